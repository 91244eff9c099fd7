// Include handlers module directly from handlers.rs
#[path = "handlers.rs"]
pub mod handlers;

// Re-export commonly used handler functions for convenience
pub use handlers::{
    load_companies_from_file,
    load_companies_from_source,
    parse_company_line,
    parse_url_line,
    write_report,
};

pub use formscout_core::{AnalysisResult, AnalyzerConfig, CompanyInput, ReportFormat, ReportSummary};
