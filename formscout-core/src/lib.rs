pub mod analyze;
pub mod batch;
pub mod config;
pub mod model;
pub mod report;

pub use analyze::{Stage, analyze_company};
pub use batch::{AnalyzeOptions, ProgressCallback, analyze_companies};
pub use config::AnalyzerConfig;
pub use model::{AnalysisResult, CompanyInput};
pub use report::{ReportError, ReportFormat, ReportSummary};
