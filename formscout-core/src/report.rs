// Report generation from analysis results

use crate::model::AnalysisResult;
use chrono::{DateTime, SecondsFormat, Utc};
use csv::{Terminator, WriterBuilder};
use formscout_scanner::assessor::FillabilityStatus;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::Path;
use thiserror::Error;

const RULE: &str = "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n";
const THIN_RULE: &str = "────────────────────────────────────────────────────────────────────────────────\n";

const CSV_HEADERS: [&str; 11] = [
    "Company Name",
    "Company URL",
    "Form Page Found",
    "Form Page URL",
    "Dynamic Content Loaded",
    "Fillability Status",
    "Mapped Fields",
    "Unmapped Required Fields",
    "Total Fields",
    "Error Message",
    "Timestamp",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportFormat {
    Text,
    Json,
    Csv,
}

impl ReportFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Some(ReportFormat::Text),
            "json" => Some(ReportFormat::Json),
            "csv" => Some(ReportFormat::Csv),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ReportFormat::Text => "txt",
            ReportFormat::Json => "json",
            ReportFormat::Csv => "csv",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FillabilityBreakdown {
    pub full: usize,
    pub partial: usize,
    pub none: usize,
    pub no_form: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSummary {
    pub total_companies: usize,
    /// Percent of companies whose contact page was found.
    pub form_discovery_success_rate: f64,
    /// Percent of companies whose contact page rendered usable content.
    pub dynamic_content_success_rate: f64,
    pub fillability_breakdown: FillabilityBreakdown,
    pub results: Vec<AnalysisResult>,
    pub generated_at: String,
}

impl ReportSummary {
    pub fn from_results(results: Vec<AnalysisResult>) -> Self {
        Self::from_results_at(results, Utc::now())
    }

    pub fn from_results_at(results: Vec<AnalysisResult>, generated_at: DateTime<Utc>) -> Self {
        let total = results.len();
        let found = results.iter().filter(|r| r.form_page_found).count();
        let loaded = results.iter().filter(|r| r.dynamic_content_loaded).count();

        let mut breakdown = FillabilityBreakdown::default();
        for result in &results {
            match result.fillability_status {
                FillabilityStatus::Full => breakdown.full += 1,
                FillabilityStatus::Partial => breakdown.partial += 1,
                FillabilityStatus::None => breakdown.none += 1,
                FillabilityStatus::NoFormFound => breakdown.no_form += 1,
            }
        }

        Self {
            total_companies: total,
            form_discovery_success_rate: percentage(found, total),
            dynamic_content_success_rate: percentage(loaded, total),
            fillability_breakdown: breakdown,
            results,
            generated_at: generated_at.to_rfc3339(),
        }
    }
}

fn percentage(count: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        count as f64 / total as f64 * 100.0
    }
}

/// Everything that can go wrong turning a run into report text.
#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Failed to serialize JSON report: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to write CSV report: {0}")]
    Csv(#[from] csv::Error),

    #[error("Failed to flush CSV report: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV report is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// One header row and one row per company, `\n`-separated with no trailing newline.
pub fn generate_csv_report(results: &[AnalysisResult]) -> Result<String, ReportError> {
    let mut wtr = WriterBuilder::new()
        .terminator(Terminator::Any(b'\n'))
        .from_writer(Vec::new());
    wtr.write_record(CSV_HEADERS)?;

    for result in results {
        let mapped = result
            .mapped_fields
            .as_ref()
            .map(|fields| {
                fields
                    .iter()
                    .map(|(concept, field)| format!("{}:{}", concept, field))
                    .collect::<Vec<_>>()
                    .join("; ")
            })
            .unwrap_or_default();
        let unmapped = result
            .unmapped_required_fields
            .as_ref()
            .map(|fields| fields.join("; "))
            .unwrap_or_default();
        let status = result.fillability_status.to_string();
        let total_fields = result.total_fields().to_string();

        wtr.write_record([
            result.company_name.as_str(),
            result.company_url.as_str(),
            yes_no(result.form_page_found),
            result.form_page_url.as_deref().unwrap_or_default(),
            yes_no(result.dynamic_content_loaded),
            status.as_str(),
            mapped.as_str(),
            unmapped.as_str(),
            total_fields.as_str(),
            result.error_message.as_deref().unwrap_or_default(),
            result.timestamp.as_str(),
        ])?;
    }

    let bytes = wtr.into_inner().map_err(|e| e.into_error())?;
    let mut csv = String::from_utf8(bytes)?;
    if csv.ends_with('\n') {
        csv.pop();
    }
    Ok(csv)
}

fn yes_no(value: bool) -> &'static str {
    if value { "Yes" } else { "No" }
}

pub fn generate_json_report(summary: &ReportSummary) -> Result<String, serde_json::Error> {
    let mut report = serde_json::to_value(summary)?;
    if let Some(object) = report.as_object_mut() {
        object.insert(
            "metadata".to_string(),
            serde_json::json!({
                "generator": "formscout",
                "version": env!("CARGO_PKG_VERSION"),
                "format": "json"
            }),
        );
    }
    serde_json::to_string_pretty(&report)
}

pub fn generate_text_report(summary: &ReportSummary) -> String {
    let mut report = String::new();

    report.push_str(RULE);
    report.push_str("                      CONTACT FORM FILLABILITY REPORT\n");
    report.push_str(RULE);
    report.push('\n');

    report.push_str(&format!("Generated:        {}\n", summary.generated_at));
    report.push_str(&format!("Companies:        {}\n", summary.total_companies));
    report.push_str(&format!(
        "Form Discovery:   {:.1}%\n",
        summary.form_discovery_success_rate
    ));
    report.push_str(&format!(
        "Dynamic Content:  {:.1}%\n",
        summary.dynamic_content_success_rate
    ));
    report.push('\n');

    report.push_str(RULE);
    report.push_str("FILLABILITY\n");
    report.push_str(RULE);
    report.push('\n');

    let breakdown = &summary.fillability_breakdown;
    report.push_str(&format!("  [FULL]     {}\n", breakdown.full));
    report.push_str(&format!("  [PARTIAL]  {}\n", breakdown.partial));
    report.push_str(&format!("  [NONE]     {}\n", breakdown.none));
    report.push_str(&format!("  [NO FORM]  {}\n", breakdown.no_form));
    report.push('\n');

    if !summary.results.is_empty() {
        report.push_str(RULE);
        report.push_str("COMPANIES\n");
        report.push_str(RULE);
        report.push('\n');

        for (idx, result) in summary.results.iter().enumerate() {
            report.push_str(&format!("[{}] {}\n", idx + 1, result.company_name));
            report.push_str(&format!("URL:          {}\n", result.company_url));
            report.push_str(&format!("Status:       {}\n", result.fillability_status));
            if let Some(url) = &result.form_page_url {
                report.push_str(&format!("Form Page:    {}\n", url));
            }
            if let Some(framework) = &result.spa_framework {
                report.push_str(&format!("Framework:    {}\n", framework));
            }
            if result.form_structure.is_some() {
                report.push_str(&format!("Fields:       {}\n", result.total_fields()));
            }
            if let Some(mapped) = result.mapped_fields.as_ref().filter(|m| !m.is_empty()) {
                report.push_str("Mapped:\n");
                for (concept, field) in mapped {
                    report.push_str(&format!("  {:<10}{}\n", concept.as_str(), field));
                }
            }
            if let Some(unmapped) = result
                .unmapped_required_fields
                .as_ref()
                .filter(|u| !u.is_empty())
            {
                report.push_str(&format!("Unmapped:     {}\n", unmapped.join(", ")));
            }
            if let Some(error) = &result.error_message {
                report.push_str(&format!("Error:        {}\n", error));
            }
            report.push('\n');
            report.push_str(THIN_RULE);
            report.push('\n');
        }
    }

    report.push_str(RULE);
    report.push_str("                          End of Report\n");
    report.push_str(RULE);

    report
}

pub fn render_report(format: ReportFormat, summary: &ReportSummary) -> Result<String, ReportError> {
    match format {
        ReportFormat::Text => Ok(generate_text_report(summary)),
        ReportFormat::Json => Ok(generate_json_report(summary)?),
        ReportFormat::Csv => generate_csv_report(&summary.results),
    }
}

/// `contact-form-analysis-<timestamp>.<ext>`, with `:` and `.` in the timestamp replaced by `-`.
pub fn report_filename(format: ReportFormat, now: DateTime<Utc>) -> String {
    let stamp = now
        .to_rfc3339_opts(SecondsFormat::Millis, true)
        .replace([':', '.'], "-");
    format!("contact-form-analysis-{}.{}", stamp, format.extension())
}

pub fn save_report(content: &str, path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = File::create(path)?;
    file.write_all(content.as_bytes())?;
    Ok(())
}
