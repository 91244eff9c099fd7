use formscout_scanner::assessor::{CanonicalConcept, FillabilityStatus};
use formscout_scanner::result::FormStructure;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyInput {
    pub name: String,
    pub url: String,
}

impl CompanyInput {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }
}

/// Everything learned about one company in one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub company_name: String,
    pub company_url: String,
    pub form_page_found: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub form_page_url: Option<String>,
    pub dynamic_content_loaded: bool,
    pub fillability_status: FillabilityStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub form_structure: Option<FormStructure>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mapped_fields: Option<BTreeMap<CanonicalConcept, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unmapped_required_fields: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spa_framework: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// RFC 3339, UTC.
    pub timestamp: String,
}

impl AnalysisResult {
    pub fn new(company: &CompanyInput) -> Self {
        Self {
            company_name: company.name.clone(),
            company_url: company.url.clone(),
            form_page_found: false,
            form_page_url: None,
            dynamic_content_loaded: false,
            fillability_status: FillabilityStatus::NoFormFound,
            form_structure: None,
            mapped_fields: None,
            unmapped_required_fields: None,
            spa_framework: None,
            error_message: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn with_error(company: &CompanyInput, error: impl Into<String>) -> Self {
        Self {
            error_message: Some(error.into()),
            ..Self::new(company)
        }
    }

    pub fn total_fields(&self) -> usize {
        self.form_structure.as_ref().map_or(0, |f| f.fields.len())
    }
}
