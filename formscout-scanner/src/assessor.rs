//! Mapping form fields onto standard contact data and classifying how much
//! of a form could be filled automatically.

use crate::result::{FieldKind, FormField, FormStructure};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Contact data an automated sender can always supply.
///
/// Declaration order is matching priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CanonicalConcept {
    Name,
    Email,
    Phone,
    Company,
    Message,
    Subject,
}

impl CanonicalConcept {
    pub const ALL: [CanonicalConcept; 6] = [
        CanonicalConcept::Name,
        CanonicalConcept::Email,
        CanonicalConcept::Phone,
        CanonicalConcept::Company,
        CanonicalConcept::Message,
        CanonicalConcept::Subject,
    ];

    pub fn keywords(&self) -> &'static [&'static str] {
        match self {
            CanonicalConcept::Name => &["name", "fullname", "full_name", "your_name", "氏名", "お名前"],
            CanonicalConcept::Email => &["email", "mail", "e-mail", "メール", "メールアドレス"],
            CanonicalConcept::Phone => &["phone", "tel", "telephone", "mobile", "電話", "電話番号"],
            CanonicalConcept::Company => &["company", "organization", "会社", "会社名", "企業名"],
            CanonicalConcept::Message => {
                &["message", "inquiry", "comment", "content", "お問い合わせ内容", "メッセージ"]
            }
            CanonicalConcept::Subject => &["subject", "title", "件名", "タイトル"],
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CanonicalConcept::Name => "name",
            CanonicalConcept::Email => "email",
            CanonicalConcept::Phone => "phone",
            CanonicalConcept::Company => "company",
            CanonicalConcept::Message => "message",
            CanonicalConcept::Subject => "subject",
        }
    }
}

impl fmt::Display for CanonicalConcept {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FillabilityStatus {
    Full,
    Partial,
    None,
    #[serde(rename = "No Form Found")]
    NoFormFound,
}

impl FillabilityStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FillabilityStatus::Full => "Full",
            FillabilityStatus::Partial => "Partial",
            FillabilityStatus::None => "None",
            FillabilityStatus::NoFormFound => "No Form Found",
        }
    }
}

impl fmt::Display for FillabilityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FillabilityResult {
    pub status: FillabilityStatus,
    /// At most one field per concept: the first in document order.
    pub mapped_fields: BTreeMap<CanonicalConcept, String>,
    pub unmapped_required_fields: Vec<String>,
}

/// Which concept `field` holds, by keyword over name, label and
/// placeholder, then by control type.
pub fn map_field(field: &FormField) -> Option<CanonicalConcept> {
    let identifier = format!(
        "{} {} {}",
        field.name,
        field.label.as_deref().unwrap_or(""),
        field.placeholder.as_deref().unwrap_or("")
    )
    .to_lowercase();

    if let Some(concept) = CanonicalConcept::ALL
        .into_iter()
        .find(|c| c.keywords().iter().any(|k| identifier.contains(k)))
    {
        return Some(concept);
    }

    match field.kind {
        FieldKind::Email => Some(CanonicalConcept::Email),
        FieldKind::Tel => Some(CanonicalConcept::Phone),
        FieldKind::Textarea => Some(CanonicalConcept::Message),
        _ => None,
    }
}

pub fn assess_fillability(form: &FormStructure) -> FillabilityResult {
    let mut mapped_fields = BTreeMap::new();
    let mut unmapped_required_fields = Vec::new();

    for field in &form.fields {
        match map_field(field) {
            Some(concept) => {
                mapped_fields.entry(concept).or_insert_with(|| field.name.clone());
            }
            None if field.required => {
                unmapped_required_fields.push(field.display_name().to_string());
            }
            None => {}
        }
    }

    let status = if unmapped_required_fields.is_empty() {
        FillabilityStatus::Full
    } else if !mapped_fields.is_empty() {
        FillabilityStatus::Partial
    } else {
        FillabilityStatus::None
    };

    FillabilityResult {
        status,
        mapped_fields,
        unmapped_required_fields,
    }
}

/// Share of required fields that map, rounded. 100 when nothing is required.
pub fn fillability_percentage(form: &FormStructure) -> u32 {
    let required: Vec<&FormField> = form.required_fields().collect();
    if required.is_empty() {
        return 100;
    }
    let mapped = required.iter().filter(|f| map_field(f).is_some()).count();
    ((mapped as f64 / required.len() as f64) * 100.0).round() as u32
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldMappingDetail {
    pub field: String,
    #[serde(rename = "type")]
    pub kind: FieldKind,
    pub required: bool,
    pub mapped: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mapped_to: Option<CanonicalConcept>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldMappingReport {
    pub total_fields: usize,
    pub required_fields: usize,
    pub mapped_fields: usize,
    pub unmapped_fields: usize,
    pub mapping_details: Vec<FieldMappingDetail>,
}

/// Per-field mapping, including fields that lost a concept to an earlier one.
pub fn field_mapping_report(form: &FormStructure) -> FieldMappingReport {
    let mapping_details: Vec<FieldMappingDetail> = form
        .fields
        .iter()
        .map(|field| {
            let mapped_to = map_field(field);
            FieldMappingDetail {
                field: field.label_or_name().unwrap_or("Unknown").to_string(),
                kind: field.kind.clone(),
                required: field.required,
                mapped: mapped_to.is_some(),
                mapped_to,
            }
        })
        .collect();

    let mapped_fields = mapping_details.iter().filter(|d| d.mapped).count();
    FieldMappingReport {
        total_fields: form.fields.len(),
        required_fields: form.required_fields().count(),
        mapped_fields,
        unmapped_fields: form.fields.len() - mapped_fields,
        mapping_details,
    }
}
