use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome of searching a homepage for its contact page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactPageResult {
    pub found: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Every surviving candidate, best first. Only filled when requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub all_candidate_urls: Option<Vec<String>>,
}

impl ContactPageResult {
    pub fn found(url: String, all_candidate_urls: Option<Vec<String>>) -> Self {
        Self {
            found: true,
            url: Some(url),
            error: None,
            all_candidate_urls,
        }
    }

    pub fn with_error(error: impl Into<String>) -> Self {
        Self {
            found: false,
            url: None,
            error: Some(error.into()),
            all_candidate_urls: None,
        }
    }
}

/// Whether a page's rendered content was judged usable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DynamicContentResult {
    pub loaded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DynamicContentResult {
    pub fn loaded() -> Self {
        Self {
            loaded: true,
            error: None,
        }
    }

    pub fn not_loaded(error: impl Into<String>) -> Self {
        Self {
            loaded: false,
            error: Some(error.into()),
        }
    }
}

/// The kind of control behind a form field.
///
/// Serialized as the lowercase HTML type string, so unknown types coming
/// out of the DOM survive a round trip through `Unknown`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FieldKind {
    Text,
    Email,
    Tel,
    Textarea,
    Select,
    Checkbox,
    Radio,
    Number,
    Url,
    Date,
    Password,
    Search,
    File,
    Unknown(String),
}

impl FieldKind {
    /// Resolve the kind from the element's tag name and its `type` attribute.
    pub fn from_control(tag: &str, type_attr: Option<&str>) -> Self {
        match tag.to_ascii_lowercase().as_str() {
            "textarea" => FieldKind::Textarea,
            "select" => FieldKind::Select,
            _ => match type_attr.map(str::trim).filter(|t| !t.is_empty()) {
                Some(t) => FieldKind::from(t.to_string()),
                None => FieldKind::Text,
            },
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            FieldKind::Text => "text",
            FieldKind::Email => "email",
            FieldKind::Tel => "tel",
            FieldKind::Textarea => "textarea",
            FieldKind::Select => "select",
            FieldKind::Checkbox => "checkbox",
            FieldKind::Radio => "radio",
            FieldKind::Number => "number",
            FieldKind::Url => "url",
            FieldKind::Date => "date",
            FieldKind::Password => "password",
            FieldKind::Search => "search",
            FieldKind::File => "file",
            FieldKind::Unknown(other) => other,
        }
    }

    /// Radio buttons and checkboxes can be collapsed into one logical field.
    pub fn is_groupable(&self) -> bool {
        matches!(self, FieldKind::Radio | FieldKind::Checkbox)
    }
}

impl From<String> for FieldKind {
    fn from(value: String) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "text" => FieldKind::Text,
            "email" => FieldKind::Email,
            "tel" => FieldKind::Tel,
            "textarea" => FieldKind::Textarea,
            "select" => FieldKind::Select,
            "checkbox" => FieldKind::Checkbox,
            "radio" => FieldKind::Radio,
            "number" => FieldKind::Number,
            "url" => FieldKind::Url,
            "date" => FieldKind::Date,
            "password" => FieldKind::Password,
            "search" => FieldKind::Search,
            "file" => FieldKind::File,
            other => FieldKind::Unknown(other.to_string()),
        }
    }
}

impl From<FieldKind> for String {
    fn from(kind: FieldKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One logical form field. Radio/checkbox groups sharing a name are a single field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormField {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: FieldKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
}

impl FormField {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            label: None,
            placeholder: None,
            required: false,
            options: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.placeholder = Some(placeholder.into());
        self
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    /// First non-empty of label, name and placeholder.
    pub fn label_or_name(&self) -> Option<&str> {
        [
            self.label.as_deref(),
            Some(self.name.as_str()),
            self.placeholder.as_deref(),
        ]
        .into_iter()
        .flatten()
        .find(|s| !s.is_empty())
    }

    /// Human-facing name for unmapped-field lists.
    pub fn display_name(&self) -> &str {
        self.label_or_name().unwrap_or("Unknown field")
    }
}

/// One `<form>` element. `fields` is in document order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormStructure {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    pub fields: Vec<FormField>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submit_button: Option<String>,
}

impl FormStructure {
    pub fn new(fields: Vec<FormField>) -> Self {
        Self {
            fields,
            ..Default::default()
        }
    }

    pub fn required_fields(&self) -> impl Iterator<Item = &FormField> {
        self.fields.iter().filter(|f| f.required)
    }
}
