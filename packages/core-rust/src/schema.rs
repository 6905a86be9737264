//! Declarative table schema: ordered sections of ordered fields.
//!
//! The JSON shape is authored by operators, one document per logical table:
//!
//! ```json
//! [{ "sectionTitle": "Customer",
//!    "fields": [{ "name": "name", "label": "Name", "type": "text", "required": true }] }]
//! ```
//!
//! The schema is trusted input; structural validation is the author's job.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Suffixes that mark a field name as carrying a resolved foreign-key identifier.
///
/// Only a trailing match counts, so names like `valid` or `identifier` are never
/// treated as foreign keys.
pub const FOREIGN_KEY_SUFFIXES: &[&str] = &["_id", "Id"];

/// Suffix appended to a foreign-key field name that has no recognised suffix
/// and no explicit `displayField`.
const DISPLAY_FALLBACK_SUFFIX: &str = "_label";

/// Returns `name` with a trailing foreign-key suffix removed, if it has one.
///
/// The suffix must leave a non-empty stem: `Id` alone is not stripped.
#[must_use]
pub fn strip_foreign_key_suffix(name: &str) -> Option<&str> {
    FOREIGN_KEY_SUFFIXES.iter().find_map(|suffix| {
        name.strip_suffix(suffix)
            .filter(|stem| !stem.is_empty())
    })
}

/// Derives the logical table name from a schema document path.
///
/// Takes the final `/`-separated segment and drops everything from the first `.`:
/// `schemas/customer.json` becomes `customer`.
#[must_use]
pub fn table_name_from_path(path: &str) -> String {
    let file = path.rsplit('/').next().unwrap_or_default();
    file.split('.').next().unwrap_or_default().to_string()
}

// ---------------------------------------------------------------------------
// InputKind
// ---------------------------------------------------------------------------

/// Kind of input a field renders as.
///
/// Serialized as the plain HTML-style type string (`"text"`, `"select"`, ...).
/// Unrecognised strings are preserved in [`InputKind::Other`] and rendered as
/// text inputs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum InputKind {
    #[default]
    Text,
    Email,
    Password,
    Number,
    Date,
    DateTimeLocal,
    Time,
    Tel,
    Url,
    TextArea,
    Checkbox,
    Select,
    Other(String),
}

impl InputKind {
    /// Wire representation of this kind.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Text => "text",
            Self::Email => "email",
            Self::Password => "password",
            Self::Number => "number",
            Self::Date => "date",
            Self::DateTimeLocal => "datetime-local",
            Self::Time => "time",
            Self::Tel => "tel",
            Self::Url => "url",
            Self::TextArea => "textarea",
            Self::Checkbox => "checkbox",
            Self::Select => "select",
            Self::Other(raw) => raw,
        }
    }
}

impl From<String> for InputKind {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "text" => Self::Text,
            "email" => Self::Email,
            "password" => Self::Password,
            "number" => Self::Number,
            "date" => Self::Date,
            "datetime-local" => Self::DateTimeLocal,
            "time" => Self::Time,
            "tel" => Self::Tel,
            "url" => Self::Url,
            "textarea" => Self::TextArea,
            "checkbox" => Self::Checkbox,
            "select" => Self::Select,
            _ => Self::Other(raw),
        }
    }
}

impl From<InputKind> for String {
    fn from(kind: InputKind) -> Self {
        match kind {
            InputKind::Other(raw) => raw,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for InputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Field / Section / Schema
// ---------------------------------------------------------------------------

/// One selectable option of a `select` field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldOption {
    /// Text shown to the user.
    pub label: String,
    /// Value stored in the record.
    pub value: String,
}

/// Single field definition within a section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Field {
    /// Key of the value in the record.
    pub name: String,
    /// Display text for the input label and the list column header.
    pub label: String,
    /// Input kind.
    #[serde(rename = "type", default)]
    pub kind: InputKind,
    /// Whether the field must be non-empty on submission.
    #[serde(default)]
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub placeholder: Option<String>,
    /// Source table used to resolve this field as a foreign key.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub autocomplete_from: Option<String>,
    /// Ordered options for `select` fields.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub options: Option<Vec<FieldOption>>,
    /// Explicit name of the display field paired with a foreign-key field.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub display_field: Option<String>,
}

impl Field {
    /// Creates a plain, optional text field.
    pub fn new(name: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            kind: InputKind::Text,
            required: false,
            placeholder: None,
            autocomplete_from: None,
            options: None,
            display_field: None,
        }
    }

    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    #[must_use]
    pub fn with_kind(mut self, kind: InputKind) -> Self {
        self.kind = kind;
        self
    }

    /// Marks this field as a foreign key resolved against `source`.
    #[must_use]
    pub fn autocomplete_from(mut self, source: impl Into<String>) -> Self {
        self.autocomplete_from = Some(source.into());
        self
    }

    #[must_use]
    pub fn with_options(mut self, options: Vec<FieldOption>) -> Self {
        self.kind = InputKind::Select;
        self.options = Some(options);
        self
    }

    #[must_use]
    pub fn with_display_field(mut self, display: impl Into<String>) -> Self {
        self.display_field = Some(display.into());
        self
    }

    /// Whether this field stores an identifier resolved through autocomplete.
    #[must_use]
    pub fn is_foreign_key(&self) -> bool {
        self.autocomplete_from.is_some()
    }

    /// Record key holding the human-readable label of a foreign-key field.
    ///
    /// Resolution order: explicit `displayField`, then the name with its
    /// foreign-key suffix stripped, then `<name>_label`. For non foreign-key
    /// fields this is the field name itself.
    #[must_use]
    pub fn display_key(&self) -> String {
        if !self.is_foreign_key() {
            return self.name.clone();
        }
        if let Some(display) = &self.display_field {
            return display.clone();
        }
        match strip_foreign_key_suffix(&self.name) {
            Some(stem) => stem.to_string(),
            None => format!("{}{DISPLAY_FALLBACK_SUFFIX}", self.name),
        }
    }

    /// Key this field's value is sent under when submitting.
    ///
    /// A foreign-key field whose name ends in a foreign-key suffix is sent
    /// under the bare name (`customerId` is sent as `customer`). Every other
    /// field is sent under its own name.
    #[must_use]
    pub fn submit_key(&self) -> &str {
        if self.is_foreign_key() {
            strip_foreign_key_suffix(&self.name).unwrap_or(&self.name)
        } else {
            &self.name
        }
    }

    /// Finds the label of the option whose value equals `value`.
    #[must_use]
    pub fn option_label(&self, value: &str) -> Option<&str> {
        self.options
            .as_deref()?
            .iter()
            .find(|opt| opt.value == value)
            .map(|opt| opt.label.as_str())
    }
}

/// Titled group of fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Section {
    pub section_title: String,
    #[serde(default)]
    pub fields: Vec<Field>,
}

impl Section {
    pub fn new(title: impl Into<String>, fields: Vec<Field>) -> Self {
        Self {
            section_title: title.into(),
            fields,
        }
    }
}

/// Complete schema for one logical table.
///
/// Immutable once loaded; every renderer instance fetches its own copy.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Schema {
    sections: Vec<Section>,
}

impl Schema {
    #[must_use]
    pub fn new(sections: Vec<Section>) -> Self {
        Self { sections }
    }

    /// Parses a schema document.
    ///
    /// # Errors
    ///
    /// Returns the JSON error if the document is not an array of sections.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    #[must_use]
    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    /// All fields of all sections, in document order.
    pub fn fields(&self) -> impl Iterator<Item = &Field> {
        self.sections.iter().flat_map(|s| s.fields.iter())
    }

    /// Looks up a field by its record key.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields().find(|f| f.name == name)
    }

    /// Whether `key` may appear in a submission payload.
    #[must_use]
    pub fn is_submit_key(&self, key: &str) -> bool {
        self.fields().any(|f| f.submit_key() == key)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields().next().is_none()
    }
}
