//! View models produced by the renderers.
//!
//! These are plain data: a presentation layer (terminal, web, native) draws
//! them without consulting the schema again.

use crate::autocomplete::Suggestion;
use crate::schema::InputKind;

/// Text of the empty default entry that precedes a select's options.
pub const SELECT_PLACEHOLDER: &str = "Select an option";
pub const SUBMIT_LABEL: &str = "Submit";
pub const LOADING_TEXT: &str = "Loading records...";
pub const NO_COLUMNS_TEXT: &str = "No columns available to display.";
pub const NO_RECORDS_TEXT: &str = "No records found.";
pub const ACTIONS_HEADER: &str = "Actions";
pub const DELETE_QUESTION: &str = "Are you sure you want to delete this record?";

// ---------------------------------------------------------------------------
// Form
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectOption {
    pub label: String,
    pub value: String,
    pub selected: bool,
}

/// How a field is drawn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldWidget {
    /// Single input of the field's kind.
    Input,
    /// Drop-down whose first option is the empty default.
    Select { options: Vec<SelectOption> },
    /// Text input bound to a display field, with an optional candidate list
    /// rendered beneath it. `suggestions` is empty unless this field is active.
    Autocomplete { suggestions: Vec<Suggestion> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldView {
    pub name: String,
    pub label: String,
    pub kind: InputKind,
    pub required: bool,
    pub placeholder: Option<String>,
    /// Value shown in the input. For foreign keys this is the display label,
    /// never the identifier.
    pub value: String,
    /// Inline validation message.
    pub error: Option<String>,
    pub widget: FieldWidget,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionView {
    pub title: String,
    pub fields: Vec<FieldView>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormView {
    /// Empty when the schema failed to load or is still loading.
    pub sections: Vec<SectionView>,
    pub submit_label: &'static str,
    /// Last submission failure, shown until the next attempt.
    pub submit_error: Option<String>,
    /// Identifier of the record being edited; `None` in create mode.
    pub editing_id: Option<String>,
}

impl FormView {
    /// Finds a rendered field by name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldView> {
        self.sections
            .iter()
            .flat_map(|s| s.fields.iter())
            .find(|f| f.name == name)
    }
}

// ---------------------------------------------------------------------------
// List
// ---------------------------------------------------------------------------

/// Address of a record's edit form opened as an independent surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowTarget {
    pub record_id: String,
    pub schema_path: String,
}

impl WindowTarget {
    /// Route of the standalone form: `/dynamicform/{id}?jsonFileName={path}`.
    #[must_use]
    pub fn address(&self) -> String {
        format!(
            "/dynamicform/{}?jsonFileName={}",
            urlencoding::encode(&self.record_id),
            urlencoding::encode(&self.schema_path)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CellView {
    /// Plain (possibly option-label resolved) text.
    Text(String),
    /// The `name` column: click enters edit mode; `window` opens the same
    /// record in a separate surface.
    EditLink {
        label: String,
        record_id: String,
        window: WindowTarget,
    },
}

impl CellView {
    /// Visible text of the cell.
    #[must_use]
    pub fn text(&self) -> &str {
        match self {
            Self::Text(text) => text,
            Self::EditLink { label, .. } => label,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowView {
    /// Identifier used by row actions; rows without an id get no actions.
    pub record_id: Option<String>,
    pub cells: Vec<CellView>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageControl {
    pub number: u32,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableView {
    /// Column labels followed by the actions header.
    pub headers: Vec<String>,
    pub rows: Vec<RowView>,
    /// Shown as a single full-width row when the page has no records.
    pub empty_message: Option<&'static str>,
    pub pages: Vec<PageControl>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListView {
    Loading,
    NoColumns,
    Table(TableView),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_address_encodes_schema_path() {
        let target = WindowTarget {
            record_id: "9".into(),
            schema_path: "schemas/customer.json".into(),
        };
        assert_eq!(
            target.address(),
            "/dynamicform/9?jsonFileName=schemas%2Fcustomer.json"
        );
    }

    #[test]
    fn cell_text() {
        assert_eq!(CellView::Text("x".into()).text(), "x");
        let link = CellView::EditLink {
            label: "Bob".into(),
            record_id: "1".into(),
            window: WindowTarget {
                record_id: "1".into(),
                schema_path: "schemas/customer.json".into(),
            },
        };
        assert_eq!(link.text(), "Bob");
    }
}
