//! Form draft state and its pure transitions.
//!
//! [`FormState`] holds everything one form instance owns: the draft record,
//! per-field validation errors, the identity of the record being edited and
//! the suggestion list. Every user or network event maps to one `apply_*`
//! transition; none of them perform I/O. The async driver issues the
//! requests the transitions ask for and feeds the results back.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::autocomplete::{LookupOrdering, LookupRequest, Suggestion, SuggestionState};
use crate::error::FormError;
use crate::record::{value_text, Record};
use crate::schema::{FieldOption, InputKind, Schema};
use crate::view::{
    FieldView, FieldWidget, FormView, SectionView, SelectOption, SELECT_PLACEHOLDER, SUBMIT_LABEL,
};

/// Inline message recorded for an empty required field.
pub const REQUIRED_MESSAGE: &str = "This field is required";

/// Follow-up requested by [`FormState::apply_change`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeEffect {
    /// Run this lookup and feed the result to [`FormState::apply_lookup_response`].
    Lookup(LookupRequest),
    /// Nothing to fetch; the suggestion list was closed.
    CloseSuggestions,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitKind {
    Create,
    Update { id: String },
}

/// A validated, normalized write ready for dispatch.
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    pub kind: SubmitKind,
    pub payload: Record,
}

/// Result of applying a dispatch outcome to the form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Storage confirmed the write; the embedding caller may close the form.
    Saved,
    /// The write failed; the draft is untouched and may be resubmitted.
    Kept,
}

/// Normalizes a draft into the payload sent to storage.
///
/// For each foreign-key field whose name carries a foreign-key suffix, the
/// identifier is moved to the bare name, overwriting the display label held
/// there. A foreign-key field with no identifier in the draft sends nothing
/// under the bare name, so stale display text never leaks. Finally every key
/// that is not a submittable schema key is dropped.
///
/// This is normalization, not validation: call it only after validation
/// succeeded.
#[must_use]
pub fn submission_payload(schema: &Schema, draft: &Record) -> Record {
    let mut payload = draft.clone();

    for field in schema.fields().filter(|f| f.is_foreign_key()) {
        let bare = field.submit_key();
        if bare == field.name {
            continue;
        }
        match payload.remove(&field.name) {
            Some(id) => {
                payload.set(bare, id);
            }
            None => {
                payload.remove(bare);
            }
        }
    }

    payload.retain(|key, _| schema.is_submit_key(key));
    payload
}

/// Draft state of one form instance.
#[derive(Debug, Clone)]
pub struct FormState {
    draft: Record,
    errors: BTreeMap<String, String>,
    editing_id: Option<String>,
    suggestions: SuggestionState,
    submit_error: Option<String>,
}

impl FormState {
    /// Creates an empty form. `editing_id` of `None` means create mode.
    #[must_use]
    pub fn new(editing_id: Option<String>, ordering: LookupOrdering) -> Self {
        Self {
            draft: Record::new(),
            errors: BTreeMap::new(),
            editing_id,
            suggestions: SuggestionState::new(ordering),
            submit_error: None,
        }
    }

    #[must_use]
    pub fn draft(&self) -> &Record {
        &self.draft
    }

    #[must_use]
    pub fn errors(&self) -> &BTreeMap<String, String> {
        &self.errors
    }

    #[must_use]
    pub fn error(&self, field: &str) -> Option<&str> {
        self.errors.get(field).map(String::as_str)
    }

    #[must_use]
    pub fn editing_id(&self) -> Option<&str> {
        self.editing_id.as_deref()
    }

    #[must_use]
    pub fn suggestions(&self) -> &SuggestionState {
        &self.suggestions
    }

    #[must_use]
    pub fn submit_error(&self) -> Option<&str> {
        self.submit_error.as_deref()
    }

    /// Replaces the draft with a record loaded for editing.
    ///
    /// Foreign-key fields take the identifier from the response property of
    /// the same name and the label from the property named by the display key.
    /// Other fields are copied as-is. Properties the schema does not mention
    /// are ignored.
    pub fn hydrate(&mut self, schema: &Schema, response: &Record) {
        let mut draft = Record::new();
        for field in schema.fields() {
            if let Some(value) = response.get(&field.name) {
                draft.set(field.name.clone(), value.clone());
            }
            if field.is_foreign_key() {
                let display = field.display_key();
                if let Some(label) = response.get(&display) {
                    draft.set(display, label.clone());
                }
            }
        }
        self.draft = draft;
    }

    /// Applies one keystroke or selection on the field named `name`.
    ///
    /// On a foreign-key field the text goes to the display field and the
    /// identifier is cleared until a suggestion is accepted; non-empty text
    /// asks for a lookup. Any other change writes the field directly and
    /// closes the suggestion list.
    pub fn apply_change(
        &mut self,
        schema: &Schema,
        name: &str,
        value: impl Into<Value>,
    ) -> ChangeEffect {
        let value = value.into();

        let Some((field, source)) = schema
            .field(name)
            .and_then(|f| f.autocomplete_from.as_deref().map(|source| (f, source)))
        else {
            self.draft.set(name, value);
            self.suggestions.close();
            return ChangeEffect::CloseSuggestions;
        };

        let text = value_text(&value);
        self.draft.set(field.display_key(), value);
        self.draft.set(field.name.clone(), "");

        if text.is_empty() {
            self.suggestions.close();
            ChangeEffect::CloseSuggestions
        } else {
            ChangeEffect::Lookup(self.suggestions.issue(name, source, &text))
        }
    }

    /// Publishes the candidates returned for `request`. Returns `false` when
    /// the response was discarded as stale.
    pub fn apply_lookup_response(
        &mut self,
        request: &LookupRequest,
        candidates: Vec<Suggestion>,
    ) -> bool {
        self.suggestions.apply_response(request, candidates)
    }

    /// Binds a chosen candidate into the active field: label into the display
    /// field, value into the identifier field, in one step. Closes the list.
    ///
    /// Returns `false` when no field is active.
    pub fn apply_suggestion(&mut self, schema: &Schema, suggestion: &Suggestion) -> bool {
        let Some(field) = self
            .suggestions
            .active_field()
            .and_then(|name| schema.field(name))
        else {
            return false;
        };

        self.draft.set(field.display_key(), suggestion.label.clone());
        self.draft.set(field.name.clone(), suggestion.value.clone());
        self.suggestions.close();
        true
    }

    /// Selects the visible candidate at `index` of the active field.
    pub fn select_suggestion(&mut self, schema: &Schema, index: usize) -> bool {
        let chosen = self
            .suggestions
            .active_field()
            .and_then(|name| self.suggestions.visible_for(name).get(index))
            .cloned();
        match chosen {
            Some(suggestion) => self.apply_suggestion(schema, &suggestion),
            None => false,
        }
    }

    /// Recomputes the error set from scratch. Returns whether the form is valid.
    pub fn apply_validation(&mut self, schema: &Schema) -> bool {
        self.errors = schema
            .fields()
            .filter(|f| f.required && self.draft.is_blank(&f.name))
            .map(|f| (f.name.clone(), REQUIRED_MESSAGE.to_string()))
            .collect();
        self.errors.is_empty()
    }

    /// Validates and, if valid, produces the normalized write to dispatch.
    ///
    /// # Errors
    ///
    /// Returns [`FormError::Validation`] listing the empty required fields in
    /// schema order. Nothing should be sent to storage in that case.
    pub fn begin_submit(&mut self, schema: &Schema) -> Result<Submission, FormError> {
        self.submit_error = None;
        if !self.apply_validation(schema) {
            let fields = schema
                .fields()
                .filter(|f| self.errors.contains_key(&f.name))
                .map(|f| f.name.clone())
                .collect();
            return Err(FormError::Validation { fields });
        }

        let kind = match &self.editing_id {
            Some(id) => SubmitKind::Update { id: id.clone() },
            None => SubmitKind::Create,
        };
        Ok(Submission {
            kind,
            payload: submission_payload(schema, &self.draft),
        })
    }

    /// Records the outcome of a dispatched write.
    ///
    /// A failure keeps the draft as typed; there is nothing to roll back.
    pub fn apply_submit_result(&mut self, result: Result<(), String>) -> SubmitOutcome {
        match result {
            Ok(()) => {
                self.submit_error = None;
                SubmitOutcome::Saved
            }
            Err(reason) => {
                self.submit_error = Some(reason);
                SubmitOutcome::Kept
            }
        }
    }

    /// Renders the form against `schema`.
    #[must_use]
    pub fn view(&self, schema: &Schema) -> FormView {
        let sections = schema
            .sections()
            .iter()
            .map(|section| SectionView {
                title: section.section_title.clone(),
                fields: section
                    .fields
                    .iter()
                    .map(|field| {
                        let value = self.draft.text(&field.display_key());
                        let widget = if field.kind == InputKind::Select {
                            FieldWidget::Select {
                                options: select_options(field.options.as_deref(), &value),
                            }
                        } else if field.is_foreign_key() {
                            FieldWidget::Autocomplete {
                                suggestions: self.suggestions.visible_for(&field.name).to_vec(),
                            }
                        } else {
                            FieldWidget::Input
                        };
                        FieldView {
                            name: field.name.clone(),
                            label: field.label.clone(),
                            kind: field.kind.clone(),
                            required: field.required,
                            placeholder: field.placeholder.clone(),
                            value,
                            error: self.errors.get(&field.name).cloned(),
                            widget,
                        }
                    })
                    .collect(),
            })
            .collect();

        FormView {
            sections,
            submit_label: SUBMIT_LABEL,
            submit_error: self.submit_error.clone(),
            editing_id: self.editing_id.clone(),
        }
    }
}

fn select_options(options: Option<&[FieldOption]>, current: &str) -> Vec<SelectOption> {
    std::iter::once(SelectOption {
        label: SELECT_PLACEHOLDER.to_string(),
        value: String::new(),
        selected: current.is_empty(),
    })
    .chain(options.unwrap_or_default().iter().map(|opt| SelectOption {
        label: opt.label.clone(),
        value: opt.value.clone(),
        selected: opt.value == current,
    }))
    .collect()
}
