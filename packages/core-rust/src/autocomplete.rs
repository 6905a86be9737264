//! Autocomplete resolution for foreign-key fields.
//!
//! A lookup is issued for every non-empty keystroke on a foreign-key field;
//! there is no debouncing, caching or cancellation. Each request carries a
//! per-field generation number so [`LookupOrdering`] can decide what happens
//! when responses arrive out of order.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::record::value_text;

/// One candidate offered for a foreign-key field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suggestion {
    /// Human-readable label, taken from the source record's `name`.
    pub label: String,
    /// Identifier, taken from the source record's `id`.
    pub value: String,
}

impl Suggestion {
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
        }
    }
}

/// Normalizes a lookup-by-name response into candidates.
///
/// The gateway may answer with a single record or an array of records; both
/// become a sequence. Entries that are not objects are skipped.
#[must_use]
pub fn suggestions_from_lookup(response: &Value) -> Vec<Suggestion> {
    let items: Vec<&Value> = match response {
        Value::Array(items) => items.iter().collect(),
        Value::Null => Vec::new(),
        single => vec![single],
    };

    items
        .into_iter()
        .filter_map(Value::as_object)
        .map(|obj| Suggestion {
            label: obj.get("name").map(value_text).unwrap_or_default(),
            value: obj.get("id").map(value_text).unwrap_or_default(),
        })
        .collect()
}

/// How responses to overlapping lookups for the same field are applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LookupOrdering {
    /// Only the response to the most recently issued request is applied;
    /// older responses are discarded whenever they arrive.
    #[default]
    LatestIssued,
    /// Every response is applied as it arrives, so the last one to resolve
    /// wins even if it answers a stale keystroke.
    LastResolved,
}

/// A lookup to run against the entity gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupRequest {
    /// Form field the candidates are for.
    pub field: String,
    /// Source table to search.
    pub source: String,
    /// Text typed so far.
    pub text: String,
    /// Per-field sequence number assigned when the request was issued.
    pub generation: u64,
}

/// Suggestion list state of one form. At most one field is active.
#[derive(Debug, Clone, Default)]
pub struct SuggestionState {
    ordering: LookupOrdering,
    latest: HashMap<String, u64>,
    active_field: Option<String>,
    candidates: Vec<Suggestion>,
    visible: bool,
}

impl SuggestionState {
    #[must_use]
    pub fn new(ordering: LookupOrdering) -> Self {
        Self {
            ordering,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn ordering(&self) -> LookupOrdering {
        self.ordering
    }

    /// Registers a new lookup for `field` and returns the request to run.
    pub fn issue(&mut self, field: &str, source: &str, text: &str) -> LookupRequest {
        let generation = self.latest.entry(field.to_string()).or_insert(0);
        *generation += 1;
        LookupRequest {
            field: field.to_string(),
            source: source.to_string(),
            text: text.to_string(),
            generation: *generation,
        }
    }

    /// Applies a lookup response. Returns `false` when the response was
    /// discarded as stale.
    pub fn apply_response(&mut self, request: &LookupRequest, candidates: Vec<Suggestion>) -> bool {
        if self.ordering == LookupOrdering::LatestIssued
            && self.latest.get(&request.field).copied() != Some(request.generation)
        {
            debug!(
                field = %request.field,
                generation = request.generation,
                "discarding stale lookup response"
            );
            return false;
        }

        self.visible = !candidates.is_empty();
        self.candidates = candidates;
        self.active_field = Some(request.field.clone());
        true
    }

    /// Hides the suggestion list.
    ///
    /// Under [`LookupOrdering::LatestIssued`] every outstanding request is
    /// invalidated as well, so a late response cannot reopen the list.
    pub fn close(&mut self) {
        if self.ordering == LookupOrdering::LatestIssued {
            for generation in self.latest.values_mut() {
                *generation += 1;
            }
        }
        self.visible = false;
        self.active_field = None;
        self.candidates.clear();
    }

    /// Field the current candidates belong to, if any are shown.
    #[must_use]
    pub fn active_field(&self) -> Option<&str> {
        if self.visible {
            self.active_field.as_deref()
        } else {
            None
        }
    }

    /// Candidates to render beneath `field`; empty unless `field` is active.
    #[must_use]
    pub fn visible_for(&self, field: &str) -> &[Suggestion] {
        if self.active_field() == Some(field) {
            &self.candidates
        } else {
            &[]
        }
    }

    #[must_use]
    pub fn is_visible(&self) -> bool {
        self.visible
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn normalizes_single_record() {
        let got = suggestions_from_lookup(&json!({ "id": 42, "name": "Acme" }));
        assert_eq!(got, vec![Suggestion::new("Acme", "42")]);
    }

    #[test]
    fn normalizes_record_sequence() {
        let got = suggestions_from_lookup(&json!([
            { "id": "1", "name": "Acme" },
            { "id": "2", "name": "Acorn" },
            "garbage"
        ]));
        assert_eq!(
            got,
            vec![Suggestion::new("Acme", "1"), Suggestion::new("Acorn", "2")]
        );
    }

    #[test]
    fn null_response_has_no_candidates() {
        assert!(suggestions_from_lookup(&Value::Null).is_empty());
        assert!(suggestions_from_lookup(&json!([])).is_empty());
    }

    #[test]
    fn empty_candidate_set_is_not_shown() {
        let mut state = SuggestionState::default();
        let req = state.issue("customerId", "customer", "zz");
        assert!(state.apply_response(&req, Vec::new()));
        assert!(!state.is_visible());
        assert!(state.visible_for("customerId").is_empty());
    }

    #[test]
    fn candidates_render_only_under_active_field() {
        let mut state = SuggestionState::default();
        let req = state.issue("customerId", "customer", "Ac");
        state.apply_response(&req, vec![Suggestion::new("Acme", "42")]);
        assert_eq!(state.active_field(), Some("customerId"));
        assert_eq!(state.visible_for("customerId").len(), 1);
        assert!(state.visible_for("supplierId").is_empty());
    }

    #[test]
    fn generations_are_per_field() {
        let mut state = SuggestionState::default();
        let a1 = state.issue("a", "t", "x");
        let b1 = state.issue("b", "t", "x");
        let a2 = state.issue("a", "t", "xy");
        assert_eq!((a1.generation, b1.generation, a2.generation), (1, 1, 2));
    }

    // Out-of-order responses: "A" issued first, "Ac" second, but "A" resolves last.

    #[test]
    fn latest_issued_discards_stale_response() {
        let mut state = SuggestionState::new(LookupOrdering::LatestIssued);
        let first = state.issue("customerId", "customer", "A");
        let second = state.issue("customerId", "customer", "Ac");

        assert!(state.apply_response(&second, vec![Suggestion::new("Acme", "42")]));
        assert!(!state.apply_response(&first, vec![Suggestion::new("Alpha", "7")]));
        assert_eq!(state.visible_for("customerId")[0].label, "Acme");
    }

    #[test]
    fn last_resolved_keeps_the_source_race() {
        let mut state = SuggestionState::new(LookupOrdering::LastResolved);
        assert_eq!(state.ordering(), LookupOrdering::LastResolved);
        let first = state.issue("customerId", "customer", "A");
        let second = state.issue("customerId", "customer", "Ac");

        assert!(state.apply_response(&second, vec![Suggestion::new("Acme", "42")]));
        assert!(state.apply_response(&first, vec![Suggestion::new("Alpha", "7")]));
        assert_eq!(state.visible_for("customerId")[0].label, "Alpha");
    }

    #[test]
    fn close_invalidates_outstanding_requests_under_latest_issued() {
        let mut state = SuggestionState::new(LookupOrdering::LatestIssued);
        let req = state.issue("customerId", "customer", "Ac");
        state.close();
        assert!(!state.apply_response(&req, vec![Suggestion::new("Acme", "42")]));
        assert!(!state.is_visible());
    }

    #[test]
    fn close_does_not_invalidate_under_last_resolved() {
        let mut state = SuggestionState::new(LookupOrdering::LastResolved);
        let req = state.issue("customerId", "customer", "Ac");
        state.close();
        assert!(state.apply_response(&req, vec![Suggestion::new("Acme", "42")]));
        assert!(state.is_visible());
    }
}
