//! Validation result types.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Field name of a trigger's threshold.
pub const ALERT_THRESHOLD: &str = "alertThreshold";

/// Field name of a trigger's label.
pub const LABEL: &str = "label";

/// Fields whose errors are produced by the threshold validator.
///
/// Errors on other fields (for example backend messages about `actions`)
/// survive a re-validation.
pub const THRESHOLD_FIELDS: [&str; 2] = [LABEL, ALERT_THRESHOLD];

/// Field name to message, for one trigger.
pub type FieldErrors = BTreeMap<String, String>;

/// Per-trigger field errors, keyed by trigger index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TriggerErrors(BTreeMap<usize, FieldErrors>);

impl TriggerErrors {
    /// Creates an empty error map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the message for a field, replacing any previous one.
    pub fn set(&mut self, index: usize, field: &str, message: impl Into<String>) {
        self.0
            .entry(index)
            .or_default()
            .insert(field.to_string(), message.into());
    }

    /// Returns the message for a field.
    pub fn get(&self, index: usize, field: &str) -> Option<&str> {
        self.0
            .get(&index)
            .and_then(|fields| fields.get(field))
            .map(String::as_str)
    }

    /// Returns all errors for one trigger.
    pub fn for_trigger(&self, index: usize) -> Option<&FieldErrors> {
        self.0.get(&index)
    }

    /// Returns true if no trigger has errors.
    pub fn is_empty(&self) -> bool {
        self.0.values().all(BTreeMap::is_empty)
    }

    /// Number of triggers with at least one error.
    pub fn len(&self) -> usize {
        self.0.values().filter(|fields| !fields.is_empty()).count()
    }

    /// Iterates over `(index, field, message)` triples.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &str, &str)> {
        self.0.iter().flat_map(|(index, fields)| {
            fields
                .iter()
                .map(move |(field, message)| (*index, field.as_str(), message.as_str()))
        })
    }

    /// Merges a fresh threshold validation into caller-held state.
    ///
    /// Threshold-owned fields in `state` are replaced by the fresh result,
    /// including being cleared when the fresh run found them valid. Every
    /// other field already in `state` is preserved.
    pub fn merge_into(self, state: &mut Self) {
        for fields in state.0.values_mut() {
            for field in THRESHOLD_FIELDS {
                fields.remove(field);
            }
        }
        for (index, fields) in self.0 {
            state.0.entry(index).or_default().extend(fields);
        }
        state.0.retain(|_, fields| !fields.is_empty());
    }
}
