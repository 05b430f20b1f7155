//! Error types for rule persistence.

use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;
use vigil_validator::TriggerErrors;

/// Fallback shown when the backend gives no reason for a failed verification.
pub const GENERIC_FAILURE: &str = "An error occurred";

/// Message for a verification that outlived the polling deadline.
pub const TIMEOUT_MESSAGE: &str = "Looking for that channel took too long";

/// Errors raised by a [`crate::RuleTransport`].
#[derive(Debug, Error)]
pub enum Error {
    /// Backend answered with a non-success status.
    #[error("request failed with status {status}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Decoded JSON body, if there was one.
        body: Option<Value>,
    },

    /// Auth token was rejected.
    #[error("invalid auth token")]
    Unauthorized,

    /// Response body could not be understood.
    #[error("failed to parse response: {0}")]
    Parse(String),

    /// Client configuration is unusable.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Network error.
    #[error(transparent)]
    Network(#[from] reqwest::Error),

    /// Rule model error.
    #[error(transparent)]
    Rule(#[from] vigil_rule::Error),
}

/// Result type alias for transport operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Terminal failure of a save or delete.
///
/// Every kind carries a human-readable message; callers display it without
/// needing to tell the kinds apart.
#[derive(Debug, Clone, Error)]
pub enum SaveError {
    /// Local validation failed; nothing was sent.
    #[error("{message}")]
    ClientValidation {
        /// Summary message.
        message: String,
        /// Per-trigger threshold errors.
        trigger_errors: TriggerErrors,
    },

    /// Backend rejected the save, or the request never completed.
    #[error("{message}")]
    Persistence {
        /// Summary message.
        message: String,
        /// Field name to backend messages.
        field_errors: BTreeMap<String, Vec<String>>,
    },

    /// Asynchronous verification reported failure.
    #[error("{0}")]
    VerificationFailed(String),

    /// Asynchronous verification did not finish before the deadline.
    #[error("{}", TIMEOUT_MESSAGE)]
    VerificationTimeout,

    /// The owning editor was torn down.
    #[error("rule editor was torn down")]
    TornDown,
}

impl SaveError {
    /// Message suitable for display.
    pub fn message(&self) -> String {
        self.to_string()
    }

    /// Backend field annotations, if any.
    pub const fn field_errors(&self) -> Option<&BTreeMap<String, Vec<String>>> {
        match self {
            Self::Persistence { field_errors, .. } => Some(field_errors),
            _ => None,
        }
    }

    /// Threshold annotations from local validation, if any.
    pub const fn trigger_errors(&self) -> Option<&TriggerErrors> {
        match self {
            Self::ClientValidation { trigger_errors, .. } => Some(trigger_errors),
            _ => None,
        }
    }

    /// Normalizes a failed create, update or delete request.
    pub(crate) fn persistence(err: Error) -> Self {
        match err {
            Error::Status { status, body } => {
                let field_errors = body.as_ref().map(parse_field_errors).unwrap_or_default();
                let detail = body
                    .as_ref()
                    .and_then(|b| b.get("detail"))
                    .and_then(Value::as_str)
                    .map(ToString::to_string);

                let message = detail.unwrap_or_else(|| {
                    if field_errors.is_empty() {
                        format!("Unable to save alert rule (status {status})")
                    } else {
                        let details: Vec<String> = field_errors
                            .iter()
                            .map(|(field, messages)| format!("{field}: {}", messages.join(" ")))
                            .collect();
                        format!("Unable to save alert rule: {}", details.join("; "))
                    }
                });

                Self::Persistence {
                    message,
                    field_errors,
                }
            }
            other => Self::Persistence {
                message: format!("Unable to save alert rule: {other}"),
                field_errors: BTreeMap::new(),
            },
        }
    }
}

fn parse_field_errors(body: &Value) -> BTreeMap<String, Vec<String>> {
    let Some(object) = body.as_object() else {
        return BTreeMap::new();
    };

    object
        .iter()
        .filter(|(field, _)| field.as_str() != "detail")
        .filter_map(|(field, value)| {
            let messages: Vec<String> = match value {
                Value::String(message) => vec![message.clone()],
                Value::Array(items) => items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(ToString::to_string)
                    .collect(),
                _ => Vec::new(),
            };
            (!messages.is_empty()).then(|| (field.clone(), messages))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn detail_becomes_the_message() {
        let err = SaveError::persistence(Error::Status {
            status: 403,
            body: Some(json!({"detail": "You do not have permission"})),
        });
        assert_eq!(err.message(), "You do not have permission");
        assert!(err.field_errors().unwrap().is_empty());
    }

    #[test]
    fn field_lists_are_collected() {
        let err = SaveError::persistence(Error::Status {
            status: 400,
            body: Some(json!({
                "name": ["This field is required."],
                "triggers": ["Must have a critical trigger", "Thresholds invalid"],
                "ignored": 3
            })),
        });
        let fields = err.field_errors().unwrap();
        assert_eq!(fields.len(), 2);
        assert_eq!(fields["triggers"].len(), 2);
        insta::assert_snapshot!(
            err.message(),
            @"Unable to save alert rule: name: This field is required.; triggers: Must have a critical trigger Thresholds invalid"
        );
    }

    #[test]
    fn bodyless_failure_gets_synthesized_message() {
        let err = SaveError::persistence(Error::Status {
            status: 502,
            body: None,
        });
        assert_eq!(err.message(), "Unable to save alert rule (status 502)");
    }

    #[test]
    fn non_status_failure_is_persistence() {
        let err = SaveError::persistence(Error::Parse("truncated body".into()));
        assert!(matches!(err, SaveError::Persistence { .. }));
        assert_eq!(
            err.message(),
            "Unable to save alert rule: failed to parse response: truncated body"
        );
    }

    #[test]
    fn timeout_has_fixed_message() {
        assert_eq!(SaveError::VerificationTimeout.message(), TIMEOUT_MESSAGE);
    }
}
