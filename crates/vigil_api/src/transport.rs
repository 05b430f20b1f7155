//! Backend operations the save workflow depends on.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;
use vigil_rule::{Rule, RuleKind};

/// Query flag telling the backend which rule schema the body uses.
pub const SCHEMA_FLAG: &str = "wizardV3";

/// A create or update request.
#[derive(Debug, Clone, PartialEq)]
pub struct SaveRequest {
    /// Endpoint family.
    pub kind: RuleKind,
    /// Rule to update; `None` creates a new rule.
    pub id: Option<String>,
    /// Sanitized body.
    pub payload: Rule,
    /// Whether the rule is a copy of an existing one.
    pub duplicate: bool,
    /// Free-form origin of the request.
    pub referrer: Option<String>,
}

impl SaveRequest {
    /// Query parameters sent with the request.
    pub fn query(&self) -> Vec<(&'static str, String)> {
        let mut query = vec![
            ("duplicateRule", self.duplicate.to_string()),
            (SCHEMA_FLAG, "true".to_string()),
        ];
        if let Some(referrer) = &self.referrer {
            query.push(("referrer", referrer.clone()));
        }
        query
    }
}

/// Response to a create or update request.
#[derive(Debug, Clone, PartialEq)]
pub enum SaveResponse {
    /// Rule persisted synchronously.
    Saved(Rule),
    /// HTTP 202: verification continues in the background.
    Accepted {
        /// Task identifier to poll.
        uuid: String,
    },
}

/// Status of an asynchronous verification task.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskStatus {
    /// Still running.
    Pending,
    /// Verification failed, with the backend's reason if any.
    Failed(Option<String>),
    /// Verification finished and the rule was saved.
    Completed(Rule),
}

impl TaskStatus {
    /// Decodes a task status body.
    ///
    /// The finished rule is under `rule` for issue rules and `alertRule`
    /// for metric rules.
    ///
    /// # Errors
    ///
    /// Returns an error if a finished task carries no rule, or the rule is
    /// malformed.
    pub fn from_value(kind: RuleKind, value: &Value) -> Result<Self> {
        match value.get("status").and_then(Value::as_str) {
            Some("pending") => Ok(Self::Pending),
            Some("failed") => Ok(Self::Failed(
                value
                    .get("error")
                    .and_then(Value::as_str)
                    .map(ToString::to_string),
            )),
            _ => {
                let key = match kind {
                    RuleKind::Issue => "rule",
                    RuleKind::Metric => "alertRule",
                };
                let rule = value
                    .get(key)
                    .filter(|rule| !rule.is_null())
                    .ok_or_else(|| Error::Parse(format!("finished task has no '{key}'")))?;
                Ok(Self::Completed(Rule::from_value(kind, rule.clone())?))
            }
        }
    }
}

/// An organization member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    /// Member identifier.
    pub id: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Email address.
    #[serde(default)]
    pub email: String,
}

/// Calls into the rule persistence backend.
pub trait RuleTransport {
    /// Creates or updates a rule.
    fn save_rule(&self, request: SaveRequest) -> impl Future<Output = Result<SaveResponse>> + Send;

    /// Fetches the status of a verification task.
    fn fetch_task(
        &self,
        kind: RuleKind,
        uuid: &str,
    ) -> impl Future<Output = Result<TaskStatus>> + Send;

    /// Deletes a rule.
    fn delete_rule(&self, kind: RuleKind, id: &str) -> impl Future<Output = Result<()>> + Send;

    /// Lists the organization's members.
    fn list_members(&self) -> impl Future<Output = Result<Vec<Member>>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use vigil_rule::MetricRule;

    #[test]
    fn query_carries_flags_and_referrer() {
        let request = SaveRequest {
            kind: RuleKind::Metric,
            id: None,
            payload: MetricRule::new("errors", "count()").into(),
            duplicate: true,
            referrer: Some("cli".into()),
        };
        assert_eq!(
            request.query(),
            vec![
                ("duplicateRule", "true".to_string()),
                ("wizardV3", "true".to_string()),
                ("referrer", "cli".to_string()),
            ]
        );
    }

    #[test]
    fn decodes_pending_and_failed() {
        let pending = TaskStatus::from_value(RuleKind::Issue, &json!({"status": "pending"}));
        assert_eq!(pending.unwrap(), TaskStatus::Pending);

        let failed = TaskStatus::from_value(
            RuleKind::Issue,
            &json!({"status": "failed", "error": "Channel not found"}),
        );
        assert_eq!(
            failed.unwrap(),
            TaskStatus::Failed(Some("Channel not found".into()))
        );
    }

    #[test]
    fn decodes_completed_metric_rule() {
        let value = json!({
            "status": "success",
            "alertRule": {"id": "7", "name": "errors", "aggregate": "count()", "timeWindow": 1,
                          "triggers": [{"label": "critical", "alertThreshold": 5}]}
        });
        let TaskStatus::Completed(rule) = TaskStatus::from_value(RuleKind::Metric, &value).unwrap()
        else {
            panic!("expected completed task");
        };
        assert_eq!(rule.id(), Some("7"));
    }

    #[test]
    fn finished_task_without_rule_is_a_parse_error() {
        let result = TaskStatus::from_value(RuleKind::Issue, &json!({"status": "success"}));
        assert!(matches!(result, Err(Error::Parse(_))));
    }
}
