//! Typed rule model.
//!
//! Field names follow the backend's camelCase JSON so a rule read from the
//! API can be edited and sent back unchanged.

use crate::error::{Error, Result};
use crate::registry::RuleComponent;
use crate::trigger::{ComparisonType, ThresholdType, Trigger, TriggerLabel};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Owner of a rule.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Owner {
    /// `team:<id>`.
    Team(String),
    /// `user:<id>`.
    User(String),
}

impl Owner {
    /// Parses an actor reference.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidOwner`] if the prefix is unknown or the id is empty.
    pub fn parse(value: &str) -> Result<Self> {
        let (kind, id) = value
            .split_once(':')
            .ok_or_else(|| Error::InvalidOwner(value.to_string()))?;
        if id.is_empty() {
            return Err(Error::InvalidOwner(value.to_string()));
        }
        match kind {
            "team" => Ok(Self::Team(id.to_string())),
            "user" => Ok(Self::User(id.to_string())),
            _ => Err(Error::InvalidOwner(value.to_string())),
        }
    }
}

impl std::fmt::Display for Owner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Team(id) => write!(f, "team:{id}"),
            Self::User(id) => write!(f, "user:{id}"),
        }
    }
}

impl TryFrom<String> for Owner {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<Owner> for String {
    fn from(owner: Owner) -> Self {
        owner.to_string()
    }
}

/// How a list of conditions or filters is combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    /// Every entry must match.
    #[default]
    All,
    /// At least one entry must match.
    Any,
    /// No entry may match.
    None,
}

/// Source of the data a metric rule aggregates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dataset {
    /// Error events.
    #[default]
    Events,
    /// Performance transactions.
    Transactions,
    /// Release health sessions.
    Sessions,
    /// Release health metrics.
    Metrics,
    /// Generic metrics.
    GenericMetrics,
}

/// Which endpoint family a rule is persisted through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleKind {
    /// Issue-based rule.
    Issue,
    /// Metric-based rule.
    Metric,
}

impl std::fmt::Display for RuleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Issue => write!(f, "issue"),
            Self::Metric => write!(f, "metric"),
        }
    }
}

/// An issue-based alert rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueRule {
    /// Backend identifier; absent for unsaved rules.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Human-readable name.
    #[serde(default)]
    pub name: String,
    /// Owning team or user.
    #[serde(default)]
    pub owner: Option<Owner>,
    /// Environment filter.
    #[serde(default)]
    pub environment: Option<String>,
    /// How conditions are combined.
    #[serde(default)]
    pub action_match: MatchMode,
    /// How filters are combined.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter_match: Option<MatchMode>,
    /// Minutes between repeated notifications.
    #[serde(default = "default_frequency")]
    pub frequency: u32,
    /// Trigger conditions.
    #[serde(default)]
    pub conditions: Vec<RuleComponent>,
    /// Event filters.
    #[serde(default)]
    pub filters: Vec<RuleComponent>,
    /// Notification actions.
    #[serde(default)]
    pub actions: Vec<RuleComponent>,
    /// Creation timestamp, set by the backend.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_created: Option<DateTime<Utc>>,
}

const fn default_frequency() -> u32 {
    30
}

impl IssueRule {
    /// Creates an empty issue rule.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            owner: None,
            environment: None,
            action_match: MatchMode::All,
            filter_match: None,
            frequency: default_frequency(),
            conditions: Vec::new(),
            filters: Vec::new(),
            actions: Vec::new(),
            date_created: None,
        }
    }
}

/// A metric-based alert rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricRule {
    /// Backend identifier; absent for unsaved rules.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Human-readable name.
    #[serde(default)]
    pub name: String,
    /// Owning team or user.
    #[serde(default)]
    pub owner: Option<Owner>,
    /// Environment filter.
    #[serde(default)]
    pub environment: Option<String>,
    /// Data source.
    #[serde(default)]
    pub dataset: Dataset,
    /// Aggregate expression, e.g. `count()` or `p95(transaction.duration)`.
    #[serde(default)]
    pub aggregate: String,
    /// Event filter query.
    #[serde(default)]
    pub query: String,
    /// Aggregation window in minutes.
    #[serde(default)]
    pub time_window: u32,
    /// Threshold levels; index 0 is conventionally critical.
    #[serde(default)]
    pub triggers: Vec<Trigger>,
    /// Value the metric must return past to resolve.
    #[serde(default, deserialize_with = "crate::trigger::threshold::deserialize")]
    pub resolve_threshold: Option<f64>,
    /// Direction of the thresholds.
    #[serde(default)]
    pub threshold_type: ThresholdType,
    /// Consecutive windows the threshold must be crossed for.
    #[serde(default = "default_threshold_period")]
    pub threshold_period: u32,
    /// Minutes back for percentage-change comparison.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comparison_delta: Option<u32>,
    /// Project slugs the rule applies to.
    #[serde(default)]
    pub projects: Vec<String>,
    /// Creation timestamp, set by the backend.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_created: Option<DateTime<Utc>>,
}

const fn default_threshold_period() -> u32 {
    1
}

impl MetricRule {
    /// Creates a metric rule with a single empty critical trigger.
    #[must_use]
    pub fn new(name: impl Into<String>, aggregate: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            owner: None,
            environment: None,
            dataset: Dataset::Events,
            aggregate: aggregate.into(),
            query: String::new(),
            time_window: 60,
            triggers: vec![Trigger::new(TriggerLabel::Critical)],
            resolve_threshold: None,
            threshold_type: ThresholdType::Above,
            threshold_period: default_threshold_period(),
            comparison_delta: None,
            projects: Vec::new(),
            date_created: None,
        }
    }

    /// Comparison type implied by the presence of a comparison delta.
    pub const fn comparison_type(&self) -> ComparisonType {
        if self.comparison_delta.is_some() {
            ComparisonType::Change
        } else {
            ComparisonType::Count
        }
    }

    /// Returns the trigger carrying the given label, if any.
    pub fn trigger(&self, label: TriggerLabel) -> Option<&Trigger> {
        self.triggers.iter().find(|t| t.label == label)
    }

    /// Removes warning triggers that carry neither a threshold nor actions.
    ///
    /// Returns how many were removed.
    pub fn strip_degenerate_warnings(&mut self) -> usize {
        let before = self.triggers.len();
        self.triggers.retain(|t| !t.is_degenerate_warning());
        before - self.triggers.len()
    }
}

/// Any persisted alert rule.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Rule {
    /// Issue-based rule.
    Issue(IssueRule),
    /// Metric-based rule.
    Metric(MetricRule),
}

impl Rule {
    /// Parses a rule of a known kind from JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON does not describe a rule of that kind.
    pub fn from_value(kind: RuleKind, value: serde_json::Value) -> Result<Self> {
        Ok(match kind {
            RuleKind::Issue => Self::Issue(serde_json::from_value(value)?),
            RuleKind::Metric => Self::Metric(serde_json::from_value(value)?),
        })
    }

    /// Endpoint family for this rule.
    pub const fn kind(&self) -> RuleKind {
        match self {
            Self::Issue(_) => RuleKind::Issue,
            Self::Metric(_) => RuleKind::Metric,
        }
    }

    /// Backend identifier.
    pub fn id(&self) -> Option<&str> {
        match self {
            Self::Issue(rule) => rule.id.as_deref(),
            Self::Metric(rule) => rule.id.as_deref(),
        }
    }

    /// Rule name.
    pub fn name(&self) -> &str {
        match self {
            Self::Issue(rule) => &rule.name,
            Self::Metric(rule) => &rule.name,
        }
    }

    /// Owning team or user.
    pub const fn owner(&self) -> Option<&Owner> {
        match self {
            Self::Issue(rule) => rule.owner.as_ref(),
            Self::Metric(rule) => rule.owner.as_ref(),
        }
    }

    /// When the backend created the rule.
    pub const fn date_created(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Issue(rule) => rule.date_created,
            Self::Metric(rule) => rule.date_created,
        }
    }

    /// True if the rule has never been saved.
    pub fn is_new(&self) -> bool {
        self.id().is_none()
    }
}

impl From<IssueRule> for Rule {
    fn from(rule: IssueRule) -> Self {
        Self::Issue(rule)
    }
}

impl From<MetricRule> for Rule {
    fn from(rule: MetricRule) -> Self {
        Self::Metric(rule)
    }
}
