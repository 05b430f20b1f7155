//! Metric rule triggers and their notification actions.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Severity tag of a trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerLabel {
    /// Primary alert level.
    Critical,
    /// Secondary, less extreme alert level.
    Warning,
    /// Recovery level.
    Resolve,
}

impl std::fmt::Display for TriggerLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Critical => write!(f, "critical"),
            Self::Warning => write!(f, "warning"),
            Self::Resolve => write!(f, "resolve"),
        }
    }
}

/// Direction a metric must cross to alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum ThresholdType {
    /// Alert when the metric goes above the threshold.
    #[default]
    Above,
    /// Alert when the metric goes below the threshold.
    Below,
}

impl TryFrom<u8> for ThresholdType {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(Self::Above),
            1 => Ok(Self::Below),
            other => Err(Error::InvalidThresholdType(other)),
        }
    }
}

impl From<ThresholdType> for u8 {
    fn from(value: ThresholdType) -> Self {
        match value {
            ThresholdType::Above => 0,
            ThresholdType::Below => 1,
        }
    }
}

/// How the metric is compared against a threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ComparisonType {
    /// Static value.
    #[default]
    Count,
    /// Percentage change against a prior period.
    Change,
}

/// Notification integration used by a trigger action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ActionType {
    /// Email a user or team.
    Email,
    /// Post to Slack.
    Slack,
    /// Post to Microsoft Teams.
    MsTeams,
    /// Page through PagerDuty.
    PagerDuty,
    /// Alert through Opsgenie.
    Opsgenie,
    /// Post to Discord.
    Discord,
    /// Deliver to an installed app.
    SentryApp,
}

impl ActionType {
    /// All registered action types.
    pub const ALL: [Self; 7] = [
        Self::Email,
        Self::Slack,
        Self::MsTeams,
        Self::PagerDuty,
        Self::Opsgenie,
        Self::Discord,
        Self::SentryApp,
    ];

    /// Returns the wire name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Slack => "slack",
            Self::MsTeams => "msteams",
            Self::PagerDuty => "pagerduty",
            Self::Opsgenie => "opsgenie",
            Self::Discord => "discord",
            Self::SentryApp => "sentry_app",
        }
    }

    /// Resolves a wire name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownActionType`] for names outside the registry.
    pub fn parse(name: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == name)
            .ok_or_else(|| Error::UnknownActionType(name.to_string()))
    }

    /// True when the backend may need to look the target up asynchronously.
    pub const fn resolves_channel(self) -> bool {
        matches!(self, Self::Slack | Self::MsTeams | Self::Discord)
    }
}

impl TryFrom<String> for ActionType {
    type Error = Error;

    fn try_from(name: String) -> Result<Self> {
        Self::parse(&name)
    }
}

impl From<ActionType> for String {
    fn from(kind: ActionType) -> Self {
        kind.as_str().to_string()
    }
}

/// What a trigger action's `targetIdentifier` refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetType {
    /// Integration-specific target such as a channel name.
    Specific,
    /// A member of the organization.
    User,
    /// A team of the organization.
    Team,
    /// An installed app.
    SentryApp,
}

/// A notification attached to a trigger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerAction {
    /// Backend identifier, absent for new actions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Integration used.
    #[serde(rename = "type")]
    pub action_type: ActionType,
    /// Kind of target.
    pub target_type: TargetType,
    /// Target reference: member id, team id or channel name.
    #[serde(default)]
    pub target_identifier: Option<String>,
    /// Channel id resolved by the backend, if already known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_channel_id: Option<String>,
    /// Integration installation, for integration-backed types.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub integration_id: Option<u64>,
}

impl TriggerAction {
    /// Creates an action pointing at the given target.
    #[must_use]
    pub fn new(
        action_type: ActionType,
        target_type: TargetType,
        target_identifier: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            action_type,
            target_type,
            target_identifier: Some(target_identifier.into()),
            input_channel_id: None,
            integration_id: None,
        }
    }

    /// Returns true if the action names a target.
    pub fn has_target(&self) -> bool {
        self.target_identifier
            .as_deref()
            .is_some_and(|target| !target.trim().is_empty())
    }
}

/// A named threshold level within a metric rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trigger {
    /// Backend identifier, absent for new triggers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Severity tag.
    pub label: TriggerLabel,
    /// Threshold the metric must cross, if set.
    #[serde(default, deserialize_with = "threshold::deserialize")]
    pub alert_threshold: Option<f64>,
    /// Notifications sent when the trigger fires.
    #[serde(default)]
    pub actions: Vec<TriggerAction>,
}

impl Trigger {
    /// Creates a trigger with no threshold and no actions.
    #[must_use]
    pub const fn new(label: TriggerLabel) -> Self {
        Self {
            id: None,
            label,
            alert_threshold: None,
            actions: Vec::new(),
        }
    }

    /// Sets the alert threshold.
    #[must_use]
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.alert_threshold = Some(threshold);
        self
    }

    /// Adds a notification action.
    #[must_use]
    pub fn with_action(mut self, action: TriggerAction) -> Self {
        self.actions.push(action);
        self
    }

    /// A warning trigger with neither a threshold nor actions is treated as
    /// not configured at all.
    pub fn is_degenerate_warning(&self) -> bool {
        self.label == TriggerLabel::Warning
            && self.alert_threshold.is_none()
            && self.actions.is_empty()
    }
}

/// Lenient threshold decoding for form-originated payloads.
///
/// Accepts a number, a numeric string, `""`, `null` or an absent field.
pub mod threshold {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(f64),
        Text(String),
    }

    /// Deserializes an optional threshold.
    ///
    /// # Errors
    ///
    /// Fails for non-numeric text and non-finite numbers.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<Raw>::deserialize(deserializer)? {
            None => Ok(None),
            Some(Raw::Number(value)) if value.is_finite() => Ok(Some(value)),
            Some(Raw::Number(value)) => Err(D::Error::custom(crate::Error::InvalidThreshold(
                value.to_string(),
            ))),
            Some(Raw::Text(text)) => parse(&text).map_err(D::Error::custom),
        }
    }

    /// Parses threshold text, treating blank input as unset.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidThreshold`] for non-numeric text.
    pub fn parse(text: &str) -> crate::Result<Option<f64>> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }
        trimmed
            .parse::<f64>()
            .ok()
            .filter(|value| value.is_finite())
            .map(Some)
            .ok_or_else(|| crate::Error::InvalidThreshold(text.to_string()))
    }
}
