//! Closed registry of issue-rule condition, filter and action handlers.
//!
//! The backend names each handler with a dotted Python-style path. Those
//! strings are resolved to a [`ComponentKind`] at the deserialization
//! boundary; a tag outside the registry is an error instead of a component
//! that silently does nothing.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Which list of an issue rule a handler belongs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Decides when the rule fires.
    Condition,
    /// Narrows which events the rule applies to.
    Filter,
    /// Notification performed when the rule fires.
    Action,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Condition => write!(f, "condition"),
            Self::Filter => write!(f, "filter"),
            Self::Action => write!(f, "action"),
        }
    }
}

/// Registry entry describing one handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Handler {
    /// Wire tag sent by the backend.
    pub tag: &'static str,
    /// List the handler belongs in.
    pub role: Role,
    /// Human-readable name.
    pub label: &'static str,
    /// Required handler fields as `(field, label)` pairs.
    pub required_fields: &'static [(&'static str, &'static str)],
}

/// Every condition, filter and action handler the backend understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ComponentKind {
    /// A new issue is created.
    FirstSeenEvent,
    /// A resolved issue changes state to unresolved.
    RegressionEvent,
    /// An ignored issue changes state to unresolved.
    ReappearedEvent,
    /// Issue is seen more than N times in an interval.
    EventFrequency,
    /// Issue is seen by more than N users in an interval.
    EventUniqueUserFrequency,
    /// Issue affects more than N percent of sessions in an interval.
    EventFrequencyPercent,
    /// Issue is older or newer than a given age.
    AgeComparison,
    /// Issue has happened at least N times.
    IssueOccurrences,
    /// Issue is assigned to a given target.
    AssignedTo,
    /// Event is from the latest release.
    LatestRelease,
    /// Event attribute matches a value.
    EventAttribute,
    /// Event tag matches a value.
    TaggedEvent,
    /// Event level compares against a level.
    Level,
    /// Send an email notification.
    NotifyEmail,
    /// Send a notification to all legacy integrations.
    NotifyEvent,
    /// Send a notification via a plugin or service.
    NotifyEventService,
    /// Post to a Slack channel.
    SlackNotifyService,
    /// Post to a Microsoft Teams channel.
    MsTeamsNotifyService,
    /// Open a PagerDuty incident.
    PagerDutyNotifyService,
    /// Open an Opsgenie alert.
    OpsgenieNotifyTeam,
    /// Post to a Discord channel.
    DiscordNotifyService,
}

impl ComponentKind {
    /// All registered kinds.
    pub const ALL: [Self; 21] = [
        Self::FirstSeenEvent,
        Self::RegressionEvent,
        Self::ReappearedEvent,
        Self::EventFrequency,
        Self::EventUniqueUserFrequency,
        Self::EventFrequencyPercent,
        Self::AgeComparison,
        Self::IssueOccurrences,
        Self::AssignedTo,
        Self::LatestRelease,
        Self::EventAttribute,
        Self::TaggedEvent,
        Self::Level,
        Self::NotifyEmail,
        Self::NotifyEvent,
        Self::NotifyEventService,
        Self::SlackNotifyService,
        Self::MsTeamsNotifyService,
        Self::PagerDutyNotifyService,
        Self::OpsgenieNotifyTeam,
        Self::DiscordNotifyService,
    ];

    /// Resolves a backend tag to a registered kind.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownActionType`] for tags outside the registry.
    pub fn from_tag(tag: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.tag() == tag)
            .ok_or_else(|| Error::UnknownActionType(tag.to_string()))
    }

    /// Returns the backend tag.
    pub const fn tag(self) -> &'static str {
        self.handler().tag
    }

    /// Returns the list this kind belongs in.
    pub const fn role(self) -> Role {
        self.handler().role
    }

    /// Returns the registry entry for this kind.
    #[allow(clippy::too_many_lines)]
    pub const fn handler(self) -> Handler {
        match self {
            Self::FirstSeenEvent => Handler {
                tag: "sentry.rules.conditions.first_seen_event.FirstSeenEventCondition",
                role: Role::Condition,
                label: "A new issue is created",
                required_fields: &[],
            },
            Self::RegressionEvent => Handler {
                tag: "sentry.rules.conditions.regression_event.RegressionEventCondition",
                role: Role::Condition,
                label: "The issue changes state from resolved to unresolved",
                required_fields: &[],
            },
            Self::ReappearedEvent => Handler {
                tag: "sentry.rules.conditions.reappeared_event.ReappearedEventCondition",
                role: Role::Condition,
                label: "The issue changes state from ignored to unresolved",
                required_fields: &[],
            },
            Self::EventFrequency => Handler {
                tag: "sentry.rules.conditions.event_frequency.EventFrequencyCondition",
                role: Role::Condition,
                label: "The issue is seen more than N times in an interval",
                required_fields: &[("value", "event count"), ("interval", "interval")],
            },
            Self::EventUniqueUserFrequency => Handler {
                tag: "sentry.rules.conditions.event_frequency.EventUniqueUserFrequencyCondition",
                role: Role::Condition,
                label: "The issue is seen by more than N users in an interval",
                required_fields: &[("value", "user count"), ("interval", "interval")],
            },
            Self::EventFrequencyPercent => Handler {
                tag: "sentry.rules.conditions.event_frequency.EventFrequencyPercentCondition",
                role: Role::Condition,
                label: "The issue affects more than N percent of sessions in an interval",
                required_fields: &[("value", "percentage"), ("interval", "interval")],
            },
            Self::AgeComparison => Handler {
                tag: "sentry.rules.filters.age_comparison.AgeComparisonFilter",
                role: Role::Filter,
                label: "The issue is older or newer than a given age",
                required_fields: &[
                    ("comparison_type", "age comparison"),
                    ("value", "age"),
                    ("time", "age unit"),
                ],
            },
            Self::IssueOccurrences => Handler {
                tag: "sentry.rules.filters.issue_occurrences.IssueOccurrencesFilter",
                role: Role::Filter,
                label: "The issue has happened at least N times",
                required_fields: &[("value", "occurrence count")],
            },
            Self::AssignedTo => Handler {
                tag: "sentry.rules.filters.assigned_to.AssignedToFilter",
                role: Role::Filter,
                label: "The issue is assigned to a target",
                required_fields: &[("targetType", "assignee type")],
            },
            Self::LatestRelease => Handler {
                tag: "sentry.rules.filters.latest_release.LatestReleaseFilter",
                role: Role::Filter,
                label: "The event is from the latest release",
                required_fields: &[],
            },
            Self::EventAttribute => Handler {
                tag: "sentry.rules.filters.event_attribute.EventAttributeFilter",
                role: Role::Filter,
                label: "The event's attribute matches a value",
                required_fields: &[("attribute", "attribute"), ("match", "attribute match")],
            },
            Self::TaggedEvent => Handler {
                tag: "sentry.rules.filters.tagged_event.TaggedEventFilter",
                role: Role::Filter,
                label: "The event's tags match a value",
                required_fields: &[("key", "tag"), ("match", "tag match")],
            },
            Self::Level => Handler {
                tag: "sentry.rules.filters.level.LevelFilter",
                role: Role::Filter,
                label: "The event's level compares against a level",
                required_fields: &[("match", "level comparison"), ("level", "level")],
            },
            Self::NotifyEmail => Handler {
                tag: "sentry.mail.actions.NotifyEmailAction",
                role: Role::Action,
                label: "Send a notification to an email target",
                required_fields: &[("targetType", "email target")],
            },
            Self::NotifyEvent => Handler {
                tag: "sentry.rules.actions.notify_event.NotifyEventAction",
                role: Role::Action,
                label: "Send a notification to all legacy integrations",
                required_fields: &[],
            },
            Self::NotifyEventService => Handler {
                tag: "sentry.rules.actions.notify_event_service.NotifyEventServiceAction",
                role: Role::Action,
                label: "Send a notification via a service",
                required_fields: &[("service", "service")],
            },
            Self::SlackNotifyService => Handler {
                tag: "sentry.integrations.slack.notify_action.SlackNotifyServiceAction",
                role: Role::Action,
                label: "Send a Slack notification",
                required_fields: &[("workspace", "Slack workspace"), ("channel", "Slack channel")],
            },
            Self::MsTeamsNotifyService => Handler {
                tag: "sentry.integrations.msteams.notify_action.MsTeamsNotifyServiceAction",
                role: Role::Action,
                label: "Send a Microsoft Teams notification",
                required_fields: &[("team", "Teams team"), ("channel", "Teams channel")],
            },
            Self::PagerDutyNotifyService => Handler {
                tag: "sentry.integrations.pagerduty.notify_action.PagerDutyNotifyServiceAction",
                role: Role::Action,
                label: "Send a PagerDuty notification",
                required_fields: &[("account", "PagerDuty account"), ("service", "PagerDuty service")],
            },
            Self::OpsgenieNotifyTeam => Handler {
                tag: "sentry.integrations.opsgenie.notify_action.OpsgenieNotifyTeamAction",
                role: Role::Action,
                label: "Send an Opsgenie notification",
                required_fields: &[("account", "Opsgenie account"), ("team", "Opsgenie team")],
            },
            Self::DiscordNotifyService => Handler {
                tag: "sentry.integrations.discord.notify_action.DiscordNotifyServiceAction",
                role: Role::Action,
                label: "Send a Discord notification",
                required_fields: &[("server", "Discord server"), ("channel_id", "Discord channel")],
            },
        }
    }
}

impl TryFrom<String> for ComponentKind {
    type Error = Error;

    fn try_from(tag: String) -> Result<Self> {
        Self::from_tag(&tag)
    }
}

impl From<ComponentKind> for String {
    fn from(kind: ComponentKind) -> Self {
        kind.tag().to_string()
    }
}

/// A condition, filter or action entry of an issue rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleComponent {
    /// Handler this entry is dispatched to.
    pub id: ComponentKind,
    /// Handler-specific fields.
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl RuleComponent {
    /// Creates a component with no fields set.
    #[must_use]
    pub fn new(id: ComponentKind) -> Self {
        Self {
            id,
            fields: Map::new(),
        }
    }

    /// Sets a handler field.
    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Returns a handler field.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Labels of required handler fields that are absent, null or blank.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        self.id
            .handler()
            .required_fields
            .iter()
            .filter(|(name, _)| is_blank(self.fields.get(*name)))
            .map(|(_, label)| *label)
            .collect()
    }
}

fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        Some(_) => false,
    }
}
