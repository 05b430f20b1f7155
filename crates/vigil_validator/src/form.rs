//! Local validation of a rule draft before it is submitted.

use crate::result::TriggerErrors;
use crate::thresholds::validate_metric_rule;
use tracing::debug;
use vigil_rule::{
    ActionType, IssueRule, MetricRule, Role, Rule, RuleComponent, TargetType, TriggerLabel,
};

/// Read access to the organization's member list.
pub trait MemberLookup {
    /// True once the member list has been fetched.
    fn is_loaded(&self) -> bool;

    /// True if a member with this id exists.
    fn contains(&self, id: &str) -> bool;
}

/// Outcome of local validation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormReport {
    /// Labels of required fields that are missing, in form order.
    pub missing: Vec<String>,
    /// Other problems found.
    pub problems: Vec<String>,
    /// Per-trigger errors from threshold validation.
    pub trigger_errors: TriggerErrors,
}

impl FormReport {
    /// True if the rule may be submitted.
    pub fn is_valid(&self) -> bool {
        self.missing.is_empty() && self.problems.is_empty() && self.trigger_errors.is_empty()
    }

    /// Single-line message describing why the rule cannot be submitted.
    pub fn summary(&self) -> String {
        let mut parts = Vec::new();
        if !self.missing.is_empty() {
            parts.push(format!("missing {}", join_labels(&self.missing)));
        }
        parts.extend(self.problems.iter().cloned());
        if parts.is_empty() && !self.trigger_errors.is_empty() {
            parts.push("invalid thresholds".to_string());
        }
        format!("Alert not valid: {}", parts.join("; "))
    }

    fn require(&mut self, present: bool, label: impl Into<String>) {
        if !present {
            self.missing.push(label.into());
        }
    }
}

/// Validates a rule draft.
///
/// `members` is consulted only once it reports itself loaded.
pub fn validate_rule(rule: &Rule, members: Option<&dyn MemberLookup>) -> FormReport {
    let mut report = FormReport::default();
    report.require(!rule.name().trim().is_empty(), "name");

    match rule {
        Rule::Issue(issue) => check_issue(issue, &mut report),
        Rule::Metric(metric) => check_metric(metric, members, &mut report),
    }

    debug!(
        "Local validation: {} missing, {} problem(s), {} trigger(s) with errors",
        report.missing.len(),
        report.problems.len(),
        report.trigger_errors.len()
    );
    report
}

fn check_issue(rule: &IssueRule, report: &mut FormReport) {
    report.require(!rule.actions.is_empty(), "action");
    report.require(rule.frequency > 0, "frequency");

    let lists = [
        (Role::Condition, &rule.conditions),
        (Role::Filter, &rule.filters),
        (Role::Action, &rule.actions),
    ];
    for (role, components) in lists {
        for component in components {
            check_component(role, component, report);
        }
    }
}

fn check_component(expected: Role, component: &RuleComponent, report: &mut FormReport) {
    let handler = component.id.handler();
    if handler.role != expected {
        report.problems.push(format!(
            "'{}' belongs in {}s, not {}s",
            handler.label, handler.role, expected
        ));
        return;
    }
    report.missing.extend(
        component
            .missing_fields()
            .into_iter()
            .map(ToString::to_string),
    );
}

fn check_metric(rule: &MetricRule, members: Option<&dyn MemberLookup>, report: &mut FormReport) {
    report.require(!rule.aggregate.trim().is_empty(), "metric");
    report.require(rule.time_window > 0, "time window");

    for trigger in &rule.triggers {
        let required = trigger.label == TriggerLabel::Critical || !trigger.actions.is_empty();
        if required && trigger.alert_threshold.is_none() {
            report.missing.push(format!("{} threshold", trigger.label));
        }
        for action in &trigger.actions {
            if !action.has_target() {
                report.missing.push(format!("{} action target", trigger.label));
            }
        }
    }

    if let Some(members) = members.filter(|m| m.is_loaded()) {
        let unknown = rule
            .triggers
            .iter()
            .flat_map(|t| &t.actions)
            .filter(|a| a.action_type == ActionType::Email && a.target_type == TargetType::User)
            .filter_map(|a| a.target_identifier.as_deref())
            .filter(|id| !id.trim().is_empty() && !members.contains(id));
        for id in unknown {
            report.problems.push(format!("unknown member {id}"));
        }
    }

    match validate_metric_rule(rule) {
        Ok(errors) => report.trigger_errors = errors,
        Err(e) => report.problems.push(e.to_string()),
    }
}

/// Joins labels as "a", "a and b", "a, b and c".
fn join_labels(labels: &[String]) -> String {
    match labels {
        [] => String::new(),
        [only] => only.clone(),
        [init @ .., last] => format!("{} and {}", init.join(", "), last),
    }
}
