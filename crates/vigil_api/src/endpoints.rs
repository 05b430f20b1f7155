//! Endpoint paths, relative to the API root.

use vigil_rule::RuleKind;

fn rule_segment(kind: RuleKind) -> &'static str {
    match kind {
        RuleKind::Issue => "rules",
        RuleKind::Metric => "alert-rules",
    }
}

fn task_segment(kind: RuleKind) -> &'static str {
    match kind {
        RuleKind::Issue => "rule-task",
        RuleKind::Metric => "alert-rule-task",
    }
}

/// Collection endpoint used to create rules.
pub fn rules(kind: RuleKind, organization: &str, project: &str) -> String {
    format!("/projects/{organization}/{project}/{}/", rule_segment(kind))
}

/// Detail endpoint used to update or delete one rule.
pub fn rule(kind: RuleKind, organization: &str, project: &str, id: &str) -> String {
    format!(
        "/projects/{organization}/{project}/{}/{id}/",
        rule_segment(kind)
    )
}

/// Status endpoint of an asynchronous verification task.
pub fn rule_task(kind: RuleKind, organization: &str, project: &str, uuid: &str) -> String {
    format!(
        "/projects/{organization}/{project}/{}/{uuid}/",
        task_segment(kind)
    )
}

/// Organization member list.
pub fn members(organization: &str) -> String {
    format!("/organizations/{organization}/users/")
}
