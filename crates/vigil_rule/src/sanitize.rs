//! Payload preparation before a rule is sent to the backend.

use crate::model::Rule;
use tracing::debug;

/// Builds the body sent to the persistence endpoint.
///
/// Degenerate warning triggers are removed. A duplicated rule loses every
/// backend identifier so the backend creates fresh objects.
#[must_use]
pub fn prepare_payload(rule: &Rule, duplicate: bool) -> Rule {
    let mut payload = rule.clone();

    match &mut payload {
        Rule::Issue(issue) => {
            if duplicate {
                issue.id = None;
                issue.date_created = None;
            }
        }
        Rule::Metric(metric) => {
            let stripped = metric.strip_degenerate_warnings();
            if stripped > 0 {
                debug!("Stripped {} empty warning trigger(s) from payload", stripped);
            }
            if duplicate {
                metric.id = None;
                metric.date_created = None;
                for trigger in &mut metric.triggers {
                    trigger.id = None;
                    for action in &mut trigger.actions {
                        action.id = None;
                    }
                }
            }
        }
    }

    payload
}
