//! Validate command implementation.

use anyhow::Result;
use tracing::{info, warn};
use vigil_rule::{Rule, RuleKind};
use vigil_validator::validate_rule;

/// Runs the validate command.
pub fn run(rule_path: &str, kind: RuleKind) -> Result<()> {
    info!("Validating {} rule: {}", kind, rule_path);

    let rule = super::load_rule(rule_path, kind)?;
    let report = validate_rule(&rule, None);

    if let Rule::Metric(metric) = &rule {
        for (index, field, message) in report.trigger_errors.iter() {
            let label = metric
                .triggers
                .get(index)
                .map_or_else(|| format!("trigger {index}"), |t| t.label.to_string());
            warn!("{} {}: {}", label, field, message);
        }
    }

    if !report.is_valid() {
        anyhow::bail!(report.summary());
    }

    println!("Rule '{}' is valid", rule.name());
    Ok(())
}
