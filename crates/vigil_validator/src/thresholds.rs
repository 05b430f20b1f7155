//! Trigger threshold validation.
//!
//! Checks that the critical and warning thresholds of a metric rule agree
//! with each other, with the resolve threshold, and with the direction the
//! rule alerts in. The validator is a pure function; callers merge its
//! output into their own error state with [`TriggerErrors::merge_into`].

use crate::error::{Error, Result};
use crate::result::{TriggerErrors, ALERT_THRESHOLD};
use tracing::debug;
use vigil_rule::{ComparisonType, MetricRule, ThresholdType, Trigger, TriggerLabel};

/// Message for a missing required threshold.
pub const FIELD_REQUIRED: &str = "Field is required";

/// Indices of the critical and (optional) warning trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriggerSlots {
    /// Index of the critical trigger.
    pub critical: usize,
    /// Index of the warning trigger, if present.
    pub warning: Option<usize>,
}

/// Locates the critical and warning triggers.
///
/// # Errors
///
/// Returns [`Error::InvalidTriggerSet`] unless there are one or two
/// triggers, exactly one labelled critical, at most one labelled warning,
/// and none labelled resolve.
pub fn locate_triggers(triggers: &[Trigger]) -> Result<TriggerSlots> {
    if triggers.is_empty() || triggers.len() > 2 {
        return Err(Error::InvalidTriggerSet(format!(
            "expected 1 or 2 triggers, found {}",
            triggers.len()
        )));
    }

    let mut critical = None;
    let mut warning = None;
    for (index, trigger) in triggers.iter().enumerate() {
        let slot = match trigger.label {
            TriggerLabel::Critical => &mut critical,
            TriggerLabel::Warning => &mut warning,
            TriggerLabel::Resolve => {
                return Err(Error::InvalidTriggerSet(
                    "resolve is configured through the resolve threshold, not a trigger"
                        .to_string(),
                ));
            }
        };
        if slot.replace(index).is_some() {
            return Err(Error::InvalidTriggerSet(format!(
                "more than one {} trigger",
                trigger.label
            )));
        }
    }

    let critical = critical
        .ok_or_else(|| Error::InvalidTriggerSet("missing critical trigger".to_string()))?;
    Ok(TriggerSlots { critical, warning })
}

/// Validates the thresholds of a set of triggers.
///
/// Returns an empty map when the configuration is alertable.
///
/// # Errors
///
/// Returns [`Error::InvalidTriggerSet`] if the triggers cannot be mapped to
/// a critical and optional warning level.
pub fn validate_triggers(
    triggers: &[Trigger],
    threshold_type: ThresholdType,
    resolve_threshold: Option<f64>,
    comparison_type: ComparisonType,
) -> Result<TriggerErrors> {
    let slots = locate_triggers(triggers)?;
    let mut errors = TriggerErrors::new();

    for (index, trigger) in triggers.iter().enumerate() {
        let required = trigger.label == TriggerLabel::Critical || !trigger.actions.is_empty();

        match (trigger.alert_threshold, resolve_threshold) {
            (None, _) if required => errors.set(index, ALERT_THRESHOLD, FIELD_REQUIRED),
            (Some(alert), Some(resolve)) if !can_resolve(threshold_type, alert, resolve) => {
                errors.set(index, ALERT_THRESHOLD, resolution_message(threshold_type));
            }
            _ => {}
        }
    }

    if let Some(warning_index) = slots.warning {
        let critical = triggers[slots.critical].alert_threshold;
        let warning = triggers[warning_index].alert_threshold;

        if let (Some(critical), Some(warning)) = (critical, warning) {
            let warning_must_be_lower =
                threshold_type == ThresholdType::Above || comparison_type == ComparisonType::Change;

            let consistent = if warning_must_be_lower {
                warning <= critical
            } else {
                warning >= critical
            };

            if !consistent {
                let message = if warning_must_be_lower {
                    "Warning threshold must be less than critical threshold"
                } else {
                    "Warning threshold must be greater than critical threshold"
                };
                errors.set(slots.critical, ALERT_THRESHOLD, message);
                errors.set(warning_index, ALERT_THRESHOLD, message);
            }
        }
    }

    debug!("Threshold validation found {} trigger(s) with errors", errors.len());
    Ok(errors)
}

/// Validates the thresholds of a metric rule.
///
/// # Errors
///
/// See [`validate_triggers`].
pub fn validate_metric_rule(rule: &MetricRule) -> Result<TriggerErrors> {
    validate_triggers(
        &rule.triggers,
        rule.threshold_type,
        rule.resolve_threshold,
        rule.comparison_type(),
    )
}

/// Whether a value that crosses `alert` could later cross `resolve`.
///
/// Thresholds are exclusive (`>` / `<`), so each side is widened by one to
/// accept adjacent integer boundaries such as alert above 0, resolve below 1.
fn can_resolve(threshold_type: ThresholdType, alert: f64, resolve: f64) -> bool {
    match threshold_type {
        ThresholdType::Below => alert - 1.0 < resolve + 1.0,
        ThresholdType::Above => alert + 1.0 > resolve - 1.0,
    }
}

const fn resolution_message(threshold_type: ThresholdType) -> &'static str {
    match threshold_type {
        ThresholdType::Below => "Alert threshold must be less than resolution",
        ThresholdType::Above => "Alert threshold must be greater than resolution",
    }
}
