//! Alert rule model for Vigil.
//!
//! This crate provides:
//! - Typed issue and metric rules matching the backend's JSON shape
//! - A closed registry of condition, filter and action handlers
//! - Payload preparation before persistence
//!
//! # Example
//!
//! ```rust,ignore
//! use vigil_rule::{MetricRule, Rule, Trigger, TriggerLabel};
//!
//! let mut rule = MetricRule::new("error spike", "count()");
//! rule.triggers[0] = Trigger::new(TriggerLabel::Critical).with_threshold(100.0);
//! let payload = vigil_rule::prepare_payload(&Rule::from(rule), false);
//! ```

#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod error;
pub mod model;
pub mod registry;
pub mod sanitize;
pub mod trigger;

pub use error::{Error, Result};
pub use model::{Dataset, IssueRule, MatchMode, MetricRule, Owner, Rule, RuleKind};
pub use registry::{ComponentKind, Handler, Role, RuleComponent};
pub use sanitize::prepare_payload;
pub use trigger::{
    ActionType, ComparisonType, TargetType, ThresholdType, Trigger, TriggerAction, TriggerLabel,
};
