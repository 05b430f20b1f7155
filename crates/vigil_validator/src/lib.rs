//! Rule validation for Vigil.
//!
//! This crate provides:
//! - Trigger threshold validation for metric rules
//! - Local form validation of rule drafts
//! - Per-trigger error state that merges across re-validation
//!
//! # Example
//!
//! ```rust,ignore
//! use vigil_validator::validate_triggers;
//!
//! let errors = validate_triggers(&rule.triggers, rule.threshold_type, rule.resolve_threshold, rule.comparison_type())?;
//! errors.merge_into(&mut state);
//! ```

#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod error;
pub mod form;
pub mod result;
pub mod thresholds;

pub use error::{Error, Result};
pub use form::{validate_rule, FormReport, MemberLookup};
pub use result::{FieldErrors, TriggerErrors, ALERT_THRESHOLD};
pub use thresholds::{locate_triggers, validate_metric_rule, validate_triggers, TriggerSlots};
