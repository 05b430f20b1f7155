//! Rule persistence for Vigil.
//!
//! This crate provides:
//! - A transport abstraction over the rule backend, with a reqwest client
//! - The save workflow: local validation, create/update, and polling of
//!   asynchronous verification tasks with timeout and teardown
//! - A shared cache of organization members
//!
//! # Example
//!
//! ```rust,ignore
//! use vigil_api::{ClientConfig, HttpTransport, RuleSaveWorkflow, SaveOptions};
//!
//! let transport = HttpTransport::new(ClientConfig {
//!     auth_token: token,
//!     organization: "acme".into(),
//!     project: "web".into(),
//!     ..Default::default()
//! })?;
//! let mut workflow = RuleSaveWorkflow::new(transport);
//! let saved = workflow.submit(&rule, &SaveOptions::default()).await?;
//! ```

#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod client;
pub mod config;
pub mod endpoints;
pub mod error;
pub mod members;
pub mod poll;
pub mod transport;
pub mod workflow;

pub use client::HttpTransport;
pub use config::{ClientConfig, PollConfig, DEFAULT_BASE_URL};
pub use error::{Error, Result, SaveError, GENERIC_FAILURE, TIMEOUT_MESSAGE};
pub use members::{MemberCache, MemberSnapshot};
pub use poll::{PollMachine, PollState, PollStep, SaveTask};
pub use transport::{Member, RuleTransport, SaveRequest, SaveResponse, TaskStatus};
pub use workflow::{RuleSaveWorkflow, SaveOptions, TeardownHandle};
