//! Verification polling state machine.
//!
//! ```text
//! Submitted ──▶ Polling ──▶ Succeeded
//!                 │  ▲  ├──▶ Failed
//!                 └──┘  └──▶ TimedOut
//! ```
//!
//! The machine only decides; sleeping and fetching are done by the
//! workflow, so transitions can be tested without a clock.

use crate::error::{Result, SaveError, GENERIC_FAILURE};
use crate::transport::TaskStatus;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use vigil_rule::{Rule, RuleKind};

/// An asynchronous verification job awaiting a terminal status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveTask {
    /// Task identifier returned with the 202.
    pub uuid: String,
    /// Endpoint family the task belongs to.
    pub kind: RuleKind,
    /// Instant after which a pending status means timeout.
    pub deadline: Instant,
}

impl SaveTask {
    /// Starts the clock on a freshly accepted task.
    #[must_use]
    pub fn accepted(uuid: impl Into<String>, kind: RuleKind, timeout: Duration) -> Self {
        Self {
            uuid: uuid.into(),
            kind,
            deadline: Instant::now() + timeout,
        }
    }
}

/// Where a verification currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    /// Task accepted, no poll issued yet.
    Submitted,
    /// At least one poll issued and the task is still pending.
    Polling {
        /// Polls issued so far.
        attempts: u32,
    },
    /// Task finished with a saved rule.
    Succeeded,
    /// Task failed or could not be polled.
    Failed,
    /// Deadline passed while the task was pending.
    TimedOut,
}

impl PollState {
    /// True for states that end the loop.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::TimedOut)
    }
}

/// What the driver should do after a poll.
#[derive(Debug)]
pub enum PollStep {
    /// Sleep for the interval and poll again.
    Continue,
    /// Stop with this outcome.
    Done(std::result::Result<Rule, SaveError>),
}

/// Transition logic for one verification task.
#[derive(Debug)]
pub struct PollMachine {
    task: SaveTask,
    state: PollState,
}

impl PollMachine {
    /// Creates a machine in the `Submitted` state.
    #[must_use]
    pub const fn new(task: SaveTask) -> Self {
        Self {
            task,
            state: PollState::Submitted,
        }
    }

    /// The task being polled.
    pub const fn task(&self) -> &SaveTask {
        &self.task
    }

    /// Current state.
    pub const fn state(&self) -> PollState {
        self.state
    }

    /// Applies the result of one poll observed at `now`.
    pub fn observe(&mut self, result: Result<TaskStatus>, now: Instant) -> PollStep {
        let attempts = match self.state {
            PollState::Submitted => 1,
            PollState::Polling { attempts } => attempts + 1,
            terminal => {
                warn!("Poll result observed after terminal state {:?}", terminal);
                return PollStep::Done(Err(SaveError::VerificationFailed(
                    GENERIC_FAILURE.to_string(),
                )));
            }
        };

        match result {
            Ok(TaskStatus::Pending) if now >= self.task.deadline => {
                warn!(
                    "Verification task {} still pending after {} polls, giving up",
                    self.task.uuid, attempts
                );
                self.state = PollState::TimedOut;
                PollStep::Done(Err(SaveError::VerificationTimeout))
            }
            Ok(TaskStatus::Pending) => {
                debug!("Verification task {} pending (poll {})", self.task.uuid, attempts);
                self.state = PollState::Polling { attempts };
                PollStep::Continue
            }
            Ok(TaskStatus::Failed(reason)) => {
                warn!("Verification task {} failed: {:?}", self.task.uuid, reason);
                self.state = PollState::Failed;
                PollStep::Done(Err(SaveError::VerificationFailed(
                    reason.unwrap_or_else(|| GENERIC_FAILURE.to_string()),
                )))
            }
            Ok(TaskStatus::Completed(rule)) => {
                info!("Verification task {} completed", self.task.uuid);
                self.state = PollState::Succeeded;
                PollStep::Done(Ok(rule))
            }
            Err(e) => {
                warn!("Polling task {} failed: {}", self.task.uuid, e);
                self.state = PollState::Failed;
                PollStep::Done(Err(SaveError::VerificationFailed(
                    GENERIC_FAILURE.to_string(),
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use vigil_rule::IssueRule;

    fn machine() -> (PollMachine, Instant) {
        let task = SaveTask::accepted("abc", RuleKind::Issue, Duration::from_secs(180));
        let deadline = task.deadline;
        (PollMachine::new(task), deadline)
    }

    #[test]
    fn pending_keeps_polling_until_deadline() {
        let (mut machine, deadline) = machine();
        let early = deadline - Duration::from_secs(10);

        assert!(matches!(
            machine.observe(Ok(TaskStatus::Pending), early),
            PollStep::Continue
        ));
        assert_eq!(machine.state(), PollState::Polling { attempts: 1 });

        let step = machine.observe(Ok(TaskStatus::Pending), deadline);
        assert!(matches!(step, PollStep::Done(Err(SaveError::VerificationTimeout))));
        assert_eq!(machine.state(), PollState::TimedOut);
        assert!(machine.state().is_terminal());
    }

    #[test]
    fn failed_status_uses_backend_reason_or_fallback() {
        let (mut machine, deadline) = machine();
        let step = machine.observe(Ok(TaskStatus::Failed(Some("No channel".into()))), deadline);
        let PollStep::Done(Err(err)) = step else {
            panic!("expected failure");
        };
        assert_eq!(err.message(), "No channel");

        let (mut machine, deadline) = self::machine();
        let PollStep::Done(Err(err)) = machine.observe(Ok(TaskStatus::Failed(None)), deadline)
        else {
            panic!("expected failure");
        };
        assert_eq!(err.message(), GENERIC_FAILURE);
    }

    #[test]
    fn transport_error_is_treated_as_failure() {
        let (mut machine, deadline) = machine();
        let step = machine.observe(Err(Error::Parse("garbage".into())), deadline);
        assert!(matches!(step, PollStep::Done(Err(SaveError::VerificationFailed(_)))));
        assert_eq!(machine.state(), PollState::Failed);
    }

    #[test]
    fn completed_rule_is_success() {
        let (mut machine, deadline) = machine();
        let rule = Rule::from(IssueRule::new("saved"));
        let step = machine.observe(Ok(TaskStatus::Completed(rule.clone())), deadline);
        assert!(matches!(step, PollStep::Done(Ok(r)) if r == rule));
        assert_eq!(machine.state(), PollState::Succeeded);
    }
}
