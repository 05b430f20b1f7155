//! Rule save workflow with asynchronous verification.
//!
//! A submit validates locally, sends one create or update request and, if
//! the backend answers 202, polls the verification task until it reaches a
//! terminal status or the deadline passes. Every path ends in exactly one
//! `Result<Rule, SaveError>` and clears the loading flag.

use crate::config::PollConfig;
use crate::error::SaveError;
use crate::members::MemberCache;
use crate::poll::{PollMachine, PollStep, SaveTask};
use crate::transport::{RuleTransport, SaveRequest, SaveResponse};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};
use vigil_rule::{prepare_payload, Rule, RuleKind};
use vigil_validator::{validate_rule, MemberLookup};

/// Per-submit options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SaveOptions {
    /// Create a copy of the rule instead of updating it.
    pub duplicate: bool,
    /// Free-form origin of the request.
    pub referrer: Option<String>,
}

/// Handle used by the owner of a workflow to tear it down.
#[derive(Clone)]
pub struct TeardownHandle {
    torn_down: Arc<watch::Sender<bool>>,
    loading: Arc<watch::Sender<bool>>,
}

impl TeardownHandle {
    /// Cancels any pending poll and stops the workflow from issuing
    /// further requests.
    pub fn teardown(&self) {
        self.torn_down.send_replace(true);
        self.loading.send_replace(false);
    }
}

/// Holds the loading flag up until dropped.
struct LoadingGuard(Arc<watch::Sender<bool>>);

impl LoadingGuard {
    fn raise(loading: &Arc<watch::Sender<bool>>) -> Self {
        loading.send_replace(true);
        Self(Arc::clone(loading))
    }
}

impl Drop for LoadingGuard {
    fn drop(&mut self) {
        self.0.send_replace(false);
    }
}

/// Submits rules and follows asynchronous verification to completion.
pub struct RuleSaveWorkflow<T> {
    transport: T,
    poll: PollConfig,
    members: Option<MemberCache>,
    pending: Option<SaveTask>,
    loading: Arc<watch::Sender<bool>>,
    torn_down: Arc<watch::Sender<bool>>,
}

impl<T: RuleTransport> RuleSaveWorkflow<T> {
    /// Creates a workflow with default polling.
    pub fn new(transport: T) -> Self {
        let (loading, _) = watch::channel(false);
        let (torn_down, _) = watch::channel(false);
        Self {
            transport,
            poll: PollConfig::default(),
            members: None,
            pending: None,
            loading: Arc::new(loading),
            torn_down: Arc::new(torn_down),
        }
    }

    /// Overrides polling timing.
    #[must_use]
    pub const fn with_poll_config(mut self, poll: PollConfig) -> Self {
        self.poll = poll;
        self
    }

    /// Attaches a member cache used during local validation.
    #[must_use]
    pub fn with_members(mut self, members: MemberCache) -> Self {
        self.members = Some(members);
        self
    }

    /// The underlying transport.
    pub const fn transport(&self) -> &T {
        &self.transport
    }

    /// Returns a handle that tears this workflow down.
    pub fn teardown_handle(&self) -> TeardownHandle {
        TeardownHandle {
            torn_down: Arc::clone(&self.torn_down),
            loading: Arc::clone(&self.loading),
        }
    }

    /// True while a request or poll is outstanding.
    pub fn is_loading(&self) -> bool {
        *self.loading.borrow()
    }

    /// Subscribes to the loading flag.
    pub fn loading(&self) -> watch::Receiver<bool> {
        self.loading.subscribe()
    }

    /// Verification task left over from an interrupted submit, if any.
    pub const fn pending_task(&self) -> Option<&SaveTask> {
        self.pending.as_ref()
    }

    fn is_torn_down(&self) -> bool {
        *self.torn_down.borrow()
    }

    /// Validates and saves a rule, following verification if needed.
    ///
    /// If an earlier submit was interrupted while polling, this resumes
    /// that task instead of sending the rule again.
    ///
    /// # Errors
    ///
    /// Returns a [`SaveError`] describing the single terminal failure.
    pub async fn submit(&mut self, rule: &Rule, options: &SaveOptions) -> Result<Rule, SaveError> {
        if self.is_torn_down() {
            return Err(SaveError::TornDown);
        }

        let members = self.members.as_ref().map(|m| m as &dyn MemberLookup);
        let report = validate_rule(rule, members);
        if !report.is_valid() {
            let message = report.summary();
            warn!("{}", message);
            return Err(SaveError::ClientValidation {
                message,
                trigger_errors: report.trigger_errors,
            });
        }

        let loading = LoadingGuard::raise(&self.loading);
        let outcome = self.save(rule, options).await;
        drop(loading);

        match &outcome {
            Ok(saved) => info!("Saved {} rule '{}'", saved.kind(), saved.name()),
            Err(e) => warn!("Save failed: {}", e),
        }
        outcome
    }

    async fn save(&mut self, rule: &Rule, options: &SaveOptions) -> Result<Rule, SaveError> {
        if let Some(task) = self.pending.clone() {
            info!("Resuming verification task {}", task.uuid);
            return self.follow(task).await;
        }

        let payload = prepare_payload(rule, options.duplicate);
        let request = SaveRequest {
            kind: payload.kind(),
            id: payload.id().map(ToString::to_string),
            payload,
            duplicate: options.duplicate,
            referrer: options.referrer.clone(),
        };

        let mut torn_down = self.torn_down.subscribe();
        let response = until_teardown(&mut torn_down, self.transport.save_rule(request))
            .await
            .ok_or(SaveError::TornDown)?
            .map_err(SaveError::persistence)?;

        match response {
            SaveResponse::Saved(saved) => Ok(saved),
            SaveResponse::Accepted { uuid } => {
                let task = SaveTask::accepted(uuid, rule.kind(), self.poll.timeout);
                self.pending = Some(task.clone());
                self.follow(task).await
            }
        }
    }

    /// Drives the poll machine until a terminal step or teardown.
    async fn follow(&mut self, task: SaveTask) -> Result<Rule, SaveError> {
        if Instant::now() >= task.deadline {
            warn!("Verification task {} expired before it could be resumed", task.uuid);
            self.pending = None;
            return Err(SaveError::VerificationTimeout);
        }

        let mut torn_down = self.torn_down.subscribe();
        let mut machine = PollMachine::new(task);

        loop {
            // One delay outstanding at a time; it is dropped on teardown.
            if until_teardown(&mut torn_down, sleep(self.poll.interval))
                .await
                .is_none()
            {
                break;
            }

            let task = machine.task();
            let Some(result) = until_teardown(
                &mut torn_down,
                self.transport.fetch_task(task.kind, &task.uuid),
            )
            .await
            else {
                break;
            };

            if let PollStep::Done(outcome) = machine.observe(result, Instant::now()) {
                self.pending = None;
                return outcome;
            }
        }

        debug!("Workflow torn down while polling {}", machine.task().uuid);
        self.pending = None;
        Err(SaveError::TornDown)
    }

    /// Deletes a rule.
    ///
    /// # Errors
    ///
    /// Returns [`SaveError::Persistence`] if the backend rejects the delete,
    /// or [`SaveError::TornDown`] after teardown.
    pub async fn delete(&mut self, kind: RuleKind, id: &str) -> Result<(), SaveError> {
        if self.is_torn_down() {
            return Err(SaveError::TornDown);
        }

        let loading = LoadingGuard::raise(&self.loading);
        let mut torn_down = self.torn_down.subscribe();
        let outcome = until_teardown(&mut torn_down, self.transport.delete_rule(kind, id)).await;
        drop(loading);

        outcome
            .ok_or(SaveError::TornDown)?
            .map_err(SaveError::persistence)
    }
}

/// Runs `future` unless teardown is signalled first.
async fn until_teardown<F: Future>(
    torn_down: &mut watch::Receiver<bool>,
    future: F,
) -> Option<F::Output> {
    tokio::select! {
        biased;
        () = wait_for_teardown(torn_down) => None,
        output = future => Some(output),
    }
}

async fn wait_for_teardown(torn_down: &mut watch::Receiver<bool>) {
    while !*torn_down.borrow_and_update() {
        if torn_down.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, Result, TIMEOUT_MESSAGE};
    use crate::transport::{Member, TaskStatus};
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;
    use vigil_rule::{
        ActionType, ComponentKind, IssueRule, MetricRule, RuleComponent, TargetType, Trigger,
        TriggerAction, TriggerLabel,
    };

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Save(SaveRequest),
        Poll(String, Instant),
        Delete(String),
    }

    #[derive(Default)]
    struct Script {
        saves: VecDeque<Result<SaveResponse>>,
        polls: VecDeque<Result<TaskStatus>>,
        deletes: VecDeque<Result<()>>,
        calls: Vec<Call>,
    }

    /// In-memory backend; an empty poll script answers `pending`.
    #[derive(Clone, Default)]
    struct FakeBackend {
        script: Arc<Mutex<Script>>,
    }

    impl FakeBackend {
        fn on_save(&self, response: Result<SaveResponse>) -> &Self {
            self.script.lock().unwrap().saves.push_back(response);
            self
        }

        fn on_poll(&self, response: Result<TaskStatus>) -> &Self {
            self.script.lock().unwrap().polls.push_back(response);
            self
        }

        fn calls(&self) -> Vec<Call> {
            self.script.lock().unwrap().calls.clone()
        }

        fn saves(&self) -> Vec<SaveRequest> {
            self.calls()
                .into_iter()
                .filter_map(|c| match c {
                    Call::Save(request) => Some(request),
                    _ => None,
                })
                .collect()
        }

        fn polls(&self) -> Vec<(String, Instant)> {
            self.calls()
                .into_iter()
                .filter_map(|c| match c {
                    Call::Poll(uuid, at) => Some((uuid, at)),
                    _ => None,
                })
                .collect()
        }
    }

    impl RuleTransport for FakeBackend {
        async fn save_rule(&self, request: SaveRequest) -> Result<SaveResponse> {
            let mut script = self.script.lock().unwrap();
            script.calls.push(Call::Save(request));
            script
                .saves
                .pop_front()
                .unwrap_or_else(|| Err(Error::Parse("unscripted save".into())))
        }

        async fn fetch_task(&self, _kind: RuleKind, uuid: &str) -> Result<TaskStatus> {
            let mut script = self.script.lock().unwrap();
            script.calls.push(Call::Poll(uuid.to_string(), Instant::now()));
            script.polls.pop_front().unwrap_or(Ok(TaskStatus::Pending))
        }

        async fn delete_rule(&self, _kind: RuleKind, id: &str) -> Result<()> {
            let mut script = self.script.lock().unwrap();
            script.calls.push(Call::Delete(id.to_string()));
            script.deletes.pop_front().unwrap_or(Ok(()))
        }

        async fn list_members(&self) -> Result<Vec<Member>> {
            Ok(Vec::new())
        }
    }

    fn metric_rule() -> MetricRule {
        let mut rule = MetricRule::new("error spike", "count()");
        rule.triggers[0] = Trigger::new(TriggerLabel::Critical)
            .with_threshold(100.0)
            .with_action(TriggerAction::new(ActionType::Slack, TargetType::Specific, "#ops"));
        rule
    }

    fn saved(mut rule: MetricRule, id: &str) -> Rule {
        rule.id = Some(id.to_string());
        rule.into()
    }

    fn accepted(uuid: &str) -> Result<SaveResponse> {
        Ok(SaveResponse::Accepted {
            uuid: uuid.to_string(),
        })
    }

    #[tokio::test(start_paused = true)]
    async fn synchronous_save_returns_rule() {
        let backend = FakeBackend::default();
        backend.on_save(Ok(SaveResponse::Saved(saved(metric_rule(), "1"))));
        let mut workflow = RuleSaveWorkflow::new(backend.clone());

        let rule = workflow
            .submit(&metric_rule().into(), &SaveOptions::default())
            .await
            .unwrap();

        assert_eq!(rule.id(), Some("1"));
        assert!(backend.polls().is_empty());
        assert!(!workflow.is_loading());
        let request = &backend.saves()[0];
        assert_eq!(request.id, None);
        assert_eq!(request.kind, RuleKind::Metric);
    }

    #[tokio::test(start_paused = true)]
    async fn accepted_save_polls_after_one_second() {
        let backend = FakeBackend::default();
        backend
            .on_save(accepted("abc"))
            .on_poll(Ok(TaskStatus::Completed(saved(metric_rule(), "2"))));
        let mut workflow = RuleSaveWorkflow::new(backend.clone());

        let started = Instant::now();
        let rule = workflow
            .submit(&metric_rule().into(), &SaveOptions::default())
            .await
            .unwrap();

        assert_eq!(rule.id(), Some("2"));
        let polls = backend.polls();
        assert_eq!(polls.len(), 1);
        assert_eq!(polls[0].0, "abc");
        assert_eq!(polls[0].1 - started, Duration::from_secs(1));
        assert!(workflow.pending_task().is_none());
        assert!(!workflow.is_loading());
    }

    #[tokio::test(start_paused = true)]
    async fn pending_until_deadline_times_out() {
        let backend = FakeBackend::default();
        backend.on_save(accepted("abc"));
        let mut workflow = RuleSaveWorkflow::new(backend.clone());

        let err = workflow
            .submit(&metric_rule().into(), &SaveOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, SaveError::VerificationTimeout));
        assert_eq!(err.message(), TIMEOUT_MESSAGE);
        assert_eq!(backend.polls().len(), 180);
        assert!(workflow.pending_task().is_none());
        assert!(!workflow.is_loading());

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(backend.polls().len(), 180);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_task_surfaces_backend_error() {
        let backend = FakeBackend::default();
        backend
            .on_save(accepted("abc"))
            .on_poll(Ok(TaskStatus::Pending))
            .on_poll(Ok(TaskStatus::Failed(Some("Channel #ops not found".into()))));
        let mut workflow = RuleSaveWorkflow::new(backend.clone());

        let err = workflow
            .submit(&metric_rule().into(), &SaveOptions::default())
            .await
            .unwrap_err();

        assert_eq!(err.message(), "Channel #ops not found");
        assert_eq!(backend.polls().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn poll_transport_error_is_verification_failure() {
        let backend = FakeBackend::default();
        backend
            .on_save(accepted("abc"))
            .on_poll(Err(Error::Parse("not json".into())));
        let mut workflow = RuleSaveWorkflow::new(backend.clone());

        let err = workflow
            .submit(&metric_rule().into(), &SaveOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, SaveError::VerificationFailed(_)));
        assert!(workflow.pending_task().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn resubmit_resumes_existing_task() {
        let backend = FakeBackend::default();
        backend.on_save(accepted("abc"));
        let mut workflow = RuleSaveWorkflow::new(backend.clone());
        let rule: Rule = metric_rule().into();

        let interrupted = tokio::time::timeout(
            Duration::from_millis(2500),
            workflow.submit(&rule, &SaveOptions::default()),
        )
        .await;
        assert!(interrupted.is_err());
        assert_eq!(workflow.pending_task().map(|t| t.uuid.as_str()), Some("abc"));
        assert_eq!(backend.polls().len(), 2);

        backend.on_poll(Ok(TaskStatus::Completed(saved(metric_rule(), "3"))));
        let rule = workflow
            .submit(&rule, &SaveOptions::default())
            .await
            .unwrap();

        assert_eq!(rule.id(), Some("3"));
        assert_eq!(backend.saves().len(), 1);
        assert!(backend.polls().iter().all(|(uuid, _)| uuid == "abc"));
        assert_eq!(backend.polls().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn interrupted_submit_clears_loading() {
        let backend = FakeBackend::default();
        backend.on_save(accepted("abc"));
        let mut workflow = RuleSaveWorkflow::new(backend.clone());
        let mut loading = workflow.loading();
        let rule: Rule = metric_rule().into();

        let interrupted = tokio::time::timeout(
            Duration::from_millis(2500),
            workflow.submit(&rule, &SaveOptions::default()),
        )
        .await;
        assert!(interrupted.is_err());

        assert!(!workflow.is_loading());
        assert!(!*loading.borrow_and_update());
        assert!(workflow.pending_task().is_some());

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(backend.polls().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn expired_task_times_out_without_polling() {
        let backend = FakeBackend::default();
        backend.on_save(accepted("abc"));
        let mut workflow = RuleSaveWorkflow::new(backend.clone()).with_poll_config(PollConfig {
            interval: Duration::from_secs(1),
            timeout: Duration::from_secs(3),
        });
        let rule: Rule = metric_rule().into();

        let interrupted = tokio::time::timeout(
            Duration::from_millis(2500),
            workflow.submit(&rule, &SaveOptions::default()),
        )
        .await;
        assert!(interrupted.is_err());
        assert_eq!(backend.polls().len(), 2);

        tokio::time::sleep(Duration::from_secs(5)).await;
        let err = workflow
            .submit(&rule, &SaveOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, SaveError::VerificationTimeout));
        assert_eq!(backend.polls().len(), 2);
        assert_eq!(backend.saves().len(), 1);
        assert!(workflow.pending_task().is_none());
        assert!(!workflow.is_loading());
    }

    #[tokio::test(start_paused = true)]
    async fn teardown_stops_polling() {
        let backend = FakeBackend::default();
        backend.on_save(accepted("abc"));
        let mut workflow = RuleSaveWorkflow::new(backend.clone());
        let handle = workflow.teardown_handle();
        let rule: Rule = metric_rule().into();

        let options = SaveOptions::default();

        let (outcome, ()) = tokio::join!(workflow.submit(&rule, &options), async {
            tokio::time::sleep(Duration::from_millis(2500)).await;
            handle.teardown();
        });

        assert!(matches!(outcome, Err(SaveError::TornDown)));
        assert_eq!(backend.polls().len(), 2);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(backend.polls().len(), 2);

        let again = workflow.submit(&rule, &SaveOptions::default()).await;
        assert!(matches!(again, Err(SaveError::TornDown)));
        assert_eq!(backend.calls().len(), 3);
        assert!(!workflow.is_loading());
    }

    #[tokio::test(start_paused = true)]
    async fn invalid_rule_never_reaches_backend() {
        let backend = FakeBackend::default();
        let mut workflow = RuleSaveWorkflow::new(backend.clone());
        let mut rule = metric_rule();
        rule.name = String::new();
        rule.triggers[0].alert_threshold = None;

        let err = workflow
            .submit(&rule.into(), &SaveOptions::default())
            .await
            .unwrap_err();

        insta::assert_snapshot!(err.message(), @"Alert not valid: missing name and critical threshold");
        assert!(err.trigger_errors().is_some());
        assert!(backend.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn empty_warning_is_stripped_before_sending() {
        let backend = FakeBackend::default();
        backend.on_save(Ok(SaveResponse::Saved(saved(metric_rule(), "1"))));
        let mut workflow = RuleSaveWorkflow::new(backend.clone());
        let mut rule = metric_rule();
        rule.triggers.push(Trigger::new(TriggerLabel::Warning));

        workflow
            .submit(&rule.into(), &SaveOptions::default())
            .await
            .unwrap();

        let Rule::Metric(sent) = &backend.saves()[0].payload else {
            panic!("expected metric payload");
        };
        assert_eq!(sent.triggers.len(), 1);
        assert_eq!(sent.triggers[0].label, TriggerLabel::Critical);
    }

    #[tokio::test(start_paused = true)]
    async fn warning_with_action_and_no_threshold_fails_validation() {
        let backend = FakeBackend::default();
        let mut workflow = RuleSaveWorkflow::new(backend.clone());
        let mut rule = metric_rule();
        rule.triggers.push(
            Trigger::new(TriggerLabel::Warning)
                .with_action(TriggerAction::new(ActionType::Email, TargetType::Team, "5")),
        );

        let err = workflow
            .submit(&rule.into(), &SaveOptions::default())
            .await
            .unwrap_err();

        assert_eq!(err.message(), "Alert not valid: missing warning threshold");
        assert!(backend.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn update_and_duplicate_requests() {
        let backend = FakeBackend::default();
        let mut issue = IssueRule::new("new issues");
        issue.id = Some("12".into());
        issue
            .conditions
            .push(RuleComponent::new(ComponentKind::FirstSeenEvent));
        issue.actions.push(
            RuleComponent::new(ComponentKind::NotifyEmail).with_field("targetType", "IssueOwners"),
        );
        let rule = Rule::from(issue);
        backend
            .on_save(Ok(SaveResponse::Saved(rule.clone())))
            .on_save(Ok(SaveResponse::Saved(rule.clone())));
        let mut workflow = RuleSaveWorkflow::new(backend.clone());

        workflow.submit(&rule, &SaveOptions::default()).await.unwrap();
        workflow
            .submit(
                &rule,
                &SaveOptions {
                    duplicate: true,
                    referrer: Some("cli".into()),
                },
            )
            .await
            .unwrap();

        let saves = backend.saves();
        assert_eq!(saves[0].id.as_deref(), Some("12"));
        assert!(!saves[0].duplicate);
        assert_eq!(saves[1].id, None);
        assert!(saves[1].payload.is_new());
        assert_eq!(saves[1].referrer.as_deref(), Some("cli"));
    }

    #[tokio::test(start_paused = true)]
    async fn backend_rejection_carries_field_errors() {
        let backend = FakeBackend::default();
        backend.on_save(Err(Error::Status {
            status: 400,
            body: Some(serde_json::json!({"aggregate": ["Invalid metric"]})),
        }));
        let mut workflow = RuleSaveWorkflow::new(backend.clone());

        let err = workflow
            .submit(&metric_rule().into(), &SaveOptions::default())
            .await
            .unwrap_err();

        assert_eq!(err.field_errors().unwrap()["aggregate"], vec!["Invalid metric"]);
        assert!(!workflow.is_loading());
    }

    #[tokio::test(start_paused = true)]
    async fn loaded_members_are_checked() {
        let backend = FakeBackend::default();
        let members = MemberCache::new();
        members.set(vec![Member {
            id: "1".into(),
            name: "Ada".into(),
            email: "ada@example.com".into(),
        }]);
        let mut workflow = RuleSaveWorkflow::new(backend.clone()).with_members(members);
        let mut rule = metric_rule();
        rule.triggers[0]
            .actions
            .push(TriggerAction::new(ActionType::Email, TargetType::User, "2"));

        let err = workflow
            .submit(&rule.into(), &SaveOptions::default())
            .await
            .unwrap_err();

        assert_eq!(err.message(), "Alert not valid: unknown member 2");
        assert!(backend.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn delete_maps_failures() {
        let backend = FakeBackend::default();
        backend.script.lock().unwrap().deletes.push_back(Err(Error::Status {
            status: 404,
            body: Some(serde_json::json!({"detail": "Not found"})),
        }));
        let mut workflow = RuleSaveWorkflow::new(backend.clone());

        let err = workflow.delete(RuleKind::Issue, "12").await.unwrap_err();
        assert_eq!(err.message(), "Not found");
        workflow.delete(RuleKind::Issue, "13").await.unwrap();
        assert_eq!(
            backend.calls(),
            vec![Call::Delete("12".into()), Call::Delete("13".into())]
        );
    }
}
