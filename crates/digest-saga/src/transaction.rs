use std::fmt::Display;
use std::time::{Duration, Instant};

use tracing::debug;
use uuid::Uuid;

use crate::audit::SagaAuditLog;
use crate::error::CompensationFailure;

/// Lifecycle state of a saga transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransactionStatus {
    #[default]
    Pending,
    Running,
    Completed,
    Compensating,
    Failed,
}

impl TransactionStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Compensating => "compensating",
            Self::Failed => "failed",
        }
    }

    /// `Completed` and `Failed` never change once reached.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Engine-owned bookkeeping for one saga run.
#[derive(Debug)]
pub(crate) struct TransactionState {
    pub(crate) id: Uuid,
    pub(crate) status: TransactionStatus,
    pub(crate) steps: Vec<String>,
    pub(crate) completed_steps: Vec<String>,
    pub(crate) current_step: Option<String>,
    pub(crate) error: Option<String>,
    pub(crate) compensation_failures: Vec<CompensationFailure>,
    pub(crate) started_at: Option<Instant>,
    pub(crate) completed_at: Option<Instant>,
    pub(crate) audit: SagaAuditLog,
}

impl TransactionState {
    pub(crate) fn new(steps: Vec<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            status: TransactionStatus::Pending,
            steps,
            completed_steps: Vec::new(),
            current_step: None,
            error: None,
            compensation_failures: Vec::new(),
            started_at: None,
            completed_at: None,
            audit: SagaAuditLog::new(),
        }
    }

    fn transition(&mut self, to: TransactionStatus) {
        if self.status.is_terminal() {
            debug!(
                transaction = %self.id,
                from = %self.status,
                to = %to,
                "ignoring transition out of terminal state"
            );
            return;
        }
        self.status = to;
        if to.is_terminal() {
            self.completed_at = Some(Instant::now());
        }
    }

    pub(crate) fn start(&mut self) {
        self.transition(TransactionStatus::Running);
        if self.status == TransactionStatus::Running && self.started_at.is_none() {
            self.started_at = Some(Instant::now());
        }
    }

    pub(crate) fn begin_stage(&mut self, name: &str) {
        self.current_step = Some(name.to_string());
    }

    pub(crate) fn complete_stage(&mut self, name: &str) {
        debug_assert_eq!(
            self.steps.get(self.completed_steps.len()).map(String::as_str),
            Some(name),
            "stages complete in declaration order"
        );
        self.completed_steps.push(name.to_string());
    }

    pub(crate) fn begin_compensation(&mut self, error: &impl Display) {
        self.error = Some(error.to_string());
        self.transition(TransactionStatus::Compensating);
    }

    /// Record a failed compensation of the step logged at audit `record`.
    pub(crate) fn record_compensation_failure(
        &mut self,
        record: usize,
        failure: CompensationFailure,
    ) {
        self.audit.record_compensation_failed(record);
        self.compensation_failures.push(failure);
    }

    pub(crate) fn finish_completed(&mut self) {
        self.current_step = None;
        self.transition(TransactionStatus::Completed);
    }

    pub(crate) fn finish_failed(&mut self) {
        self.transition(TransactionStatus::Failed);
    }

    /// Open the transaction of a chained sub-saga run.
    ///
    /// The sub-saga writes into this transaction's audit log until it is
    /// handed back with [`Self::absorb`], so record indices stay valid for
    /// the chain's own rollback.
    pub(crate) fn link(&mut self, steps: Vec<String>) -> TransactionState {
        let mut inner = Self::new(steps);
        inner.audit = std::mem::take(&mut self.audit);
        inner
    }

    /// Take back the audit log lent to a sub-saga run, with its failures.
    pub(crate) fn absorb(&mut self, inner: TransactionState) {
        self.audit = inner.audit;
        self.compensation_failures
            .extend(inner.compensation_failures);
    }
}

/// Record of one saga invocation.
///
/// Created per `execute_with_transaction` call and only mutated by the
/// engine. `completed_steps` is always a prefix of `steps`, and remains
/// populated after a failure so partial progress can be diagnosed.
#[derive(Debug)]
pub struct SagaTransaction<I, O> {
    state: TransactionState,
    input: I,
    output: Option<O>,
}

impl<I, O> SagaTransaction<I, O> {
    pub(crate) fn new(state: TransactionState, input: I, output: Option<O>) -> Self {
        Self {
            state,
            input,
            output,
        }
    }

    #[must_use]
    pub fn id(&self) -> Uuid {
        self.state.id
    }

    #[must_use]
    pub fn status(&self) -> TransactionStatus {
        self.state.status
    }

    /// Stage names in declaration order.
    #[must_use]
    pub fn steps(&self) -> &[String] {
        &self.state.steps
    }

    /// Stages that completed, in completion order.
    #[must_use]
    pub fn completed_steps(&self) -> &[String] {
        &self.state.completed_steps
    }

    /// The stage that was running last; `None` after successful completion.
    #[must_use]
    pub fn current_step(&self) -> Option<&str> {
        self.state.current_step.as_deref()
    }

    /// Rendered triggering error, if the saga failed.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.state.error.as_deref()
    }

    #[must_use]
    pub fn compensation_failures(&self) -> &[CompensationFailure] {
        &self.state.compensation_failures
    }

    #[must_use]
    pub fn started_at(&self) -> Option<Instant> {
        self.state.started_at
    }

    #[must_use]
    pub fn completed_at(&self) -> Option<Instant> {
        self.state.completed_at
    }

    /// Wall time between start and reaching a terminal state.
    #[must_use]
    pub fn duration(&self) -> Option<Duration> {
        Some(self.state.completed_at? - self.state.started_at?)
    }

    /// The input the saga was invoked with.
    #[must_use]
    pub fn input(&self) -> &I {
        &self.input
    }

    /// The final output; `None` unless the saga completed.
    #[must_use]
    pub fn output(&self) -> Option<&O> {
        self.output.as_ref()
    }

    #[must_use]
    pub fn audit_log(&self) -> &SagaAuditLog {
        &self.state.audit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(steps: &[&str]) -> TransactionState {
        TransactionState::new(steps.iter().map(ToString::to_string).collect())
    }

    #[test]
    fn new_transaction_is_pending() {
        let tx = state(&["fetch"]);
        assert_eq!(tx.status, TransactionStatus::Pending);
        assert!(tx.started_at.is_none());
    }

    #[test]
    fn successful_lifecycle_reaches_completed() {
        let mut tx = state(&["fetch", "send"]);
        tx.start();
        tx.begin_stage("fetch");
        tx.complete_stage("fetch");
        tx.begin_stage("send");
        tx.complete_stage("send");
        tx.finish_completed();

        assert_eq!(tx.status, TransactionStatus::Completed);
        assert_eq!(tx.completed_steps, vec!["fetch", "send"]);
        assert!(tx.current_step.is_none());
        assert!(tx.completed_at.is_some());
    }

    #[test]
    fn terminal_states_are_immutable() {
        let mut tx = state(&["fetch"]);
        tx.start();
        tx.begin_compensation(&"boom");
        tx.finish_failed();
        let started_at = tx.started_at;
        let completed_at = tx.completed_at;

        tx.start();
        tx.finish_completed();

        assert_eq!(tx.status, TransactionStatus::Failed);
        assert_eq!(tx.error.as_deref(), Some("boom"));
        assert!(started_at.is_some());
        assert_eq!(tx.started_at, started_at);
        assert_eq!(tx.completed_at, completed_at);
    }

    #[test]
    fn compensation_failures_are_mirrored_in_audit_log() {
        let mut tx = state(&["fetch"]);
        let index = tx.audit.record_start("fetch");
        tx.audit.record_success(index, "undo fetch".to_string());

        tx.record_compensation_failure(
            index,
            CompensationFailure {
                step: "fetch".to_string(),
                description: "undo fetch".to_string(),
                message: "disk full".to_string(),
            },
        );

        assert_eq!(tx.compensation_failures.len(), 1);
        assert_eq!(
            tx.audit.records()[0].status,
            crate::audit::StepStatus::CompensationFailed
        );
    }

    #[test]
    fn status_display_matches_lowercase_names() {
        assert_eq!(TransactionStatus::Compensating.to_string(), "compensating");
        assert!(TransactionStatus::Completed.is_terminal());
        assert!(!TransactionStatus::Compensating.is_terminal());
    }
}
