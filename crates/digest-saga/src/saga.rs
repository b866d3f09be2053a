use std::fmt::{Debug, Display};
use std::marker::PhantomData;

use tracing::info;

use crate::cloneable::downcast;
use crate::erased::ErasedStage;
use crate::error::SagaError;
use crate::runner::{self, Stages};
use crate::transaction::{SagaTransaction, TransactionState};

pub(crate) const DEFAULT_SAGA_NAME: &str = "saga";

/// A compiled saga ready for execution.
///
/// Sagas execute a sequence of stages, where each stage's output becomes the
/// next stage's input. If any stage fails, previously completed stages are
/// compensated in reverse order (LIFO).
///
/// A saga holds no per-run state: concurrent calls to [`Saga::execute`]
/// produce independent transactions.
pub struct Saga<Input, Output, Ctx, Err> {
    name: String,
    stages: Vec<Box<dyn ErasedStage<Ctx, Err>>>,
    _phantom: PhantomData<(Input, Output)>,
}

impl<Input, Output, Ctx, Err> Saga<Input, Output, Ctx, Err> {
    pub(crate) fn from_stages(name: String, stages: Vec<Box<dyn ErasedStage<Ctx, Err>>>) -> Self {
        Self {
            name,
            stages,
            _phantom: PhantomData,
        }
    }

    /// Rename the saga. The name shows up in logs and as the link name when
    /// the saga is chained.
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stage names in declaration order. A parallel group counts as one stage.
    #[must_use]
    pub fn stage_names(&self) -> Vec<String> {
        self.stages.iter().map(|s| s.name().to_string()).collect()
    }

    pub(crate) fn stages(&self) -> &Stages<Ctx, Err> {
        &self.stages
    }
}

impl<Input, Output, Ctx, Err> Saga<Input, Output, Ctx, Err>
where
    Input: Clone + Send + Sync + 'static,
    Output: Clone + Send + Sync + 'static,
    Ctx: Sync,
    Err: Debug + Display + Send + Sync,
{
    /// Execute the saga, returning the final output on success.
    ///
    /// On failure, compensates all previously completed stages in reverse order.
    ///
    /// # Errors
    ///
    /// Returns `SagaError::StepFailed` carrying the triggering error once the
    /// rollback has finished. Compensation failures do not change the error;
    /// they are recorded on the transaction.
    pub async fn execute(&self, ctx: &Ctx, input: Input) -> Result<Output, SagaError<Err>> {
        let (result, _transaction) = self.execute_with_transaction(ctx, input).await;
        result
    }

    /// Execute the saga and return both the result and the transaction record.
    pub async fn execute_with_transaction(
        &self,
        ctx: &Ctx,
        input: Input,
    ) -> (
        Result<Output, SagaError<Err>>,
        SagaTransaction<Input, Output>,
    ) {
        execute_typed(&self.name, &self.stages, ctx, input).await
    }
}

/// Drive a typed run over erased stages and wrap it in a transaction.
pub(crate) async fn execute_typed<Input, Output, Ctx, Err>(
    name: &str,
    stages: &Stages<Ctx, Err>,
    ctx: &Ctx,
    input: Input,
) -> (
    Result<Output, SagaError<Err>>,
    SagaTransaction<Input, Output>,
)
where
    Input: Clone + Send + Sync + 'static,
    Output: Clone + Send + Sync + 'static,
    Ctx: Sync,
    Err: Debug + Display + Send + Sync,
{
    let mut state = TransactionState::new(stages.iter().map(|s| s.name().to_string()).collect());
    state.start();
    info!(
        saga = name,
        transaction = %state.id,
        steps = stages.len(),
        "saga started"
    );

    let result = runner::run_stages(stages, ctx, Box::new(input.clone()), &mut state).await;
    match result {
        Ok(completed) => {
            let output = downcast::<Output>(completed.value);
            state.finish_completed();
            info!(saga = name, transaction = %state.id, "saga completed");
            let transaction = SagaTransaction::new(state, input, Some(output.clone()));
            (Ok(output), transaction)
        }
        Err(failure) => {
            state.finish_failed();
            info!(
                saga = name,
                transaction = %state.id,
                step = %failure.step,
                compensation_failures = state.compensation_failures.len(),
                "saga failed"
            );
            let error = SagaError::StepFailed {
                step: failure.step,
                transaction: state.id,
                source: failure.error,
            };
            (Err(error), SagaTransaction::new(state, input, None))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::audit::StepStatus;
    use crate::builder::SagaBuilder;
    use crate::step::SagaStep;
    use crate::transaction::TransactionStatus;

    #[derive(Default)]
    struct TestContext {
        compensation_log: Mutex<Vec<String>>,
    }

    impl TestContext {
        fn log(&self) -> Vec<String> {
            self.compensation_log
                .lock()
                .expect("log lock poisoned")
                .clone()
        }
    }

    #[derive(Debug, PartialEq, thiserror::Error)]
    #[error("{0}")]
    struct TestError(String);

    struct AddStep {
        name: &'static str,
        value: i32,
    }

    #[async_trait]
    impl SagaStep for AddStep {
        type Input = i32;
        type Output = i32;
        type Context = TestContext;
        type Error = TestError;

        fn name(&self) -> &str {
            self.name
        }

        async fn execute(&self, _ctx: &TestContext, input: i32) -> Result<i32, TestError> {
            Ok(input + self.value)
        }

        async fn compensate(
            &self,
            ctx: &TestContext,
            output: i32,
            cause: &TestError,
        ) -> Result<(), TestError> {
            ctx.compensation_log
                .lock()
                .expect("log lock poisoned")
                .push(format!("compensate {} output {output} cause {cause}", self.name));
            Ok(())
        }
    }

    struct FailingStep;

    #[async_trait]
    impl SagaStep for FailingStep {
        type Input = i32;
        type Output = i32;
        type Context = TestContext;
        type Error = TestError;

        fn name(&self) -> &str {
            "failing"
        }

        async fn execute(&self, _ctx: &TestContext, _input: i32) -> Result<i32, TestError> {
            Err(TestError("boom".to_string()))
        }
    }

    struct IntToString;

    #[async_trait]
    impl SagaStep for IntToString {
        type Input = i32;
        type Output = String;
        type Context = TestContext;
        type Error = TestError;

        fn name(&self) -> &str {
            "int_to_string"
        }

        async fn execute(&self, _ctx: &TestContext, input: i32) -> Result<String, TestError> {
            Ok(input.to_string())
        }
    }

    #[tokio::test]
    async fn multi_step_saga_flows_data_through_steps() -> anyhow::Result<()> {
        let ctx = TestContext::default();
        let saga = SagaBuilder::new()
            .add_step(AddStep {
                name: "add_10",
                value: 10,
            })
            .add_step(AddStep {
                name: "add_5",
                value: 5,
            })
            .add_step(IntToString)
            .build();

        let result = saga.execute(&ctx, 5).await?;

        assert_eq!(result, "20");
        assert!(ctx.log().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn empty_saga_returns_input_unchanged() -> anyhow::Result<()> {
        let ctx = TestContext::default();
        let saga: Saga<i32, i32, TestContext, TestError> = SagaBuilder::new().build();

        let (result, transaction) = saga.execute_with_transaction(&ctx, 7).await;

        assert_eq!(result?, 7);
        assert_eq!(transaction.status(), TransactionStatus::Completed);
        assert!(transaction.steps().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn compensation_receives_step_output_and_cause_in_reverse_order() {
        let ctx = TestContext::default();
        let saga = SagaBuilder::new()
            .add_step(AddStep {
                name: "add_10",
                value: 10,
            })
            .add_step(AddStep {
                name: "add_1",
                value: 1,
            })
            .add_step(FailingStep)
            .build();

        let err = saga
            .execute(&ctx, 5)
            .await
            .expect_err("failing step should fail the saga");

        assert_eq!(err.step(), "failing");
        assert_eq!(err.into_source(), TestError("boom".to_string()));
        assert_eq!(
            ctx.log(),
            vec![
                "compensate add_1 output 16 cause boom",
                "compensate add_10 output 15 cause boom",
            ]
        );
    }

    #[tokio::test]
    async fn transaction_records_partial_progress_on_failure() {
        let ctx = TestContext::default();
        let saga = SagaBuilder::new()
            .add_step(AddStep {
                name: "add_10",
                value: 10,
            })
            .add_step(FailingStep)
            .add_step(AddStep {
                name: "never",
                value: 1,
            })
            .named("digest");

        let saga = saga.build();
        let (result, transaction) = saga.execute_with_transaction(&ctx, 1).await;

        let err = result.expect_err("saga should fail");
        assert_eq!(err.transaction_id(), transaction.id());
        assert_eq!(transaction.status(), TransactionStatus::Failed);
        assert_eq!(transaction.steps(), ["add_10", "failing", "never"]);
        assert_eq!(transaction.completed_steps(), ["add_10"]);
        assert_eq!(transaction.current_step(), Some("failing"));
        assert_eq!(transaction.error(), Some("boom"));
        assert_eq!(*transaction.input(), 1);
        assert!(transaction.output().is_none());
        assert!(transaction.duration().is_some());

        let records = transaction.audit_log().records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].status, StepStatus::Compensated);
        assert_eq!(records[1].status, StepStatus::Failed);
    }

    #[tokio::test]
    async fn successful_transaction_keeps_output() -> anyhow::Result<()> {
        let ctx = TestContext::default();
        let saga = SagaBuilder::new()
            .add_step(AddStep {
                name: "add_2",
                value: 2,
            })
            .build();

        let (result, transaction) = saga.execute_with_transaction(&ctx, 40).await;

        assert_eq!(result?, 42);
        assert_eq!(transaction.output(), Some(&42));
        assert_eq!(transaction.completed_steps(), ["add_2"]);
        assert!(transaction.current_step().is_none());
        assert!(transaction.error().is_none());
        Ok(())
    }

    #[tokio::test]
    async fn repeated_runs_produce_independent_transactions() {
        let ctx = TestContext::default();
        let saga = SagaBuilder::new()
            .add_step(AddStep {
                name: "add_1",
                value: 1,
            })
            .build();

        let (first, second) = tokio::join!(
            saga.execute_with_transaction(&ctx, 1),
            saga.execute_with_transaction(&ctx, 2)
        );

        assert_ne!(first.1.id(), second.1.id());
        assert_eq!(first.1.output(), Some(&2));
        assert_eq!(second.1.output(), Some(&3));
    }
}
