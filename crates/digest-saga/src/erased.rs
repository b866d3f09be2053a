use std::any::Any;
use std::fmt::Display;

use async_trait::async_trait;
use futures::future::join_all;
use tracing::{debug, warn};

use crate::cloneable::{CloneableAny, downcast};
use crate::error::CompensationFailure;
use crate::runner::{self, UndoStack};
use crate::saga::Saga;
use crate::step::{BoxedStep, SagaStep};
use crate::transaction::TransactionState;

/// What a completed stage leaves behind for a later rollback.
pub(crate) type Undo = Box<dyn Any + Send + Sync>;

pub(crate) struct StageOutput {
    pub(crate) value: Box<dyn CloneableAny>,
    pub(crate) undo: Undo,
}

/// A saga stage with its value types erased.
///
/// Stages own their audit records: they mark their steps in the
/// transaction's audit log, while the runner owns the stage-level fields.
#[async_trait]
pub(crate) trait ErasedStage<Ctx, Err>: Send + Sync {
    fn name(&self) -> &str;

    async fn execute_erased(
        &self,
        ctx: &Ctx,
        input: Box<dyn CloneableAny>,
        tx: &mut TransactionState,
    ) -> Result<StageOutput, Err>;

    async fn compensate_erased(
        &self,
        ctx: &Ctx,
        undo: Undo,
        cause: &Err,
        tx: &mut TransactionState,
    );
}

pub(crate) struct StepWrapper<S> {
    step: S,
}

impl<S> StepWrapper<S> {
    pub(crate) fn new(step: S) -> Self {
        Self { step }
    }
}

#[async_trait]
impl<S> ErasedStage<S::Context, S::Error> for StepWrapper<S>
where
    S: SagaStep,
{
    fn name(&self) -> &str {
        self.step.name()
    }

    async fn execute_erased(
        &self,
        ctx: &S::Context,
        input: Box<dyn CloneableAny>,
        tx: &mut TransactionState,
    ) -> Result<StageOutput, S::Error> {
        let record = tx.audit.record_start(self.step.name());
        match self.step.execute(ctx, downcast::<S::Input>(input)).await {
            Ok(output) => {
                tx.audit
                    .record_success(record, self.step.compensation_description());
                Ok(StageOutput {
                    value: Box::new(output.clone()),
                    undo: Box::new((record, output)),
                })
            }
            Err(error) => {
                tx.audit.record_failure(record);
                Err(error)
            }
        }
    }

    async fn compensate_erased(
        &self,
        ctx: &S::Context,
        undo: Undo,
        cause: &S::Error,
        tx: &mut TransactionState,
    ) {
        let (record, output) = *undo
            .downcast::<(usize, S::Output)>()
            .expect("step undo record is its audit index and own output");
        let result = self.step.compensate(ctx, output, cause).await;
        record_compensation(
            tx,
            record,
            self.step.name(),
            self.step.compensation_description(),
            result,
        );
    }
}

fn record_compensation<E: Display>(
    tx: &mut TransactionState,
    record: usize,
    step: &str,
    description: String,
    result: Result<(), E>,
) {
    match result {
        Ok(()) => {
            debug!(transaction = %tx.id, step, "compensated step");
            tx.audit.record_compensated(record);
        }
        Err(error) => {
            warn!(
                transaction = %tx.id,
                step,
                error = %error,
                "compensation failed; continuing rollback"
            );
            tx.record_compensation_failure(
                record,
                CompensationFailure {
                    step: step.to_string(),
                    description,
                    message: error.to_string(),
                },
            );
        }
    }
}

type Combiner<O, C> = Box<dyn Fn(Vec<O>) -> C + Send + Sync>;

/// A sibling that succeeded: its position in the group, its audit record
/// and its output.
type CompletedSibling<O> = (usize, usize, O);

/// Sibling steps that run concurrently against the same input.
///
/// The group is atomic: either every sibling succeeds and the combiner
/// produces the next value, or the siblings that did succeed are
/// compensated and the group fails as a single stage.
pub(crate) struct ParallelGroup<I, O, C, Ctx, Err> {
    name: String,
    steps: Vec<BoxedStep<I, O, Ctx, Err>>,
    combiner: Combiner<O, C>,
}

impl<I, O, C, Ctx, Err> ParallelGroup<I, O, C, Ctx, Err> {
    pub(crate) fn new(
        name: String,
        steps: Vec<BoxedStep<I, O, Ctx, Err>>,
        combiner: Combiner<O, C>,
    ) -> Self {
        Self {
            name,
            steps,
            combiner,
        }
    }
}

impl<I, O, C, Ctx, Err> ParallelGroup<I, O, C, Ctx, Err>
where
    I: Clone + Send + Sync + 'static,
    O: Clone + Send + Sync + 'static,
    Ctx: Sync,
    Err: Display + Send + Sync,
{
    async fn compensate_siblings(
        &self,
        ctx: &Ctx,
        completed: Vec<CompletedSibling<O>>,
        cause: &Err,
        tx: &mut TransactionState,
    ) {
        let results = join_all(
            completed
                .into_iter()
                .map(|(index, record, output)| async move {
                    let step = &self.steps[index];
                    (index, record, step.compensate(ctx, output, cause).await)
                }),
        )
        .await;

        for (index, record, result) in results {
            let step = &self.steps[index];
            record_compensation(
                tx,
                record,
                step.name(),
                step.compensation_description(),
                result,
            );
        }
    }
}

#[async_trait]
impl<I, O, C, Ctx, Err> ErasedStage<Ctx, Err> for ParallelGroup<I, O, C, Ctx, Err>
where
    I: Clone + Send + Sync + 'static,
    O: Clone + Send + Sync + 'static,
    C: Clone + Send + Sync + 'static,
    Ctx: Sync,
    Err: Display + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute_erased(
        &self,
        ctx: &Ctx,
        input: Box<dyn CloneableAny>,
        tx: &mut TransactionState,
    ) -> Result<StageOutput, Err> {
        let input = downcast::<I>(input);
        let records: Vec<usize> = self
            .steps
            .iter()
            .map(|step| tx.audit.record_start(step.name()))
            .collect();

        debug!(
            transaction = %tx.id,
            group = %self.name,
            siblings = self.steps.len(),
            "running parallel group"
        );
        let results = join_all(
            self.steps
                .iter()
                .map(|step| step.execute(ctx, input.clone())),
        )
        .await;

        let mut completed = Vec::new();
        let mut first_error = None;
        for (index, result) in results.into_iter().enumerate() {
            match result {
                Ok(output) => {
                    tx.audit.record_success(
                        records[index],
                        self.steps[index].compensation_description(),
                    );
                    completed.push((index, records[index], output));
                }
                Err(error) => {
                    tx.audit.record_failure(records[index]);
                    if first_error.is_none() {
                        first_error = Some(error);
                    } else {
                        warn!(
                            transaction = %tx.id,
                            group = %self.name,
                            step = self.steps[index].name(),
                            error = %error,
                            "additional sibling failure"
                        );
                    }
                }
            }
        }

        if let Some(error) = first_error {
            debug!(
                transaction = %tx.id,
                group = %self.name,
                completed = completed.len(),
                "parallel group failed; compensating completed siblings"
            );
            self.compensate_siblings(ctx, completed, &error, tx).await;
            return Err(error);
        }

        let outputs: Vec<O> = completed
            .iter()
            .map(|(_, _, output)| output.clone())
            .collect();
        let combined = (self.combiner)(outputs);
        Ok(StageOutput {
            value: Box::new(combined),
            undo: Box::new(completed),
        })
    }

    async fn compensate_erased(
        &self,
        ctx: &Ctx,
        undo: Undo,
        cause: &Err,
        tx: &mut TransactionState,
    ) {
        let completed = *undo
            .downcast::<Vec<CompletedSibling<O>>>()
            .expect("group undo record holds sibling outputs");
        self.compensate_siblings(ctx, completed, cause, tx).await;
    }
}

/// A fully built saga used as one link of a chain.
pub(crate) struct SubSaga<I, O, Ctx, Err> {
    saga: Saga<I, O, Ctx, Err>,
}

impl<I, O, Ctx, Err> SubSaga<I, O, Ctx, Err> {
    pub(crate) fn new(saga: Saga<I, O, Ctx, Err>) -> Self {
        Self { saga }
    }
}

#[async_trait]
impl<I, O, Ctx, Err> ErasedStage<Ctx, Err> for SubSaga<I, O, Ctx, Err>
where
    I: Send + Sync + 'static,
    O: Send + Sync + 'static,
    Ctx: Sync,
    Err: Display + Send + Sync + 'static,
{
    fn name(&self) -> &str {
        self.saga.name()
    }

    async fn execute_erased(
        &self,
        ctx: &Ctx,
        input: Box<dyn CloneableAny>,
        tx: &mut TransactionState,
    ) -> Result<StageOutput, Err> {
        let mut inner = tx.link(self.saga.stage_names());
        inner.start();
        debug!(
            transaction = %tx.id,
            link = self.saga.name(),
            link_transaction = %inner.id,
            "running chained saga"
        );

        let result = runner::run_stages(self.saga.stages(), ctx, input, &mut inner).await;
        match result {
            Ok(completed) => {
                inner.finish_completed();
                tx.absorb(inner);
                Ok(StageOutput {
                    value: completed.value,
                    undo: Box::new(completed.undo),
                })
            }
            Err(failure) => {
                inner.finish_failed();
                tx.absorb(inner);
                Err(failure.error)
            }
        }
    }

    async fn compensate_erased(
        &self,
        ctx: &Ctx,
        undo: Undo,
        cause: &Err,
        tx: &mut TransactionState,
    ) {
        let stack = *undo
            .downcast::<UndoStack>()
            .expect("link undo record is its completed stage stack");
        debug!(
            transaction = %tx.id,
            link = self.saga.name(),
            stages = stack.len(),
            "rolling back chained saga"
        );
        runner::compensate_stages(self.saga.stages(), ctx, stack, cause, tx).await;
    }
}
