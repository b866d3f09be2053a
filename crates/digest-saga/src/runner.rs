use std::fmt::Display;

use tracing::{debug, info};

use crate::cloneable::CloneableAny;
use crate::erased::{ErasedStage, Undo};
use crate::transaction::TransactionState;

pub(crate) type Stages<Ctx, Err> = [Box<dyn ErasedStage<Ctx, Err>>];

/// Completed stages in completion order, with what each needs to undo itself.
pub(crate) type UndoStack = Vec<(usize, Undo)>;

pub(crate) struct Completed {
    pub(crate) value: Box<dyn CloneableAny>,
    pub(crate) undo: UndoStack,
}

pub(crate) struct StageFailure<Err> {
    pub(crate) step: String,
    pub(crate) error: Err,
}

/// Run every stage in order, threading each output into the next stage.
///
/// On the first failure the already completed stages are compensated in
/// reverse order before the failure is returned.
pub(crate) async fn run_stages<Ctx, Err>(
    stages: &Stages<Ctx, Err>,
    ctx: &Ctx,
    input: Box<dyn CloneableAny>,
    tx: &mut TransactionState,
) -> Result<Completed, StageFailure<Err>>
where
    Ctx: Sync,
    Err: Display + Send + Sync,
{
    let mut undo: UndoStack = Vec::with_capacity(stages.len());
    let mut value = input;

    for (index, stage) in stages.iter().enumerate() {
        let name = stage.name();
        tx.begin_stage(name);
        debug!(transaction = %tx.id, step = name, "executing step");

        match stage.execute_erased(ctx, value, tx).await {
            Ok(output) => {
                tx.complete_stage(name);
                undo.push((index, output.undo));
                value = output.value;
            }
            Err(error) => {
                info!(
                    transaction = %tx.id,
                    step = name,
                    error = %error,
                    completed = undo.len(),
                    "step failed; compensating completed steps"
                );
                tx.begin_compensation(&error);
                compensate_stages(stages, ctx, undo, &error, tx).await;
                return Err(StageFailure {
                    step: name.to_string(),
                    error,
                });
            }
        }
    }

    Ok(Completed { value, undo })
}

/// Compensate completed stages, most recent first.
///
/// A failing compensation is recorded and the rollback continues.
pub(crate) async fn compensate_stages<Ctx, Err>(
    stages: &Stages<Ctx, Err>,
    ctx: &Ctx,
    mut undo: UndoStack,
    cause: &Err,
    tx: &mut TransactionState,
) where
    Ctx: Sync,
    Err: Display + Send + Sync,
{
    while let Some((index, record)) = undo.pop() {
        stages[index].compensate_erased(ctx, record, cause, tx).await;
    }
}
