use std::fmt::Display;

use async_trait::async_trait;

/// A step in a saga that can be executed and compensated.
///
/// Each step transforms an input into an output, with the ability to undo
/// its effects if a later step fails. The output is kept for compensation.
///
/// # Type Parameters
///
/// - `Input`: Data received from the previous step (or saga entry point)
/// - `Output`: Data produced for the next step
/// - `Context`: Shared dependencies (injected, not passed between steps)
/// - `Error`: The error type for step failures
#[async_trait]
pub trait SagaStep: Send + Sync {
    /// Data received from the previous step or saga entry point.
    type Input: Clone + Send + Sync + 'static;

    /// Data produced for the next step.
    type Output: Clone + Send + Sync + 'static;

    /// Shared context providing dependencies such as client pools.
    type Context: Sync;

    /// Error type for step failures.
    type Error: Display + Send + Sync;

    /// Human-readable name for logging and error messages.
    fn name(&self) -> &str;

    /// Execute the step, transforming input into output.
    ///
    /// # Errors
    ///
    /// Returns an error if the step fails to complete.
    async fn execute(
        &self,
        ctx: &Self::Context,
        input: Self::Input,
    ) -> Result<Self::Output, Self::Error>;

    /// Compensate (undo) the step's effects.
    ///
    /// Called during rollback when a later stage fails. Receives the output
    /// this step produced and the error that triggered the rollback.
    ///
    /// The default implementation is a no-op, suitable for read-only steps.
    ///
    /// # Errors
    ///
    /// Returns an error if compensation fails. The engine records it and
    /// keeps compensating the remaining steps.
    async fn compensate(
        &self,
        ctx: &Self::Context,
        output: Self::Output,
        cause: &Self::Error,
    ) -> Result<(), Self::Error> {
        let _ = (ctx, output, cause);
        Ok(())
    }

    /// Human-readable description of what compensation will do.
    fn compensation_description(&self) -> String {
        format!("undo {}", self.name())
    }
}

/// A boxed step, used for the siblings of a parallel group.
pub type BoxedStep<I, O, Ctx, Err> =
    Box<dyn SagaStep<Input = I, Output = O, Context = Ctx, Error = Err>>;
