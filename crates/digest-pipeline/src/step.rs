use std::marker::PhantomData;

use async_trait::async_trait;
use digest_pool::ResourceFactory;
use digest_saga::SagaStep;
use tracing::debug;

use crate::context::PipelineContext;
use crate::error::PipelineError;
use crate::handler::StageHandler;

/// Runs a [`StageHandler`] as a saga step.
///
/// Every attempt borrows its own client from the context's pool and returns
/// it before the recovery handler decides whether to retry. Compensation
/// borrows a client for the handler's `undo`.
pub struct PooledStep<H, F> {
    handler: H,
    _factory: PhantomData<fn() -> F>,
}

impl<H, F> PooledStep<H, F>
where
    H: StageHandler<Client = F::Resource>,
    F: ResourceFactory,
{
    #[must_use]
    pub fn new(handler: H) -> Self {
        Self {
            handler,
            _factory: PhantomData,
        }
    }

    #[must_use]
    pub fn handler(&self) -> &H {
        &self.handler
    }

    async fn attempt(
        &self,
        ctx: &PipelineContext<F>,
        input: &H::Input,
    ) -> Result<H::Output, PipelineError> {
        let client = ctx.pool().acquire().await?;
        let result = self.handler.run(&client, input).await;
        ctx.pool().release(client).await;
        result.map_err(|source| PipelineError::Stage {
            stage: self.handler.stage(),
            source,
        })
    }
}

#[async_trait]
impl<H, F> SagaStep for PooledStep<H, F>
where
    H: StageHandler<Client = F::Resource>,
    F: ResourceFactory,
{
    type Input = H::Input;
    type Output = H::Output;
    type Context = PipelineContext<F>;
    type Error = PipelineError;

    fn name(&self) -> &str {
        self.handler.stage().as_str()
    }

    async fn execute(
        &self,
        ctx: &PipelineContext<F>,
        input: H::Input,
    ) -> Result<H::Output, PipelineError> {
        let input = &input;
        let recovery_ctx = ctx.recovery_context(self.name());
        let recovered = ctx
            .recovery()
            .execute_with_recovery(|| self.attempt(ctx, input), &recovery_ctx)
            .await?;
        debug!(
            stage = %self.handler.stage(),
            attempts = recovered.attempts,
            "stage completed"
        );
        Ok(recovered.value)
    }

    async fn compensate(
        &self,
        ctx: &PipelineContext<F>,
        output: H::Output,
        cause: &PipelineError,
    ) -> Result<(), PipelineError> {
        debug!(stage = %self.handler.stage(), cause = %cause, "undoing stage");
        let client = ctx.pool().acquire().await?;
        let result = self.handler.undo(&client, &output).await;
        ctx.pool().release(client).await;
        result.map_err(|source| PipelineError::Undo {
            stage: self.handler.stage(),
            source,
        })
    }

    fn compensation_description(&self) -> String {
        format!("undo {} stage", self.handler.stage())
    }
}
