use std::fmt::{Debug, Display};
use std::marker::PhantomData;

use crate::erased::{ErasedStage, SubSaga};
use crate::error::SagaError;
use crate::saga::{DEFAULT_SAGA_NAME, Saga, execute_typed};
use crate::transaction::SagaTransaction;

/// Fully built sagas linked end to end.
///
/// Each link's output feeds the next link. When a link fails it first rolls
/// back its own completed steps, then every earlier link replays its full
/// compensation path, most recent link first. The chain's transaction lists
/// link names as its steps; the audit log contains every inner step.
pub struct SagaChain<Input, Output, Ctx, Err> {
    name: String,
    links: Vec<Box<dyn ErasedStage<Ctx, Err>>>,
    _phantom: PhantomData<(Input, Output)>,
}

impl<Input, Output, Ctx, Err> SagaChain<Input, Output, Ctx, Err>
where
    Input: Send + Sync + 'static,
    Output: Clone + Send + Sync + 'static,
    Ctx: Sync + 'static,
    Err: Display + Send + Sync + 'static,
{
    /// Start a chain with its first saga.
    #[must_use]
    pub fn new(first: Saga<Input, Output, Ctx, Err>) -> Self {
        Self {
            name: DEFAULT_SAGA_NAME.to_string(),
            links: vec![Box::new(SubSaga::new(first))],
            _phantom: PhantomData,
        }
    }

    /// Append a saga whose input is this chain's current output.
    #[must_use]
    pub fn chain<Next>(
        mut self,
        saga: Saga<Output, Next, Ctx, Err>,
    ) -> SagaChain<Input, Next, Ctx, Err>
    where
        Next: Send + Sync + 'static,
    {
        self.links.push(Box::new(SubSaga::new(saga)));
        SagaChain {
            name: self.name,
            links: self.links,
            _phantom: PhantomData,
        }
    }

    /// Name the chain in its log lines.
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// The chain's name, `"saga"` unless set with [`Self::named`].
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Link names in chain order.
    #[must_use]
    pub fn link_names(&self) -> Vec<String> {
        self.links.iter().map(|l| l.name().to_string()).collect()
    }
}

impl<Input, Output, Ctx, Err> SagaChain<Input, Output, Ctx, Err>
where
    Input: Clone + Send + Sync + 'static,
    Output: Clone + Send + Sync + 'static,
    Ctx: Sync,
    Err: Debug + Display + Send + Sync,
{
    /// Run every link in order.
    ///
    /// # Errors
    ///
    /// Returns `SagaError::StepFailed` naming the failing link once it and
    /// every earlier link have been compensated.
    pub async fn execute(&self, ctx: &Ctx, input: Input) -> Result<Output, SagaError<Err>> {
        let (result, _transaction) = self.execute_with_transaction(ctx, input).await;
        result
    }

    /// Run every link and return the chain-level transaction record.
    pub async fn execute_with_transaction(
        &self,
        ctx: &Ctx,
        input: Input,
    ) -> (
        Result<Output, SagaError<Err>>,
        SagaTransaction<Input, Output>,
    ) {
        execute_typed(&self.name, &self.links, ctx, input).await
    }
}
