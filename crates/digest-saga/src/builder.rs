use std::fmt::Display;
use std::marker::PhantomData;

use crate::erased::{ErasedStage, ParallelGroup, StepWrapper};
use crate::saga::{DEFAULT_SAGA_NAME, Saga};
use crate::step::{BoxedStep, SagaStep};

/// Type-state builder for constructing type-safe sagas.
///
/// `Input` is fixed by the first stage (or stays the entry type for an empty
/// saga) and `Output` tracks the value produced by the last stage added. The
/// builder enforces at compile time that each stage's input type matches the
/// previous stage's output type.
///
/// ```compile_fail
/// use async_trait::async_trait;
/// use digest_saga::{SagaBuilder, SagaStep};
///
/// struct StepA;
/// #[async_trait]
/// impl SagaStep for StepA {
///     type Input = i32;
///     type Output = String;  // Outputs String
///     type Context = ();
///     type Error = String;
///     fn name(&self) -> &str { "a" }
///     async fn execute(&self, _: &(), input: i32) -> Result<String, String> {
///         Ok(input.to_string())
///     }
/// }
///
/// struct StepB;
/// #[async_trait]
/// impl SagaStep for StepB {
///     type Input = i32;  // Expects i32, not String!
///     type Output = i32;
///     type Context = ();
///     type Error = String;
///     fn name(&self) -> &str { "b" }
///     async fn execute(&self, _: &(), input: i32) -> Result<i32, String> {
///         Ok(input * 2)
///     }
/// }
///
/// // This should fail: StepB expects i32 but StepA outputs String
/// let saga = SagaBuilder::new()
///     .add_step(StepA)
///     .add_step(StepB)  // Compile error here!
///     .build();
/// ```
pub struct SagaBuilder<Input, Output, Ctx, Err> {
    name: String,
    stages: Vec<Box<dyn ErasedStage<Ctx, Err>>>,
    _phantom: PhantomData<(Input, Output)>,
}

impl<Input, Ctx, Err> SagaBuilder<Input, Input, Ctx, Err> {
    /// Create a new saga builder with no stages.
    #[must_use]
    pub fn new() -> Self {
        Self {
            name: DEFAULT_SAGA_NAME.to_string(),
            stages: Vec::new(),
            _phantom: PhantomData,
        }
    }
}

impl<Input, Ctx, Err> Default for SagaBuilder<Input, Input, Ctx, Err> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Input, Current, Ctx, Err> SagaBuilder<Input, Current, Ctx, Err>
where
    Current: Clone + Send + Sync + 'static,
    Ctx: Sync + 'static,
    Err: Display + Send + Sync + 'static,
{
    /// Name the saga being built.
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Append a step. Its input type must match the current output type.
    #[must_use]
    pub fn add_step<S>(self, step: S) -> SagaBuilder<Input, S::Output, Ctx, Err>
    where
        S: SagaStep<Input = Current, Context = Ctx, Error = Err> + 'static,
    {
        self.push(Box::new(StepWrapper::new(step)))
    }

    /// Append a group of steps that run concurrently on the current value.
    ///
    /// Once every sibling succeeds, `combiner` receives their outputs in
    /// declaration order and produces the value for the next stage. If any
    /// sibling fails, the group fails as one stage.
    #[must_use]
    pub fn add_parallel_steps<O, C, F>(
        self,
        name: impl Into<String>,
        steps: Vec<BoxedStep<Current, O, Ctx, Err>>,
        combiner: F,
    ) -> SagaBuilder<Input, C, Ctx, Err>
    where
        O: Clone + Send + Sync + 'static,
        C: Clone + Send + Sync + 'static,
        F: Fn(Vec<O>) -> C + Send + Sync + 'static,
    {
        self.push(Box::new(ParallelGroup::new(
            name.into(),
            steps,
            Box::new(combiner),
        )))
    }

    fn push<Next>(
        self,
        stage: Box<dyn ErasedStage<Ctx, Err>>,
    ) -> SagaBuilder<Input, Next, Ctx, Err> {
        let mut stages = self.stages;
        stages.push(stage);
        SagaBuilder {
            name: self.name,
            stages,
            _phantom: PhantomData,
        }
    }

    /// Build the saga from the accumulated stages.
    #[must_use]
    pub fn build(self) -> Saga<Input, Current, Ctx, Err> {
        Saga::from_stages(self.name, self.stages)
    }
}
