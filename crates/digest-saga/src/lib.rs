//! Saga engine for multi-step, compensable workflows.
//!
//! A saga threads a value through an ordered list of stages. A stage is
//! either a single [`SagaStep`], a parallel group of sibling steps whose
//! outputs are combined, or (inside a [`SagaChain`]) a whole sub-saga. When
//! a stage fails, every stage that already completed is compensated in
//! reverse order and the original error is returned.
//!
//! Every run produces a [`SagaTransaction`] describing what happened, which
//! stays readable after failure for diagnostics.

mod audit;
mod builder;
mod chain;
mod cloneable;
mod erased;
mod error;
mod runner;
mod saga;
mod step;
mod transaction;

pub use audit::{SagaAuditLog, StepRecord, StepStatus};
pub use builder::SagaBuilder;
pub use chain::SagaChain;
pub use error::{CompensationFailure, SagaError};
pub use saga::Saga;
pub use step::{BoxedStep, SagaStep};
pub use transaction::{SagaTransaction, TransactionStatus};
