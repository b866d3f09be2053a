use std::fmt::Debug;

use thiserror::Error;
use uuid::Uuid;

/// A compensation that returned an error while a saga was rolling back.
///
/// Compensation failures never stop the rollback; they are collected on the
/// transaction so callers can see which undo actions need manual attention.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("compensation failed for step '{step}' ({description}): {message}")]
pub struct CompensationFailure {
    /// Name of the step whose compensation failed.
    pub step: String,
    /// Description of what the compensation was trying to do.
    pub description: String,
    /// Rendered error returned by the compensation.
    pub message: String,
}

/// Error from saga execution.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SagaError<E: Debug> {
    /// A stage failed. Every previously completed stage has been compensated.
    #[error("step '{step}' failed in transaction {transaction}")]
    StepFailed {
        /// Name of the stage that failed.
        step: String,
        /// Transaction that was rolled back.
        transaction: Uuid,
        /// The error that caused the stage to fail.
        #[source]
        source: E,
    },
}

impl<E: Debug> SagaError<E> {
    /// Name of the stage that triggered the rollback.
    #[must_use]
    pub fn step(&self) -> &str {
        match self {
            Self::StepFailed { step, .. } => step,
        }
    }

    /// Id of the transaction that failed.
    #[must_use]
    pub fn transaction_id(&self) -> Uuid {
        match self {
            Self::StepFailed { transaction, .. } => *transaction,
        }
    }

    /// The original triggering error.
    #[must_use]
    pub fn source_error(&self) -> &E {
        match self {
            Self::StepFailed { source, .. } => source,
        }
    }

    /// Consume the saga error and return the original triggering error.
    #[must_use]
    pub fn into_source(self) -> E {
        match self {
            Self::StepFailed { source, .. } => source,
        }
    }
}
