use digest_pool::PoolError;
use digest_recovery::RecoveryError;
use thiserror::Error;

use crate::stage::Stage;

/// Error returned by a [`StageHandler`](crate::StageHandler).
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PipelineError {
    // The handler's message is part of the display text so the recovery
    // classifier can see it.
    #[error("{stage} stage failed: {source}")]
    Stage {
        stage: Stage,
        #[source]
        source: HandlerError,
    },

    #[error("undoing {stage} stage failed: {source}")]
    Undo {
        stage: Stage,
        #[source]
        source: HandlerError,
    },

    #[error(transparent)]
    Pool(#[from] PoolError),

    #[error(transparent)]
    Recovery(#[from] RecoveryError),
}
