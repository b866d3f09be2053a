use std::time::Duration;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, PoolError>;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PoolError {
    #[error("timed out after {0:?} waiting for a pooled resource")]
    AcquireTimeout(Duration),

    #[error("pool is draining")]
    Draining,

    #[error("invalid pool configuration: {0}")]
    InvalidConfig(String),
}
