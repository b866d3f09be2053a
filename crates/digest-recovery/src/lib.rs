//! Retry handler that classifies each failure before deciding what to do.
//!
//! [`RecoveryHandler::execute_with_recovery`] runs an operation, maps every
//! failure to an [`ErrorCode`], and either backs off and retries, refreshes
//! credentials first, or gives up with a [`RecoveryError`]. The handler
//! never panics on an operation failure and never retries past a
//! non-recoverable classification.

mod classify;
mod config;
mod context;
mod error;
mod handler;

pub use classify::{ErrorClassification, ErrorCode, classify, classify_message};
pub use config::RecoveryConfig;
pub use context::{CredentialRefresh, RecoveryContext, RefreshError};
pub use error::{RecoveryError, Result};
pub use handler::{Recovered, RecoveryHandler};
