use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

pub type RefreshError = Box<dyn std::error::Error + Send + Sync>;

/// Renews credentials after an authentication failure.
#[async_trait]
pub trait CredentialRefresh: Send + Sync {
    /// # Errors
    ///
    /// Returns an error if fresh credentials could not be obtained; the
    /// retry loop then stops with an authentication failure.
    async fn refresh(&self) -> Result<(), RefreshError>;
}

/// Per-call metadata for [`RecoveryHandler::execute_with_recovery`](crate::RecoveryHandler::execute_with_recovery).
#[derive(Clone)]
pub struct RecoveryContext {
    operation_name: String,
    credential_refresh: Option<Arc<dyn CredentialRefresh>>,
    cancellation: Option<CancellationToken>,
}

impl RecoveryContext {
    #[must_use]
    pub fn new(operation_name: impl Into<String>) -> Self {
        Self {
            operation_name: operation_name.into(),
            credential_refresh: None,
            cancellation: None,
        }
    }

    #[must_use]
    pub fn with_credential_refresh(mut self, refresh: Arc<dyn CredentialRefresh>) -> Self {
        self.credential_refresh = Some(refresh);
        self
    }

    /// Backoff waits end early, with a cancellation error, once `token` fires.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    #[must_use]
    pub fn operation_name(&self) -> &str {
        &self.operation_name
    }

    #[must_use]
    pub fn credential_refresh(&self) -> Option<&Arc<dyn CredentialRefresh>> {
        self.credential_refresh.as_ref()
    }

    #[must_use]
    pub fn cancellation(&self) -> Option<&CancellationToken> {
        self.cancellation.as_ref()
    }
}

impl std::fmt::Debug for RecoveryContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecoveryContext")
            .field("operation_name", &self.operation_name)
            .field("credential_refresh", &self.credential_refresh.is_some())
            .field("cancellation", &self.cancellation)
            .finish()
    }
}
