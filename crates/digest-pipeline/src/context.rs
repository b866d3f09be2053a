use std::sync::Arc;

use digest_pool::{ResourceFactory, ResourcePool};
use digest_recovery::{CredentialRefresh, RecoveryContext, RecoveryHandler};
use tokio_util::sync::CancellationToken;

use crate::config::{ConfigError, DigestConfig};

/// Shared dependencies handed to every pipeline step.
///
/// Built once at startup and passed to the saga by reference.
pub struct PipelineContext<F: ResourceFactory> {
    pool: ResourcePool<F>,
    recovery: RecoveryHandler,
    credential_refresh: Option<Arc<dyn CredentialRefresh>>,
    cancellation: Option<CancellationToken>,
}

impl<F: ResourceFactory> PipelineContext<F> {
    #[must_use]
    pub fn new(pool: ResourcePool<F>, recovery: RecoveryHandler) -> Self {
        Self {
            pool,
            recovery,
            credential_refresh: None,
            cancellation: None,
        }
    }

    /// Build the pool and recovery handler described by `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if either section is invalid.
    pub async fn from_config(factory: F, config: &DigestConfig) -> Result<Self, ConfigError> {
        let recovery = RecoveryHandler::new(config.recovery().clone())?;
        let pool = ResourcePool::new(factory, config.pool().clone()).await?;
        Ok(Self::new(pool, recovery))
    }

    #[must_use]
    pub fn with_credential_refresh(mut self, refresh: Arc<dyn CredentialRefresh>) -> Self {
        self.credential_refresh = Some(refresh);
        self
    }

    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    #[must_use]
    pub fn pool(&self) -> &ResourcePool<F> {
        &self.pool
    }

    #[must_use]
    pub fn recovery(&self) -> &RecoveryHandler {
        &self.recovery
    }

    /// Recovery metadata for one named operation, carrying this context's
    /// credential refresh hook and cancellation token.
    #[must_use]
    pub fn recovery_context(&self, operation: &str) -> RecoveryContext {
        let mut ctx = RecoveryContext::new(operation);
        if let Some(refresh) = &self.credential_refresh {
            ctx = ctx.with_credential_refresh(Arc::clone(refresh));
        }
        if let Some(token) = &self.cancellation {
            ctx = ctx.with_cancellation(token.clone());
        }
        ctx
    }
}
