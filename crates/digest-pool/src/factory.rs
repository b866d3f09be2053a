use async_trait::async_trait;

/// Creates, checks and disposes of the resources a pool manages.
///
/// Supplied by the caller per pool instance. `destroy` and `validate` have
/// permissive defaults for resources that need no teardown or health check.
#[async_trait]
pub trait ResourceFactory: Send + Sync + 'static {
    type Resource: Send + Sync + 'static;
    type Error: std::error::Error + Send + Sync + 'static;

    /// Build a new resource.
    ///
    /// # Errors
    ///
    /// Returns an error if the resource cannot be created. The pool retries
    /// according to its configuration.
    async fn create(&self) -> Result<Self::Resource, Self::Error>;

    /// Dispose of a resource that is leaving the pool.
    async fn destroy(&self, resource: Self::Resource) {
        drop(resource);
    }

    /// Report whether a resource is still usable.
    async fn validate(&self, resource: &Self::Resource) -> bool {
        let _ = resource;
        true
    }
}
