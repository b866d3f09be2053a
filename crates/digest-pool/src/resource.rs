use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use tokio::time::Instant;

use crate::factory::ResourceFactory;
use crate::pool::Shared;

/// A live resource plus the bookkeeping the pool keeps about it.
#[derive(Debug)]
pub(crate) struct PooledResource<T> {
    pub(crate) resource: T,
    pub(crate) created_at: Instant,
    pub(crate) last_used: Instant,
    pub(crate) use_count: u64,
    pub(crate) valid: bool,
}

impl<T> PooledResource<T> {
    pub(crate) fn new(resource: T) -> Self {
        let now = Instant::now();
        Self {
            resource,
            created_at: now,
            last_used: now,
            use_count: 0,
            valid: true,
        }
    }

    pub(crate) fn idle_since(&self) -> Instant {
        self.last_used
    }
}

/// Exclusive access to one pooled resource.
///
/// Dereferences to the resource itself. Hand it back with
/// [`ResourcePool::release`](crate::ResourcePool::release) or retire it with
/// [`ResourcePool::destroy`](crate::ResourcePool::destroy). A lease that is
/// simply dropped is released in the background.
pub struct Lease<F: ResourceFactory> {
    pooled: Option<PooledResource<F::Resource>>,
    shared: Arc<Shared<F>>,
}

impl<F: ResourceFactory> Lease<F> {
    pub(crate) fn new(mut pooled: PooledResource<F::Resource>, shared: Arc<Shared<F>>) -> Self {
        pooled.use_count += 1;
        pooled.last_used = Instant::now();
        Self {
            pooled: Some(pooled),
            shared,
        }
    }

    pub(crate) fn take(mut self) -> PooledResource<F::Resource> {
        self.pooled
            .take()
            .expect("lease holds its resource until consumed")
    }

    fn pooled(&self) -> &PooledResource<F::Resource> {
        self.pooled
            .as_ref()
            .expect("lease holds its resource until consumed")
    }

    /// How many times this resource has been handed out, this lease included.
    #[must_use]
    pub fn use_count(&self) -> u64 {
        self.pooled().use_count
    }

    /// When the underlying resource was created.
    #[must_use]
    pub fn created_at(&self) -> Instant {
        self.pooled().created_at
    }
}

impl<F: ResourceFactory> Deref for Lease<F> {
    type Target = F::Resource;

    fn deref(&self) -> &Self::Target {
        &self.pooled().resource
    }
}

impl<F: ResourceFactory> DerefMut for Lease<F> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self
            .pooled
            .as_mut()
            .expect("lease holds its resource until consumed")
            .resource
    }
}

impl<F: ResourceFactory> Drop for Lease<F> {
    fn drop(&mut self) {
        if let Some(pooled) = self.pooled.take() {
            Shared::reclaim(&self.shared, pooled);
        }
    }
}

impl<F: ResourceFactory> std::fmt::Debug for Lease<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let pooled = self.pooled.as_ref();
        f.debug_struct("Lease")
            .field("use_count", &pooled.map(|p| p.use_count))
            .field("created_at", &pooled.map(|p| p.created_at))
            .finish_non_exhaustive()
    }
}
