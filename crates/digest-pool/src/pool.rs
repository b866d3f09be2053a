use std::collections::VecDeque;
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{Notify, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::config::PoolConfig;
use crate::error::{PoolError, Result};
use crate::factory::ResourceFactory;
use crate::resource::{Lease, PooledResource};

type Handoff<T> = oneshot::Sender<Result<PooledResource<T>>>;

struct Waiter<T> {
    id: u64,
    tx: Handoff<T>,
}

struct State<T> {
    /// Idle resources, least recently used at the front.
    available: VecDeque<PooledResource<T>>,
    in_use: usize,
    /// Creations in flight; they count against `max` from the moment the
    /// slot is reserved.
    creating: usize,
    waiters: VecDeque<Waiter<T>>,
    next_waiter: u64,
    draining: bool,
}

impl<T> State<T> {
    fn total(&self) -> usize {
        self.available.len() + self.in_use + self.creating
    }

    fn prune_waiters(&mut self) {
        self.waiters.retain(|w| !w.tx.is_closed());
    }

    fn enqueue(&mut self) -> (u64, oneshot::Receiver<Result<PooledResource<T>>>) {
        let (waiter, rx) = self.new_waiter();
        let id = waiter.id;
        self.waiters.push_back(waiter);
        (id, rx)
    }

    /// Queue a caller ahead of everyone else. Used when a caller that was
    /// already first in line has to wait again.
    fn enqueue_front(&mut self) -> (u64, oneshot::Receiver<Result<PooledResource<T>>>) {
        let (waiter, rx) = self.new_waiter();
        let id = waiter.id;
        self.waiters.push_front(waiter);
        (id, rx)
    }

    fn new_waiter(&mut self) -> (Waiter<T>, oneshot::Receiver<Result<PooledResource<T>>>) {
        let (tx, rx) = oneshot::channel();
        let id = self.next_waiter;
        self.next_waiter += 1;
        (Waiter { id, tx }, rx)
    }

    /// Whether queued callers could be served by creating another resource.
    fn starved(&mut self, max_size: usize) -> bool {
        self.prune_waiters();
        !self.draining && !self.waiters.is_empty() && self.total() < max_size
    }

    /// Give an uncounted resource to the longest-waiting live caller, or park
    /// it in the available set.
    fn hand_off(&mut self, mut pooled: PooledResource<T>) {
        while let Some(waiter) = self.waiters.pop_front() {
            self.in_use += 1;
            match waiter.tx.send(Ok(pooled)) {
                Ok(()) => return,
                Err(Ok(returned)) => {
                    self.in_use -= 1;
                    pooled = returned;
                }
                Err(Err(_)) => return,
            }
        }
        self.available.push_back(pooled);
    }
}

/// Snapshot of pool occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    /// Live resources: `available + in_use`.
    pub size: usize,
    pub available: usize,
    pub in_use: usize,
    pub waiting: usize,
    pub creating: usize,
}

pub(crate) struct Shared<F: ResourceFactory> {
    factory: F,
    config: PoolConfig,
    state: Mutex<State<F::Resource>>,
    idle: Notify,
    evictor: Mutex<Option<JoinHandle<()>>>,
}

enum Acquire<T> {
    Ready(PooledResource<T>),
    Create,
    Wait {
        id: u64,
        rx: oneshot::Receiver<Result<PooledResource<T>>>,
        /// Start a background creation for the queue after this delay.
        replenish: Option<Duration>,
    },
}

/// A bounded, self-healing pool of resources built by a [`ResourceFactory`].
///
/// Cloning the pool is cheap and shares the same resources.
pub struct ResourcePool<F: ResourceFactory> {
    shared: Arc<Shared<F>>,
}

impl<F: ResourceFactory> Clone for ResourcePool<F> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<F: ResourceFactory> ResourcePool<F> {
    /// Build a pool, pre-create `min` resources and start the idle sweep.
    ///
    /// Must be called inside a tokio runtime. Pre-creation failures are
    /// logged; the pool fills up lazily instead.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::InvalidConfig`] when the sizing is inconsistent.
    pub async fn new(factory: F, config: PoolConfig) -> Result<Self> {
        config.validate()?;

        let shared = Arc::new(Shared {
            factory,
            config,
            state: Mutex::new(State {
                available: VecDeque::new(),
                in_use: 0,
                creating: 0,
                waiters: VecDeque::new(),
                next_waiter: 0,
                draining: false,
            }),
            idle: Notify::new(),
            evictor: Mutex::new(None),
        });

        for _ in 0..shared.config.min_size() {
            shared.state.lock().creating += 1;
            shared.finish_creation().await;
        }

        let period = shared.config.eviction_interval();
        if !period.is_zero() {
            let handle = tokio::spawn(run_eviction(Arc::downgrade(&shared), period));
            *shared.evictor.lock() = Some(handle);
        }

        info!(
            min = shared.config.min_size(),
            max = shared.config.max_size(),
            size = shared.stats().size,
            "resource pool ready"
        );
        Ok(Self { shared })
    }

    #[must_use]
    pub fn config(&self) -> &PoolConfig {
        &self.shared.config
    }

    /// Live resources, idle or leased.
    #[must_use]
    pub fn size(&self) -> usize {
        self.shared.stats().size
    }

    #[must_use]
    pub fn stats(&self) -> PoolStats {
        self.shared.stats()
    }

    /// Borrow a resource, waiting up to the configured acquire timeout.
    ///
    /// Idle resources are reused first, then a new one is created if the
    /// pool is below `max`; otherwise the caller joins a FIFO queue. New
    /// callers never overtake queued ones. A failed creation is logged and
    /// the caller keeps waiting at the head of the queue while the pool
    /// tries again. With `validate_on_borrow`, every resource is checked
    /// before it is handed out, including those handed to queued callers.
    ///
    /// # Errors
    ///
    /// - [`PoolError::AcquireTimeout`] if no valid resource became available
    ///   in time
    /// - [`PoolError::Draining`] if the pool is shutting down
    pub async fn acquire(&self) -> Result<Lease<F>> {
        let shared = &self.shared;
        let max_size = shared.config.max_size();
        let deadline = Instant::now() + shared.config.acquire_timeout();
        // Set when the caller must wait again at the head of the queue; holds
        // the delay before the pool tries to create on its behalf.
        let mut rejoin: Option<Duration> = None;

        loop {
            let next = {
                let mut state = shared.state.lock();
                if state.draining {
                    return Err(PoolError::Draining);
                }
                state.prune_waiters();
                if let Some(delay) = rejoin.take() {
                    if let Some(pooled) = state.available.pop_back() {
                        state.in_use += 1;
                        Acquire::Ready(pooled)
                    } else {
                        let spare_capacity = state.total() < max_size;
                        let (id, rx) = state.enqueue_front();
                        Acquire::Wait {
                            id,
                            rx,
                            replenish: spare_capacity.then_some(delay),
                        }
                    }
                } else if !state.waiters.is_empty() {
                    let spare_capacity = state.total() < max_size;
                    let (id, rx) = state.enqueue();
                    Acquire::Wait {
                        id,
                        rx,
                        replenish: spare_capacity.then_some(Duration::ZERO),
                    }
                } else if let Some(pooled) = state.available.pop_back() {
                    state.in_use += 1;
                    Acquire::Ready(pooled)
                } else if state.total() < max_size {
                    state.creating += 1;
                    Acquire::Create
                } else {
                    let (id, rx) = state.enqueue();
                    Acquire::Wait {
                        id,
                        rx,
                        replenish: None,
                    }
                }
            };

            let mut pooled = match next {
                Acquire::Ready(pooled) => pooled,
                Acquire::Create => {
                    let created =
                        tokio::time::timeout_at(deadline, shared.create_with_retries()).await;
                    {
                        let mut state = shared.state.lock();
                        state.creating -= 1;
                        if matches!(created, Ok(Ok(_))) {
                            state.in_use += 1;
                        }
                    }
                    shared.idle.notify_waiters();
                    match created {
                        Ok(Ok(pooled)) => return Ok(Lease::new(pooled, Arc::clone(shared))),
                        Ok(Err(error)) => {
                            warn!(
                                error = %error,
                                "could not create resource for acquire; waiting in queue"
                            );
                            rejoin = Some(shared.config.create_retry_delay());
                            continue;
                        }
                        Err(_elapsed) => {
                            let timeout = shared.config.acquire_timeout();
                            debug!(?timeout, "acquire timed out while creating");
                            return Err(PoolError::AcquireTimeout(timeout));
                        }
                    }
                }
                Acquire::Wait { id, rx, replenish } => {
                    if let Some(delay) = replenish {
                        shared.replenish_later(delay);
                    }
                    shared.wait_for(id, rx, deadline).await?
                }
            };

            let valid = if shared.config.validate_on_borrow() {
                shared.factory.validate(&pooled.resource).await
            } else {
                true
            };
            if valid {
                return Ok(Lease::new(pooled, Arc::clone(shared)));
            }
            pooled.valid = false;
            warn!(
                use_count = pooled.use_count,
                "pooled resource failed validation on borrow; discarding"
            );
            shared.discard(pooled).await;
            rejoin = Some(Duration::ZERO);
        }
    }

    /// Return a leased resource.
    ///
    /// With `validate_on_release`, an invalid resource is destroyed and a
    /// replacement created before this returns, so the pool keeps its size.
    /// A valid resource goes to the longest-waiting caller, if any.
    pub async fn release(&self, lease: Lease<F>) {
        self.shared.release_pooled(lease.take()).await;
    }

    /// Retire a leased resource. The pool refills to `min` and serves
    /// queued callers if capacity allows.
    pub async fn destroy(&self, lease: Lease<F>) {
        self.shared.retire(lease.take()).await;
    }

    /// Shut the pool down.
    ///
    /// Stops the idle sweep, rejects every queued caller, waits for all leased
    /// resources to come back, then destroys everything. Later acquires fail
    /// with [`PoolError::Draining`].
    pub async fn drain(&self) {
        let shared = &self.shared;
        let rejected = {
            let mut state = shared.state.lock();
            state.draining = true;
            std::mem::take(&mut state.waiters)
        };
        if let Some(handle) = shared.evictor.lock().take() {
            handle.abort();
        }
        info!(rejected = rejected.len(), "draining resource pool");
        for waiter in rejected {
            let _ = waiter.tx.send(Err(PoolError::Draining));
        }

        loop {
            let notified = shared.idle.notified();
            {
                let state = shared.state.lock();
                if state.in_use == 0 && state.creating == 0 {
                    break;
                }
                debug!(
                    in_use = state.in_use,
                    creating = state.creating,
                    "waiting for leased resources before draining"
                );
            }
            notified.await;
        }

        let remaining = std::mem::take(&mut shared.state.lock().available);
        let count = remaining.len();
        for pooled in remaining {
            shared.factory.destroy(pooled.resource).await;
        }
        info!(destroyed = count, "resource pool drained");
    }
}

impl<F: ResourceFactory> Shared<F> {
    fn stats(&self) -> PoolStats {
        let state = self.state.lock();
        PoolStats {
            size: state.available.len() + state.in_use,
            available: state.available.len(),
            in_use: state.in_use,
            waiting: state.waiters.len(),
            creating: state.creating,
        }
    }

    /// Call the factory up to `create_retries` times, returning the last
    /// error if every attempt fails.
    async fn create_with_retries(
        &self,
    ) -> std::result::Result<PooledResource<F::Resource>, F::Error> {
        let attempts = self.config.create_retries().max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.factory.create().await {
                Ok(resource) => {
                    debug!(attempt, "created pooled resource");
                    return Ok(PooledResource::new(resource));
                }
                Err(error) => {
                    warn!(attempt, attempts, error = %error, "resource creation failed");
                    if attempt >= attempts {
                        return Err(error);
                    }
                    tokio::time::sleep(self.config.create_retry_delay()).await;
                }
            }
        }
    }

    /// Create a resource for an already reserved slot and place it.
    ///
    /// Returns whether a resource was created. After a failure, queued
    /// callers that could still be served get another creation once the
    /// retry delay has passed.
    async fn finish_creation(self: &Arc<Self>) -> bool {
        let created = self.create_with_retries().await;
        let outcome = {
            let mut state = self.state.lock();
            state.creating -= 1;
            match created {
                Ok(pooled) if state.draining => Err(Some(pooled)),
                Ok(pooled) => {
                    state.hand_off(pooled);
                    Ok(())
                }
                Err(error) => {
                    error!(
                        attempts = self.config.create_retries().max(1),
                        error = %error,
                        "could not create pooled resource"
                    );
                    if state.starved(self.config.max_size()) {
                        self.replenish_later(self.config.create_retry_delay());
                    }
                    Err(None)
                }
            }
        };
        self.idle.notify_waiters();

        match outcome {
            Ok(()) => true,
            Err(Some(pooled)) => {
                self.factory.destroy(pooled.resource).await;
                false
            }
            Err(None) => false,
        }
    }

    /// Create resources while below `min` or while callers wait with spare
    /// capacity.
    async fn replenish(self: Arc<Self>) {
        loop {
            let reserved = {
                let mut state = self.state.lock();
                state.prune_waiters();
                let total = state.total();
                let needed = !state.draining
                    && (total < self.config.min_size()
                        || (!state.waiters.is_empty() && total < self.config.max_size()));
                if needed {
                    state.creating += 1;
                }
                needed
            };
            if !reserved || !self.finish_creation().await {
                break;
            }
        }
    }

    /// Run [`Self::replenish`] in the background, after `delay`.
    fn replenish_later(self: &Arc<Self>, delay: Duration) {
        let shared = Arc::clone(self);
        tokio::spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            shared.replenish().await;
        });
    }

    async fn release_pooled(self: &Arc<Self>, mut pooled: PooledResource<F::Resource>) {
        pooled.last_used = Instant::now();

        if self.config.validate_on_release() && !self.factory.validate(&pooled.resource).await {
            pooled.valid = false;
            warn!(
                use_count = pooled.use_count,
                "pooled resource failed validation on release; replacing"
            );
            let replace = {
                let mut state = self.state.lock();
                state.in_use -= 1;
                if state.draining {
                    false
                } else {
                    state.creating += 1;
                    true
                }
            };
            self.factory.destroy(pooled.resource).await;
            if replace {
                self.finish_creation().await;
            } else {
                self.idle.notify_waiters();
            }
            return;
        }

        {
            let mut state = self.state.lock();
            state.in_use -= 1;
            state.hand_off(pooled);
        }
        self.idle.notify_waiters();
    }

    /// Destroy a leased resource and refill the pool.
    async fn retire(self: &Arc<Self>, pooled: PooledResource<F::Resource>) {
        self.discard(pooled).await;
        Arc::clone(self).replenish().await;
    }

    /// Destroy a leased resource without replacing it.
    async fn discard(&self, pooled: PooledResource<F::Resource>) {
        self.state.lock().in_use -= 1;
        debug!(
            use_count = pooled.use_count,
            valid = pooled.valid,
            "destroying pooled resource"
        );
        self.factory.destroy(pooled.resource).await;
        self.idle.notify_waiters();
    }

    /// Return a lease that was dropped without an explicit release.
    pub(crate) fn reclaim(this: &Arc<Self>, pooled: PooledResource<F::Resource>) {
        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            let shared = Arc::clone(this);
            runtime.spawn(async move { shared.release_pooled(pooled).await });
        } else {
            warn!("lease dropped outside a runtime; discarding resource");
            this.state.lock().in_use -= 1;
            this.idle.notify_waiters();
        }
    }

    /// Wait in the queue until served, rejected or past `deadline`.
    async fn wait_for(
        &self,
        id: u64,
        mut rx: oneshot::Receiver<Result<PooledResource<F::Resource>>>,
        deadline: Instant,
    ) -> Result<PooledResource<F::Resource>> {
        let timeout = self.config.acquire_timeout();
        match tokio::time::timeout_at(deadline, &mut rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_closed)) => Err(PoolError::Draining),
            Err(_elapsed) => {
                let removed = {
                    let mut state = self.state.lock();
                    let before = state.waiters.len();
                    state.waiters.retain(|w| w.id != id);
                    state.waiters.len() != before
                };
                if removed {
                    debug!(?timeout, "acquire timed out");
                    return Err(PoolError::AcquireTimeout(timeout));
                }
                // Served between the deadline and the dequeue: the resource is
                // already in the channel and counted as in use.
                match rx.try_recv() {
                    Ok(result) => result,
                    Err(_) => Err(PoolError::AcquireTimeout(timeout)),
                }
            }
        }
    }

    async fn evict_idle(&self) {
        let now = Instant::now();
        let idle_timeout = self.config.idle_timeout();
        let expired = {
            let mut state = self.state.lock();
            let mut expired = Vec::new();
            let mut index = 0;
            while !state.draining
                && index < state.available.len()
                && state.total() > self.config.min_size()
            {
                if now.duration_since(state.available[index].idle_since()) >= idle_timeout {
                    if let Some(pooled) = state.available.remove(index) {
                        expired.push(pooled);
                    }
                } else {
                    index += 1;
                }
            }
            expired
        };

        for pooled in expired {
            debug!(
                use_count = pooled.use_count,
                age = ?now.duration_since(pooled.created_at),
                "evicting idle resource"
            );
            self.factory.destroy(pooled.resource).await;
        }
    }
}

async fn run_eviction<F: ResourceFactory>(shared: Weak<Shared<F>>, period: Duration) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker.tick().await;
    loop {
        ticker.tick().await;
        let Some(shared) = shared.upgrade() else {
            break;
        };
        shared.evict_idle().await;
    }
}
