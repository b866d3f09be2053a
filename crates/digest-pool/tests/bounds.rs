//! Capacity limits and acquire timeouts.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use digest_pool::{PoolConfig, PoolError, ResourceFactory, ResourcePool};
use tokio::time::Instant;

#[derive(Debug, thiserror::Error)]
#[error("upstream refused connection")]
struct Refused;

#[derive(Default)]
struct Clients {
    created: AtomicUsize,
    destroyed: AtomicUsize,
}

impl Clients {
    fn live(&self) -> usize {
        self.created.load(Ordering::SeqCst) - self.destroyed.load(Ordering::SeqCst)
    }
}

struct ClientFactory(Arc<Clients>);

#[async_trait]
impl ResourceFactory for ClientFactory {
    type Resource = usize;
    type Error = Refused;

    async fn create(&self) -> Result<usize, Refused> {
        tokio::time::sleep(Duration::from_millis(5)).await;
        Ok(self.0.created.fetch_add(1, Ordering::SeqCst))
    }

    async fn destroy(&self, _client: usize) {
        self.0.destroyed.fetch_add(1, Ordering::SeqCst);
    }
}

fn config(min: usize, max: usize) -> PoolConfig {
    PoolConfig::default()
        .with_min_size(min)
        .with_max_size(max)
        .with_eviction_interval(Duration::ZERO)
}

#[tokio::test(start_paused = true)]
async fn acquire_times_out_when_pool_is_exhausted() -> anyhow::Result<()> {
    let clients = Arc::new(Clients::default());
    let pool = ResourcePool::new(
        ClientFactory(Arc::clone(&clients)),
        config(1, 2).with_acquire_timeout(Duration::from_millis(100)),
    )
    .await?;

    let first = pool.acquire().await?;
    let second = pool.acquire().await?;
    assert_eq!(pool.size(), 2);

    let started = Instant::now();
    let err = pool.acquire().await.expect_err("pool is exhausted");

    assert!(matches!(err, PoolError::AcquireTimeout(t) if t == Duration::from_millis(100)));
    assert!(started.elapsed() >= Duration::from_millis(100));
    assert_eq!(pool.stats().waiting, 0);
    assert_eq!(clients.live(), 2);

    pool.release(first).await;
    pool.release(second).await;
    assert_eq!(pool.stats().available, 2);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn concurrent_borrowers_never_exceed_max() -> anyhow::Result<()> {
    const MAX: usize = 3;
    let clients = Arc::new(Clients::default());
    let pool = ResourcePool::new(
        ClientFactory(Arc::clone(&clients)),
        config(0, MAX).with_acquire_timeout(Duration::from_secs(10)),
    )
    .await?;
    let held = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let mut tasks = Vec::new();
    for _ in 0..12 {
        let pool = pool.clone();
        let clients = Arc::clone(&clients);
        let held = Arc::clone(&held);
        let peak = Arc::clone(&peak);
        tasks.push(tokio::spawn(async move {
            let lease = pool.acquire().await?;
            let now = held.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            assert!(pool.size() <= MAX);
            assert!(clients.live() <= MAX);
            tokio::time::sleep(Duration::from_millis(50)).await;
            held.fetch_sub(1, Ordering::SeqCst);
            pool.release(lease).await;
            Ok::<_, PoolError>(())
        }));
    }
    for task in tasks {
        task.await??;
    }

    assert_eq!(peak.load(Ordering::SeqCst), MAX);
    assert!(clients.created.load(Ordering::SeqCst) <= MAX);
    assert_eq!(pool.stats().in_use, 0);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn waiting_callers_get_new_resources_while_below_max() -> anyhow::Result<()> {
    let clients = Arc::new(Clients::default());
    let pool = ResourcePool::new(ClientFactory(Arc::clone(&clients)), config(0, 2)).await?;

    let (a, b) = tokio::join!(pool.acquire(), pool.acquire());
    let (a, b) = (a?, b?);

    assert_ne!(*a, *b);
    assert_eq!(pool.size(), 2);
    assert_eq!(clients.created.load(Ordering::SeqCst), 2);
    Ok(())
}

#[tokio::test]
async fn inconsistent_sizing_is_rejected() {
    let clients = Arc::new(Clients::default());
    let result = ResourcePool::new(ClientFactory(clients), config(3, 1)).await;

    assert!(matches!(result, Err(PoolError::InvalidConfig(_))));
}
