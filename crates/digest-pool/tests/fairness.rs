//! Waiters are served in arrival order and never overtaken.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use digest_pool::{PoolConfig, PoolError, ResourceFactory, ResourcePool};

#[derive(Debug, thiserror::Error)]
#[error("unreachable")]
struct Never;

struct SingleClient;

#[async_trait]
impl ResourceFactory for SingleClient {
    type Resource = &'static str;
    type Error = Never;

    async fn create(&self) -> Result<&'static str, Never> {
        Ok("client")
    }
}

async fn single_slot_pool() -> anyhow::Result<ResourcePool<SingleClient>> {
    let config = PoolConfig::default()
        .with_min_size(1)
        .with_max_size(1)
        .with_acquire_timeout(Duration::from_secs(30))
        .with_eviction_interval(Duration::ZERO);
    Ok(ResourcePool::new(SingleClient, config).await?)
}

fn spawn_waiter(
    pool: &ResourcePool<SingleClient>,
    order: &Arc<Mutex<Vec<String>>>,
    name: String,
) -> tokio::task::JoinHandle<Result<(), PoolError>> {
    let pool = pool.clone();
    let order = Arc::clone(order);
    tokio::spawn(async move {
        let lease = pool.acquire().await?;
        order.lock().expect("order lock poisoned").push(name);
        tokio::time::sleep(Duration::from_millis(10)).await;
        pool.release(lease).await;
        Ok(())
    })
}

#[tokio::test(start_paused = true)]
async fn waiters_are_served_first_in_first_out() -> anyhow::Result<()> {
    let pool = single_slot_pool().await?;
    let order = Arc::new(Mutex::new(Vec::new()));
    let holder = pool.acquire().await?;

    let mut waiters = Vec::new();
    for i in 1..=5 {
        waiters.push(spawn_waiter(&pool, &order, format!("w{i}")));
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    assert_eq!(pool.stats().waiting, 5);

    pool.release(holder).await;
    for waiter in waiters {
        waiter.await??;
    }

    let order = order.lock().expect("order lock poisoned").clone();
    assert_eq!(order, ["w1", "w2", "w3", "w4", "w5"]);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn released_resource_goes_to_queued_caller_not_newcomer() -> anyhow::Result<()> {
    let pool = single_slot_pool().await?;
    let order = Arc::new(Mutex::new(Vec::new()));
    let holder = pool.acquire().await?;

    let queued = spawn_waiter(&pool, &order, "queued".to_string());
    tokio::time::sleep(Duration::from_millis(1)).await;

    pool.release(holder).await;
    let stats = pool.stats();
    assert_eq!(stats.available, 0);
    assert_eq!(stats.in_use, 1);

    let newcomer = pool.acquire().await?;
    assert_eq!(
        order.lock().expect("order lock poisoned").as_slice(),
        ["queued"]
    );
    queued.await??;
    pool.release(newcomer).await;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn timed_out_waiter_leaves_the_queue() -> anyhow::Result<()> {
    let pool = single_slot_pool().await?;
    let holder = pool.acquire().await?;

    let impatient = {
        let pool = pool.clone();
        tokio::spawn(async move {
            tokio::time::timeout(Duration::from_millis(20), pool.acquire()).await
        })
    };
    tokio::time::sleep(Duration::from_millis(1)).await;
    assert_eq!(pool.stats().waiting, 1);

    assert!(impatient.await?.is_err());
    pool.release(holder).await;

    let stats = pool.stats();
    assert_eq!(stats.available, 1);
    assert_eq!(stats.waiting, 0);
    Ok(())
}
