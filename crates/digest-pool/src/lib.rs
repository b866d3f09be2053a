//! Bounded pool of reusable resources such as API clients.
//!
//! The pool pre-creates its minimum size, hands resources out through
//! [`Lease`]s, queues callers fairly (FIFO) when it is at capacity, evicts
//! resources that sit idle too long, and heals itself when creation or
//! validation fails. Only an acquire timeout, a drained pool, or an acquire
//! that could not create a resource are reported to callers.

mod config;
mod error;
mod factory;
mod pool;
mod resource;

pub use config::PoolConfig;
pub use error::{PoolError, Result};
pub use factory::ResourceFactory;
pub use pool::{PoolStats, ResourcePool};
pub use resource::Lease;
