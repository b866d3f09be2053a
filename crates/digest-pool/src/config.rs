use std::time::Duration;

use crate::error::{PoolError, Result};

/// Sizing and lifecycle settings for a [`ResourcePool`](crate::ResourcePool).
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct PoolConfig {
    min_size: usize,
    max_size: usize,
    idle_timeout: Duration,
    acquire_timeout: Duration,
    create_retries: u32,
    create_retry_delay: Duration,
    validate_on_borrow: bool,
    validate_on_release: bool,
    eviction_interval: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            min_size: 1,
            max_size: 4,
            idle_timeout: Duration::from_secs(30),
            acquire_timeout: Duration::from_secs(5),
            create_retries: 3,
            create_retry_delay: Duration::from_secs(1),
            validate_on_borrow: false,
            validate_on_release: true,
            eviction_interval: Duration::from_secs(10),
        }
    }
}

impl PoolConfig {
    /// Check the sizing invariants.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::InvalidConfig`] when `max` is zero or `min > max`.
    pub fn validate(&self) -> Result<()> {
        if self.max_size == 0 {
            return Err(PoolError::InvalidConfig(
                "max size must be at least 1".to_string(),
            ));
        }
        if self.min_size > self.max_size {
            return Err(PoolError::InvalidConfig(format!(
                "min size {} exceeds max size {}",
                self.min_size, self.max_size
            )));
        }
        Ok(())
    }

    #[must_use]
    pub fn min_size(&self) -> usize {
        self.min_size
    }

    #[must_use]
    pub fn max_size(&self) -> usize {
        self.max_size
    }

    #[must_use]
    pub fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }

    #[must_use]
    pub fn acquire_timeout(&self) -> Duration {
        self.acquire_timeout
    }

    /// Total creation attempts before a creation failure is reported.
    #[must_use]
    pub fn create_retries(&self) -> u32 {
        self.create_retries
    }

    #[must_use]
    pub fn create_retry_delay(&self) -> Duration {
        self.create_retry_delay
    }

    #[must_use]
    pub fn validate_on_borrow(&self) -> bool {
        self.validate_on_borrow
    }

    #[must_use]
    pub fn validate_on_release(&self) -> bool {
        self.validate_on_release
    }

    /// Period of the idle eviction sweep; zero disables the sweep.
    #[must_use]
    pub fn eviction_interval(&self) -> Duration {
        self.eviction_interval
    }

    #[must_use]
    pub fn with_min_size(mut self, min_size: usize) -> Self {
        self.min_size = min_size;
        self
    }

    #[must_use]
    pub fn with_max_size(mut self, max_size: usize) -> Self {
        self.max_size = max_size;
        self
    }

    #[must_use]
    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    #[must_use]
    pub fn with_acquire_timeout(mut self, acquire_timeout: Duration) -> Self {
        self.acquire_timeout = acquire_timeout;
        self
    }

    #[must_use]
    pub fn with_create_retries(mut self, create_retries: u32) -> Self {
        self.create_retries = create_retries;
        self
    }

    #[must_use]
    pub fn with_create_retry_delay(mut self, create_retry_delay: Duration) -> Self {
        self.create_retry_delay = create_retry_delay;
        self
    }

    #[must_use]
    pub fn with_validate_on_borrow(mut self, validate_on_borrow: bool) -> Self {
        self.validate_on_borrow = validate_on_borrow;
        self
    }

    #[must_use]
    pub fn with_validate_on_release(mut self, validate_on_release: bool) -> Self {
        self.validate_on_release = validate_on_release;
        self
    }

    #[must_use]
    pub fn with_eviction_interval(mut self, eviction_interval: Duration) -> Self {
        self.eviction_interval = eviction_interval;
        self
    }
}
