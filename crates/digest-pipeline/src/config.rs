use std::path::{Path, PathBuf};
use std::time::Duration;

use digest_pool::{PoolConfig, PoolError};
use digest_recovery::{RecoveryConfig, RecoveryError};
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at '{path}'")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config at '{path}'")]
    ParseFile {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to parse config")]
    Parse(#[from] toml::de::Error),

    #[error(transparent)]
    Pool(#[from] PoolError),

    #[error(transparent)]
    Recovery(#[from] RecoveryError),
}

/// Pool and recovery settings for a digest run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DigestConfig {
    pool: PoolConfig,
    recovery: RecoveryConfig,
}

impl DigestConfig {
    #[must_use]
    pub fn new(pool: PoolConfig, recovery: RecoveryConfig) -> Self {
        Self { pool, recovery }
    }

    /// Read and validate a TOML config file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is not valid TOML, has
    /// unknown keys, or describes an invalid pool or recovery setup.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let raw: RawConfig = toml::from_str(&content).map_err(|source| ConfigError::ParseFile {
            path: path.to_path_buf(),
            source,
        })?;
        raw.into_config()
    }

    /// Parse and validate TOML config text. Missing keys take their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid TOML, has unknown keys, or
    /// describes an invalid pool or recovery setup.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig = toml::from_str(content)?;
        raw.into_config()
    }

    #[must_use]
    pub fn pool(&self) -> &PoolConfig {
        &self.pool
    }

    #[must_use]
    pub fn recovery(&self) -> &RecoveryConfig {
        &self.recovery
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    #[serde(default)]
    pool: RawPool,
    #[serde(default)]
    recovery: RawRecovery,
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
#[allow(clippy::struct_excessive_bools)]
struct RawPool {
    min: usize,
    max: usize,
    idle_timeout_ms: u64,
    acquire_timeout_ms: u64,
    create_retries: u32,
    create_retry_delay_ms: u64,
    validate_on_borrow: bool,
    validate_on_release: bool,
    eviction_interval_ms: u64,
}

impl Default for RawPool {
    fn default() -> Self {
        let defaults = PoolConfig::default();
        Self {
            min: defaults.min_size(),
            max: defaults.max_size(),
            idle_timeout_ms: millis(defaults.idle_timeout()),
            acquire_timeout_ms: millis(defaults.acquire_timeout()),
            create_retries: defaults.create_retries(),
            create_retry_delay_ms: millis(defaults.create_retry_delay()),
            validate_on_borrow: defaults.validate_on_borrow(),
            validate_on_release: defaults.validate_on_release(),
            eviction_interval_ms: millis(defaults.eviction_interval()),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RawRecovery {
    max_attempts: u32,
    retry_delays_ms: Vec<u64>,
}

impl Default for RawRecovery {
    fn default() -> Self {
        let defaults = RecoveryConfig::default();
        Self {
            max_attempts: defaults.max_attempts(),
            retry_delays_ms: defaults.retry_delays().iter().copied().map(millis).collect(),
        }
    }
}

impl RawConfig {
    fn into_config(self) -> Result<DigestConfig, ConfigError> {
        let pool = PoolConfig::default()
            .with_min_size(self.pool.min)
            .with_max_size(self.pool.max)
            .with_idle_timeout(Duration::from_millis(self.pool.idle_timeout_ms))
            .with_acquire_timeout(Duration::from_millis(self.pool.acquire_timeout_ms))
            .with_create_retries(self.pool.create_retries)
            .with_create_retry_delay(Duration::from_millis(self.pool.create_retry_delay_ms))
            .with_validate_on_borrow(self.pool.validate_on_borrow)
            .with_validate_on_release(self.pool.validate_on_release)
            .with_eviction_interval(Duration::from_millis(self.pool.eviction_interval_ms));
        pool.validate()?;

        let recovery = RecoveryConfig::default()
            .with_max_attempts(self.recovery.max_attempts)
            .with_retry_delays(
                self.recovery
                    .retry_delays_ms
                    .into_iter()
                    .map(Duration::from_millis)
                    .collect(),
            );
        recovery.validate()?;

        Ok(DigestConfig { pool, recovery })
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
