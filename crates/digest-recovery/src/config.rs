use std::time::Duration;

use crate::error::{RecoveryError, Result};

/// Attempt limit and backoff schedule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveryConfig {
    max_attempts: u32,
    retry_delays: Vec<Duration>,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_delays: vec![
                Duration::from_secs(1),
                Duration::from_secs(2),
                Duration::from_secs(5),
            ],
        }
    }
}

impl RecoveryConfig {
    /// # Errors
    ///
    /// Returns [`RecoveryError::InvalidConfig`] when `max_attempts` is zero.
    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(RecoveryError::InvalidConfig(
                "max attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Total attempts, the first one included.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    #[must_use]
    pub fn retry_delays(&self) -> &[Duration] {
        &self.retry_delays
    }

    /// Backoff after the zero-based `attempt`. The last entry repeats once
    /// the schedule runs out; an empty schedule retries immediately.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let index = usize::try_from(attempt).unwrap_or(usize::MAX);
        self.retry_delays
            .get(index)
            .or_else(|| self.retry_delays.last())
            .copied()
            .unwrap_or(Duration::ZERO)
    }

    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    #[must_use]
    pub fn with_retry_delays(mut self, retry_delays: Vec<Duration>) -> Self {
        self.retry_delays = retry_delays;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_uses_last_entry_past_the_schedule() {
        let config = RecoveryConfig::default();

        assert_eq!(config.delay_for(0), Duration::from_secs(1));
        assert_eq!(config.delay_for(2), Duration::from_secs(5));
        assert_eq!(config.delay_for(9), Duration::from_secs(5));
    }

    #[test]
    fn empty_schedule_means_no_delay() {
        let config = RecoveryConfig::default().with_retry_delays(Vec::new());
        assert_eq!(config.delay_for(0), Duration::ZERO);
    }

    #[test]
    fn zero_attempts_is_rejected() {
        let config = RecoveryConfig::default().with_max_attempts(0);
        assert!(matches!(
            config.validate(),
            Err(RecoveryError::InvalidConfig(_))
        ));
    }
}
