use std::fmt;
use std::future::Future;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::classify::{ErrorClassification, ErrorCode, classify, classify_message};
use crate::config::RecoveryConfig;
use crate::context::RecoveryContext;
use crate::error::{RecoveryError, Result};

/// Value of an operation that eventually succeeded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recovered<T> {
    pub value: T,
    /// Attempts made, the successful one included.
    pub attempts: u32,
}

impl<T> Recovered<T> {
    pub fn into_value(self) -> T {
        self.value
    }
}

#[derive(Debug, Clone, Default)]
pub struct RecoveryHandler {
    config: RecoveryConfig,
}

impl RecoveryHandler {
    /// # Errors
    ///
    /// Returns [`RecoveryError::InvalidConfig`] if the configuration allows
    /// no attempts.
    pub fn new(config: RecoveryConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    #[must_use]
    pub fn config(&self) -> &RecoveryConfig {
        &self.config
    }

    #[must_use]
    pub fn classify(&self, error: &impl fmt::Display, attempt: u32) -> ErrorClassification {
        classify(error, attempt)
    }

    /// Run `operation` until it succeeds, fails with a non-recoverable
    /// classification, or uses up `max_attempts`.
    ///
    /// Each failure is classified with the number of earlier attempts. A
    /// recoverable failure waits for its backoff delay, refreshes credentials
    /// after an authentication failure when the context carries a hook, and
    /// then calls `operation` again.
    ///
    /// # Errors
    ///
    /// - [`RecoveryError::Failed`] with the last classification when retries
    ///   stop, or when the credential refresh fails
    /// - [`RecoveryError::Cancelled`] when the context's token fires
    pub async fn execute_with_recovery<T, E, Op, Fut>(
        &self,
        mut operation: Op,
        ctx: &RecoveryContext,
    ) -> Result<Recovered<T>>
    where
        Op: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        E: fmt::Display,
    {
        let name = ctx.operation_name();
        let max_attempts = self.config.max_attempts().max(1);
        let mut attempt = 0;

        loop {
            if ctx.cancellation().is_some_and(|token| token.is_cancelled()) {
                return Err(cancelled(name, attempt));
            }

            let message = match operation().await {
                Ok(value) => {
                    if attempt > 0 {
                        info!(operation = name, attempts = attempt + 1, "operation recovered");
                    }
                    return Ok(Recovered {
                        value,
                        attempts: attempt + 1,
                    });
                }
                Err(error) => format!("{error:#}"),
            };
            let classification = classify_message(&message, attempt);
            let attempts = attempt + 1;
            warn!(
                operation = name,
                attempt = attempts,
                max_attempts,
                code = %classification.code,
                recoverable = classification.recoverable,
                error = %message,
                "operation attempt failed"
            );

            if !classification.recoverable || attempts >= max_attempts {
                return Err(RecoveryError::Failed {
                    operation: name.to_string(),
                    attempts,
                    code: classification.code,
                    user_message: classification.user_message,
                    message,
                });
            }

            let delay = self.config.delay_for(attempt);
            debug!(operation = name, attempt = attempts, ?delay, "backing off before retry");
            if wait_or_cancel(delay, ctx).await {
                info!(operation = name, attempts, "retry cancelled during backoff");
                return Err(cancelled(name, attempts));
            }

            if classification.code == ErrorCode::Auth {
                if let Some(hook) = ctx.credential_refresh() {
                    match hook.refresh().await {
                        Ok(()) => info!(operation = name, "credentials refreshed"),
                        Err(refresh_error) => {
                            warn!(
                                operation = name,
                                error = %refresh_error,
                                "credential refresh failed"
                            );
                            return Err(RecoveryError::Failed {
                                operation: name.to_string(),
                                attempts,
                                code: ErrorCode::Auth,
                                user_message: classification.user_message,
                                message: format!("credential refresh failed: {refresh_error}"),
                            });
                        }
                    }
                }
            }

            attempt = attempts;
        }
    }
}

fn cancelled(operation: &str, attempts: u32) -> RecoveryError {
    RecoveryError::Cancelled {
        operation: operation.to_string(),
        attempts,
    }
}

/// Sleep for `delay`; returns `true` if the context's token fired first.
async fn wait_or_cancel(delay: Duration, ctx: &RecoveryContext) -> bool {
    match ctx.cancellation() {
        Some(token) => tokio::select! {
            biased;
            () = token.cancelled() => true,
            () = tokio::time::sleep(delay) => false,
        },
        None => {
            tokio::time::sleep(delay).await;
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;

    fn fast_handler(max_attempts: u32) -> RecoveryHandler {
        RecoveryHandler::new(
            RecoveryConfig::default()
                .with_max_attempts(max_attempts)
                .with_retry_delays(vec![Duration::from_millis(10)]),
        )
        .expect("valid config")
    }

    #[tokio::test(start_paused = true)]
    async fn first_success_reports_one_attempt() -> anyhow::Result<()> {
        let handler = fast_handler(3);
        let recovered = handler
            .execute_with_recovery(
                || async { Ok::<_, String>("digest") },
                &RecoveryContext::new("send"),
            )
            .await?;

        assert_eq!(recovered.value, "digest");
        assert_eq!(recovered.attempts, 1);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_error_is_retried_once() {
        let handler = fast_handler(5);
        let calls = Cell::new(0);

        let err = handler
            .execute_with_recovery(
                || {
                    calls.set(calls.get() + 1);
                    async { Err::<(), _>("kaboom") }
                },
                &RecoveryContext::new("classify"),
            )
            .await
            .expect_err("unknown errors stop after one retry");

        assert_eq!(calls.get(), 2);
        assert_eq!(err.code(), Some(ErrorCode::Unknown));
        assert_eq!(err.attempts(), 2);
    }

    #[test]
    fn new_rejects_zero_attempts() {
        let result = RecoveryHandler::new(RecoveryConfig::default().with_max_attempts(0));
        assert!(matches!(result, Err(RecoveryError::InvalidConfig(_))));
    }
}
