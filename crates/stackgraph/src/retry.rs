//! Retry logic with exponential backoff for transient provider errors.
//!
//! The executor never retries on its own. Engines that want retries wrap
//! themselves in [`RetryingEngine`]; the node id of the step is the
//! idempotency key, so repeating a call is safe.

use crate::engine::{ApplyEngine, ResolvedStep};
use crate::error::ApplyError;
use crate::types::Outputs;
use std::thread;
use std::time::Duration;

/// Configuration for retry behavior
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Maximum number of attempts (including the first)
    pub max_attempts: u32,
    /// Base delay between retries
    pub base_delay: Duration,
    /// Multiplier for exponential backoff
    pub backoff_factor: f64,
    /// Maximum delay between retries
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(2),
            backoff_factor: 2.0,
            max_delay: Duration::from_secs(60),
        }
    }
}

impl RetryConfig {
    /// Calculate the delay for a given attempt number (0-indexed)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay = self.base_delay.as_secs_f64() * self.backoff_factor.powi(attempt as i32);
        let capped = delay.min(self.max_delay.as_secs_f64());
        // negative or NaN factors fall back to no wait
        Duration::try_from_secs_f64(capped).unwrap_or(Duration::ZERO)
    }

    /// Create a config that never retries
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }
}

/// Callback trait for retry progress notifications
pub trait RetryCallback: Send + Sync {
    /// Called before sleeping ahead of another attempt
    ///
    /// # Arguments
    /// * `node_id` - Node whose step is being retried
    /// * `attempt` - Attempt that just failed (1-indexed)
    /// * `max_attempts` - Maximum number of attempts
    /// * `error` - The error that triggered the retry
    /// * `delay` - Time until the next attempt
    fn on_retry(
        &self,
        node_id: &str,
        attempt: u32,
        max_attempts: u32,
        error: &ApplyError,
        delay: Duration,
    );
}

/// No-op callback that does nothing
pub struct NoCallback;

impl RetryCallback for NoCallback {
    fn on_retry(&self, _: &str, _: u32, _: u32, _: &ApplyError, _: Duration) {}
}

/// Callback that logs each retry at warn level
pub struct LogCallback;

impl RetryCallback for LogCallback {
    fn on_retry(
        &self,
        node_id: &str,
        attempt: u32,
        max_attempts: u32,
        error: &ApplyError,
        delay: Duration,
    ) {
        log::warn!(
            "{node_id}: attempt {attempt}/{max_attempts} failed: {error}. Retrying in {}ms",
            delay.as_millis()
        );
    }
}

/// Execute an operation with retry logic
///
/// Retries while the operation returns a retryable error, sleeping with
/// exponential backoff between attempts. Non-retryable errors return at once.
pub fn with_retry<T, F>(
    config: &RetryConfig,
    node_id: &str,
    callback: Option<&dyn RetryCallback>,
    mut operation: F,
) -> Result<T, ApplyError>
where
    F: FnMut() -> Result<T, ApplyError>,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        match operation() {
            Ok(result) => return Ok(result),
            Err(e) if !e.is_retryable() || attempt + 1 >= max_attempts => return Err(e),
            Err(e) => {
                let delay = config.delay_for_attempt(attempt);
                if let Some(cb) = callback {
                    cb.on_retry(node_id, attempt + 1, max_attempts, &e, delay);
                }
                thread::sleep(delay);
                attempt += 1;
            }
        }
    }
}

/// Engine decorator that retries transient failures
pub struct RetryingEngine<E> {
    inner: E,
    config: RetryConfig,
    callback: Box<dyn RetryCallback>,
}

impl<E: ApplyEngine> RetryingEngine<E> {
    /// Wrap an engine, logging retries
    pub fn new(inner: E, config: RetryConfig) -> Self {
        Self {
            inner,
            config,
            callback: Box::new(LogCallback),
        }
    }

    /// Replace the retry callback
    pub fn with_callback(mut self, callback: impl RetryCallback + 'static) -> Self {
        self.callback = Box::new(callback);
        self
    }

    /// Get the wrapped engine
    pub fn inner(&self) -> &E {
        &self.inner
    }
}

impl<E: ApplyEngine> ApplyEngine for RetryingEngine<E> {
    fn apply(&self, step: &ResolvedStep) -> Result<Outputs, ApplyError> {
        with_retry(&self.config, &step.node_id, Some(self.callback.as_ref()), || {
            self.inner.apply(step)
        })
    }

    fn teardown(&self, step: &ResolvedStep) -> Result<(), ApplyError> {
        with_retry(&self.config, &step.node_id, Some(self.callback.as_ref()), || {
            self.inner.teardown(step)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ResourceKind;
    use crate::planner::Action;
    use crate::types::Attributes;
    use std::cell::Cell;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast(max_attempts: u32) -> RetryConfig {
        RetryConfig {
            max_attempts,
            base_delay: Duration::from_millis(1),
            backoff_factor: 1.0,
            max_delay: Duration::from_millis(10),
        }
    }

    fn timeout() -> ApplyError {
        ApplyError::Timeout {
            message: "no response".into(),
        }
    }

    #[test]
    fn test_delay_for_attempt() {
        let config = RetryConfig {
            max_attempts: 5,
            base_delay: Duration::from_secs(2),
            backoff_factor: 2.0,
            max_delay: Duration::from_secs(10),
        };
        assert_eq!(config.delay_for_attempt(0), Duration::from_secs(2));
        assert_eq!(config.delay_for_attempt(1), Duration::from_secs(4));
        assert_eq!(config.delay_for_attempt(2), Duration::from_secs(8));
        assert_eq!(config.delay_for_attempt(3), Duration::from_secs(10));
    }

    #[test]
    fn test_delay_with_unusable_factor_does_not_panic() {
        let config = RetryConfig {
            backoff_factor: -2.0,
            ..Default::default()
        };
        assert_eq!(config.delay_for_attempt(1), Duration::ZERO);

        let config = RetryConfig {
            backoff_factor: f64::NAN,
            ..Default::default()
        };
        assert!(config.delay_for_attempt(1) <= config.max_delay);
    }

    #[test]
    fn test_with_retry_success_first_try() {
        let result = with_retry(&RetryConfig::no_retry(), "sg1", None, || Ok::<_, ApplyError>(42));
        assert_eq!(result.unwrap(), 42);
    }

    #[test]
    fn test_with_retry_non_retryable_error() {
        let attempts = Cell::new(0);
        let result: Result<(), _> = with_retry(&fast(3), "role1", None, || {
            attempts.set(attempts.get() + 1);
            Err(ApplyError::PermissionDenied {
                message: "iam:CreateRole".into(),
            })
        });

        assert!(result.is_err());
        assert_eq!(attempts.get(), 1);
    }

    #[test]
    fn test_with_retry_eventual_success() {
        let attempts = Cell::new(0);
        let result = with_retry(&fast(3), "alb1", None, || {
            let current = attempts.get();
            attempts.set(current + 1);
            if current < 2 { Err(timeout()) } else { Ok(7) }
        });

        assert_eq!(result.unwrap(), 7);
        assert_eq!(attempts.get(), 3);
    }

    #[test]
    fn test_with_retry_all_attempts_fail() {
        let attempts = Cell::new(0);
        let result: Result<(), _> = with_retry(&fast(3), "alb1", None, || {
            attempts.set(attempts.get() + 1);
            Err(timeout())
        });

        assert_eq!(result.unwrap_err(), timeout());
        assert_eq!(attempts.get(), 3);
    }

    #[test]
    fn test_callback_invoked_between_attempts() {
        struct CountingCallback(Arc<AtomicU32>);
        impl RetryCallback for CountingCallback {
            fn on_retry(&self, _: &str, _: u32, _: u32, _: &ApplyError, _: Duration) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }

        let count = Arc::new(AtomicU32::new(0));
        let callback = CountingCallback(count.clone());
        let _: Result<(), _> = with_retry(&fast(3), "lt1", Some(&callback), || Err(timeout()));

        // not after the last attempt
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    struct FlakyEngine {
        failures_left: AtomicU32,
    }

    impl ApplyEngine for FlakyEngine {
        fn apply(&self, _step: &ResolvedStep) -> Result<Outputs, ApplyError> {
            if self.failures_left.load(Ordering::SeqCst) > 0 {
                self.failures_left.fetch_sub(1, Ordering::SeqCst);
                return Err(timeout());
            }
            Ok(Outputs::from([("id".to_string(), "sg-1".to_string())]))
        }

        fn teardown(&self, _step: &ResolvedStep) -> Result<(), ApplyError> {
            Err(ApplyError::ProviderRejected {
                message: "DependencyViolation".into(),
            })
        }
    }

    #[test]
    fn test_retrying_engine() {
        let engine = RetryingEngine::new(
            FlakyEngine {
                failures_left: AtomicU32::new(2),
            },
            fast(3),
        )
        .with_callback(NoCallback);
        let step = ResolvedStep {
            index: 0,
            node_id: "sg1".into(),
            kind: ResourceKind::SecurityGroup,
            action: Action::Create,
            attributes: Attributes::new(),
            previous_outputs: Outputs::new(),
        };

        assert_eq!(engine.apply(&step).unwrap()["id"], "sg-1");
        assert_eq!(engine.inner().failures_left.load(Ordering::SeqCst), 0);
        assert!(matches!(
            engine.teardown(&step),
            Err(ApplyError::ProviderRejected { .. })
        ));
    }
}
