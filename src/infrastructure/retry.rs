use crate::domain::error::DomainError;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Exponential backoff settings for connection attempts.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Attempts after the first one.
    pub max_retries: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
    pub use_jitter: bool,
}

impl RetryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_initial_delay(mut self, delay_ms: u64) -> Self {
        self.initial_delay_ms = delay_ms;
        self
    }

    pub fn without_jitter(mut self) -> Self {
        self.use_jitter = false;
        self
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 100,
            max_delay_ms: 5000,
            backoff_multiplier: 2.0,
            use_jitter: true,
        }
    }
}

/// Retry `operation` while it fails with a retryable error (connection or
/// timeout). Any other error, or the last retryable one, is returned as is.
pub async fn retry_with_backoff<F, Fut, T>(
    mut operation: F,
    config: &RetryConfig,
) -> Result<T, DomainError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, DomainError>>,
{
    let mut delay_ms = config.initial_delay_ms;
    let mut attempt = 0;
    loop {
        let err = match operation().await {
            Ok(value) => {
                if attempt > 0 {
                    debug!(retries = attempt, "Recovered after retrying");
                }
                return Ok(value);
            }
            Err(e) if !e.is_retryable() || attempt == config.max_retries => {
                if e.is_retryable() {
                    warn!(attempts = attempt + 1, error = %e, "Giving up");
                }
                return Err(e);
            }
            Err(e) => e,
        };

        let wait_ms = if config.use_jitter { apply_jitter(delay_ms) } else { delay_ms };
        debug!(attempt = attempt + 1, wait_ms, error = %err, "Retrying");
        tokio::time::sleep(Duration::from_millis(wait_ms)).await;
        delay_ms = ((delay_ms as f64 * config.backoff_multiplier) as u64).min(config.max_delay_ms);
        attempt += 1;
    }
}

/// Scale the delay by a pseudo-random factor in [0.5, 1.0).
fn apply_jitter(delay: u64) -> u64 {
    use std::collections::hash_map::RandomState;
    use std::hash::BuildHasher;

    let random_factor =
        (RandomState::new().hash_one(std::time::SystemTime::now()) % 50) as f64 / 100.0 + 0.5;
    (delay as f64 * random_factor) as u64
}
