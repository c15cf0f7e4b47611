use std::thread;
use std::time::Duration;

use tracing::warn;

use crate::error::EnvError;

/// Retry policy for controller connection attempts.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total attempts before giving up, including the first one.
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub initial_delay_ms: u64,
    /// Multiplier applied to the delay after each failed attempt.
    pub backoff_multiplier: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 1000,
            backoff_multiplier: 2,
        }
    }
}

/// Delay to wait after the given attempt number (1-based) fails.
pub fn exponential_backoff_delay_ms(config: &RetryConfig, attempt: u32) -> u64 {
    if attempt <= 1 {
        return config.initial_delay_ms;
    }
    let mut delay = config.initial_delay_ms;
    for _ in 1..attempt {
        delay = delay.saturating_mul(config.backoff_multiplier);
    }
    delay
}

/// Runs `op` until it succeeds or the retry budget is spent, sleeping with
/// exponential backoff between attempts. The last error is returned as-is.
pub(crate) fn run_with_retry<T>(
    describe: &'static str,
    config: &RetryConfig,
    mut op: impl FnMut() -> Result<T, EnvError>,
) -> Result<T, EnvError> {
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match op() {
            Ok(value) => return Ok(value),
            Err(err) if attempt < max_attempts => {
                warn!(attempt, max_attempts, error = %err, "{describe} failed, retrying");
                let delay = exponential_backoff_delay_ms(config, attempt);
                if delay > 0 {
                    thread::sleep(Duration::from_millis(delay));
                }
                attempt += 1;
            }
            Err(err) => {
                warn!(attempt, max_attempts, error = %err, "{describe} failed, giving up");
                return Err(err);
            }
        }
    }
}
