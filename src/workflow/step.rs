use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;

use crate::config::AppConfig;
use crate::error::AppResult;

const MAX_DELAY: Duration = Duration::from_secs(10);

/// Runs named workflow steps, retrying transient failures with exponential
/// backoff. Permanent failures return immediately.
#[derive(Debug, Clone)]
pub struct StepRunner {
    max_retries: u32,
    initial_delay: Duration,
}

impl StepRunner {
    pub fn new(max_retries: u32, initial_delay: Duration) -> Self {
        Self {
            max_retries,
            initial_delay,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.step_retries, config.retry_delay)
    }

    pub async fn run<T, F, Fut>(&self, name: &str, mut step: F) -> AppResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = AppResult<T>>,
    {
        let mut attempt = 0;
        let mut delay = self.initial_delay;

        loop {
            tracing::debug!(step = name, attempt, "running step");
            match step().await {
                Ok(value) => {
                    if attempt > 0 {
                        tracing::info!(step = name, "step succeeded after {attempt} retries");
                    }
                    return Ok(value);
                }
                Err(err) if !err.is_retriable() => {
                    tracing::warn!(step = name, "step failed permanently: {err}");
                    return Err(err);
                }
                Err(err) if attempt >= self.max_retries => {
                    tracing::warn!(step = name, "step failed after {} attempts: {err}", attempt + 1);
                    return Err(err);
                }
                Err(err) => {
                    attempt += 1;
                    tracing::warn!(
                        step = name,
                        "attempt {attempt} failed: {err}; retrying in {delay:?}"
                    );
                    sleep(delay).await;
                    delay = (delay * 2).min(MAX_DELAY);
                }
            }
        }
    }
}
