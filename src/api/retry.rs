//! Fixed-count, fixed-delay retries for transient outbound failures.

use std::future::Future;
use std::time::Duration;
use tracing::warn;

use crate::config::Config;
use crate::error::TrackerResult;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Attempts after the first one
    pub retries: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(retries: u32, delay: Duration) -> Self {
        Self { retries, delay }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.fetch_retries, config.fetch_retry_delay())
    }

    /// Run `call` until it succeeds, fails permanently, or the retries are used up.
    /// Only errors reporting `is_transient` are retried.
    pub async fn run<T, F, Fut>(&self, what: &str, mut call: F) -> TrackerResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = TrackerResult<T>>,
    {
        let mut attempt = 0;
        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < self.retries => {
                    attempt += 1;
                    warn!("{} failed ({}), retry {}/{}", what, e, attempt, self.retries);
                    tokio::time::sleep(self.delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}
