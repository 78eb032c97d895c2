//! Serialized outbound request queue
//!
//! Funnels every call to the third-party price API through one async mutex
//! and spaces call starts by at least `min_delay`. The tokio mutex is FIFO,
//! so callers are served in arrival order.

use std::future::Future;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep_until, Instant};

#[derive(Debug)]
pub struct RequestQueue {
    min_delay: Duration,
    last_call: Mutex<Option<Instant>>,
}

impl RequestQueue {
    pub fn new(min_delay: Duration) -> Self {
        Self {
            min_delay,
            last_call: Mutex::new(None),
        }
    }

    pub async fn run<F, Fut, T>(&self, call: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let mut last = self.last_call.lock().await;
        if let Some(previous) = *last {
            sleep_until(previous + self.min_delay).await;
        }
        *last = Some(Instant::now());
        call().await
    }
}
