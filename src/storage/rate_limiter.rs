//! Sliding-window rate limiter keyed by caller identity
//!
//! Bounds how often a single (hashed) identity may vote or post. State is
//! process-local; it deters casual abuse only.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::debug;

#[derive(Debug)]
pub struct RateLimiter {
    name: &'static str,
    limit: usize,
    window: Duration,
    events: Mutex<HashMap<String, VecDeque<Instant>>>,
}

impl RateLimiter {
    pub fn new(name: &'static str, limit: usize, window: Duration) -> Self {
        Self {
            name,
            limit,
            window,
            events: Mutex::new(HashMap::new()),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Returns whether `key` may proceed. The attempt is recorded only when allowed.
    pub async fn try_request(&self, key: &str) -> bool {
        let now = Instant::now();
        let mut events = self.events.lock().await;
        let queue = events.entry(key.to_string()).or_default();
        prune(queue, now, self.window);

        if queue.len() >= self.limit {
            debug!("[{}] rate limit hit for {}", self.name, key);
            return false;
        }
        queue.push_back(now);
        true
    }

    /// Requests still available to `key` in the current window.
    pub async fn remaining(&self, key: &str) -> usize {
        let now = Instant::now();
        let mut events = self.events.lock().await;
        match events.get_mut(key) {
            Some(queue) => {
                prune(queue, now, self.window);
                self.limit.saturating_sub(queue.len())
            }
            None => self.limit,
        }
    }

    /// Time until `key` regains a request slot; zero when one is free.
    pub async fn retry_after(&self, key: &str) -> Duration {
        let now = Instant::now();
        let mut events = self.events.lock().await;
        let Some(queue) = events.get_mut(key) else {
            return Duration::ZERO;
        };
        prune(queue, now, self.window);
        if queue.len() < self.limit {
            return Duration::ZERO;
        }
        queue
            .front()
            .map(|oldest| (*oldest + self.window).saturating_duration_since(now))
            .unwrap_or(Duration::ZERO)
    }

    /// Drop expired events and keys with nothing left. Returns the number of keys removed.
    pub async fn cleanup(&self) -> usize {
        let now = Instant::now();
        let mut events = self.events.lock().await;
        let before = events.len();
        events.retain(|_, queue| {
            prune(queue, now, self.window);
            !queue.is_empty()
        });
        before - events.len()
    }

    pub async fn tracked_keys(&self) -> usize {
        self.events.lock().await.len()
    }

    /// Periodically run `cleanup` until `shutdown` flips to true.
    pub fn spawn_cleanup(
        self: Arc<Self>,
        every: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let removed = self.cleanup().await;
                        if removed > 0 {
                            debug!("[{}] cleaned up {} idle keys", self.name, removed);
                        }
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }
        })
    }
}

fn prune(queue: &mut VecDeque<Instant>, now: Instant, window: Duration) {
    while let Some(oldest) = queue.front() {
        if now.duration_since(*oldest) >= window {
            queue.pop_front();
        } else {
            break;
        }
    }
}
