//! Per-domain request throttling.
//!
//! Each domain gets its own [`RateLimiter`] holding the timestamp of the
//! last permitted request. Limiters are created lazily on first use and
//! live for the process; the rate passed on first use sticks for the
//! domain's lifetime.
//!
//! [`LimiterMap`] is the concurrency-safe keyed store: the map itself sits
//! behind a std mutex (never held across an await), and each entry is an
//! `Arc<tokio::sync::Mutex<RateLimiter>>` so waits on one domain serialize
//! without blocking fetches to other domains.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::{Instant, sleep};
use tracing::debug;

/// Minimum-interval throttle for a single domain.
#[derive(Debug)]
pub struct RateLimiter {
    min_interval: Duration,
    last_request: Option<Instant>,
}

impl RateLimiter {
    /// A limiter allowing `requests_per_second` requests. Non-positive rates
    /// disable the wait entirely.
    pub fn new(requests_per_second: f64) -> Self {
        let min_interval = if requests_per_second > 0.0 {
            Duration::from_secs_f64(1.0 / requests_per_second)
        } else {
            Duration::ZERO
        };
        Self {
            min_interval,
            last_request: None,
        }
    }

    /// Block until at least `1/rate` seconds have passed since this domain's
    /// last permitted request. The first call never waits.
    pub async fn wait(&mut self) {
        let now = Instant::now();
        let Some(last) = self.last_request else {
            self.last_request = Some(now);
            return;
        };
        let elapsed = now - last;
        if elapsed < self.min_interval {
            let pause = self.min_interval - elapsed;
            debug!(?pause, "rate limit wait");
            sleep(pause).await;
        }
        self.last_request = Some(Instant::now());
    }
}

/// Lazily-populated, concurrency-safe map of per-domain limiters.
#[derive(Debug, Default)]
pub struct LimiterMap {
    inner: StdMutex<HashMap<String, Arc<Mutex<RateLimiter>>>>,
}

impl LimiterMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get or create the limiter for `domain`. The rate only applies on
    /// creation; later callers share whatever the first caller set up.
    pub fn get(&self, domain: &str, requests_per_second: f64) -> Arc<Mutex<RateLimiter>> {
        let mut map = self.inner.lock().expect("limiter map poisoned");
        map.entry(domain.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(RateLimiter::new(requests_per_second))))
            .clone()
    }
}
