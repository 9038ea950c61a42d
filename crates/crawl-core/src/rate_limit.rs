//! Sliding-window rate limiting with global and per-origin scopes, a bounded
//! concurrency semaphore, and a per-origin backoff override.
//!
//! Grounded on `original_source/crawl-service/utils/rate_limiter.py`'s
//! `RateLimiter` (global + per-domain deques, a single lock, a backoff map)
//! and on the sliding-log window shape in
//! `tower-resilience-ratelimiter`'s `SlidingLogState`.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::sleep;
use url::Url;

const WINDOW: Duration = Duration::from_secs(60);

/// A bounded deque of request timestamps, per spec.md §3's `RateWindow`.
#[derive(Debug, Default)]
struct RateWindow {
    timestamps: VecDeque<Instant>,
}

impl RateWindow {
    fn evict_expired(&mut self, now: Instant) {
        while let Some(&front) = self.timestamps.front() {
            if now.duration_since(front) >= WINDOW {
                self.timestamps.pop_front();
            } else {
                break;
            }
        }
    }

    /// Duration until the oldest entry ages out, if the window is at capacity.
    fn wait_for_slot(&self, limit: usize, now: Instant) -> Option<Duration> {
        if self.timestamps.len() < limit {
            return None;
        }
        self.timestamps
            .front()
            .map(|&oldest| (oldest + WINDOW).saturating_duration_since(now))
    }

    fn record(&mut self, now: Instant) {
        self.timestamps.push_back(now);
    }

    fn len(&self) -> usize {
        self.timestamps.len()
    }
}

struct LimiterState {
    global: RateWindow,
    per_origin: HashMap<String, RateWindow>,
    backoff_until: HashMap<String, Instant>,
}

/// A permit held for the lifetime of one in-flight request. Dropping it
/// releases the concurrency slot; it carries no other behavior.
pub struct FetchPermit {
    _permit: OwnedSemaphorePermit,
    origin: String,
}

impl FetchPermit {
    pub fn origin(&self) -> &str {
        &self.origin
    }
}

/// Shared rate limiter: one global sliding window, one per-origin sliding
/// window per host, a concurrency semaphore, and a backoff override map.
pub struct RateLimiter {
    state: Mutex<LimiterState>,
    semaphore: Arc<Semaphore>,
    global_limit: usize,
    per_origin_limit: usize,
}

impl RateLimiter {
    pub fn new(requests_per_minute: usize, max_concurrent: usize, per_origin_rpm: usize) -> Self {
        Self {
            state: Mutex::new(LimiterState {
                global: RateWindow::default(),
                per_origin: HashMap::new(),
                backoff_until: HashMap::new(),
            }),
            semaphore: Arc::new(Semaphore::new(max_concurrent)),
            global_limit: requests_per_minute,
            per_origin_limit: per_origin_rpm,
        }
    }

    fn origin_of(url: &str) -> String {
        Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_else(|| url.to_string())
    }

    /// Blocks the caller until admission is possible under every applicable
    /// window and a concurrency slot is free, honoring any active backoff.
    pub async fn acquire(&self, url: &str) -> FetchPermit {
        let origin = Self::origin_of(url);

        loop {
            let wait = {
                let mut state = self.state.lock();
                match state.backoff_until.get(&origin).copied() {
                    Some(until) if until > Instant::now() => Some(until - Instant::now()),
                    Some(_) => {
                        state.backoff_until.remove(&origin);
                        None
                    }
                    None => None,
                }
            };
            match wait {
                Some(d) => {
                    tracing::info!(origin = %origin, wait_ms = d.as_millis() as u64, "backing off");
                    sleep(d).await;
                }
                None => break,
            }
        }

        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .expect("rate limiter semaphore never closed");

        loop {
            let wait = {
                let mut state = self.state.lock();
                let now = Instant::now();

                state.global.evict_expired(now);
                let global_wait = state.global.wait_for_slot(self.global_limit, now);

                let origin_window = state.per_origin.entry(origin.clone()).or_default();
                origin_window.evict_expired(now);
                let origin_wait = origin_window.wait_for_slot(self.per_origin_limit, now);

                match (global_wait, origin_wait) {
                    (None, None) => {
                        state.global.record(now);
                        state
                            .per_origin
                            .get_mut(&origin)
                            .expect("just inserted above")
                            .record(now);
                        None
                    }
                    (g, o) => Some(g.into_iter().chain(o).max().unwrap_or(Duration::ZERO)),
                }
            };
            match wait {
                None => break,
                Some(d) => {
                    tracing::debug!(origin = %origin, wait_ms = d.as_millis() as u64, "rate limit: waiting");
                    sleep(d.max(Duration::from_millis(1))).await;
                }
            }
        }

        FetchPermit {
            _permit: permit,
            origin,
        }
    }

    /// Records a 429-triggered backoff for `url`'s origin, overriding
    /// admission until it elapses.
    pub fn backoff(&self, url: &str, duration: Duration) {
        let origin = Self::origin_of(url);
        let mut state = self.state.lock();
        state.backoff_until.insert(origin.clone(), Instant::now() + duration);
        tracing::warn!(origin = %origin, seconds = duration.as_secs_f64(), "recorded backoff");
    }

    /// Current occupancy of the global window, for diagnostics/tests.
    pub fn global_window_len(&self) -> usize {
        self.state.lock().global.len()
    }
}
