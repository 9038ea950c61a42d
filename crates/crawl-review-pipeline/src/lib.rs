//! Two-phase feed-then-browser review merge orchestrator, per spec.md
//! §4.4. Sequential by design: the browser collector's locale loop must
//! itself stay sequential to respect storefront rate limits, and the spec
//! mandates "a single synchronization boundary" rather than mixed async
//! models (spec.md §9).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;

use crawl_core::{Fetcher, Review, ReviewSource};
use crawl_review_browser::{collect as browser_collect, BrowserCollectorConfig, BrowserPool};
use crawl_review_feed::{collect as feed_collect, FeedCollectorConfig};

const FEED_CAP_CEILING: u32 = 2000;
const FEED_PHASE_BUDGET: Duration = Duration::from_secs(90);
const BROWSER_PHASE_BUDGET: Duration = Duration::from_secs(300);

#[derive(Debug, Clone)]
pub struct PipelineRequest {
    pub app_id: String,
    pub locale: String,
    pub cap: u32,
    pub rating_range: Option<(u8, u8)>,
    pub multi_locale: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelineStats {
    pub rating_histogram: HashMap<u8, u64>,
    pub average_rating: Option<f64>,
    pub feed_count: usize,
    pub browser_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelineResult {
    pub reviews: Vec<Review>,
    pub stats: PipelineStats,
}

/// Shared first-seen-wins accumulator keyed by review digest, serialized
/// by mutex per spec.md §4.4's concurrency note.
struct Accumulator {
    order: Vec<String>,
    by_digest: HashMap<String, Review>,
}

impl Accumulator {
    fn new() -> Self {
        Self {
            order: Vec::new(),
            by_digest: HashMap::new(),
        }
    }

    fn insert_if_absent(&mut self, review: Review) -> bool {
        if self.by_digest.contains_key(&review.digest) {
            return false;
        }
        self.order.push(review.digest.clone());
        self.by_digest.insert(review.digest.clone(), review);
        true
    }

    fn len(&self) -> usize {
        self.order.len()
    }

    fn into_ordered(self) -> Vec<Review> {
        self.order
            .into_iter()
            .filter_map(|digest| self.by_digest.get(&digest).cloned())
            .collect()
    }
}

fn matches_rating_range(review: &Review, range: Option<(u8, u8)>) -> bool {
    match (range, review.rating) {
        (None, _) => true,
        (Some(_), None) => false,
        (Some((lo, hi)), Some(r)) => r >= lo && r <= hi,
    }
}

fn aggregate_stats(reviews: &[Review]) -> PipelineStats {
    let mut histogram = HashMap::new();
    let mut sum = 0u64;
    let mut rated = 0u64;
    let mut feed_count = 0usize;
    let mut browser_count = 0usize;

    for review in reviews {
        if let Some(r) = review.rating {
            *histogram.entry(r).or_insert(0u64) += 1;
            sum += r as u64;
            rated += 1;
        }
        match review.source {
            ReviewSource::Feed => feed_count += 1,
            ReviewSource::Browser => browser_count += 1,
        }
    }

    let average_rating = if rated > 0 {
        Some(sum as f64 / rated as f64)
    } else {
        None
    };

    PipelineStats {
        rating_histogram: histogram,
        average_rating,
        feed_count,
        browser_count,
    }
}

/// Runs the feed collector under a 90-second budget and inserts every
/// returned review (tagged `source = feed`) into the accumulator.
async fn run_feed_phase(
    fetcher: Arc<Fetcher>,
    accumulator: Arc<Mutex<Accumulator>>,
    app_id: &str,
    locale: &str,
    cap: u32,
    rating_range: Option<(u8, u8)>,
) {
    let feed_cap = cap.min(FEED_CAP_CEILING);
    let cfg = FeedCollectorConfig {
        app_id: app_id.to_string(),
        locale: locale.to_string(),
        cap: Some(feed_cap),
        ..Default::default()
    };

    let reviews = match tokio::time::timeout(FEED_PHASE_BUDGET, feed_collect(fetcher, cfg)).await {
        Ok(reviews) => reviews,
        Err(_) => {
            tracing::warn!("feed phase exceeded 90s budget, proceeding with partial results");
            Vec::new()
        }
    };

    let mut guard = accumulator.lock();
    for review in reviews {
        if matches_rating_range(&review, rating_range) {
            guard.insert_if_absent(review);
        }
    }
}

/// Runs the browser collector under a 300-second budget for the remaining
/// capacity only; failures and timeouts yield an empty set rather than
/// aborting the pipeline.
async fn run_browser_phase(
    pool: &BrowserPool,
    accumulator: Arc<Mutex<Accumulator>>,
    app_id: &str,
    locale: &str,
    remaining: u32,
    multi_locale: bool,
    rating_range: Option<(u8, u8)>,
) {
    if remaining == 0 {
        return;
    }
    let cfg = BrowserCollectorConfig {
        app_id: app_id.to_string(),
        primary_locale: locale.to_string(),
        multi_locale,
        cap: Some(remaining),
    };

    let reviews = match tokio::time::timeout(BROWSER_PHASE_BUDGET, browser_collect(pool, &cfg))
        .await
    {
        Ok(Ok(reviews)) => reviews,
        Ok(Err(e)) => {
            tracing::warn!(error = %e, "browser phase failed, proceeding with feed-only results");
            Vec::new()
        }
        Err(_) => {
            tracing::warn!("browser phase exceeded 300s budget, proceeding with partial results");
            Vec::new()
        }
    };

    let mut guard = accumulator.lock();
    for review in reviews {
        if matches_rating_range(&review, rating_range) {
            guard.insert_if_absent(review);
        }
    }
}

/// Runs the full two-phase pipeline. `pool` is optional so callers that
/// only need feed coverage (or that have no browser available) can skip
/// phase two entirely rather than stub it out.
pub async fn run_pipeline(
    fetcher: Arc<Fetcher>,
    pool: Option<&BrowserPool>,
    request: PipelineRequest,
) -> PipelineResult {
    let accumulator = Arc::new(Mutex::new(Accumulator::new()));

    run_feed_phase(
        fetcher,
        accumulator.clone(),
        &request.app_id,
        &request.locale,
        request.cap,
        request.rating_range,
    )
    .await;

    let current_len = accumulator.lock().len() as u32;
    if current_len < request.cap {
        if let Some(pool) = pool {
            let remaining = request.cap - current_len;
            run_browser_phase(
                pool,
                accumulator.clone(),
                &request.app_id,
                &request.locale,
                remaining,
                request.multi_locale,
                request.rating_range,
            )
            .await;
        }
    }

    let mut reviews = match Arc::try_unwrap(accumulator) {
        Ok(mutex) => mutex.into_inner().into_ordered(),
        Err(arc) => {
            let guard = arc.lock();
            guard
                .order
                .iter()
                .filter_map(|d| guard.by_digest.get(d).cloned())
                .collect()
        }
    };

    reviews.truncate(request.cap as usize);
    let stats = aggregate_stats(&reviews);
    PipelineResult { reviews, stats }
}

pub fn stats_as_json(stats: &PipelineStats) -> Value {
    serde_json::to_value(stats).unwrap_or(Value::Null)
}
