//! SSE event payloads for feed-mode review streaming, per spec.md §6's
//! event-type table. Each variant serializes as `{"type": "...", ...}`.

use crawl_core::Review;
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum FeedEvent {
    Start {
        filters: Vec<String>,
        total_target_reviews: u32,
    },
    Progress {
        filter: String,
        filter_index: usize,
        page: u32,
        max_pages: u32,
        reviews_this_page: usize,
        new_unique_this_page: usize,
        filter_reviews_total: u32,
        total_unique: usize,
        next_delay_ms: u64,
    },
    Throttle {
        filter: String,
        page: u32,
        new_delay_multiplier: f64,
        message: String,
    },
    FilterTargetReached {
        filter: String,
        filter_reviews_total: u32,
    },
    FilterEarlyStop {
        filter: String,
        page: u32,
        message: String,
    },
    FilterSkipped {
        filter: String,
        message: String,
    },
    FilterComplete {
        filter: String,
        filter_reviews_total: u32,
    },
    FilterCooldown {
        filter: String,
        next_filter: Option<String>,
        new_delay_multiplier: f64,
        cooldown_seconds: f64,
    },
    Complete {
        reviews: Vec<Review>,
        stats: Value,
    },
    Error {
        message: String,
    },
}
