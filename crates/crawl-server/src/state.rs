//! Shared state threaded through every handler, per spec.md §6.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Semaphore;

use crawl_config::Config;
use crawl_core::Fetcher;
use crawl_discussion::client::DiscussionApiClient;
use crawl_jobs::JobRegistry;
use crawl_review_browser::BrowserPool;

/// Application state shared across handlers, cloned cheaply (every field
/// is an `Arc`). The browser pool is optional: if Playwright failed to
/// launch at startup, review requests degrade to feed-only and website/
/// app-store browser-backed endpoints return a descriptive error.
#[derive(Clone)]
pub struct AppState {
    pub fetcher: Arc<Fetcher>,
    pub browser_pool: Option<Arc<BrowserPool>>,
    pub discussion_client: Arc<DiscussionApiClient>,
    pub jobs: Arc<JobRegistry>,
    pub config: Arc<Config>,
    /// The concurrent-request semaphore: the principal backpressure
    /// mechanism per spec.md §5. `try_acquire` failure maps to HTTP 429.
    pub concurrency: Arc<Semaphore>,
    pub started_at: Instant,
}
