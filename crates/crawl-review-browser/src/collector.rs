//! Per-locale scroll-and-extract procedure plus the multi-locale sweep
//! orchestrator, per spec.md §4.3.

use std::time::Duration;

use crawl_core::{Review, ReviewSource};

use crate::driver::{BrowserDriver, BrowserError, BrowserPool, NavigationOutcome};
use crate::extract::RawExtractedReview;
use crate::locales::build_locale_sweep;

pub const MAX_SCROLL_ITERATIONS: u32 = 25;
pub const CONSECUTIVE_ZERO_NEW_THRESHOLD: u32 = 5;
const WAIT_TIER_ONE: Duration = Duration::from_millis(2500);
const WAIT_TIER_TWO: Duration = Duration::from_millis(1500);
const WAIT_TIER_BOUNDARY: u32 = 5;
const INTER_LOCALE_DELAY: Duration = Duration::from_millis(1500);

#[derive(Debug, Clone)]
pub struct BrowserCollectorConfig {
    pub app_id: String,
    pub primary_locale: String,
    pub multi_locale: bool,
    pub cap: Option<u32>,
}

fn reviews_page_url(app_id: &str, locale: &str) -> String {
    format!("https://apps.apple.com/{locale}/app/id{app_id}?see-all=reviews")
}

fn into_review(raw: RawExtractedReview, locale: &str) -> Review {
    Review::new(
        raw.id,
        raw.title,
        raw.content,
        raw.rating,
        raw.author,
        None,
        0,
        0,
        locale.to_string(),
        "mostRecent".to_string(),
        ReviewSource::Browser,
    )
}

/// Runs the scroll-and-extract loop against an already-navigated page,
/// stopping at the iteration cap, the consecutive-zero-new threshold, or
/// the remaining item budget, whichever comes first.
async fn scroll_and_extract(
    driver: &dyn BrowserDriver,
    locale: &str,
    remaining: usize,
) -> Result<Vec<Review>, BrowserError> {
    let mut seen_prefixes = std::collections::HashSet::new();
    let mut collected = Vec::new();
    let mut consecutive_zero_new = 0u32;

    for iteration in 0..MAX_SCROLL_ITERATIONS {
        let raw = driver.extract_reviews().await?;
        let mut new_this_round = 0u32;
        for r in raw {
            let prefix: String = r.content.chars().take(100).collect();
            if seen_prefixes.insert(prefix) {
                collected.push(into_review(r, locale));
                new_this_round += 1;
                if collected.len() >= remaining {
                    return Ok(collected);
                }
            }
        }

        if new_this_round == 0 {
            consecutive_zero_new += 1;
            if consecutive_zero_new >= CONSECUTIVE_ZERO_NEW_THRESHOLD {
                break;
            }
        } else {
            consecutive_zero_new = 0;
        }

        driver.scroll().await?;
        let wait = if iteration < WAIT_TIER_BOUNDARY {
            WAIT_TIER_ONE
        } else {
            WAIT_TIER_TWO
        };
        tokio::time::sleep(wait).await;
    }

    Ok(collected)
}

/// The full single-locale procedure: navigate, attempt the "See All
/// Reviews" affordance, then scroll-and-extract. Isolated from the
/// multi-locale loop so a single locale's failure never aborts the sweep.
pub async fn collect_locale(
    driver: &dyn BrowserDriver,
    app_id: &str,
    locale: &str,
    remaining: usize,
) -> Result<Vec<Review>, BrowserError> {
    let url = reviews_page_url(app_id, locale);
    match driver.navigate(&url).await? {
        NavigationOutcome::Loaded | NavigationOutcome::LoadedAfterRedirect => {}
    }
    driver.click_see_all_reviews().await;
    scroll_and_extract(driver, locale, remaining).await
}

/// Sweeps the primary locale and, when eligible, a cap-scaled set of
/// priority locales, pooling results with cross-locale de-duplication by
/// content prefix and an overall cap. Per-locale failures are logged and
/// skipped rather than aborting the whole crawl.
pub async fn collect(
    pool: &BrowserPool,
    cfg: &BrowserCollectorConfig,
) -> Result<Vec<Review>, BrowserError> {
    let cap = cfg.cap.unwrap_or(u32::MAX) as usize;
    let locales = build_locale_sweep(&cfg.primary_locale, cfg.multi_locale, cfg.cap.unwrap_or(0));

    let mut seen_prefixes = std::collections::HashSet::new();
    let mut out = Vec::new();

    for (idx, locale) in locales.iter().enumerate() {
        if out.len() >= cap {
            break;
        }
        let remaining = cap - out.len();

        let scoped = pool.scoped_page().await?;
        let result = collect_locale(&scoped, &cfg.app_id, locale, remaining).await;
        scoped.close().await;

        match result {
            Ok(reviews) => {
                for review in reviews {
                    let prefix: String = review.content.chars().take(100).collect();
                    if seen_prefixes.insert(prefix) {
                        out.push(review);
                        if out.len() >= cap {
                            break;
                        }
                    }
                }
            }
            Err(e) => {
                tracing::warn!(locale = %locale, error = %e, "locale crawl failed, skipping");
            }
        }

        if idx + 1 < locales.len() && out.len() < cap {
            tokio::time::sleep(INTER_LOCALE_DELAY).await;
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::BrowserDriver;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct MockDriver {
        /// Each call to `extract_reviews` pops the next page from this list.
        pages: Mutex<Vec<Vec<RawExtractedReview>>>,
        navigate_calls: AtomicUsize,
        scroll_calls: AtomicUsize,
    }

    impl MockDriver {
        fn new(pages: Vec<Vec<RawExtractedReview>>) -> Self {
            Self {
                pages: Mutex::new(pages),
                navigate_calls: AtomicUsize::new(0),
                scroll_calls: AtomicUsize::new(0),
            }
        }
    }

    fn raw(id: &str, content: &str) -> RawExtractedReview {
        RawExtractedReview {
            id: id.to_string(),
            title: "title".to_string(),
            rating: Some(4),
            date: None,
            author: "author".to_string(),
            content: content.to_string(),
        }
    }

    #[async_trait]
    impl BrowserDriver for MockDriver {
        async fn navigate(&self, _url: &str) -> Result<crate::driver::NavigationOutcome, BrowserError> {
            self.navigate_calls.fetch_add(1, Ordering::SeqCst);
            Ok(crate::driver::NavigationOutcome::Loaded)
        }

        async fn click_see_all_reviews(&self) -> bool {
            true
        }

        async fn extract_reviews(&self) -> Result<Vec<RawExtractedReview>, BrowserError> {
            let mut pages = self.pages.lock().unwrap();
            if pages.is_empty() {
                Ok(Vec::new())
            } else {
                Ok(pages.remove(0))
            }
        }

        async fn scroll(&self) -> Result<bool, BrowserError> {
            self.scroll_calls.fetch_add(1, Ordering::SeqCst);
            Ok(true)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn stops_after_five_consecutive_empty_scrolls() {
        let pages = vec![
            vec![raw("1", "first review content long enough")],
            vec![],
            vec![],
            vec![],
            vec![],
            vec![],
        ];
        let driver = MockDriver::new(pages);
        let reviews = collect_locale(&driver, "123", "us", 1000).await.unwrap();
        assert_eq!(reviews.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stops_early_once_remaining_budget_is_exhausted() {
        let pages = vec![
            vec![raw("1", "alpha review content long enough text")],
            vec![raw("2", "beta review content long enough text")],
            vec![raw("3", "gamma review content long enough text")],
        ];
        let driver = MockDriver::new(pages);
        let reviews = collect_locale(&driver, "123", "us", 2).await.unwrap();
        assert_eq!(reviews.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn duplicate_content_prefix_within_a_locale_is_not_double_counted() {
        let pages = vec![
            vec![raw("1", "same review content appearing twice here")],
            vec![raw("2", "same review content appearing twice here")],
            vec![],
            vec![],
            vec![],
            vec![],
        ];
        let driver = MockDriver::new(pages);
        let reviews = collect_locale(&driver, "123", "us", 1000).await.unwrap();
        assert_eq!(reviews.len(), 1);
    }
}
