//! Browser lifecycle: a single launched process, mutex-serialized context
//! creation, and a scoped context+tab guard torn down on every exit path.
//! Grounded on `dashflow-playwright`'s `BrowserState` (context kept alive
//! behind `Arc<Mutex<..>>` so page references stay valid).

use async_trait::async_trait;
use parking_lot::Mutex as SyncMutex;
use playwright::api::{Browser, BrowserContext, Page, Playwright};
use tokio::sync::Mutex as AsyncMutex;

#[derive(Debug, thiserror::Error)]
pub enum BrowserError {
    #[error("failed to launch browser: {0}")]
    Launch(String),
    #[error("failed to create browser context: {0}")]
    Context(String),
    #[error("navigation to {url} failed: {message}")]
    Navigation { url: String, message: String },
    #[error("script evaluation failed: {0}")]
    Eval(String),
}

/// Anti-automation launch flags, per
/// `original_source/crawl-service/crawlers/app_store_browser.py`.
const LAUNCH_ARGS: &[&str] = &[
    "--disable-blink-features=AutomationControlled",
    "--disable-dev-shm-usage",
    "--no-sandbox",
];

pub enum NavigationOutcome {
    Loaded,
    LoadedAfterRedirect,
}

/// Behavior a per-locale crawl needs from a live page. Abstracted behind a
/// trait so the per-locale control flow (collector.rs) is testable without
/// a real browser — mirrors the trait-behind-`async_trait` shape the
/// teacher uses for its own tool abstractions (e.g. `dashflow-reddit`'s
/// `RedditSearchTool`).
#[async_trait]
pub trait BrowserDriver: Send + Sync {
    async fn navigate(&self, url: &str) -> Result<NavigationOutcome, BrowserError>;
    /// Attempts the "See All Reviews" affordance; a failure is logged and
    /// non-fatal, per spec.md §4.3.
    async fn click_see_all_reviews(&self) -> bool;
    async fn extract_reviews(&self) -> Result<Vec<crate::extract::RawExtractedReview>, BrowserError>;
    /// Scrolls one iteration; returns whether a modal container was
    /// scrolled (`true`) or the document fallback was used (`false`).
    async fn scroll(&self) -> Result<bool, BrowserError>;
}

/// A scoped context+page pair. Callers must call `close` on every exit
/// path (including error returns) to tear down the underlying context and
/// page; `Drop` cannot do this itself since context/page teardown is
/// async, so it only warns if a scope was dropped still holding resources.
pub struct ScopedPage {
    context: Option<BrowserContext>,
    page: Option<Page>,
}

impl ScopedPage {
    /// Evaluates an arbitrary in-page script and deserializes its return
    /// value. Used by operations (`whatsnew.rs`) that don't fit the fixed
    /// `BrowserDriver` surface.
    pub async fn eval_json<T: serde::de::DeserializeOwned>(
        &self,
        script: &str,
    ) -> Result<T, BrowserError> {
        let page = self.page.as_ref().expect("page present while scope is open");
        page.eval(script).await.map_err(|e| BrowserError::Eval(e.to_string()))
    }

    pub async fn close(mut self) {
        if let Some(page) = self.page.take() {
            let _ = page.close(None).await;
        }
        if let Some(context) = self.context.take() {
            let _ = context.close().await;
        }
    }
}

impl Drop for ScopedPage {
    fn drop(&mut self) {
        if self.page.is_some() || self.context.is_some() {
            tracing::warn!("ScopedPage dropped without explicit close; resources may leak");
        }
    }
}

#[async_trait]
impl BrowserDriver for ScopedPage {
    async fn navigate(&self, url: &str) -> Result<NavigationOutcome, BrowserError> {
        let page = self.page.as_ref().expect("page present while scope is open");
        match page.goto_builder(url).goto().await {
            Ok(Some(resp)) => {
                let status = resp.status().unwrap_or(0);
                if (200..300).contains(&status) {
                    Ok(NavigationOutcome::Loaded)
                } else if (300..400).contains(&status) {
                    Ok(NavigationOutcome::LoadedAfterRedirect)
                } else {
                    Err(BrowserError::Navigation {
                        url: url.to_string(),
                        message: format!("status {status}"),
                    })
                }
            }
            Ok(None) => Ok(NavigationOutcome::Loaded),
            Err(e) => Err(BrowserError::Navigation {
                url: url.to_string(),
                message: e.to_string(),
            }),
        }
    }

    async fn click_see_all_reviews(&self) -> bool {
        let page = self.page.as_ref().expect("page present while scope is open");
        const LOCATOR_ATTEMPTS: &[&str] = &[
            "text=See All",
            "[aria-label*='See All Reviews' i]",
            "button[class*='see-all']",
        ];
        for locator in LOCATOR_ATTEMPTS {
            if page.click_builder(locator).click().await.is_ok() {
                return true;
            }
        }
        false
    }

    async fn extract_reviews(&self) -> Result<Vec<crate::extract::RawExtractedReview>, BrowserError> {
        let page = self.page.as_ref().expect("page present while scope is open");
        page.eval(crate::extract::EXTRACT_REVIEWS_SCRIPT)
            .await
            .map_err(|e| BrowserError::Eval(e.to_string()))
    }

    async fn scroll(&self) -> Result<bool, BrowserError> {
        let page = self.page.as_ref().expect("page present while scope is open");
        page.eval(crate::extract::SCROLL_SCRIPT)
            .await
            .map_err(|e| BrowserError::Eval(e.to_string()))
    }
}

/// Owns the single launched browser process and serializes context
/// creation behind a dedicated mutex, per spec.md §4.3/§5: "concurrent
/// `new-context` calls on the underlying driver are not safe."
pub struct BrowserPool {
    _playwright: Playwright,
    browser: Browser,
    context_lock: AsyncMutex<()>,
}

impl BrowserPool {
    pub async fn launch() -> Result<Self, BrowserError> {
        let playwright = Playwright::initialize()
            .await
            .map_err(|e| BrowserError::Launch(e.to_string()))?;
        let chromium = playwright.chromium();
        let browser = chromium
            .launcher()
            .headless(true)
            .args(LAUNCH_ARGS)
            .launch()
            .await
            .map_err(|e| BrowserError::Launch(e.to_string()))?;
        Ok(Self {
            _playwright: playwright,
            browser,
            context_lock: AsyncMutex::new(()),
        })
    }

    /// Allocates a fresh isolated context and a single tab, guaranteeing
    /// cookie/state isolation between locales.
    pub async fn scoped_page(&self) -> Result<ScopedPage, BrowserError> {
        let _guard = self.context_lock.lock().await;
        let context = self
            .browser
            .context_builder()
            .build()
            .await
            .map_err(|e| BrowserError::Context(e.to_string()))?;
        let page = context
            .new_page()
            .await
            .map_err(|e| BrowserError::Context(e.to_string()))?;
        Ok(ScopedPage {
            context: Some(context),
            page: Some(page),
        })
    }
}

/// Avoids an unused-import lint in crates that only reference `SyncMutex`
/// through re-exports.
pub type _ContextLockMarker = SyncMutex<()>;
