//! `WhatsNewEntry` / `PrivacyLabel` extraction, per SPEC_FULL.md §3's
//! supplement. Thin wrappers over the same scoped-browser-context
//! primitive the review collector uses — no new concurrency or rate-limit
//! scope, grounded on
//! `original_source/crawl-service/crawlers/app_store_browser.py`'s
//! `crawl_whats_new` / `crawl_privacy_labels`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::driver::{BrowserDriver, BrowserError, BrowserPool, NavigationOutcome};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhatsNewEntry {
    pub version: String,
    pub release_date: Option<DateTime<Utc>>,
    pub release_notes: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrivacyLabel {
    pub category: String,
    pub data_types: Vec<String>,
    pub purposes: Vec<String>,
}

fn app_page_url(app_id: &str, locale: &str) -> String {
    format!("https://apps.apple.com/{locale}/app/id{app_id}")
}

const WHATS_NEW_SCRIPT: &str = r#"
() => {
  const section = document.querySelector('[class*="whats-new"], section[aria-label*="What"]');
  if (!section) return [];
  const version = section.querySelector('[class*="version"]');
  const date = section.querySelector('time');
  const notes = section.querySelector('p, [class*="notes"]');
  if (!notes) return [];
  return [{
    version: version ? version.innerText.trim() : '',
    release_date: date ? date.getAttribute('datetime') : null,
    release_notes: notes.innerText.trim(),
  }];
}
"#;

const PRIVACY_LABELS_SCRIPT: &str = r#"
() => {
  const cards = Array.from(document.querySelectorAll('[class*="privacy-type"], [class*="privacy-label"]'));
  return cards.map(card => {
    const category = card.querySelector('h3, [class*="category"]');
    const dataTypes = Array.from(card.querySelectorAll('[class*="data-type"]')).map(el => el.innerText.trim());
    const purposes = Array.from(card.querySelectorAll('[class*="purpose"]')).map(el => el.innerText.trim());
    return {
      category: category ? category.innerText.trim() : '',
      data_types: dataTypes,
      purposes,
    };
  }).filter(c => c.category.length > 0);
}
"#;

#[derive(Deserialize)]
struct RawWhatsNewEntry {
    version: String,
    release_date: Option<String>,
    release_notes: String,
}

async fn navigate_app_page(
    driver: &dyn BrowserDriver,
    app_id: &str,
    locale: &str,
) -> Result<(), BrowserError> {
    match driver.navigate(&app_page_url(app_id, locale)).await? {
        NavigationOutcome::Loaded | NavigationOutcome::LoadedAfterRedirect => Ok(()),
    }
}

/// Navigates to the app's storefront page and extracts its "What's New"
/// section, if present.
pub async fn crawl_whats_new(
    pool: &BrowserPool,
    app_id: &str,
    locale: &str,
) -> Result<Vec<WhatsNewEntry>, BrowserError> {
    let scoped = pool.scoped_page().await?;
    let result: Result<Vec<RawWhatsNewEntry>, BrowserError> = async {
        navigate_app_page(&scoped, app_id, locale).await?;
        scoped.eval_json(WHATS_NEW_SCRIPT).await
    }
    .await;
    scoped.close().await;

    let raw = result?;
    Ok(raw
        .into_iter()
        .map(|r| WhatsNewEntry {
            version: r.version,
            release_date: r
                .release_date
                .and_then(|d| DateTime::parse_from_rfc3339(&d).ok())
                .map(|d| d.with_timezone(&Utc)),
            release_notes: r.release_notes,
        })
        .collect())
}

/// Navigates to the app's storefront page and extracts its declared
/// privacy-nutrition labels, if present.
pub async fn crawl_privacy_labels(
    pool: &BrowserPool,
    app_id: &str,
    locale: &str,
) -> Result<Vec<PrivacyLabel>, BrowserError> {
    let scoped = pool.scoped_page().await?;
    let result: Result<Vec<PrivacyLabel>, BrowserError> = async {
        navigate_app_page(&scoped, app_id, locale).await?;
        scoped.eval_json(PRIVACY_LABELS_SCRIPT).await
    }
    .await;
    scoped.close().await;
    result
}
