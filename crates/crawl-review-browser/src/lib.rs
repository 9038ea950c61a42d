//! Scripted headless-browser review collector, per spec.md §4.3: a
//! fallback used when the feed collector under-delivers, driving a real
//! browser through the storefront's reviews modal.

pub mod collector;
pub mod driver;
pub mod extract;
pub mod locales;
pub mod whatsnew;

pub use collector::{collect, collect_locale, BrowserCollectorConfig};
pub use driver::{BrowserDriver, BrowserError, BrowserPool, NavigationOutcome, ScopedPage};
pub use extract::RawExtractedReview;
pub use locales::build_locale_sweep;
pub use whatsnew::{crawl_privacy_labels, crawl_whats_new, PrivacyLabel, WhatsNewEntry};
