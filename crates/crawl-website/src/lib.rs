//! Competitor-website content extractor: BFS traversal bounded by page
//! count, an SSRF guard on every fetched URL, and keyword-priority
//! subpage selection, per spec.md §4.6.

pub mod crawler;
pub mod extract;
pub mod links;
pub mod model;
pub mod ssrf;

pub use crawler::{extract as crawl, CrawlError, ExtractRequest};
pub use model::{PageContent, PricingInfo, PricingPlan, WebsiteExtraction};
pub use ssrf::{guard_url, SsrfError};
