//! BFS crawl orchestrator: bounded page count, per-page SSRF guard, and
//! merge of per-page extractions into one `WebsiteExtraction`, per
//! spec.md §4.6.

use std::collections::{HashSet, VecDeque};
use std::time::Duration;

use thiserror::Error;
use url::Url;

use crawl_core::Fetcher;

use crate::extract::extract_main_page;
use crate::links::find_relevant_links;
use crate::model::{PageContent, PricingInfo, WebsiteExtraction};
use crate::ssrf::{guard_url, SsrfError};

const INTER_PAGE_DELAY: Duration = Duration::from_millis(500);

#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error(transparent)]
    Ssrf(#[from] SsrfError),
    #[error("root page fetch failed: {0}")]
    RootFetchFailed(String),
}

#[derive(Debug, Clone)]
pub struct ExtractRequest {
    pub url: String,
    pub max_pages: u32,
    pub include_subpages: bool,
    pub extract_pricing: bool,
    pub extract_features: bool,
}

fn merge_page(content: &mut PageContent, page: PageContent, extract_pricing_flag: bool, extract_features_flag: bool) {
    if extract_features_flag {
        for feature in page.features {
            if !content.features.contains(&feature) {
                content.features.push(feature);
            }
        }
    }
    if extract_pricing_flag {
        if content.pricing.is_none() {
            content.pricing = page.pricing;
        } else if let (Some(existing), Some(incoming)) = (content.pricing.as_mut(), page.pricing) {
            merge_pricing(existing, incoming);
        }
    }
    for shot in page.screenshots {
        if !content.screenshots.contains(&shot) {
            content.screenshots.push(shot);
        }
    }
    for testimonial in page.testimonials {
        if !content.testimonials.contains(&testimonial) {
            content.testimonials.push(testimonial);
        }
    }
    for hint in page.technology_hints {
        if !content.technology_hints.contains(&hint) {
            content.technology_hints.push(hint);
        }
    }
    for (platform, link) in page.social_links {
        content.social_links.entry(platform).or_insert(link);
    }
}

fn merge_pricing(existing: &mut PricingInfo, incoming: PricingInfo) {
    existing.plans.extend(incoming.plans);
    existing.has_free_tier = existing.has_free_tier || incoming.has_free_tier;
}

/// Runs the bounded BFS crawl described in spec.md §4.6: extracts the
/// root page, then (if `include_subpages`) follows same-host links in
/// keyword-priority order until `max_pages` pages have been visited.
pub async fn extract(fetcher: &Fetcher, request: ExtractRequest) -> Result<WebsiteExtraction, CrawlError> {
    let root_url = Url::parse(&request.url)?;
    guard_url(&root_url)?;

    let root_html = fetcher
        .fetch_text(root_url.as_str(), None)
        .await
        .map_err(|e| CrawlError::RootFetchFailed(e.to_string()))?;

    let mut content = extract_main_page(&root_html);
    if !request.extract_pricing {
        content.pricing = None;
    }
    if !request.extract_features {
        content.features.clear();
    }

    let mut visited: HashSet<String> = HashSet::new();
    visited.insert(root_url.as_str().to_string());
    let mut crawled_pages = 1u32;

    if request.include_subpages && crawled_pages < request.max_pages {
        let mut queue: VecDeque<Url> = find_relevant_links(&root_html, &root_url).into();

        while crawled_pages < request.max_pages {
            let Some(next_url) = queue.pop_front() else {
                break;
            };
            let key = next_url.as_str().to_string();
            if visited.contains(&key) {
                continue;
            }
            visited.insert(key);

            if guard_url(&next_url).is_err() {
                continue;
            }

            tokio::time::sleep(INTER_PAGE_DELAY).await;

            let html = match fetcher.fetch_text(next_url.as_str(), None).await {
                Ok(html) => html,
                Err(err) => {
                    tracing::warn!(url = %next_url, error = %err, "subpage fetch failed, skipping");
                    continue;
                }
            };

            let mut page_content = extract_main_page(&html);
            if !request.extract_pricing {
                page_content.pricing = None;
            }
            if !request.extract_features {
                page_content.features.clear();
            }

            merge_page(&mut content, page_content, request.extract_pricing, request.extract_features);
            crawled_pages += 1;

            for link in find_relevant_links(&html, &root_url) {
                if !visited.contains(link.as_str()) {
                    queue.push_back(link);
                }
            }
        }
    }

    Ok(WebsiteExtraction {
        url: request.url,
        content,
        crawled_pages,
    })
}
