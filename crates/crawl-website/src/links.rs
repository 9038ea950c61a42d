//! Subpage discovery and priority ordering, grounded on
//! `original_source/crawl-service/crawlers/websites.py`'s
//! `_find_relevant_links`: same-domain only, anchors/mailto/tel skipped,
//! ordered by keyword substring relevance (spec.md §4.6).

use std::collections::HashSet;

use scraper::{Html, Selector};
use url::Url;

const PRIORITY_KEYWORDS: &[&str] = &[
    "pricing", "price", "plans", "features", "capabilities", "about",
    "testimonials", "reviews", "faq",
];

fn keyword_rank(path_and_text: &str) -> usize {
    let lower = path_and_text.to_lowercase();
    PRIORITY_KEYWORDS
        .iter()
        .position(|k| lower.contains(k))
        .unwrap_or(PRIORITY_KEYWORDS.len())
}

/// Extracts same-domain subpage links from `html`, deduplicated and
/// ordered by keyword relevance (pricing/features/about/... rank first).
pub fn find_relevant_links(html: &str, base_url: &Url) -> Vec<Url> {
    let doc = Html::parse_document(html);
    let sel = Selector::parse("a[href]").expect("valid selector");

    let mut seen = HashSet::new();
    let mut candidates: Vec<(usize, Url)> = Vec::new();

    for a in doc.select(&sel) {
        let Some(href) = a.value().attr("href") else {
            continue;
        };
        let trimmed = href.trim();
        if trimmed.is_empty()
            || trimmed.starts_with('#')
            || trimmed.starts_with("mailto:")
            || trimmed.starts_with("tel:")
            || trimmed.starts_with("javascript:")
        {
            continue;
        }

        let Ok(resolved) = base_url.join(trimmed) else {
            continue;
        };

        if resolved.host_str() != base_url.host_str() {
            continue;
        }
        if !matches!(resolved.scheme(), "http" | "https") {
            continue;
        }

        let mut normalized = resolved.clone();
        normalized.set_fragment(None);
        if !seen.insert(normalized.to_string()) {
            continue;
        }

        let link_text = a.text().collect::<Vec<_>>().join(" ");
        let rank_input = format!("{} {}", normalized.path(), link_text);
        candidates.push((keyword_rank(&rank_input), normalized));
    }

    candidates.sort_by_key(|(rank, _)| *rank);
    candidates.into_iter().map(|(_, url)| url).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn orders_pricing_links_before_unranked_links() {
        let html = r#"<a href="/blog/post-1">Blog</a>
        <a href="/pricing">Pricing</a>
        <a href="/about">About us</a>"#;
        let base = Url::parse("https://example.com/").unwrap();
        let links = find_relevant_links(html, &base);
        assert_eq!(links[0].path(), "/pricing");
        assert_eq!(links[1].path(), "/about");
        assert_eq!(links[2].path(), "/blog/post-1");
    }

    #[test]
    fn skips_cross_domain_anchor_and_mailto_links() {
        let html = r#"<a href="https://other.com/page">Other</a>
        <a href="#section">Jump</a>
        <a href="mailto:hi@example.com">Mail</a>
        <a href="/features">Features</a>"#;
        let base = Url::parse("https://example.com/").unwrap();
        let links = find_relevant_links(html, &base);
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].path(), "/features");
    }

    #[test]
    fn deduplicates_links_that_differ_only_by_fragment() {
        let html = r#"<a href="/features#top">A</a>
        <a href="/features">B</a>"#;
        let base = Url::parse("https://example.com/").unwrap();
        let links = find_relevant_links(html, &base);
        assert_eq!(links.len(), 1);
    }
}
