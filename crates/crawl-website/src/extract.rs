//! Per-page extraction heuristics, grounded directly on
//! `original_source/crawl-service/crawlers/websites.py`'s selector lists,
//! length thresholds, and tech/social regex dictionaries (spec.md §4.6).

use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use crate::model::{PageContent, PricingInfo, PricingPlan};

const HERO_SELECTORS: &[&str] = &["hero", "jumbotron", "banner", "[class*=hero]", "header"];
const FEATURE_CONTAINER_SELECTOR: &str = "[class*=feature], [class*=benefit]";
const PRICING_CONTAINER_SELECTOR: &str = "[class*=pricing], [class*=plan], [class*=tier]";
const SCREENSHOT_SELECTORS: &[&str] = &[
    "img[class*=screenshot]",
    "img[class*=product]",
    "img[class*=preview]",
    "img[alt*=screenshot]",
];
const TESTIMONIAL_SELECTOR: &str = "[class*=testimonial], [class*=review], blockquote";
const SCREENSHOT_SKIP_SUBSTRINGS: &[&str] = &["icon", "logo", "avatar", "profile"];

const TECH_PATTERNS: &[(&str, &[&str])] = &[
    ("React", &["react", "_reactRoot"]),
    ("Vue.js", &["vue", "__vue__"]),
    ("Angular", &["ng-app", "angular"]),
    ("Next.js", &["__NEXT_DATA__", "next/"]),
    ("Nuxt.js", &["__nuxt", "nuxt"]),
    ("Tailwind CSS", &["tailwind"]),
    ("Bootstrap", &["bootstrap"]),
    ("jQuery", &["jquery"]),
    ("WordPress", &["wp-content", "wordpress"]),
    ("Shopify", &["shopify", "cdn.shopify"]),
    ("Webflow", &["webflow"]),
    ("Stripe", &["stripe.js", "stripe.com"]),
    ("Intercom", &["intercom"]),
    ("Segment", &["segment.com", "analytics.js"]),
    ("Google Analytics", &["google-analytics", "gtag"]),
    ("Hotjar", &["hotjar"]),
    ("Cloudflare", &["cloudflare"]),
];

const SOCIAL_PATTERNS: &[(&str, &str)] = &[
    ("twitter", r"twitter\.com/\w+"),
    ("facebook", r"facebook\.com/\w+"),
    ("linkedin", r"linkedin\.com/(company|in)/\w+"),
    ("instagram", r"instagram\.com/\w+"),
    ("youtube", r"youtube\.com/(c|channel|user)/\w+"),
    ("github", r"github\.com/\w+"),
    ("discord", r"discord\.(gg|com)"),
];

fn selector(css: &str) -> Selector {
    Selector::parse(css).unwrap_or_else(|_| Selector::parse("nosuchtag").unwrap())
}

fn text_of(el: ElementRef) -> String {
    el.text().collect::<Vec<_>>().join(" ").trim().to_string()
}

pub fn extract_title(doc: &Html) -> String {
    doc.select(&selector("title"))
        .next()
        .map(text_of)
        .unwrap_or_default()
}

pub fn extract_description(doc: &Html) -> String {
    let meta_desc = selector("meta[name=description]");
    if let Some(el) = doc.select(&meta_desc).next() {
        if let Some(content) = el.value().attr("content") {
            if !content.is_empty() {
                return content.to_string();
            }
        }
    }
    let og_desc = selector("meta[property='og:description']");
    doc.select(&og_desc)
        .next()
        .and_then(|el| el.value().attr("content"))
        .unwrap_or_default()
        .to_string()
}

/// First of the fixed selector list, truncated to 1000 characters.
pub fn extract_hero_text(doc: &Html) -> String {
    for css in HERO_SELECTORS {
        let sel = selector(css);
        if let Some(el) = doc.select(&sel).next() {
            let text = text_of(el);
            if !text.is_empty() {
                return text.chars().take(1000).collect();
            }
        }
    }
    String::new()
}

/// Union over feature-like containers of their heading text (5 < len <
/// 100) and first ten list items (5 < len < 200), deduplicated.
pub fn extract_features(doc: &Html) -> Vec<String> {
    let container_sel = selector(FEATURE_CONTAINER_SELECTOR);
    let heading_sel = selector("h2, h3, h4, strong, b");
    let li_sel = selector("li");

    let mut seen = HashSet::new();
    let mut out = Vec::new();

    for container in doc.select(&container_sel) {
        if let Some(heading) = container.select(&heading_sel).next() {
            let text = text_of(heading);
            if text.chars().count() > 5 && text.chars().count() < 100 && seen.insert(text.clone()) {
                out.push(text);
            }
        }
        for li in container.select(&li_sel).take(10) {
            let text = text_of(li);
            if text.chars().count() > 5 && text.chars().count() < 200 && seen.insert(text.clone()) {
                out.push(text);
            }
        }
    }

    out
}

fn detect_free_tier(price_text: &str) -> bool {
    let lower = price_text.to_lowercase();
    ["free", "$0", "0/mo"].iter().any(|s| lower.contains(s))
}

fn detect_currency(price_text: &str) -> Option<&'static str> {
    if price_text.contains('$') {
        Some("USD")
    } else if price_text.contains('€') {
        Some("EUR")
    } else if price_text.contains('£') {
        Some("GBP")
    } else {
        None
    }
}

/// One entry per container whose class contains `pricing`, `plan`, or
/// `tier`; captures a name, price string, and up to 10 feature items.
pub fn extract_pricing(doc: &Html) -> Option<PricingInfo> {
    let container_sel = selector(PRICING_CONTAINER_SELECTOR);
    let name_sel = selector("h2, h3, [class*=title]");
    let price_sel = selector("[class*=price]");
    let li_sel = selector("li");

    let mut plans = Vec::new();
    let mut has_free_tier = false;
    let mut currency = "USD".to_string();

    for container in doc.select(&container_sel) {
        let name = container.select(&name_sel).next().map(text_of);
        let price_text = container.select(&price_sel).next().map(text_of);

        if let Some(ref price) = price_text {
            if detect_free_tier(price) {
                has_free_tier = true;
            }
            if let Some(c) = detect_currency(price) {
                currency = c.to_string();
            }
        }

        let features: Vec<String> = container
            .select(&li_sel)
            .take(10)
            .map(text_of)
            .filter(|t| !t.is_empty())
            .collect();

        if name.is_some() || price_text.is_some() {
            plans.push(PricingPlan {
                name,
                price_text,
                features,
            });
        }
    }

    if plans.is_empty() {
        None
    } else {
        Some(PricingInfo {
            plans,
            has_free_tier,
            currency,
        })
    }
}

/// Screenshot/product/preview-classed images, excluding icon/logo/avatar/
/// profile src substrings.
pub fn extract_screenshots(doc: &Html) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();

    for css in SCREENSHOT_SELECTORS {
        let sel = selector(css);
        for img in doc.select(&sel) {
            let src = img
                .value()
                .attr("src")
                .or_else(|| img.value().attr("data-src"));
            if let Some(src) = src {
                let lower = src.to_lowercase();
                if SCREENSHOT_SKIP_SUBSTRINGS.iter().any(|s| lower.contains(s)) {
                    continue;
                }
                if seen.insert(src.to_string()) {
                    out.push(src.to_string());
                }
            }
        }
    }

    out
}

/// Testimonial/review/blockquote text content, 20-500 characters.
pub fn extract_testimonials(doc: &Html) -> Vec<String> {
    let sel = selector(TESTIMONIAL_SELECTOR);
    doc.select(&sel)
        .filter_map(|el| {
            let text = text_of(el);
            let len = text.chars().count();
            (len > 20 && len < 500).then_some(text)
        })
        .take(10)
        .collect()
}

/// Fixed-dictionary substring matches over the raw HTML source.
pub fn detect_technology(html: &str) -> Vec<String> {
    let lower = html.to_lowercase();
    TECH_PATTERNS
        .iter()
        .filter(|(_, patterns)| patterns.iter().any(|p| lower.contains(&p.to_lowercase())))
        .map(|(name, _)| name.to_string())
        .collect()
}

fn social_patterns() -> &'static Vec<(&'static str, Regex)> {
    static PATTERNS: OnceLock<Vec<(&'static str, Regex)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        SOCIAL_PATTERNS
            .iter()
            .map(|(platform, pattern)| {
                (*platform, Regex::new(&format!("(?i){pattern}")).expect("valid regex"))
            })
            .collect()
    })
}

/// First matching `<a href>` per platform, per spec.md §4.6.
pub fn extract_social_links(doc: &Html) -> HashMap<String, String> {
    let a_sel = selector("a[href]");
    let mut out = HashMap::new();

    for a in doc.select(&a_sel) {
        let Some(href) = a.value().attr("href") else {
            continue;
        };
        for (platform, re) in social_patterns() {
            if out.contains_key(*platform) {
                continue;
            }
            if re.is_match(href) {
                out.insert(platform.to_string(), href.to_string());
            }
        }
    }

    out
}

/// Runs the full main-page extraction pass, per spec.md §4.6.
pub fn extract_main_page(html: &str) -> PageContent {
    let doc = Html::parse_document(html);
    PageContent {
        title: extract_title(&doc),
        description: extract_description(&doc),
        hero_text: extract_hero_text(&doc),
        features: extract_features(&doc),
        pricing: extract_pricing(&doc),
        screenshots: extract_screenshots(&doc),
        testimonials: extract_testimonials(&doc),
        technology_hints: detect_technology(html),
        social_links: extract_social_links(&doc),
    }
}
