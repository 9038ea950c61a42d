//! Extracted-content entities, per spec.md §4.6.

use std::collections::HashMap;

use serde::Serialize;

#[derive(Debug, Clone, Default, Serialize)]
pub struct PricingPlan {
    pub name: Option<String>,
    pub price_text: Option<String>,
    pub features: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PricingInfo {
    pub plans: Vec<PricingPlan>,
    pub has_free_tier: bool,
    pub currency: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PageContent {
    pub title: String,
    pub description: String,
    pub hero_text: String,
    pub features: Vec<String>,
    pub pricing: Option<PricingInfo>,
    pub screenshots: Vec<String>,
    pub testimonials: Vec<String>,
    pub technology_hints: Vec<String>,
    pub social_links: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct WebsiteExtraction {
    pub url: String,
    pub content: PageContent,
    pub crawled_pages: u32,
}
