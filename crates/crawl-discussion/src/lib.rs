//! Social-discussion deep-dive, per spec.md §4.5: community validation and
//! discovery, an adaptive-threshold community×topic sweep, and depth-3
//! comment recovery over the high-engagement subset.

pub mod client;
pub mod discovery;
pub mod recovery;
pub mod sweep;
pub mod thresholds;

use std::collections::HashMap;

use serde::Serialize;

use crawl_core::DiscussionPost;

use client::DiscussionApiClient;
use discovery::{discover_all, validate_community, ValidatedCommunity};
use recovery::{parse_comment_forest, select_for_recovery};
use sweep::{Accumulator, CommunityYield};
use thresholds::threshold_for;

/// Fallback community list for callers that don't supply their own, per
/// `original_source/crawl-service/crawlers/reddit.py`'s `DEFAULT_SUBREDDITS`.
pub const DEFAULT_SUBREDDITS: &[&str] = &[
    "apps",
    "iphone",
    "ios",
    "apple",
    "productivity",
    "GetMotivated",
    "Entrepreneur",
    "startups",
    "SideProject",
    "androidapps",
];

#[derive(Debug, Clone)]
pub struct DeepDiveRequest {
    pub topics: Vec<String>,
    pub communities: Vec<String>,
    pub time_filter: String,
    pub per_combo_cap: u32,
    pub per_post_comment_cap: u32,
    pub validate: bool,
    pub adaptive: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct TimeRange {
    pub start: i64,
    pub end: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeepDiveResult {
    pub posts: Vec<DiscussionPost>,
    pub community_yield: HashMap<String, CommunityYield>,
    pub topics_searched: Vec<String>,
    pub communities_searched: Vec<String>,
    pub time_range: Option<TimeRange>,
}

/// Result of Phase A run standalone: which seeds were valid/invalid, and
/// which new communities were discovered from their descriptions.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationOutcome {
    pub valid: Vec<String>,
    pub invalid: Vec<String>,
    pub discovered: Vec<String>,
}

/// Runs Phase A (validation + mention-based discovery) standalone, for
/// the `/crawl/reddit/validate-subreddits` endpoint.
pub async fn validate_and_discover(
    client: &DiscussionApiClient,
    seeds: &[String],
) -> (Vec<ValidatedCommunity>, ValidationOutcome) {
    let mut validated = Vec::new();
    let mut abouts = Vec::new();
    let mut valid_names = Vec::new();
    let mut invalid_names = Vec::new();

    for seed in seeds {
        match client.about(seed).await {
            Ok(about) if matches!(about.data.subreddit_type.as_str(), "public" | "restricted") => {
                let name = about.data.display_name.to_lowercase();
                valid_names.push(name.clone());
                validated.push(ValidatedCommunity {
                    name,
                    subscribers: about.data.subscribers,
                });
                let wiki_text = client
                    .wiki_index(seed)
                    .await
                    .map(|w| w.data.content_md)
                    .unwrap_or_default();
                abouts.push((seed.clone(), about.data, wiki_text));
            }
            _ => invalid_names.push(seed.to_lowercase()),
        }
    }

    let discovered_names = discover_all(&abouts);
    let mut discovered_out = Vec::new();
    for name in discovered_names {
        if let Some(v) = validate_community(client, &name).await {
            discovered_out.push(v.name.clone());
            validated.push(v);
        }
    }

    (
        validated,
        ValidationOutcome {
            valid: valid_names,
            invalid: invalid_names,
            discovered: discovered_out,
        },
    )
}

/// Runs the full three-phase deep dive.
pub async fn deep_dive(client: &DiscussionApiClient, request: DeepDiveRequest) -> DeepDiveResult {
    let communities = if request.validate {
        validate_and_discover(client, &request.communities).await.0
    } else {
        request
            .communities
            .iter()
            .map(|name| ValidatedCommunity {
                name: name.to_lowercase(),
                subscribers: 0,
            })
            .collect()
    };

    let mut accumulator = Accumulator::new();
    let mut communities_searched = Vec::new();

    for community in &communities {
        let threshold = threshold_for(community.subscribers, request.adaptive);
        communities_searched.push(community.name.clone());

        for topic in &request.topics {
            let result = client
                .search(
                    &community.name,
                    topic,
                    &request.time_filter,
                    request.per_combo_cap,
                )
                .await;

            let Ok(response) = result else {
                tracing::warn!(community = %community.name, topic = %topic, "sweep request failed, skipping combo");
                continue;
            };

            for child in response.data.children {
                accumulator.offer(&community.name, child.data, threshold, topic);
            }
        }
    }

    let community_yield = accumulator.yield_map();
    let mut posts = accumulator.into_ordered();
    posts.sort_by_key(|p| std::cmp::Reverse(p.engagement_rank()));

    let high_engagement_ids: Vec<String> = select_for_recovery(&posts)
        .into_iter()
        .map(|p| p.id.clone())
        .collect();

    for post in posts.iter_mut() {
        if !high_engagement_ids.contains(&post.id) {
            continue;
        }
        let result = client.comments(&post.community, &post.id).await;
        if let Ok(listings) = result {
            post.comments = parse_comment_forest(&listings, &post.author)
                .into_iter()
                .take(request.per_post_comment_cap.max(1) as usize)
                .collect();
        }
    }

    let time_range = posts
        .iter()
        .map(|p| p.created_utc)
        .fold(None, |acc: Option<(i64, i64)>, t| match acc {
            None => Some((t, t)),
            Some((lo, hi)) => Some((lo.min(t), hi.max(t))),
        })
        .map(|(start, end)| TimeRange { start, end });

    DeepDiveResult {
        posts,
        community_yield,
        topics_searched: request.topics,
        communities_searched,
        time_range,
    }
}
