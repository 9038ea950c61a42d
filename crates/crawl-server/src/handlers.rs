//! Request handlers for every endpoint in spec.md §6's table, grounded on
//! `dashflow-langserve`'s `handler.rs` (`AppState` extraction, `Sse`
//! streaming via `async_stream::stream!`, metadata-at-the-end framing).

use std::convert::Infallible;

use axum::extract::{Path, Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::Json;
use futures::Stream;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crawl_discussion::{
    deep_dive, validate_and_discover, DeepDiveRequest, DEFAULT_SUBREDDITS,
};
use crawl_review_browser::{crawl_privacy_labels, crawl_whats_new};
use crawl_review_feed::{collect_streaming, FeedCollectorConfig};
use crawl_review_pipeline::{run_pipeline, PipelineRequest};
use crawl_website::{crawl as website_crawl, ExtractRequest};

use crate::error::{ApiError, Result};
use crate::state::AppState;

pub async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "uptime_seconds": state.started_at.elapsed().as_secs(),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

#[derive(Debug, Deserialize)]
pub struct ReviewsRequest {
    pub app_id: String,
    pub country: String,
    pub max_reviews: u32,
    pub min_rating: Option<u8>,
    pub max_rating: Option<u8>,
    pub multi_country: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct StreamQuery {
    #[serde(default)]
    pub stream: bool,
}

fn validate_reviews_request(request: &ReviewsRequest) -> Result<()> {
    if !(1..=10_000).contains(&request.max_reviews) {
        return Err(ApiError::InvalidRequest(
            "max_reviews must be between 1 and 10000".to_string(),
        ));
    }
    Ok(())
}

pub async fn reviews_handler(
    State(state): State<AppState>,
    Query(query): Query<StreamQuery>,
    Json(request): Json<ReviewsRequest>,
) -> Result<axum::response::Response> {
    validate_reviews_request(&request)?;

    if query.stream {
        return Ok(reviews_stream(state, request).await.into_response());
    }

    let rating_range = match (request.min_rating, request.max_rating) {
        (None, None) => None,
        (min, max) => Some((min.unwrap_or(1), max.unwrap_or(5))),
    };

    let pipeline_request = PipelineRequest {
        app_id: request.app_id.clone(),
        locale: request.country.clone(),
        cap: request.max_reviews,
        rating_range,
        multi_locale: request.multi_country.unwrap_or(false),
    };

    let result = run_pipeline(
        state.fetcher.clone(),
        state.browser_pool.as_deref(),
        pipeline_request,
    )
    .await;

    let total = result.reviews.len();

    Ok(Json(json!({
        "app_id": request.app_id,
        "country": request.country,
        "reviews": result.reviews,
        "stats": {
            "total": total,
            "average_rating": result.stats.average_rating,
            "rating_distribution": result.stats.rating_histogram,
            "sources": {
                "feed": result.stats.feed_count,
                "browser": result.stats.browser_count,
            },
        },
    }))
    .into_response())
}

/// Feed-mode-only SSE streaming, per spec.md §6's event table. The
/// browser phase isn't representable as incremental SSE progress (a
/// scripted scroll loop has no natural per-page granularity to report),
/// so streaming mode covers the feed collector only.
async fn reviews_stream(
    state: AppState,
    request: ReviewsRequest,
) -> Sse<impl Stream<Item = std::result::Result<Event, Infallible>>> {
    let cfg = FeedCollectorConfig {
        app_id: request.app_id,
        locale: request.country,
        cap: Some(request.max_reviews),
        ..Default::default()
    };

    let mut events = Box::pin(collect_streaming(state.fetcher.clone(), cfg));
    let sse_stream = async_stream::stream! {
        use futures::StreamExt;
        while let Some(event) = events.next().await {
            if let Ok(sse_event) = Event::default().json_data(&event) {
                yield Ok(sse_event);
            }
        }
    };

    Sse::new(sse_stream).keep_alive(KeepAlive::default())
}

#[derive(Debug, Deserialize)]
pub struct AppStoreRequest {
    pub app_id: String,
    pub country: String,
}

pub async fn whats_new_handler(
    State(state): State<AppState>,
    Json(request): Json<AppStoreRequest>,
) -> Result<Json<Value>> {
    let pool = state
        .browser_pool
        .as_ref()
        .ok_or_else(|| ApiError::Upstream("browser pool unavailable".to_string()))?;

    let versions = crawl_whats_new(pool, &request.app_id, &request.country)
        .await
        .map_err(|e| ApiError::Upstream(e.to_string()))?;

    Ok(Json(json!({
        "app_id": request.app_id,
        "country": request.country,
        "versions": versions,
    })))
}

pub async fn privacy_handler(
    State(state): State<AppState>,
    Json(request): Json<AppStoreRequest>,
) -> Result<Json<Value>> {
    let pool = state
        .browser_pool
        .as_ref()
        .ok_or_else(|| ApiError::Upstream("browser pool unavailable".to_string()))?;

    let privacy_labels = crawl_privacy_labels(pool, &request.app_id, &request.country)
        .await
        .map_err(|e| ApiError::Upstream(e.to_string()))?;

    Ok(Json(json!({
        "app_id": request.app_id,
        "country": request.country,
        "privacy_labels": privacy_labels,
    })))
}

#[derive(Debug, Deserialize)]
pub struct RedditRequest {
    pub keywords: Vec<String>,
    pub subreddits: Option<Vec<String>>,
    pub max_posts: u32,
    pub max_comments_per_post: u32,
    pub time_filter: String,
    #[serde(default)]
    pub sort: Option<String>,
}

fn validate_keywords(keywords: &[String]) -> Result<()> {
    if keywords.is_empty() || keywords.len() > 10 {
        return Err(ApiError::InvalidRequest(
            "keywords must contain between 1 and 10 entries".to_string(),
        ));
    }
    Ok(())
}

fn validate_subreddits(subreddits: &[String]) -> Result<()> {
    if subreddits.len() > 20 {
        return Err(ApiError::InvalidRequest(
            "subreddits must contain at most 20 entries".to_string(),
        ));
    }
    Ok(())
}

pub async fn reddit_handler(
    State(state): State<AppState>,
    Json(request): Json<RedditRequest>,
) -> Result<Json<Value>> {
    validate_keywords(&request.keywords)?;
    let communities = request.subreddits.unwrap_or_else(|| {
        DEFAULT_SUBREDDITS.iter().map(|s| s.to_string()).collect()
    });
    validate_subreddits(&communities)?;

    let deep_dive_request = DeepDiveRequest {
        topics: request.keywords,
        communities,
        time_filter: request.time_filter,
        per_combo_cap: request.max_posts,
        per_post_comment_cap: request.max_comments_per_post,
        validate: false,
        adaptive: false,
    };

    let result = deep_dive(&state.discussion_client, deep_dive_request).await;

    Ok(Json(json!({
        "posts": result.posts,
        "success": true,
    })))
}

#[derive(Debug, Deserialize)]
pub struct DeepDiveHttpRequest {
    pub search_topics: Vec<String>,
    pub subreddits: Vec<String>,
    pub time_filter: String,
    pub max_posts_per_combo: u32,
    pub max_comments_per_post: u32,
    pub validate_subreddits: Option<bool>,
    pub use_adaptive_thresholds: Option<bool>,
}

pub async fn reddit_deep_dive_handler(
    State(state): State<AppState>,
    Json(request): Json<DeepDiveHttpRequest>,
) -> Result<Json<Value>> {
    validate_keywords(&request.search_topics)?;
    validate_subreddits(&request.subreddits)?;
    if !(1..=100).contains(&request.max_posts_per_combo) {
        return Err(ApiError::InvalidRequest(
            "max_posts_per_combo must be between 1 and 100".to_string(),
        ));
    }

    let validate = request.validate_subreddits.unwrap_or(false);
    let adaptive = request.use_adaptive_thresholds.unwrap_or(false);

    let validation = if validate {
        let (_, outcome) = validate_and_discover(&state.discussion_client, &request.subreddits).await;
        Some(outcome)
    } else {
        None
    };

    let deep_dive_request = DeepDiveRequest {
        topics: request.search_topics,
        communities: request.subreddits,
        time_filter: request.time_filter,
        per_combo_cap: request.max_posts_per_combo,
        per_post_comment_cap: request.max_comments_per_post,
        validate,
        adaptive,
    };

    let result = deep_dive(&state.discussion_client, deep_dive_request).await;

    Ok(Json(json!({
        "posts": result.posts,
        "stats": {
            "subreddit_stats": result.community_yield,
            "topics_searched": result.topics_searched,
            "communities_searched": result.communities_searched,
            "time_range": result.time_range,
        },
        "validation": validation,
        "success": true,
    })))
}

#[derive(Debug, Deserialize)]
pub struct ValidateSubredditsRequest {
    pub subreddits: Vec<String>,
}

pub async fn validate_subreddits_handler(
    State(state): State<AppState>,
    Json(request): Json<ValidateSubredditsRequest>,
) -> Result<Json<Value>> {
    validate_subreddits(&request.subreddits)?;
    let (_, outcome) = validate_and_discover(&state.discussion_client, &request.subreddits).await;
    Ok(Json(json!(outcome)))
}

#[derive(Debug, Deserialize)]
pub struct WebsiteRequest {
    pub url: String,
    pub max_pages: u32,
    pub include_subpages: bool,
    pub extract_pricing: bool,
    pub extract_features: bool,
}

pub async fn website_handler(
    State(state): State<AppState>,
    Json(request): Json<WebsiteRequest>,
) -> Result<Json<Value>> {
    let parsed = url::Url::parse(&request.url)
        .map_err(|e| ApiError::InvalidRequest(format!("invalid url: {e}")))?;
    crawl_website::guard_url(&parsed).map_err(|e| ApiError::UrlRejected(e.to_string()))?;

    let extract_request = ExtractRequest {
        url: request.url.clone(),
        max_pages: request.max_pages,
        include_subpages: request.include_subpages,
        extract_pricing: request.extract_pricing,
        extract_features: request.extract_features,
    };

    let extraction = website_crawl(&state.fetcher, extract_request)
        .await
        .map_err(|e| ApiError::Upstream(e.to_string()))?;

    let domain = parsed.host_str().unwrap_or_default().to_string();
    Ok(Json(json!({
        "url": extraction.url,
        "domain": domain,
        "title": extraction.content.title,
        "description": extraction.content.description,
        "main_content": extraction.content.hero_text,
        "features": extraction.content.features,
        "pricing_info": extraction.content.pricing,
        "screenshots": extraction.content.screenshots,
        "testimonials": extraction.content.testimonials,
        "social_links": extraction.content.social_links,
        "crawled_pages": extraction.crawled_pages,
    })))
}

/// Polls a submitted batch-crawl job, per SPEC_FULL.md §4.7.
pub async fn job_status_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>> {
    let job = state
        .jobs
        .get(id)
        .ok_or_else(|| ApiError::NotFound(format!("job {id}")))?;
    Ok(Json(serde_json::to_value(job).unwrap_or(Value::Null)))
}

/// Streams a submitted job's progress as SSE, per spec.md §6's envelope
/// shape, reusing the job registry's `watch::Receiver` per job.
pub async fn job_stream_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Sse<impl Stream<Item = std::result::Result<Event, Infallible>>>> {
    let mut rx = state
        .jobs
        .subscribe(id)
        .ok_or_else(|| ApiError::NotFound(format!("job {id}")))?;

    let sse_stream = async_stream::stream! {
        loop {
            let job = rx.borrow().clone();
            let terminal = job.status.is_terminal();
            if let Ok(event) = Event::default().json_data(&job) {
                yield Ok(event);
            }
            if terminal || rx.changed().await.is_err() {
                break;
            }
        }
    };

    Ok(Sse::new(sse_stream).keep_alive(KeepAlive::default()))
}

