//! Router assembly: one `Router` per spec.md §6's endpoint table, CORS
//! and body-size limits applied the way `dashflow-langserve::server`
//! composes `create_server_with_cors`.

use axum::extract::DefaultBodyLimit;
use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use crate::handlers::{
    health_handler, job_status_handler, job_stream_handler, privacy_handler, reddit_deep_dive_handler,
    reddit_handler, reviews_handler, validate_subreddits_handler, website_handler, whats_new_handler,
};
use crate::middleware::{api_key_layer, concurrency_layer};
use crate::state::AppState;

const MAX_BODY_BYTES: usize = 100 * 1024;

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    if allowed_origins.is_empty() {
        CorsLayer::new()
    } else {
        let origins: Vec<_> = allowed_origins.iter().filter_map(|s| s.parse().ok()).collect();
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.cors_allowed_origins);

    Router::new()
        .route("/health", get(health_handler))
        .route("/crawl/app-store/reviews", post(reviews_handler))
        .route("/crawl/app-store/whats-new", post(whats_new_handler))
        .route("/crawl/app-store/privacy", post(privacy_handler))
        .route("/crawl/reddit", post(reddit_handler))
        .route("/crawl/reddit/deep-dive", post(reddit_deep_dive_handler))
        .route("/crawl/reddit/validate-subreddits", post(validate_subreddits_handler))
        .route("/crawl/website", post(website_handler))
        .route("/jobs/:id", get(job_status_handler))
        .route("/jobs/:id/stream", get(job_stream_handler))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(from_fn_with_state(state.clone(), concurrency_layer))
        .layer(from_fn_with_state(state.clone(), api_key_layer))
        .layer(cors)
        .with_state(state)
}
