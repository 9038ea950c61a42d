//! Inbound middleware: optional API-key check and the concurrent-request
//! semaphore that is, per spec.md §5, "the principal backpressure
//! mechanism" — saturation returns HTTP 429 with `Retry-After` rather
//! than queuing.

use axum::extract::{Request, State};
use axum::http::{HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::state::AppState;

const API_KEY_HEADER: &str = "x-api-key";
const RETRY_AFTER_SECONDS: &str = "1";

pub async fn api_key_layer(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let Some(expected) = state.config.api_key.as_deref() else {
        return next.run(request).await;
    };

    let provided = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok());

    if provided == Some(expected) {
        next.run(request).await
    } else {
        let body = Json(json!({
            "error": "missing or invalid X-API-Key header",
        }));
        (StatusCode::UNAUTHORIZED, body).into_response()
    }
}

pub async fn concurrency_layer(State(state): State<AppState>, request: Request, next: Next) -> Response {
    match state.concurrency.clone().try_acquire_owned() {
        Ok(permit) => {
            let response = next.run(request).await;
            drop(permit);
            response
        }
        Err(_) => {
            let mut response = (
                StatusCode::TOO_MANY_REQUESTS,
                Json(json!({
                    "error": "too many concurrent requests",
                    "retry_after": RETRY_AFTER_SECONDS,
                    "message": "server is at capacity, retry shortly",
                })),
            )
                .into_response();
            response.headers_mut().insert(
                "retry-after",
                HeaderValue::from_static(RETRY_AFTER_SECONDS),
            );
            response
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request as HttpRequest;
    use axum::middleware::from_fn_with_state;
    use axum::routing::get;
    use axum::Router;
    use std::sync::Arc;
    use tower::ServiceExt;

    async fn ok_handler() -> &'static str {
        "ok"
    }

    fn test_state(api_key: Option<&str>, permits: usize) -> AppState {
        use crawl_config::Config;
        use crawl_core::{Fetcher, RateLimiter};
        use crawl_discussion::client::DiscussionApiClient;
        use crawl_jobs::JobRegistry;
        use tokio::sync::Semaphore;

        AppState {
            fetcher: Arc::new(Fetcher::new(reqwest::Client::new(), RateLimiter::new(60, 10, 60))),
            browser_pool: None,
            discussion_client: Arc::new(DiscussionApiClient::reddit()),
            jobs: JobRegistry::new(),
            config: Arc::new(Config {
                log_level: "info".to_string(),
                rate_limit_per_minute: 30,
                rate_limit_burst: 5,
                cors_allowed_origins: vec![],
                cache_dir: "./.cache".into(),
                durable_cache_ttl: std::time::Duration::from_secs(86_400),
                api_key: api_key.map(str::to_string),
            }),
            concurrency: Arc::new(Semaphore::new(permits)),
            started_at: std::time::Instant::now(),
        }
    }

    #[tokio::test]
    async fn rejects_requests_missing_api_key_when_configured() {
        let state = test_state(Some("secret"), 10);
        let app = Router::new()
            .route("/", get(ok_handler))
            .layer(from_fn_with_state(state.clone(), api_key_layer))
            .with_state(state);

        let response = app
            .oneshot(HttpRequest::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn accepts_requests_with_matching_api_key() {
        let state = test_state(Some("secret"), 10);
        let app = Router::new()
            .route("/", get(ok_handler))
            .layer(from_fn_with_state(state.clone(), api_key_layer))
            .with_state(state);

        let response = app
            .oneshot(
                HttpRequest::builder()
                    .uri("/")
                    .header("x-api-key", "secret")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn concurrency_layer_returns_429_when_saturated() {
        let state = test_state(None, 0);
        let app = Router::new()
            .route("/", get(ok_handler))
            .layer(from_fn_with_state(state.clone(), concurrency_layer))
            .with_state(state);

        let response = app
            .oneshot(HttpRequest::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers().get("retry-after").unwrap(), "1");
    }
}
