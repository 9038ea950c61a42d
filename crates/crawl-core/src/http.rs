//! The fetch substrate's three public operations: `fetch_text`,
//! `fetch_json`, and `acquire` (for callers, i.e. the browser collector,
//! that manage their own client). Ties together rate limiting, retry, and
//! caching per spec.md §4.1.

use std::collections::HashMap;
use std::time::Duration;

use reqwest::Client;
use serde_json::Value;

use crate::error::{classify_status, Disposition, FetchError};
use crate::rate_limit::{FetchPermit, RateLimiter};
use crate::retry::{backoff_429, exponential_backoff, MAX_ATTEMPTS};

const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(500);

/// Shared fetch substrate. One instance per process; cloned cheaply via
/// `Arc` at the call sites that need it (collectors hold an `Arc<Fetcher>`).
pub struct Fetcher {
    client: Client,
    limiter: RateLimiter,
}

impl Fetcher {
    pub fn new(client: Client, limiter: RateLimiter) -> Self {
        Self { client, limiter }
    }

    /// `acquire(url) -> permit`, for callers managing a raw client
    /// (the browser collector's page navigations).
    pub async fn acquire(&self, url: &str) -> FetchPermit {
        self.limiter.acquire(url).await
    }

    pub async fn fetch_text(
        &self,
        url: &str,
        headers: Option<&HashMap<String, String>>,
    ) -> Result<String, FetchError> {
        self.fetch_with_retry(url, headers).await
    }

    pub async fn fetch_json(
        &self,
        url: &str,
        headers: Option<&HashMap<String, String>>,
    ) -> Result<Value, FetchError> {
        let text = self.fetch_text(url, headers).await?;
        serde_json::from_str(&text).map_err(|source| FetchError::Decode {
            url: url.to_string(),
            source,
        })
    }

    async fn fetch_with_retry(
        &self,
        url: &str,
        headers: Option<&HashMap<String, String>>,
    ) -> Result<String, FetchError> {
        for attempt in 0..MAX_ATTEMPTS {
            let permit = self.limiter.acquire(url).await;

            let mut builder = self.client.get(url);
            if let Some(headers) = headers {
                for (k, v) in headers {
                    builder = builder.header(k, v);
                }
            }

            let response = match builder.send().await {
                Ok(r) => r,
                Err(err) if err.is_timeout() => {
                    if attempt + 1 == MAX_ATTEMPTS {
                        return Err(FetchError::Timeout {
                            url: url.to_string(),
                            attempts: attempt + 1,
                        });
                    }
                    drop(permit);
                    tokio::time::sleep(exponential_backoff(DEFAULT_BASE_DELAY, attempt)).await;
                    continue;
                }
                Err(err) => {
                    return Err(FetchError::Connect {
                        url: url.to_string(),
                        source: err,
                    });
                }
            };

            let status = response.status().as_u16();
            if response.status().is_success() {
                return response.text().await.map_err(|source| FetchError::Connect {
                    url: url.to_string(),
                    source,
                });
            }

            match classify_status(status) {
                Disposition::Terminal => {
                    return Err(FetchError::Status {
                        url: url.to_string(),
                        status,
                        attempts: attempt + 1,
                    });
                }
                Disposition::Retry => {
                    if attempt + 1 == MAX_ATTEMPTS {
                        return Err(FetchError::Status {
                            url: url.to_string(),
                            status,
                            attempts: attempt + 1,
                        });
                    }
                    drop(permit);
                    tokio::time::sleep(exponential_backoff(DEFAULT_BASE_DELAY, attempt)).await;
                }
                Disposition::RetryWithBackoffRecord => {
                    let sleep_for = backoff_429(DEFAULT_BASE_DELAY, attempt);
                    self.limiter.backoff(url, sleep_for);
                    if attempt + 1 == MAX_ATTEMPTS {
                        return Err(FetchError::Status {
                            url: url.to_string(),
                            status,
                            attempts: attempt + 1,
                        });
                    }
                    drop(permit);
                    tokio::time::sleep(sleep_for).await;
                }
            }
        }

        Err(FetchError::Timeout {
            url: url.to_string(),
            attempts: MAX_ATTEMPTS,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fetcher() -> Fetcher {
        Fetcher::new(
            Client::new(),
            RateLimiter::new(1000, 50, 1000),
        )
    }

    #[tokio::test]
    async fn fetch_json_parses_success_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ok"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"a": 1})))
            .mount(&server)
            .await;

        let f = fetcher();
        let v = f
            .fetch_json(&format!("{}/ok", server.uri()), None)
            .await
            .unwrap();
        assert_eq!(v["a"], 1);
    }

    #[tokio::test]
    async fn fetch_returns_terminal_error_on_404() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let f = fetcher();
        let err = f
            .fetch_text(&format!("{}/missing", server.uri()), None)
            .await
            .unwrap_err();
        assert!(!err.retryable());
    }

    #[tokio::test]
    async fn fetch_decode_failure_surfaces_as_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/badjson"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let f = fetcher();
        let err = f
            .fetch_json(&format!("{}/badjson", server.uri()), None)
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Decode { .. }));
    }
}
