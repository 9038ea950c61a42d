//! Thin JSON-API client, grounded on `dashflow-reddit`'s `RedditSearchTool`:
//! a fixed user agent and the same `/r/<sub>/search.json` + `restrict_sr`
//! request shape, generalized to also cover `/about.json`,
//! `/comments/<id>.json`, and `/wiki/index.json`. Routed through
//! `crawl_core::Fetcher` so Reddit traffic shares the same rate-limiting
//! and retry-with-backoff substrate as every other worker, per spec.md §5.

use std::sync::Arc;

use reqwest::Client;
use serde::Deserialize;

use crawl_core::{FetchError, Fetcher, RateLimiter};

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("request to {url} failed: {message}")]
    Request { url: String, message: String },
    #[error("rate limited")]
    RateLimited,
    #[error("unexpected status {status} from {url}")]
    Status { url: String, status: u16 },
    #[error("failed to decode response from {url}: {source}")]
    Decode { url: String, source: serde_json::Error },
}

impl From<FetchError> for ApiError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::Status { status: 429, .. } => ApiError::RateLimited,
            FetchError::Status { url, status, .. } => ApiError::Status { url, status },
            FetchError::Timeout { url, attempts } => ApiError::Request {
                url,
                message: format!("timed out after {attempts} attempt(s)"),
            },
            FetchError::Connect { url, source } => ApiError::Request {
                url,
                message: source.to_string(),
            },
            FetchError::Decode { url, source } => ApiError::Decode { url, source },
            FetchError::RateLimited { origin } => ApiError::Request {
                url: origin,
                message: "rate limiter deadline exceeded".to_string(),
            },
            other => ApiError::Request {
                url: other.origin().to_string(),
                message: other.to_string(),
            },
        }
    }
}

const USER_AGENT: &str = "marketcrawl/0.1 (by /u/marketcrawl-bot)";

/// Reddit is polite enough to tolerate bursts but not much more; this
/// mirrors the 1.5s-between-requests gate the hand-rolled pacer used to
/// enforce, now expressed as the shared limiter's own admission windows.
const REDDIT_REQUESTS_PER_MINUTE: usize = 40;

#[derive(Clone)]
pub struct DiscussionApiClient {
    fetcher: Arc<Fetcher>,
    base_url: String,
}

#[derive(Debug, Deserialize)]
pub struct AboutResponse {
    pub data: AboutData,
}

#[derive(Debug, Deserialize)]
pub struct AboutData {
    pub display_name: String,
    pub subscribers: u64,
    #[serde(default)]
    pub public_description: String,
    #[serde(default)]
    pub description: String,
    pub subreddit_type: String,
}

#[derive(Debug, Deserialize)]
pub struct WikiPageResponse {
    pub data: WikiPageData,
}

#[derive(Debug, Deserialize)]
pub struct WikiPageData {
    #[serde(default)]
    pub content_md: String,
}

#[derive(Debug, Deserialize)]
pub struct SearchResponse {
    pub data: SearchData,
}

#[derive(Debug, Deserialize)]
pub struct SearchData {
    pub children: Vec<SearchChild>,
}

#[derive(Debug, Deserialize)]
pub struct SearchChild {
    pub data: PostData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PostData {
    pub id: String,
    pub title: String,
    pub author: String,
    pub subreddit: String,
    pub score: i64,
    pub num_comments: i64,
    pub created_utc: f64,
    pub permalink: String,
    #[serde(default)]
    pub selftext: String,
    #[serde(default = "default_upvote_ratio")]
    pub upvote_ratio: f64,
}

fn default_upvote_ratio() -> f64 {
    1.0
}

#[derive(Debug, Deserialize)]
pub struct CommentListing {
    pub data: CommentListingData,
}

#[derive(Debug, Deserialize)]
pub struct CommentListingData {
    pub children: Vec<CommentChild>,
}

#[derive(Debug, Deserialize)]
pub struct CommentChild {
    pub kind: String,
    pub data: CommentData,
}

#[derive(Debug, Deserialize)]
pub struct CommentData {
    pub id: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub score: i64,
    #[serde(default)]
    pub created_utc: f64,
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub replies: RepliesField,
}

/// Reddit's `replies` field is either an empty string (leaf comment) or a
/// nested listing object; serde_json can't pick a variant by shape alone
/// without an untagged enum.
#[derive(Debug, Default)]
pub enum RepliesField {
    #[default]
    None,
    Listing(CommentListing),
}

impl<'de> Deserialize<'de> for RepliesField {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = serde_json::Value::deserialize(deserializer)?;
        if value.is_string() {
            return Ok(RepliesField::None);
        }
        let listing: CommentListing =
            serde_json::from_value(value).map_err(serde::de::Error::custom)?;
        Ok(RepliesField::Listing(listing))
    }
}

impl DiscussionApiClient {
    /// Builds a client over a caller-supplied, already rate-limited
    /// `Fetcher`, letting server wiring share one substrate across every
    /// worker instead of each crate pacing its own requests.
    pub fn new(base_url: impl Into<String>, fetcher: Arc<Fetcher>) -> Self {
        Self {
            fetcher,
            base_url: base_url.into(),
        }
    }

    /// Convenience constructor for standalone use (tests, CLI): builds its
    /// own `Fetcher` with a Reddit-appropriate request budget.
    pub fn reddit() -> Self {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .expect("reqwest client with fixed config always builds");
        let limiter = RateLimiter::new(REDDIT_REQUESTS_PER_MINUTE, 1, REDDIT_REQUESTS_PER_MINUTE);
        Self::new("https://www.reddit.com", Arc::new(Fetcher::new(client, limiter)))
    }

    async fn get<T: for<'de> Deserialize<'de>>(&self, url: &str) -> Result<T, ApiError> {
        let value = self.fetcher.fetch_json(url, None).await?;
        serde_json::from_value(value).map_err(|source| ApiError::Decode {
            url: url.to_string(),
            source,
        })
    }

    pub async fn about(&self, community: &str) -> Result<AboutResponse, ApiError> {
        let url = format!("{}/r/{community}/about.json", self.base_url);
        self.get(&url).await
    }

    /// Fetches the community's wiki index page, if one exists. A missing
    /// or disabled wiki (404/403) is not an error — it's folded into an
    /// empty-body result so `discover_mentions` can scan it unconditionally.
    pub async fn wiki_index(&self, community: &str) -> Result<WikiPageResponse, ApiError> {
        let url = format!("{}/r/{community}/wiki/index.json", self.base_url);
        match self.get(&url).await {
            Ok(page) => Ok(page),
            Err(ApiError::Status { status, .. }) if status == 404 || status == 403 => {
                Ok(WikiPageResponse {
                    data: WikiPageData {
                        content_md: String::new(),
                    },
                })
            }
            Err(err) => Err(err),
        }
    }

    pub async fn search(
        &self,
        community: &str,
        query: &str,
        time_filter: &str,
        limit: u32,
    ) -> Result<SearchResponse, ApiError> {
        let url = format!(
            "{}/r/{community}/search.json?q={}&restrict_sr=true&sort=relevance&t={time_filter}&limit={limit}",
            self.base_url,
            urlencoding_q(query),
        );
        self.get(&url).await
    }

    pub async fn comments(
        &self,
        community: &str,
        post_id: &str,
    ) -> Result<Vec<CommentListing>, ApiError> {
        let url = format!("{}/r/{community}/comments/{post_id}.json", self.base_url);
        self.get(&url).await
    }
}

fn urlencoding_q(query: &str) -> String {
    url::form_urlencoded::byte_serialize(query.as_bytes()).collect()
}
