use std::fmt;

/// Failure surfaced by the fetch substrate. Never thrown across a collector
/// boundary — always returned, per the structured-value-over-exception rule.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum FetchError {
    #[error("request to {url} timed out after {attempts} attempt(s)")]
    Timeout { url: String, attempts: u32 },

    #[error("{url} returned HTTP {status} after {attempts} attempt(s)")]
    Status {
        url: String,
        status: u16,
        attempts: u32,
    },

    #[error("request to {url} failed: {source}")]
    Connect {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to decode JSON from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("rate limiter deadline exceeded for origin {origin}")]
    RateLimited { origin: String },
}

impl FetchError {
    /// Origin classification, mirroring spec.md's `{kind, message, retryable?, origin}` shape.
    pub fn origin(&self) -> &str {
        match self {
            FetchError::Timeout { url, .. }
            | FetchError::Status { url, .. }
            | FetchError::Connect { url, .. }
            | FetchError::Decode { url, .. } => url.as_str(),
            FetchError::RateLimited { origin } => origin.as_str(),
        }
    }

    /// Whether a caller could plausibly retry this outside the substrate's
    /// own retry budget (it never will, since the substrate exhausts its
    /// own budget first, but collectors use this to decide whether to log
    /// at `warn` or `error`).
    pub fn retryable(&self) -> bool {
        matches!(
            self,
            FetchError::Timeout { .. } | FetchError::RateLimited { .. }
        ) || matches!(self, FetchError::Status { status, .. } if *status == 429 || *status >= 500)
    }
}

/// Disposition of a single HTTP attempt, used by the retry loop in `http.rs`
/// to decide whether to sleep-and-retry or terminate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Retry,
    RetryWithBackoffRecord,
    Terminal,
}

impl fmt::Display for Disposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Disposition::Retry => write!(f, "retry"),
            Disposition::RetryWithBackoffRecord => write!(f, "retry-with-backoff"),
            Disposition::Terminal => write!(f, "terminal"),
        }
    }
}

/// Classifies an HTTP status per spec.md §4.1's disposition table.
pub fn classify_status(status: u16) -> Disposition {
    match status {
        429 => Disposition::RetryWithBackoffRecord,
        500..=599 => Disposition::Retry,
        _ => Disposition::Terminal,
    }
}
