//! Fetch-control substrate: bounded concurrency, sliding-window rate
//! limits, retry with backoff, adaptive throttling, and the two-tier
//! content cache described in spec.md §4.1 and §5.

pub mod cache;
pub mod digest;
pub mod error;
pub mod http;
pub mod model;
pub mod rate_limit;
pub mod retry;

pub use cache::{cache_key, Cache, CacheEntry, DurableTier};
pub use digest::review_digest;
pub use error::FetchError;
pub use http::Fetcher;
pub use model::{Comment, DiscussionPost, Job, JobStatus, Review, ReviewSource};
pub use rate_limit::{FetchPermit, RateLimiter};
pub use retry::AdaptiveThrottle;
