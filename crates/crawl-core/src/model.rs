//! Shared entities from spec.md §3, common to every collector and the
//! orchestrator: `Review`, `DiscussionPost`, `Comment`, and `Job`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::digest::review_digest;

/// Where a review was collected from, per spec.md §3's `source tag`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewSource {
    Feed,
    Browser,
}

/// A single user review, normalized across the feed and browser
/// collectors. Identity (`digest`) is deterministic: see
/// [`crate::digest::review_digest`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Review {
    pub id: String,
    pub digest: String,
    pub title: String,
    pub content: String,
    /// `None` when the source-provided rating is missing or out of range —
    /// preserved as null rather than coerced, to avoid biasing aggregates.
    pub rating: Option<u8>,
    pub author: String,
    pub app_version: Option<String>,
    pub vote_count: i64,
    pub vote_sum: i64,
    pub locale: String,
    pub sort_origin: String,
    pub source: ReviewSource,
}

impl Review {
    /// Content is truncated to 5000 characters on ingest, per spec.md §3;
    /// the digest uses the untruncated author/content pair as supplied
    /// since truncation can only drop characters past position 100.
    pub fn new(
        id: String,
        title: String,
        content: String,
        rating: Option<u8>,
        author: String,
        app_version: Option<String>,
        vote_count: i64,
        vote_sum: i64,
        locale: String,
        sort_origin: String,
        source: ReviewSource,
    ) -> Self {
        let digest = review_digest(&author, &content);
        let content = content.chars().take(5000).collect();
        let rating = rating.filter(|r| (1..=5).contains(r));
        Self {
            id,
            digest,
            title,
            content,
            rating,
            author,
            app_version,
            vote_count,
            vote_sum,
            locale,
            sort_origin,
            source,
        }
    }
}

/// A threaded reply beneath a `DiscussionPost`, per spec.md §3.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    pub author: String,
    pub body: String,
    pub score: i64,
    pub created_utc: i64,
    pub depth: u8,
    pub is_poster: bool,
    pub parent_id: Option<String>,
    pub replies: Vec<Comment>,
}

impl Comment {
    /// `true` when this body should be dropped rather than emitted:
    /// deleted/removed/empty bodies are never surfaced with placeholder
    /// text, per spec.md §3.
    pub fn is_tombstoned(body: &str) -> bool {
        let trimmed = body.trim();
        trimmed.is_empty() || trimmed == "[deleted]" || trimmed == "[removed]"
    }
}

/// A single discussion post with its recovered comment tree, per spec.md §3.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscussionPost {
    pub id: String,
    pub community: String,
    pub title: String,
    pub body: String,
    pub score: i64,
    pub comment_count: i64,
    pub created_utc: i64,
    pub permalink: String,
    pub author: String,
    pub upvote_ratio: f64,
    pub matched_topic: String,
    pub comments: Vec<Comment>,
}

impl DiscussionPost {
    /// The ranking key Phase C sorts the accumulator by, per spec.md §4.5.
    pub fn engagement_rank(&self) -> i64 {
        self.score + 2 * self.comment_count
    }

    /// Whether this post qualifies for comment recovery's "high-engagement"
    /// subset (spec.md §4.5: `score > 20 OR comment_count > 10`).
    pub fn is_high_engagement(&self) -> bool {
        self.score > 20 || self.comment_count > 10
    }
}

/// Lifecycle state of an async job, per spec.md §3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }
}

/// A batch crawl tracked across the lifetime of the owning process, per
/// spec.md §3. Mutated only by its owning worker task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub job_type: String,
    pub status: JobStatus,
    pub request: serde_json::Value,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
    pub progress: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    pub fn new(job_type: impl Into<String>, request: serde_json::Value) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            job_type: job_type.into(),
            status: JobStatus::Pending,
            request,
            result: None,
            error: None,
            progress: 0.0,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn review_rating_out_of_range_becomes_null() {
        let r = Review::new(
            "1".into(),
            "t".into(),
            "c".into(),
            Some(7),
            "a".into(),
            None,
            0,
            0,
            "us".into(),
            "mostRecent".into(),
            ReviewSource::Feed,
        );
        assert_eq!(r.rating, None);
    }

    #[test]
    fn review_content_truncated_to_5000_chars() {
        let long = "x".repeat(6000);
        let r = Review::new(
            "1".into(),
            "t".into(),
            long,
            Some(5),
            "a".into(),
            None,
            0,
            0,
            "us".into(),
            "mostRecent".into(),
            ReviewSource::Feed,
        );
        assert_eq!(r.content.chars().count(), 5000);
    }

    #[test]
    fn comment_tombstone_detection() {
        assert!(Comment::is_tombstoned(""));
        assert!(Comment::is_tombstoned("[deleted]"));
        assert!(Comment::is_tombstoned("[removed]"));
        assert!(!Comment::is_tombstoned("a real comment"));
    }

    #[test]
    fn job_starts_pending_with_zero_progress() {
        let job = Job::new("reviews", serde_json::json!({}));
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.progress, 0.0);
    }
}
