//! Phase B: the community × topic sweep, per spec.md §4.5.

use std::collections::HashMap;

use crawl_core::DiscussionPost;

use crate::client::PostData;
use crate::thresholds::Threshold;

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct CommunityYield {
    pub count: u64,
    pub mean_engagement: f64,
}

/// First-seen-wins accumulator keyed by post id, per spec.md §4.5.
pub struct Accumulator {
    order: Vec<String>,
    by_id: HashMap<String, DiscussionPost>,
    yields: HashMap<String, (u64, i64)>,
}

impl Accumulator {
    pub fn new() -> Self {
        Self {
            order: Vec::new(),
            by_id: HashMap::new(),
            yields: HashMap::new(),
        }
    }

    /// Applies the threshold rejection rule and inserts an accepted post
    /// if its id hasn't been seen yet. Updates the per-community yield
    /// sidecar regardless of whether the post was a duplicate, since a
    /// re-found post still reflects that community's engagement.
    pub fn offer(&mut self, community: &str, post: PostData, threshold: Threshold, matched_topic: &str) {
        if threshold.rejects(post.score, post.num_comments) {
            return;
        }

        let entry = self.yields.entry(community.to_string()).or_insert((0, 0));
        entry.0 += 1;
        entry.1 += post.score + 2 * post.num_comments;

        if self.by_id.contains_key(&post.id) {
            return;
        }

        let discussion = DiscussionPost {
            id: post.id.clone(),
            community: community.to_string(),
            title: post.title,
            body: post.selftext,
            score: post.score,
            comment_count: post.num_comments,
            created_utc: post.created_utc as i64,
            permalink: post.permalink,
            author: post.author,
            upvote_ratio: post.upvote_ratio,
            matched_topic: matched_topic.to_string(),
            comments: Vec::new(),
        };
        self.order.push(post.id.clone());
        self.by_id.insert(post.id, discussion);
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn into_ordered(self) -> Vec<DiscussionPost> {
        let Self { order, mut by_id, .. } = self;
        order
            .into_iter()
            .filter_map(|id| by_id.remove(&id))
            .collect()
    }

    pub fn yield_map(&self) -> HashMap<String, CommunityYield> {
        self.yields
            .iter()
            .map(|(community, (count, engagement_sum))| {
                let mean = if *count > 0 {
                    *engagement_sum as f64 / *count as f64
                } else {
                    0.0
                };
                (
                    community.clone(),
                    CommunityYield {
                        count: *count,
                        mean_engagement: mean,
                    },
                )
            })
            .collect()
    }
}

impl Default for Accumulator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post(id: &str, score: i64, num_comments: i64) -> PostData {
        PostData {
            id: id.to_string(),
            title: "t".to_string(),
            author: "a".to_string(),
            subreddit: "apps".to_string(),
            score,
            num_comments,
            created_utc: 0.0,
            permalink: "/p".to_string(),
            selftext: String::new(),
            upvote_ratio: 1.0,
        }
    }

    #[test]
    fn rejects_posts_below_both_thresholds() {
        let mut acc = Accumulator::new();
        let threshold = Threshold {
            min_score: 5,
            min_comments: 3,
        };
        acc.offer("apps", post("1", 1, 1), threshold, "pain-point");
        assert!(acc.is_empty());
    }

    #[test]
    fn accepts_posts_clearing_either_bar() {
        let mut acc = Accumulator::new();
        let threshold = Threshold {
            min_score: 5,
            min_comments: 3,
        };
        acc.offer("apps", post("1", 10, 0), threshold, "pain-point");
        acc.offer("apps", post("2", 0, 5), threshold, "pain-point");
        assert_eq!(acc.len(), 2);
    }

    #[test]
    fn first_seen_wins_on_duplicate_post_id() {
        let mut acc = Accumulator::new();
        let threshold = Threshold {
            min_score: 0,
            min_comments: 0,
        };
        acc.offer("apps", post("1", 10, 0), threshold, "first-topic");
        acc.offer("ios", post("1", 10, 0), threshold, "second-topic");
        let ordered = acc.into_ordered();
        assert_eq!(ordered.len(), 1);
        assert_eq!(ordered[0].matched_topic, "first-topic");
    }
}
