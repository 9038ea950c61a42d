//! Phase C: comment recovery, per spec.md §4.5. Selects the top 20
//! high-engagement posts from the accumulator and fetches their comment
//! forest, parsed to depth 3 inclusive with tombstoned bodies dropped.

use crawl_core::{Comment, DiscussionPost};

use crate::client::{CommentChild, CommentListing, RepliesField};

const MAX_RECOVERED_POSTS: usize = 20;
const MAX_DEPTH: u8 = 3;

/// Selects the subset of the sorted accumulator eligible for comment
/// recovery: the first 20 posts (already sorted by
/// `DiscussionPost::engagement_rank` descending) that clear the
/// high-engagement bar.
pub fn select_for_recovery(posts_sorted_by_rank_desc: &[DiscussionPost]) -> Vec<&DiscussionPost> {
    posts_sorted_by_rank_desc
        .iter()
        .filter(|p| p.is_high_engagement())
        .take(MAX_RECOVERED_POSTS)
        .collect()
}

fn build_tree(child: &CommentChild, depth: u8, post_author: &str) -> Option<Comment> {
    if child.kind != "t1" || depth > MAX_DEPTH {
        return None;
    }
    if Comment::is_tombstoned(&child.data.body) {
        return None;
    }

    let replies = match &child.data.replies {
        RepliesField::None => Vec::new(),
        RepliesField::Listing(listing) if depth < MAX_DEPTH => {
            build_forest(listing, depth + 1, post_author)
        }
        RepliesField::Listing(_) => Vec::new(),
    };

    Some(Comment {
        id: child.data.id.clone(),
        author: child.data.author.clone(),
        body: child.data.body.clone(),
        score: child.data.score,
        created_utc: child.data.created_utc as i64,
        depth,
        is_poster: child.data.author == post_author,
        parent_id: child.data.parent_id.clone(),
        replies,
    })
}

fn build_forest(listing: &CommentListing, depth: u8, post_author: &str) -> Vec<Comment> {
    listing
        .data
        .children
        .iter()
        .filter_map(|child| build_tree(child, depth, post_author))
        .collect()
}

/// Parses the raw `[post_listing, comments_listing]` response into a
/// depth-3 comment forest, attributing `is_poster` per comment by
/// comparing its own author to the post author (not inherited from an
/// ancestor).
pub fn parse_comment_forest(
    listings: &[CommentListing],
    post_author: &str,
) -> Vec<Comment> {
    let Some(comments_listing) = listings.get(1) else {
        return Vec::new();
    };
    comments_listing
        .data
        .children
        .iter()
        .filter_map(|child| build_tree(child, 1, post_author))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn make_post(id: &str, score: i64, comment_count: i64) -> DiscussionPost {
        DiscussionPost {
            id: id.to_string(),
            community: "apps".to_string(),
            title: "t".to_string(),
            body: String::new(),
            score,
            comment_count,
            created_utc: 0,
            permalink: String::new(),
            author: "a".to_string(),
            upvote_ratio: 1.0,
            matched_topic: "".to_string(),
            comments: Vec::new(),
        }
    }

    #[test]
    fn selects_only_high_engagement_posts_up_to_twenty() {
        let mut posts: Vec<DiscussionPost> = (0..25)
            .map(|i| make_post(&i.to_string(), 25, 0))
            .collect();
        posts.push(make_post("low", 1, 1));
        let selected = select_for_recovery(&posts);
        assert_eq!(selected.len(), 20);
        assert!(selected.iter().all(|p| p.is_high_engagement()));
    }

    fn child_json(id: &str, body: &str, replies: serde_json::Value) -> serde_json::Value {
        json!({
            "kind": "t1",
            "data": {
                "id": id,
                "author": "someone",
                "body": body,
                "score": 1,
                "created_utc": 0.0,
                "parent_id": null,
                "replies": replies,
            }
        })
    }

    #[test]
    fn drops_tombstoned_comments_and_stops_at_depth_three() {
        let leaf = child_json("c3", "deepest reply", json!(""));
        let listing3 = json!({ "data": { "children": [leaf] } });
        let mid = child_json("c2", "[deleted]", listing3.clone());
        let listing2 = json!({ "data": { "children": [mid, child_json("c2b", "mid reply kept", listing3)] } });
        let top = child_json("c1", "top level reply", listing2);
        let post_listing = json!({ "data": { "children": [] } });
        let comments_listing = json!({ "data": { "children": [top] } });

        let listings: Vec<CommentListing> =
            serde_json::from_value(json!([post_listing, comments_listing])).unwrap();

        let forest = parse_comment_forest(&listings, "op");
        assert_eq!(forest.len(), 1);
        assert_eq!(forest[0].id, "c1");
        assert_eq!(forest[0].replies.len(), 1, "the [deleted] reply must be dropped");
        assert_eq!(forest[0].replies[0].id, "c2b");
    }

    #[test]
    fn is_poster_is_computed_per_comment_not_inherited() {
        fn child_json_author(id: &str, author: &str, replies: serde_json::Value) -> serde_json::Value {
            json!({
                "kind": "t1",
                "data": {
                    "id": id,
                    "author": author,
                    "body": "some reply text",
                    "score": 1,
                    "created_utc": 0.0,
                    "parent_id": null,
                    "replies": replies,
                }
            })
        }

        let grandchild = child_json_author("c3", "someone_else", json!(""));
        let listing2 = json!({ "data": { "children": [grandchild] } });
        let top = child_json_author("c1", "op", listing2);
        let post_listing = json!({ "data": { "children": [] } });
        let comments_listing = json!({ "data": { "children": [top] } });

        let listings: Vec<CommentListing> =
            serde_json::from_value(json!([post_listing, comments_listing])).unwrap();

        let forest = parse_comment_forest(&listings, "op");
        assert!(forest[0].is_poster, "top-level reply by op must be flagged");
        assert!(
            !forest[0].replies[0].is_poster,
            "nested reply by someone else must not inherit the ancestor's is_poster"
        );
    }
}
