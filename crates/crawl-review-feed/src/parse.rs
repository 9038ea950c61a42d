//! Feed page parsing, per spec.md §4.2's "page parse rules".

use crawl_core::model::{Review, ReviewSource};
use serde_json::Value;

pub const DEFAULT_FEED_HOST: &str = "https://itunes.apple.com";

/// Builds the paginated feed URL for `(locale, app_id, sort_order, page)`
/// against `host` (overridable in tests to point at a mock server).
pub fn feed_url(host: &str, locale: &str, app_id: &str, sort_order: &str, page: u32) -> String {
    format!(
        "{host}/{locale}/rss/customerreviews/page={page}/id={app_id}/sortby={sort_order}/json"
    )
}

fn label_str(v: &Value, field: &str) -> Option<String> {
    v.get(field)?.get("label")?.as_str().map(str::to_string)
}

fn label_i64(v: &Value, field: &str) -> Option<i64> {
    label_str(v, field).and_then(|s| s.parse::<i64>().ok())
}

/// Normalizes `feed.entry`, which Apple's endpoint represents as an array
/// when there's more than one entry but as a bare object for exactly one
/// (the quirk behind "first entry is the app" being fragile across
/// response shapes, per spec.md §9's open question).
fn entries(page: &Value) -> Vec<Value> {
    match page.get("feed").and_then(|f| f.get("entry")) {
        Some(Value::Array(items)) => items.clone(),
        Some(obj @ Value::Object(_)) => vec![obj.clone()],
        _ => Vec::new(),
    }
}

/// Parses one feed page into reviews, per spec.md §4.2. The first entry,
/// when it lacks a rating field, represents the app itself and is
/// skipped — not a review.
pub fn parse_page(page: &Value, locale: &str, sort_order: &str) -> Vec<Review> {
    let all = entries(page);
    let mut out = Vec::with_capacity(all.len());

    for (i, entry) in all.iter().enumerate() {
        let has_rating = entry.get("im:rating").is_some();
        if i == 0 && !has_rating {
            continue;
        }

        let rating = label_str(entry, "im:rating")
            .and_then(|s| s.parse::<u8>().ok())
            .filter(|r| (1..=5).contains(r));
        let vote_count = label_i64(entry, "im:voteCount").unwrap_or(0);
        let vote_sum = label_i64(entry, "im:voteSum").unwrap_or(0);
        let author = entry
            .get("author")
            .and_then(|a| a.get("name"))
            .and_then(|n| n.get("label"))
            .and_then(|l| l.as_str())
            .unwrap_or("")
            .to_string();
        let title = label_str(entry, "title").unwrap_or_default();
        let content = label_str(entry, "content").unwrap_or_default();
        let app_version = label_str(entry, "im:version");
        let id = label_str(entry, "id").unwrap_or_else(|| format!("feed-{i}"));

        out.push(Review::new(
            id,
            title,
            content,
            rating,
            author,
            app_version,
            vote_count,
            vote_sum,
            locale.to_string(),
            sort_order.to_string(),
            ReviewSource::Feed,
        ));
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn first_entry_without_rating_is_skipped() {
        let page = json!({
            "feed": {
                "entry": [
                    {"im:name": {"label": "My App"}},
                    {
                        "id": {"label": "r1"},
                        "author": {"name": {"label": "alice"}},
                        "im:rating": {"label": "5"},
                        "im:voteCount": {"label": "2"},
                        "im:voteSum": {"label": "2"},
                        "title": {"label": "Great"},
                        "content": {"label": "Loved it"}
                    }
                ]
            }
        });
        let reviews = parse_page(&page, "us", "mostRecent");
        assert_eq!(reviews.len(), 1);
        assert_eq!(reviews[0].author, "alice");
        assert_eq!(reviews[0].rating, Some(5));
    }

    #[test]
    fn out_of_range_rating_becomes_null() {
        let page = json!({
            "feed": {
                "entry": [
                    {"im:name": {"label": "My App"}},
                    {
                        "id": {"label": "r1"},
                        "author": {"name": {"label": "bob"}},
                        "im:rating": {"label": "9"},
                        "title": {"label": "t"},
                        "content": {"label": "c"}
                    }
                ]
            }
        });
        let reviews = parse_page(&page, "us", "mostRecent");
        assert_eq!(reviews[0].rating, None);
    }

    #[test]
    fn single_entry_object_shape_is_treated_as_app_only() {
        let page = json!({"feed": {"entry": {"im:name": {"label": "Solo App"}}}});
        let reviews = parse_page(&page, "us", "mostRecent");
        assert!(reviews.is_empty());
    }

    #[test]
    fn missing_entry_array_parses_as_empty_page() {
        let page = json!({"feed": {}});
        assert!(parse_page(&page, "us", "mostRecent").is_empty());
    }
}
