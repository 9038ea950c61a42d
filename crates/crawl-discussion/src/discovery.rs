//! Phase A: community validation and discovery, per spec.md §4.5.

use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;

use crate::client::{AboutData, DiscussionApiClient};

/// Communities discovery must never return, regardless of mention count.
const DENYLIST: &[&str] = &["all", "popular", "random", "mods", "mod", "announcements"];
const MAX_DISCOVERED: usize = 10;

#[derive(Debug, Clone)]
pub struct ValidatedCommunity {
    pub name: String,
    pub subscribers: u64,
}

fn mention_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?i)\br/([a-z0-9_]{2,21})\b").expect("valid regex"))
}

/// `true` for `public`/`restricted` community types; `private` and any
/// other type are rejected per spec.md §4.5.
fn is_accessible(subreddit_type: &str) -> bool {
    matches!(subreddit_type, "public" | "restricted")
}

fn extract_mentions(text: &str) -> Vec<String> {
    mention_pattern()
        .captures_iter(text)
        .map(|c| c[1].to_lowercase())
        .collect()
}

/// Validates one seed community, returning `None` when it's private/
/// missing/some other inaccessible type.
pub async fn validate_community(
    client: &DiscussionApiClient,
    name: &str,
) -> Option<ValidatedCommunity> {
    let about = client.about(name).await.ok()?;
    if !is_accessible(&about.data.subreddit_type) {
        return None;
    }
    Some(ValidatedCommunity {
        name: about.data.display_name.to_lowercase(),
        subscribers: about.data.subscribers,
    })
}

/// Parses `r/<name>` mentions out of a validated community's public
/// description, long description, and wiki index, excluding the seed
/// itself and the denylist. Capped globally at 10 newly discovered names
/// across all seeds, per spec.md §4.5.
pub fn discover_mentions(
    about: &AboutData,
    wiki_text: &str,
    seed_community: &str,
    already_discovered: &HashSet<String>,
) -> Vec<String> {
    let mut found = Vec::new();
    for text in [about.public_description.as_str(), about.description.as_str(), wiki_text] {
        for mention in extract_mentions(text) {
            if mention == seed_community.to_lowercase() {
                continue;
            }
            if DENYLIST.contains(&mention.as_str()) {
                continue;
            }
            if already_discovered.contains(&mention) || found.contains(&mention) {
                continue;
            }
            found.push(mention);
        }
    }
    found
}

/// Runs discovery across every valid seed community, respecting the
/// global 10-name cap. `seeds_with_about` pairs each seed with its
/// `about.json` data and its wiki index text (empty string if the
/// community has no wiki).
pub fn discover_all(seeds_with_about: &[(String, AboutData, String)]) -> Vec<String> {
    let mut discovered = HashSet::new();
    let mut ordered = Vec::new();
    for (seed, about, wiki_text) in seeds_with_about {
        if discovered.len() >= MAX_DISCOVERED {
            break;
        }
        for mention in discover_mentions(about, wiki_text, seed, &discovered) {
            if discovered.len() >= MAX_DISCOVERED {
                break;
            }
            discovered.insert(mention.clone());
            ordered.push(mention);
        }
    }
    ordered
}

#[cfg(test)]
mod tests {
    use super::*;

    fn about(public: &str, long: &str) -> AboutData {
        AboutData {
            display_name: "seed".to_string(),
            subscribers: 1000,
            public_description: public.to_string(),
            description: long.to_string(),
            subreddit_type: "public".to_string(),
        }
    }

    #[test]
    fn is_accessible_allows_public_and_restricted_only() {
        assert!(is_accessible("public"));
        assert!(is_accessible("restricted"));
        assert!(!is_accessible("private"));
        assert!(!is_accessible("archived"));
    }

    #[test]
    fn extracts_mentions_case_insensitively() {
        let mentions = extract_mentions("check out r/Apps and R/ios too");
        assert_eq!(mentions, vec!["apps", "ios"]);
    }

    #[test]
    fn denylist_and_seed_are_excluded_from_discovery() {
        let a = about(
            "see r/all, r/mods, r/seed, and r/productivity",
            "",
        );
        let discovered = discover_mentions(&a, "", "seed", &HashSet::new());
        assert_eq!(discovered, vec!["productivity".to_string()]);
    }

    #[test]
    fn wiki_index_text_is_scanned_for_mentions_too() {
        let a = about("", "");
        let discovered = discover_mentions(&a, "related: r/sideproject", "seed", &HashSet::new());
        assert_eq!(discovered, vec!["sideproject".to_string()]);
    }

    #[test]
    fn discovery_is_capped_at_ten_names_total() {
        let names: Vec<String> = (0..15).map(|i| format!("r/sub{i}")).collect();
        let a = about(&names.join(" "), "");
        let seeds = vec![("seed".to_string(), a, String::new())];
        let discovered = discover_all(&seeds);
        assert_eq!(discovered.len(), 10);
    }
}
