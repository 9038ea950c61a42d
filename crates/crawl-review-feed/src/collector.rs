//! The feed collector's per-filter state machine and page loop, per
//! spec.md §4.2. Grounded directly on
//! `original_source/api/py-reviews.py`'s `scrape_reviews_streaming`: same
//! state transitions, same 40-page cap, same 5-consecutive-empty-page
//! exhaustion rule, same SSE event sequence.

use std::collections::HashSet;
use std::sync::Arc;

use async_stream::stream;
use crawl_core::model::Review;
use crawl_core::{AdaptiveThrottle, Fetcher};
use futures::Stream;
use rand::Rng;
use serde_json::json;
use tokio::time::Duration;

use crate::config::{Filter, Stealth};
use crate::events::FeedEvent;
use crate::parse::{feed_url, parse_page, DEFAULT_FEED_HOST};

const MAX_PAGES_PER_FILTER: u32 = 40;
const CONSECUTIVE_EMPTY_THRESHOLD: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FilterState {
    Active,
    TargetReached,
    Exhausted,
    RateLimitedSkip,
}

pub struct FeedCollectorConfig {
    pub app_id: String,
    pub locale: String,
    pub filters: Vec<Filter>,
    pub stealth: Stealth,
    /// Overall cap across all filters combined; `None` when the caller
    /// (the standalone SSE endpoint) relies solely on per-filter targets.
    pub cap: Option<u32>,
    /// Feed host, overridable in tests; defaults to the real storefront.
    pub host: String,
}

impl Default for FeedCollectorConfig {
    fn default() -> Self {
        Self {
            app_id: String::new(),
            locale: "us".to_string(),
            filters: Vec::new(),
            stealth: Stealth::default(),
            cap: None,
            host: DEFAULT_FEED_HOST.to_string(),
        }
    }
}

fn stealth_delay(stealth: &Stealth, throttle: &AdaptiveThrottle) -> Duration {
    let jitter_frac = rand::thread_rng().gen_range(0.0..=(stealth.randomization / 100.0));
    let jittered = stealth.base_delay * (1.0 + jitter_frac);
    throttle.scaled_delay(Duration::from_secs_f64(jittered))
}

/// Streams SSE-shaped events for one crawl across every filter, in order.
/// The terminal `Complete` event carries the full de-duplicated review set
/// and aggregate stats.
pub fn collect_streaming(
    fetcher: Arc<Fetcher>,
    cfg: FeedCollectorConfig,
) -> impl Stream<Item = FeedEvent> {
    stream! {
        let filter_names: Vec<String> = cfg.filters.iter().map(|f| f.sort_order.clone()).collect();
        let total_target: u32 = cfg.filters.iter().map(|f| f.target_count).sum();
        yield FeedEvent::Start {
            filters: filter_names.clone(),
            total_target_reviews: total_target,
        };

        let mut accumulator: Vec<Review> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        let mut throttle = AdaptiveThrottle::default();

        'filters: for (filter_index, filter) in cfg.filters.iter().enumerate() {
            if let Some(cap) = cfg.cap {
                if accumulator.len() as u32 >= cap {
                    break 'filters;
                }
            }

            let mut state = FilterState::Active;
            let mut page: u32 = 1;
            let mut consecutive_empty: u32 = 0;
            let mut filter_total: u32 = 0;

            while state == FilterState::Active && page <= MAX_PAGES_PER_FILTER {
                let url = feed_url(&cfg.host, &cfg.locale, &cfg.app_id, &filter.sort_order, page);
                let mut fetch_result = fetcher.fetch_json(&url, None).await;

                // A 429 doubles the adaptive multiplier and gets one retry of
                // the same page at the doubled rate before falling back to
                // skipping the filter, per spec.md §8 Scenario 4.
                if let Err(err) = &fetch_result {
                    let is_429 = matches!(err, crawl_core::FetchError::Status { status: 429, .. });
                    if is_429 {
                        let new_multiplier = throttle.on_rate_limited();
                        yield FeedEvent::Throttle {
                            filter: filter.sort_order.clone(),
                            page,
                            new_delay_multiplier: new_multiplier,
                            message: format!("rate limited: {err}"),
                        };
                        let retry_delay = Duration::from_secs_f64(
                            cfg.stealth.base_delay * new_multiplier * 2.0,
                        );
                        tokio::time::sleep(retry_delay).await;
                        fetch_result = fetcher.fetch_json(&url, None).await;
                    }
                }

                let page_reviews = match fetch_result {
                    Ok(value) => parse_page(&value, &cfg.locale, &filter.sort_order),
                    Err(err) => {
                        let is_persistent_429 = matches!(
                            &err,
                            crawl_core::FetchError::Status { status: 429, .. }
                        );
                        if is_persistent_429 {
                            state = FilterState::RateLimitedSkip;
                            yield FeedEvent::FilterSkipped {
                                filter: filter.sort_order.clone(),
                                message: format!("rate limited after retry: {err}"),
                            };
                            break;
                        }
                        tracing::warn!(filter = %filter.sort_order, page, error = %err, "feed page fetch failed, treating as empty");
                        Vec::new()
                    }
                };

                let reviews_this_page = page_reviews.len();
                let mut new_unique_this_page = 0usize;
                for review in page_reviews {
                    if seen.insert(review.digest.clone()) {
                        accumulator.push(review);
                        new_unique_this_page += 1;
                        filter_total += 1;
                    }
                    if let Some(cap) = cfg.cap {
                        if accumulator.len() as u32 >= cap {
                            break;
                        }
                    }
                }

                if reviews_this_page == 0 {
                    consecutive_empty += 1;
                } else {
                    consecutive_empty = 0;
                }

                if filter_total >= filter.target_count {
                    state = FilterState::TargetReached;
                    yield FeedEvent::FilterTargetReached {
                        filter: filter.sort_order.clone(),
                        filter_reviews_total: filter_total,
                    };
                    break;
                }

                if consecutive_empty >= CONSECUTIVE_EMPTY_THRESHOLD {
                    state = FilterState::Exhausted;
                    yield FeedEvent::FilterEarlyStop {
                        filter: filter.sort_order.clone(),
                        page,
                        message: format!("{CONSECUTIVE_EMPTY_THRESHOLD} consecutive empty pages"),
                    };
                    break;
                }

                if let Some(cap) = cfg.cap {
                    if accumulator.len() as u32 >= cap {
                        state = FilterState::TargetReached;
                        break;
                    }
                }

                let delay = stealth_delay(&cfg.stealth, &throttle);
                yield FeedEvent::Progress {
                    filter: filter.sort_order.clone(),
                    filter_index,
                    page,
                    max_pages: MAX_PAGES_PER_FILTER,
                    reviews_this_page,
                    new_unique_this_page,
                    filter_reviews_total: filter_total,
                    total_unique: accumulator.len(),
                    next_delay_ms: delay.as_millis() as u64,
                };

                tokio::time::sleep(delay).await;
                page += 1;
            }

            if state == FilterState::Active {
                // Page cap reached without another terminal transition.
                yield FeedEvent::FilterComplete {
                    filter: filter.sort_order.clone(),
                    filter_reviews_total: filter_total,
                };
            }

            if filter_index + 1 < cfg.filters.len() {
                let new_multiplier = if cfg.stealth.auto_throttle {
                    throttle.on_clean_boundary()
                } else {
                    throttle.multiplier()
                };
                let cooldown = cfg.stealth.filter_cooldown
                    * (1.0 + rand::thread_rng().gen_range(0.0..=0.5));
                yield FeedEvent::FilterCooldown {
                    filter: filter.sort_order.clone(),
                    next_filter: cfg.filters.get(filter_index + 1).map(|f| f.sort_order.clone()),
                    new_delay_multiplier: new_multiplier,
                    cooldown_seconds: cooldown,
                };
                tokio::time::sleep(Duration::from_secs_f64(cooldown)).await;
            }
        }

        let stats = aggregate_stats(&accumulator);
        yield FeedEvent::Complete {
            reviews: accumulator,
            stats,
        };
    }
}

/// Non-streaming convenience wrapper: drains the event stream and returns
/// just the final review set, for the pipeline orchestrator (§4.4) which
/// only cares about the terminal payload.
pub async fn collect(fetcher: Arc<Fetcher>, cfg: FeedCollectorConfig) -> Vec<Review> {
    use futures::StreamExt;
    let mut stream = Box::pin(collect_streaming(fetcher, cfg));
    let mut result = Vec::new();
    while let Some(event) = stream.next().await {
        if let FeedEvent::Complete { reviews, .. } = event {
            result = reviews;
        }
    }
    result
}

fn aggregate_stats(reviews: &[Review]) -> serde_json::Value {
    let mut histogram = [0u32; 5];
    let mut rated = 0u32;
    let mut sum = 0u32;
    for r in reviews {
        if let Some(rating) = r.rating {
            histogram[(rating - 1) as usize] += 1;
            rated += 1;
            sum += rating as u32;
        }
    }
    let average = if rated > 0 {
        sum as f64 / rated as f64
    } else {
        0.0
    };
    json!({
        "total": reviews.len(),
        "average_rating": average,
        "rating_distribution": {
            "1": histogram[0], "2": histogram[1], "3": histogram[2],
            "4": histogram[3], "5": histogram[4],
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crawl_core::RateLimiter;
    use futures::StreamExt;
    use reqwest::Client;
    use wiremock::matchers::{method, path_regex};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn entry(id: &str, rating: &str) -> serde_json::Value {
        json!({
            "id": {"label": id},
            "author": {"name": {"label": format!("author-{id}")}},
            "im:rating": {"label": rating},
            "im:voteCount": {"label": "0"},
            "im:voteSum": {"label": "0"},
            "title": {"label": "t"},
            "content": {"label": format!("content {id}")}
        })
    }

    fn page_with(n: usize) -> serde_json::Value {
        let mut entries = vec![json!({"im:name": {"label": "App"}})];
        for i in 0..n {
            entries.push(entry(&format!("r{i}"), "5"));
        }
        json!({"feed": {"entry": entries}})
    }

    fn fast_stealth() -> Stealth {
        Stealth {
            base_delay: 0.0,
            randomization: 0.0,
            filter_cooldown: 0.0,
            auto_throttle: true,
        }
    }

    #[tokio::test]
    async fn feed_only_small_crawl_matches_scenario_1() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path_regex(r"page=1/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page_with(50)))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path_regex(r"page=2/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page_with(50)))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path_regex(r"page=3/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page_with(20)))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path_regex(r"page=[4-9]/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page_with(0)))
            .mount(&server)
            .await;

        let fetcher = Arc::new(Fetcher::new(Client::new(), RateLimiter::new(10_000, 50, 10_000)));
        let cfg = FeedCollectorConfig {
            app_id: "100001".into(),
            locale: "us".into(),
            filters: vec![Filter {
                sort_order: "mostRecent".into(),
                target_count: 120,
            }],
            stealth: fast_stealth(),
            cap: None,
            host: server.uri(),
        };

        let reviews = collect(fetcher, cfg).await;
        assert_eq!(reviews.len(), 120);
        assert!(reviews.iter().all(|r| matches!(r.source, crawl_core::ReviewSource::Feed)));
    }

    #[tokio::test]
    async fn exhausts_after_five_consecutive_empty_pages() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page_with(0)))
            .mount(&server)
            .await;

        let fetcher = Arc::new(Fetcher::new(Client::new(), RateLimiter::new(10_000, 50, 10_000)));
        let cfg = FeedCollectorConfig {
            app_id: "1".into(),
            locale: "us".into(),
            filters: vec![Filter {
                sort_order: "mostRecent".into(),
                target_count: 10,
            }],
            stealth: fast_stealth(),
            cap: None,
            host: server.uri(),
        };

        let mut stream = Box::pin(collect_streaming(fetcher, cfg));
        let mut saw_early_stop = false;
        while let Some(event) = stream.next().await {
            if matches!(event, FeedEvent::FilterEarlyStop { .. }) {
                saw_early_stop = true;
            }
        }
        assert!(saw_early_stop);
    }

    #[tokio::test]
    async fn overall_cap_stops_before_filter_target() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page_with(50)))
            .mount(&server)
            .await;

        let fetcher = Arc::new(Fetcher::new(Client::new(), RateLimiter::new(10_000, 50, 10_000)));
        let cfg = FeedCollectorConfig {
            app_id: "1".into(),
            locale: "us".into(),
            filters: vec![Filter {
                sort_order: "mostRecent".into(),
                target_count: 2000,
            }],
            stealth: fast_stealth(),
            cap: Some(30),
            host: server.uri(),
        };

        let reviews = collect(fetcher, cfg).await;
        assert_eq!(reviews.len(), 30);
    }

    #[tokio::test]
    async fn rate_limited_page_retries_once_with_doubled_multiplier() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path_regex(r"page=1/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page_with(10)))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path_regex(r"page=2/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page_with(10)))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path_regex(r"page=3/"))
            .respond_with(ResponseTemplate::new(429))
            .up_to_n_times(1)
            .with_priority(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path_regex(r"page=3/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page_with(10)))
            .with_priority(5)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path_regex(r"page=[4-9]/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page_with(0)))
            .mount(&server)
            .await;

        let fetcher = Arc::new(Fetcher::new(Client::new(), RateLimiter::new(10_000, 50, 10_000)));
        let cfg = FeedCollectorConfig {
            app_id: "1".into(),
            locale: "us".into(),
            filters: vec![Filter {
                sort_order: "mostRecent".into(),
                target_count: 25,
            }],
            stealth: fast_stealth(),
            cap: None,
            host: server.uri(),
        };

        let mut stream = Box::pin(collect_streaming(fetcher, cfg));
        let mut throttle_multiplier = None;
        while let Some(event) = stream.next().await {
            if let FeedEvent::Throttle { new_delay_multiplier, .. } = event {
                throttle_multiplier = Some(new_delay_multiplier);
            }
        }
        assert_eq!(throttle_multiplier, Some(2.0));
    }

    #[test]
    fn aggregate_stats_computes_average_and_histogram() {
        let fetcher_reviews = parse_page(&page_with(3), "us", "mostRecent");
        let stats = aggregate_stats(&fetcher_reviews);
        assert_eq!(stats["total"], 3);
        assert_eq!(stats["rating_distribution"]["5"], 3);
        assert_eq!(stats["average_rating"], 5.0);
    }
}
