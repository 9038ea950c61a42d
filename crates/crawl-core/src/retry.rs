//! Backoff math for the fetch substrate's retry disposition table
//! (spec.md §4.1) and the feed collector's adaptive throttle (§4.1, "feed
//! collector only").

use std::time::Duration;

use rand::Rng;

/// Maximum attempts per logical `fetch_*` call, per spec.md §4.1.
pub const MAX_ATTEMPTS: u32 = 3;

/// `base * 2^attempt` seconds, deterministic, the shared backoff shape for
/// 5xx/timeout. The 429 row adds its own jittered term on top via
/// `backoff_429` rather than jittering here.
pub fn exponential_backoff(base: Duration, attempt: u32) -> Duration {
    let scaled = base.as_secs_f64() * 2f64.powi(attempt as i32);
    Duration::from_secs_f64(scaled.max(0.0))
}

/// `base * 2^attempt + U(1,3)` seconds, per the 429 row of the disposition
/// table. The additive `U(1,3)` term is the jitter; it is not also applied
/// to the deterministic base.
pub fn backoff_429(base: Duration, attempt: u32) -> Duration {
    let extra = rand::thread_rng().gen_range(1.0..=3.0);
    exponential_backoff(base, attempt) + Duration::from_secs_f64(extra)
}

/// A per-crawl mutable multiplier scaling the feed collector's inter-page
/// delay. Doubles (capped at 4.0) on 429, relaxes by ×0.75 (floored at 1.0)
/// on a clean filter boundary. Confined to the feed collector per spec.md
/// §4.1 ("adaptive throttle (feed collector only)").
#[derive(Debug, Clone, Copy)]
pub struct AdaptiveThrottle {
    multiplier: f64,
}

impl Default for AdaptiveThrottle {
    fn default() -> Self {
        Self { multiplier: 1.0 }
    }
}

impl AdaptiveThrottle {
    pub fn multiplier(&self) -> f64 {
        self.multiplier
    }

    pub fn on_rate_limited(&mut self) -> f64 {
        self.multiplier = (self.multiplier * 2.0).min(4.0);
        self.multiplier
    }

    pub fn on_clean_boundary(&mut self) -> f64 {
        self.multiplier = (self.multiplier * 0.75).max(1.0);
        self.multiplier
    }

    pub fn scaled_delay(&self, base: Duration) -> Duration {
        Duration::from_secs_f64(base.as_secs_f64() * self.multiplier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn throttle_doubles_and_caps_at_four() {
        let mut t = AdaptiveThrottle::default();
        assert_eq!(t.on_rate_limited(), 2.0);
        assert_eq!(t.on_rate_limited(), 4.0);
        assert_eq!(t.on_rate_limited(), 4.0);
    }

    #[test]
    fn throttle_relaxes_and_floors_at_one() {
        let mut t = AdaptiveThrottle { multiplier: 2.0 };
        assert_eq!(t.on_clean_boundary(), 1.5);
        assert_eq!(t.on_clean_boundary(), 1.125);
        let mut near_floor = AdaptiveThrottle { multiplier: 1.1 };
        assert_eq!(near_floor.on_clean_boundary(), 1.0);
    }

    #[test]
    fn backoff_429_adds_one_to_three_seconds() {
        let base = backoff_429(Duration::from_millis(100), 0);
        assert!(base >= Duration::from_secs(1));
    }
}
