//! Filter and stealth configuration for the feed collector, per spec.md
//! §4.2. Grounded on `original_source/api/py-reviews.py`'s
//! `VALID_SORT_ORDERS`, `DEFAULT_FILTERS`, and `DEFAULT_STEALTH`.

use serde::{Deserialize, Serialize};

pub const VALID_SORT_ORDERS: &[&str] = &["mostRecent", "mostHelpful"];

/// At most 10 filters per request; each target is capped at 2000, per
/// spec.md §4.2.
pub const MAX_FILTERS: usize = 10;
pub const MAX_TARGET_COUNT: u32 = 2000;

/// One `{sort-order, target-count}` configuration the feed collector
/// iterates pages under.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Filter {
    pub sort_order: String,
    pub target_count: u32,
}

impl Filter {
    pub fn clamp(mut self) -> Self {
        self.target_count = self.target_count.min(MAX_TARGET_COUNT).max(1);
        if !VALID_SORT_ORDERS.contains(&self.sort_order.as_str()) {
            self.sort_order = VALID_SORT_ORDERS[0].to_string();
        }
        self
    }
}

/// Stealth delay configuration, per spec.md §4.2's ranges.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stealth {
    pub base_delay: f64,
    pub randomization: f64,
    pub filter_cooldown: f64,
    pub auto_throttle: bool,
}

impl Default for Stealth {
    fn default() -> Self {
        Self {
            base_delay: 2.0,
            randomization: 30.0,
            filter_cooldown: 5.0,
            auto_throttle: true,
        }
    }
}

impl Stealth {
    pub fn clamp(mut self) -> Self {
        self.base_delay = self.base_delay.clamp(0.5, 10.0);
        self.randomization = self.randomization.clamp(0.0, 100.0);
        self.filter_cooldown = self.filter_cooldown.clamp(1.0, 30.0);
        self
    }
}

/// Clamps and bounds a caller-supplied filter list to spec.md §4.2's
/// contract: ordered, at most 10, targets capped at 2000.
pub fn normalize_filters(mut filters: Vec<Filter>) -> Vec<Filter> {
    filters.truncate(MAX_FILTERS);
    filters.into_iter().map(Filter::clamp).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_clamps_target_count_and_sort_order() {
        let f = Filter {
            sort_order: "bogus".into(),
            target_count: 999_999,
        };
        let clamped = f.clamp();
        assert_eq!(clamped.target_count, MAX_TARGET_COUNT);
        assert_eq!(clamped.sort_order, VALID_SORT_ORDERS[0]);
    }

    #[test]
    fn normalize_filters_truncates_to_ten() {
        let filters: Vec<Filter> = (0..15)
            .map(|_| Filter {
                sort_order: "mostRecent".into(),
                target_count: 10,
            })
            .collect();
        assert_eq!(normalize_filters(filters).len(), MAX_FILTERS);
    }

    #[test]
    fn stealth_clamps_into_documented_ranges() {
        let s = Stealth {
            base_delay: 50.0,
            randomization: 500.0,
            filter_cooldown: 0.1,
            auto_throttle: false,
        }
        .clamp();
        assert_eq!(s.base_delay, 10.0);
        assert_eq!(s.randomization, 100.0);
        assert_eq!(s.filter_cooldown, 1.0);
    }
}
