//! Adaptive engagement thresholds by subscriber tier, per spec.md §4.5.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Threshold {
    pub min_score: i64,
    pub min_comments: i64,
}

pub const NON_ADAPTIVE: Threshold = Threshold {
    min_score: 5,
    min_comments: 3,
};

/// Maps subscriber count to `(min-score, min-comments)` per spec.md §4.5's
/// table. Only consulted when the caller opts into adaptive thresholds.
pub fn adaptive_threshold(subscribers: u64) -> Threshold {
    if subscribers < 10_000 {
        Threshold {
            min_score: 2,
            min_comments: 1,
        }
    } else if subscribers < 100_000 {
        Threshold {
            min_score: 5,
            min_comments: 3,
        }
    } else if subscribers < 1_000_000 {
        Threshold {
            min_score: 10,
            min_comments: 5,
        }
    } else {
        Threshold {
            min_score: 20,
            min_comments: 10,
        }
    }
}

pub fn threshold_for(subscribers: u64, adaptive: bool) -> Threshold {
    if adaptive {
        adaptive_threshold(subscribers)
    } else {
        NON_ADAPTIVE
    }
}

impl Threshold {
    /// `true` when a post fails both bars and should be rejected, per
    /// spec.md §4.5: "score < min-score AND comment-count < min-comments".
    pub fn rejects(&self, score: i64, comment_count: i64) -> bool {
        score < self.min_score && comment_count < self.min_comments
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_subscriber_tiers_to_documented_thresholds() {
        assert_eq!(
            adaptive_threshold(5_000),
            Threshold {
                min_score: 2,
                min_comments: 1
            }
        );
        assert_eq!(
            adaptive_threshold(50_000),
            Threshold {
                min_score: 5,
                min_comments: 3
            }
        );
        assert_eq!(
            adaptive_threshold(500_000),
            Threshold {
                min_score: 10,
                min_comments: 5
            }
        );
        assert_eq!(
            adaptive_threshold(2_000_000),
            Threshold {
                min_score: 20,
                min_comments: 10
            }
        );
    }

    #[test]
    fn non_adaptive_mode_ignores_subscriber_count() {
        assert_eq!(threshold_for(50, false), NON_ADAPTIVE);
        assert_eq!(threshold_for(5_000_000, false), NON_ADAPTIVE);
    }

    #[test]
    fn rejects_only_when_both_bars_are_missed() {
        let t = Threshold {
            min_score: 5,
            min_comments: 3,
        };
        assert!(t.rejects(4, 2));
        assert!(!t.rejects(10, 0));
        assert!(!t.rejects(0, 10));
    }
}
