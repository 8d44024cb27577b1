//! Pluggable scoring for metrics blobs.

use crate::entity::MetricsBlob;

/// Computes a score for a merged metrics blob. `None` leaves the score unset.
pub trait InsightScorer: Send + Sync {
    fn score(&self, blob: &MetricsBlob) -> Option<i64>;
}

impl<F> InsightScorer for F
where
    F: Fn(&MetricsBlob) -> Option<i64> + Send + Sync,
{
    fn score(&self, blob: &MetricsBlob) -> Option<i64> {
        self(blob)
    }
}

/// Metric name used as the visibility signal.
pub const PROFILE_VIEWS: &str = "PROFILE_VIEWS";

/// Deterministic tiered visibility score in `0..=100`.
///
/// Base 50, plus a bonus for profile views, average rating and review count.
#[derive(Debug, Clone, Copy, Default)]
pub struct TieredVisibilityScorer;

impl TieredVisibilityScorer {
    const BASE: i64 = 50;

    fn views_bonus(views: i64) -> i64 {
        match views {
            v if v > 1000 => 20,
            v if v > 500 => 15,
            v if v > 100 => 10,
            _ => 0,
        }
    }

    fn rating_bonus(rating: f64) -> i64 {
        if rating >= 4.5 {
            15
        } else if rating >= 4.0 {
            10
        } else if rating >= 3.5 {
            5
        } else {
            0
        }
    }

    fn reviews_bonus(total: usize) -> i64 {
        match total {
            t if t > 100 => 10,
            t if t > 50 => 5,
            _ => 0,
        }
    }
}

impl InsightScorer for TieredVisibilityScorer {
    fn score(&self, blob: &MetricsBlob) -> Option<i64> {
        let score = Self::BASE
            + Self::views_bonus(blob.metric_total(PROFILE_VIEWS))
            + Self::rating_bonus(blob.review_summary.average_rating)
            + Self::reviews_bonus(blob.review_summary.total);
        Some(score.clamp(0, 100))
    }
}
