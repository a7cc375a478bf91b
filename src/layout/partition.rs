//! # Proportional Partition Layout
//!
//! Splits a bar into width shares proportional to item weights, e.g.
//! balanced cells vs. cells left to balance.
//!
//! ```
//! use bms_dashboard::layout::partition::{partition, LabelPlacement, PartitionItem};
//!
//! let shares = partition(
//!     vec![PartitionItem::new(92.0, "Balanced"), PartitionItem::new(8.0, "Left")],
//!     8.0,
//! );
//! assert_eq!(shares[0].percentage, 92.0);
//! assert_eq!(shares[0].placement, LabelPlacement::Inline);
//! assert_eq!(shares[1].placement, LabelPlacement::Overlay);
//! ```

use serde::Serialize;

/// Share (%) above which a segment is wide enough for an inline label.
pub const DEFAULT_VISIBILITY_THRESHOLD_PCT: f64 = 8.0;

/// A weighted item to lay out.
#[derive(Debug, Clone, PartialEq)]
pub struct PartitionItem<T> {
    pub weight: f64,
    pub content: T,
}

impl<T> PartitionItem<T> {
    pub fn new(weight: f64, content: T) -> Self {
        Self { weight, content }
    }
}

/// Where a segment's label is drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LabelPlacement {
    /// Inside the segment.
    Inline,
    /// Over the segment's trailing edge.
    Overlay,
}

/// Computed width of one item.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Share<T> {
    /// Effective weight after sanitizing.
    pub weight: f64,
    /// Width as a percentage of the whole bar.
    pub percentage: f64,
    pub placement: LabelPlacement,
    pub content: T,
}

/// Negative and non-finite weights count as zero.
#[inline]
fn sanitize(weight: f64) -> f64 {
    if weight.is_finite() && weight > 0.0 {
        weight
    } else {
        0.0
    }
}

/// Computes each item's share of the total weight.
///
/// A zero total yields 0% for every item. Items with a share strictly
/// greater than `visibility_threshold_pct` get an inline label.
///
/// # Arguments
///
/// * `items` - Weighted items in display order
/// * `visibility_threshold_pct` - Inline label threshold in percent
pub fn partition<T>(items: Vec<PartitionItem<T>>, visibility_threshold_pct: f64) -> Vec<Share<T>> {
    let total: f64 = items.iter().map(|item| sanitize(item.weight)).sum();

    items
        .into_iter()
        .map(|item| {
            let weight = sanitize(item.weight);
            let percentage = if total > 0.0 { weight / total * 100.0 } else { 0.0 };
            let placement = if percentage > visibility_threshold_pct {
                LabelPlacement::Inline
            } else {
                LabelPlacement::Overlay
            };

            Share {
                weight,
                percentage,
                placement,
                content: item.content,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn percentages(weights: &[f64]) -> Vec<f64> {
        let items = weights.iter().map(|&w| PartitionItem::new(w, ())).collect();
        partition(items, DEFAULT_VISIBILITY_THRESHOLD_PCT)
            .into_iter()
            .map(|s| s.percentage)
            .collect()
    }

    #[test]
    fn test_shares_match_weights_summing_to_100() {
        assert_eq!(percentages(&[92.0, 8.0]), vec![92.0, 8.0]);
    }

    #[test]
    fn test_all_zero_weights() {
        assert_eq!(percentages(&[0.0, 0.0, 0.0]), vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_empty_input() {
        assert!(percentages(&[]).is_empty());
    }

    #[test]
    fn test_shares_sum_to_100() {
        let shares = percentages(&[132.0, 12.0, 7.0]);
        let sum: f64 = shares.iter().sum();
        assert!((sum - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_invalid_weights_count_as_zero() {
        assert_eq!(percentages(&[-5.0, 50.0, f64::NAN, 50.0]), vec![0.0, 50.0, 0.0, 50.0]);
    }

    #[test]
    fn test_label_placement_threshold_is_strict() {
        let items = vec![
            PartitionItem::new(92.0, "balanced"),
            PartitionItem::new(8.0, "left"),
        ];
        let shares = partition(items, 8.0);

        assert_eq!(shares[0].placement, LabelPlacement::Inline);
        // Exactly at the threshold still renders as overlay
        assert_eq!(shares[1].placement, LabelPlacement::Overlay);
        assert_eq!(shares[1].content, "left");
    }

    #[test]
    fn test_content_preserved_in_order() {
        let items = vec![PartitionItem::new(1.0, 'a'), PartitionItem::new(3.0, 'b')];
        let shares = partition(items, 8.0);

        assert_eq!(shares[0].content, 'a');
        assert_eq!(shares[0].percentage, 25.0);
        assert_eq!(shares[1].content, 'b');
        assert_eq!(shares[1].percentage, 75.0);
    }
}
