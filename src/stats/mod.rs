//! # Statistics Engine
//!
//! Pure aggregate computations over an immutable [`Pack`] snapshot.
//!
//! This module handles:
//! - Pack-wide aggregates (total voltage, extrema, cell delta, balancing flag)
//! - Per-segment aggregates including the imbalance count
//! - Balancing progress against the target cell delta
//!
//! All results are recomputed from scratch for each snapshot and are never
//! updated incrementally. Aggregating an empty set of measurements is an
//! [`DashboardError::EmptyInput`] instead of a NaN.

pub mod health;

use serde::Serialize;

use crate::error::{DashboardError, Result};
use crate::pack::{Pack, Segment};

/// Deviation from the segment average above which a cell counts as imbalanced (50 mV).
pub const IMBALANCE_THRESHOLD_VOLTS: f64 = 0.05;

/// Minimum, maximum, mean and sum of a set of measurements.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Summary {
    pub min: f64,
    pub max: f64,
    pub avg: f64,
    pub sum: f64,
    pub count: usize,
}

impl Summary {
    /// Spread between the largest and smallest value.
    pub fn delta(&self) -> f64 {
        self.max - self.min
    }
}

/// Summarizes a set of measurements in one pass.
///
/// # Arguments
///
/// * `values` - Measurements to aggregate
/// * `what` - Description used in the error message
///
/// # Errors
///
/// Returns `EmptyInput` if `values` yields nothing.
pub fn summarize<I>(values: I, what: &str) -> Result<Summary>
where
    I: IntoIterator<Item = f64>,
{
    let mut iter = values.into_iter();
    let first = iter
        .next()
        .ok_or_else(|| DashboardError::EmptyInput(format!("no {} to aggregate", what)))?;

    let mut summary = Summary {
        min: first,
        max: first,
        avg: 0.0,
        sum: first,
        count: 1,
    };

    for value in iter {
        summary.min = summary.min.min(value);
        summary.max = summary.max.max(value);
        summary.sum += value;
        summary.count += 1;
    }

    summary.avg = summary.sum / summary.count as f64;
    Ok(summary)
}

/// Pack-wide aggregates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PackStats {
    /// Sum of every cell voltage in the pack (V).
    pub total_voltage: f64,
    /// Mean of every thermistor reading (°C).
    pub avg_temperature: f64,
    pub min_voltage: f64,
    pub max_voltage: f64,
    /// `max_voltage - min_voltage` (V).
    pub cell_delta: f64,
    pub max_temp: f64,
    /// True if any cell in any segment is balancing.
    pub balancing_active: bool,
}

/// Aggregates scoped to one segment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SegmentStats {
    pub segment_number: u32,
    pub min_voltage: f64,
    pub avg_voltage: f64,
    pub max_voltage: f64,
    pub voltage_delta: f64,
    pub min_temp: f64,
    pub avg_temp: f64,
    pub max_temp: f64,
    pub temp_delta: f64,
    /// Cells deviating from the segment average by more than the threshold.
    pub imbalance_count: usize,
}

/// Computes pack-wide aggregates.
///
/// # Errors
///
/// Returns `EmptyInput` if the pack has no voltage or no temperature channels.
///
/// # Examples
///
/// ```
/// use bms_dashboard::pack::{ChannelLayout, Pack, SegmentReadings};
/// use bms_dashboard::stats::compute_pack_stats;
///
/// let pack = Pack::from_readings(
///     ChannelLayout::new(2, 1),
///     vec![SegmentReadings {
///         segment_number: 1,
///         voltages: vec![3.6, 3.8],
///         temperatures: vec![30.0],
///         balancing: vec![],
///     }],
/// )?;
///
/// let stats = compute_pack_stats(&pack)?;
/// assert!((stats.total_voltage - 7.4).abs() < 1e-9);
/// assert!(!stats.balancing_active);
/// # Ok::<(), bms_dashboard::error::DashboardError>(())
/// ```
pub fn compute_pack_stats(pack: &Pack) -> Result<PackStats> {
    let voltages = summarize(pack.voltages(), "cell voltages")?;
    let temperatures = summarize(pack.temperatures(), "cell temperatures")?;

    Ok(PackStats {
        total_voltage: voltages.sum,
        avg_temperature: temperatures.avg,
        min_voltage: voltages.min,
        max_voltage: voltages.max,
        cell_delta: voltages.delta(),
        max_temp: temperatures.max,
        balancing_active: pack.segments().iter().any(|s| s.balancing_count() > 0),
    })
}

/// Computes per-segment aggregates with the fixed 50 mV imbalance threshold.
///
/// # Errors
///
/// Returns `EmptyInput` if any segment has no voltage or temperature channels.
pub fn compute_segment_stats(pack: &Pack) -> Result<Vec<SegmentStats>> {
    compute_segment_stats_with_threshold(pack, IMBALANCE_THRESHOLD_VOLTS)
}

/// Computes per-segment aggregates with an explicit imbalance threshold.
pub fn compute_segment_stats_with_threshold(
    pack: &Pack,
    threshold_volts: f64,
) -> Result<Vec<SegmentStats>> {
    pack.segments()
        .iter()
        .map(|segment| segment_stats(segment, threshold_volts))
        .collect()
}

/// Aggregates a single segment.
pub fn segment_stats(segment: &Segment, threshold_volts: f64) -> Result<SegmentStats> {
    let what_v = format!("voltages in segment {}", segment.number());
    let what_t = format!("temperatures in segment {}", segment.number());
    let voltages = summarize(segment.voltages().iter().copied(), &what_v)?;
    let temperatures = summarize(segment.temperatures().iter().copied(), &what_t)?;

    Ok(SegmentStats {
        segment_number: segment.number(),
        min_voltage: voltages.min,
        avg_voltage: voltages.avg,
        max_voltage: voltages.max,
        voltage_delta: voltages.delta(),
        min_temp: temperatures.min,
        avg_temp: temperatures.avg,
        max_temp: temperatures.max,
        temp_delta: temperatures.delta(),
        imbalance_count: imbalance_count(segment.voltages(), voltages.avg, threshold_volts),
    })
}

/// Counts voltages with `|v - avg| > threshold` (strictly greater).
pub fn imbalance_count(voltages: &[f64], avg: f64, threshold_volts: f64) -> usize {
    voltages
        .iter()
        .filter(|&&v| (v - avg).abs() > threshold_volts)
        .count()
}

/// Cells within and outside the target delta.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BalancingProgress {
    pub balanced: usize,
    pub remaining: usize,
}

impl BalancingProgress {
    pub fn total(&self) -> usize {
        self.balanced + self.remaining
    }
}

/// Counts cells whose voltage is within `target_delta_mv` of the pack minimum.
///
/// The target delta is a user setting distinct from [`IMBALANCE_THRESHOLD_VOLTS`].
///
/// # Errors
///
/// Returns `EmptyInput` if the pack has no voltage channels.
pub fn balancing_progress(pack: &Pack, target_delta_mv: f64) -> Result<BalancingProgress> {
    let floor = summarize(pack.voltages(), "cell voltages")?.min;
    let target = target_delta_mv / 1000.0;

    let balanced = pack.voltages().filter(|&v| v - floor <= target).count();
    Ok(BalancingProgress {
        balanced,
        remaining: pack.cell_count() - balanced,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pack::{ChannelLayout, SegmentReadings};

    fn pack_from(segments: Vec<(Vec<f64>, Vec<f64>, Vec<usize>)>) -> Pack {
        let layout = ChannelLayout::new(segments[0].0.len(), segments[0].1.len());
        let readings = segments
            .into_iter()
            .enumerate()
            .map(|(i, (voltages, temperatures, balancing))| SegmentReadings {
                segment_number: i as u32 + 1,
                voltages,
                temperatures,
                balancing,
            })
            .collect();
        Pack::from_readings(layout, readings).unwrap()
    }

    fn assert_close(a: f64, b: f64) {
        assert!((a - b).abs() < 1e-9, "{} != {}", a, b);
    }

    #[test]
    fn test_summarize_empty_is_error() {
        match summarize(Vec::<f64>::new(), "widgets") {
            Err(DashboardError::EmptyInput(msg)) => assert!(msg.contains("widgets")),
            other => panic!("Expected EmptyInput, got: {:?}", other),
        }
    }

    #[test]
    fn test_summarize_values() {
        let s = summarize(vec![3.0, 1.0, 2.0], "values").unwrap();
        assert_eq!(s.min, 1.0);
        assert_eq!(s.max, 3.0);
        assert_eq!(s.sum, 6.0);
        assert_eq!(s.avg, 2.0);
        assert_eq!(s.count, 3);
        assert_eq!(s.delta(), 2.0);
    }

    #[test]
    fn test_pack_stats() {
        let pack = pack_from(vec![
            (vec![3.6, 3.7, 3.8], vec![25.0, 35.0], vec![]),
            (vec![3.5, 3.9, 3.7], vec![30.0, 40.0], vec![2]),
        ]);

        let stats = compute_pack_stats(&pack).unwrap();
        assert_close(stats.total_voltage, 22.2);
        assert_close(stats.avg_temperature, 32.5);
        assert_eq!(stats.min_voltage, 3.5);
        assert_eq!(stats.max_voltage, 3.9);
        assert_close(stats.cell_delta, 0.4);
        assert_eq!(stats.max_temp, 40.0);
        assert!(stats.balancing_active);
    }

    #[test]
    fn test_balancing_inactive_without_balancing_cells() {
        let pack = pack_from(vec![(vec![3.7, 3.7], vec![30.0], vec![])]);
        assert!(!compute_pack_stats(&pack).unwrap().balancing_active);
    }

    #[test]
    fn test_segment_stats_fields() {
        let pack = pack_from(vec![(vec![3.6, 3.7, 3.8], vec![20.0, 30.0], vec![])]);
        let stats = compute_segment_stats(&pack).unwrap();

        assert_eq!(stats.len(), 1);
        let s = stats[0];
        assert_eq!(s.segment_number, 1);
        assert_eq!(s.min_voltage, 3.6);
        assert_close(s.avg_voltage, 3.7);
        assert_eq!(s.max_voltage, 3.8);
        assert_close(s.voltage_delta, 0.2);
        assert_eq!(s.min_temp, 20.0);
        assert_eq!(s.avg_temp, 25.0);
        assert_eq!(s.max_temp, 30.0);
        assert_eq!(s.temp_delta, 10.0);
        // 3.6 and 3.8 deviate by 0.1 from the 3.7 average
        assert_eq!(s.imbalance_count, 2);
    }

    #[test]
    fn test_equal_voltages_have_no_imbalance_or_delta() {
        let pack = pack_from(vec![(vec![3.71; 24], vec![30.0; 20], vec![])]);
        let s = compute_segment_stats(&pack).unwrap()[0];

        assert_eq!(s.imbalance_count, 0);
        assert_eq!(s.voltage_delta, 0.0);
    }

    #[test]
    fn test_imbalance_threshold_is_strict() {
        // Deviation of exactly the threshold does not count
        assert_eq!(imbalance_count(&[1.0, 1.5], 1.25, 0.25), 0);
        assert_eq!(imbalance_count(&[1.0, 1.5], 1.25, 0.2), 2);
    }

    #[test]
    fn test_imbalance_uses_segment_own_average() {
        let pack = pack_from(vec![
            (vec![3.70, 3.72, 3.74, 3.90], vec![30.0], vec![]),
            (vec![4.00, 4.00, 4.00, 4.00], vec![30.0], vec![]),
        ]);
        let stats = compute_segment_stats(&pack).unwrap();

        // avg 3.765: only 3.70 and 3.90 deviate by more than 50 mV
        assert_eq!(stats[0].imbalance_count, 2);
        assert_eq!(stats[1].imbalance_count, 0);
    }

    #[test]
    fn test_segment_averages_weighted_match_pack_average() {
        let pack = pack_from(vec![
            (vec![3.61, 3.72, 3.83, 3.94], vec![25.0, 27.0, 29.0], vec![]),
            (vec![3.65, 3.66, 3.67, 3.98], vec![31.0, 33.0, 35.0], vec![]),
            (vec![3.90, 3.60, 3.75, 3.70], vec![37.0, 39.0, 21.0], vec![]),
        ]);

        let pack_stats = compute_pack_stats(&pack).unwrap();
        let segments = compute_segment_stats(&pack).unwrap();
        let cells = pack.layout().voltage_channels as f64;

        let weighted: f64 = segments.iter().map(|s| s.avg_voltage * cells).sum();
        let pack_avg = pack_stats.total_voltage / pack.cell_count() as f64;
        assert_close(weighted / pack.cell_count() as f64, pack_avg);

        let temp_weighted: f64 = segments.iter().map(|s| s.avg_temp).sum::<f64>() / 3.0;
        assert_close(temp_weighted, pack_stats.avg_temperature);
    }

    #[test]
    fn test_empty_segment_is_empty_input() {
        let layout = ChannelLayout::new(0, 0);
        let pack = Pack::from_readings(
            layout,
            vec![SegmentReadings {
                segment_number: 1,
                voltages: vec![],
                temperatures: vec![],
                balancing: vec![],
            }],
        )
        .unwrap();

        assert!(matches!(compute_pack_stats(&pack), Err(DashboardError::EmptyInput(_))));
        assert!(matches!(compute_segment_stats(&pack), Err(DashboardError::EmptyInput(_))));
    }

    #[test]
    fn test_pack_without_segments_is_empty_input() {
        let pack = Pack::from_readings(ChannelLayout::default(), vec![]).unwrap();
        assert!(compute_pack_stats(&pack).is_err());
        assert!(compute_segment_stats(&pack).unwrap().is_empty());
    }

    #[test]
    fn test_balancing_progress() {
        let pack = pack_from(vec![
            (vec![3.700, 3.705, 3.708, 3.730], vec![30.0], vec![]),
            (vec![3.702, 3.750, 3.700, 3.709], vec![30.0], vec![]),
        ]);

        let progress = balancing_progress(&pack, 10.0).unwrap();
        assert_eq!(progress.balanced, 6);
        assert_eq!(progress.remaining, 2);
        assert_eq!(progress.total(), 8);
    }
}
