//! # Dashboard Engine
//!
//! Turns raw segment readings into an immutable, internally consistent view.
//!
//! Each ingestion builds a fresh [`Pack`], derives pack and segment
//! statistics, heatmap colors, warning flags and the balancing bar from it,
//! and publishes the result as one [`PackView`]. A failure anywhere along the
//! way leaves the previously published view in place.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::Result;
use crate::heatmap::{Rgb, TemperatureScale, VoltageScale};
use crate::layout::partition::{partition, PartitionItem, Share, DEFAULT_VISIBILITY_THRESHOLD_PCT};
use crate::pack::{ChannelLayout, Pack, Segment, SegmentReadings};
use crate::stats::health::segment_has_warning;
use crate::stats::{
    balancing_progress, compute_pack_stats, compute_segment_stats_with_threshold,
    BalancingProgress, PackStats, SegmentStats, IMBALANCE_THRESHOLD_VOLTS,
};

/// Balancing target used when none is configured (mV).
pub const DEFAULT_TARGET_CELL_DELTA_MV: f64 = 10.0;

/// Label of the balanced share in the balancing partition bar.
pub const BALANCED_LABEL: &str = "Balanced";
/// Label of the remaining share in the balancing partition bar.
pub const REMAINING_LABEL: &str = "Balancing";

/// Heatmap colors and warning flag for one segment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentHeatmap {
    pub segment_number: u32,
    /// Any cell outside the voltage window or over temperature.
    pub has_warning: bool,
    pub voltage_colors: Vec<Rgb>,
    pub temperature_colors: Vec<Rgb>,
}

/// One pack snapshot together with everything derived from it.
#[derive(Debug, Clone, PartialEq)]
pub struct PackView {
    /// Monotonic ingestion counter, starting at 1.
    pub sequence: u64,
    pub pack: Pack,
    pub stats: PackStats,
    pub segments: Vec<SegmentStats>,
    pub heatmaps: Vec<SegmentHeatmap>,
    pub balancing: BalancingProgress,
    /// Balanced and remaining cells as partition bar shares.
    pub balancing_shares: Vec<Share<&'static str>>,
    pub voltage_scale: VoltageScale,
    pub temperature_scale: TemperatureScale,
}

impl PackView {
    /// Statistics for a segment by its 1-based number.
    pub fn segment_stats(&self, number: u32) -> Option<&SegmentStats> {
        self.segments.iter().find(|s| s.segment_number == number)
    }

    pub fn segment_heatmap(&self, number: u32) -> Option<&SegmentHeatmap> {
        self.heatmaps.iter().find(|h| h.segment_number == number)
    }

    /// Heatmap color of a voltage on this view's scale.
    pub fn voltage_color(&self, voltage: f64) -> Rgb {
        self.voltage_scale.color(voltage)
    }

    /// Heatmap color of a temperature on this view's scale.
    pub fn temperature_color(&self, temperature: f64) -> Rgb {
        self.temperature_scale.color(temperature)
    }
}

/// Owns the current [`PackView`] and replaces it on every successful ingest.
#[derive(Debug, Clone)]
pub struct Dashboard {
    layout: ChannelLayout,
    imbalance_threshold_volts: f64,
    target_cell_delta_mv: f64,
    voltage_scale: VoltageScale,
    temperature_scale: TemperatureScale,
    visibility_threshold_pct: f64,
    sequence: u64,
    view: Option<Arc<PackView>>,
}

impl Dashboard {
    /// Creates an engine for `layout` with the default thresholds and scales.
    pub fn new(layout: ChannelLayout) -> Self {
        Self {
            layout,
            imbalance_threshold_volts: IMBALANCE_THRESHOLD_VOLTS,
            target_cell_delta_mv: DEFAULT_TARGET_CELL_DELTA_MV,
            voltage_scale: VoltageScale::default(),
            temperature_scale: TemperatureScale::default(),
            visibility_threshold_pct: DEFAULT_VISIBILITY_THRESHOLD_PCT,
            sequence: 0,
            view: None,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            imbalance_threshold_volts: config.statistics.imbalance_threshold_volts,
            target_cell_delta_mv: config.statistics.target_cell_delta_mv,
            voltage_scale: config.voltage_scale(),
            temperature_scale: config.temperature_scale(),
            visibility_threshold_pct: config.layout.visibility_threshold_pct,
            ..Self::new(config.channel_layout())
        }
    }

    pub fn layout(&self) -> ChannelLayout {
        self.layout
    }

    pub fn target_cell_delta_mv(&self) -> f64 {
        self.target_cell_delta_mv
    }

    /// Most recently published view, if any ingest has succeeded.
    pub fn view(&self) -> Option<Arc<PackView>> {
        self.view.clone()
    }

    /// Builds and publishes a new view from one set of readings.
    ///
    /// # Arguments
    ///
    /// * `readings` - One entry per segment from the pack source
    ///
    /// # Returns
    ///
    /// * `Result<Arc<PackView>>` - The newly published view
    ///
    /// # Errors
    ///
    /// Returns `MalformedReading` or `EmptyInput` if the readings cannot form
    /// a pack or cannot be aggregated. The current view is left unchanged.
    pub fn ingest(&mut self, readings: Vec<SegmentReadings>) -> Result<Arc<PackView>> {
        match self.build(readings) {
            Ok(view) => {
                let view = Arc::new(view);
                self.sequence = view.sequence;
                self.view = Some(Arc::clone(&view));
                debug!(
                    "Ingested snapshot {} ({} cells, delta {:.3}V)",
                    view.sequence,
                    view.pack.cell_count(),
                    view.stats.cell_delta
                );
                Ok(view)
            }
            Err(e) => {
                warn!("Rejected pack snapshot, keeping previous view: {}", e);
                Err(e)
            }
        }
    }

    fn build(&self, readings: Vec<SegmentReadings>) -> Result<PackView> {
        let pack = Pack::from_readings(self.layout, readings)?;
        let stats = compute_pack_stats(&pack)?;
        let segments = compute_segment_stats_with_threshold(&pack, self.imbalance_threshold_volts)?;
        let balancing = balancing_progress(&pack, self.target_cell_delta_mv)?;
        let heatmaps = pack.segments().iter().map(|s| self.heatmap(s)).collect();

        let balancing_shares = partition(
            vec![
                PartitionItem::new(balancing.balanced as f64, BALANCED_LABEL),
                PartitionItem::new(balancing.remaining as f64, REMAINING_LABEL),
            ],
            self.visibility_threshold_pct,
        );

        Ok(PackView {
            sequence: self.sequence + 1,
            pack,
            stats,
            segments,
            heatmaps,
            balancing,
            balancing_shares,
            voltage_scale: self.voltage_scale,
            temperature_scale: self.temperature_scale,
        })
    }

    fn heatmap(&self, segment: &Segment) -> SegmentHeatmap {
        SegmentHeatmap {
            segment_number: segment.number(),
            has_warning: segment_has_warning(segment),
            voltage_colors: segment.voltages().iter().map(|&v| self.voltage_scale.color(v)).collect(),
            temperature_colors: segment
                .temperatures()
                .iter()
                .map(|&t| self.temperature_scale.color(t))
                .collect(),
        }
    }
}
