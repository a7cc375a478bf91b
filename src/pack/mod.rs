//! # Pack Data Model
//!
//! Typed, immutable representation of a battery pack snapshot.
//!
//! A pack is made of segments (physical modules), each owning an ordered set
//! of voltage channels and an independently sized set of temperature
//! channels. Channel order is the physical wiring order and is never changed.
//!
//! ## Usage
//!
//! ```
//! use bms_dashboard::pack::{ChannelLayout, Pack, SegmentReadings};
//!
//! let layout = ChannelLayout::new(2, 1);
//! let readings = vec![SegmentReadings {
//!     segment_number: 1,
//!     voltages: vec![3.70, 3.72],
//!     temperatures: vec![28.5],
//!     balancing: vec![1],
//! }];
//!
//! let pack = Pack::from_readings(layout, readings)?;
//! assert_eq!(pack.segments().len(), 1);
//! assert!(pack.segments()[0].is_balancing(1));
//! # Ok::<(), bms_dashboard::error::DashboardError>(())
//! ```

use serde::Serialize;

use crate::error::{DashboardError, Result};

/// Per-segment channel counts, fixed at configuration time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChannelLayout {
    /// Number of cell voltage channels per segment.
    pub voltage_channels: usize,
    /// Number of thermistor channels per segment.
    pub temperature_channels: usize,
}

impl ChannelLayout {
    /// Creates a layout with the given voltage and temperature channel counts.
    #[must_use]
    pub fn new(voltage_channels: usize, temperature_channels: usize) -> Self {
        Self {
            voltage_channels,
            temperature_channels,
        }
    }
}

impl Default for ChannelLayout {
    fn default() -> Self {
        Self::new(24, 20)
    }
}

/// Raw readings for one segment as delivered by the transport.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentReadings {
    /// 1-based segment identity.
    pub segment_number: u32,
    /// Cell voltages in volts, in channel order.
    pub voltages: Vec<f64>,
    /// Thermistor temperatures in °C, in channel order.
    pub temperatures: Vec<f64>,
    /// Indices of voltage channels currently being balanced.
    pub balancing: Vec<usize>,
}

/// A single addressable measurement point.
///
/// Voltage and temperature channels are addressed independently, so a cell
/// index beyond the thermistor count has no temperature.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cell {
    pub voltage: f64,
    pub temperature: Option<f64>,
    pub is_balancing: bool,
}

/// One physical module of the pack.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    number: u32,
    voltages: Vec<f64>,
    temperatures: Vec<f64>,
    balancing: Vec<bool>,
}

impl Segment {
    /// 1-based segment identity.
    pub fn number(&self) -> u32 {
        self.number
    }

    /// Cell voltages in channel order.
    pub fn voltages(&self) -> &[f64] {
        &self.voltages
    }

    /// Thermistor temperatures in channel order.
    pub fn temperatures(&self) -> &[f64] {
        &self.temperatures
    }

    /// Returns true if the voltage channel at `index` is balancing.
    ///
    /// Out-of-range indices are never balancing.
    pub fn is_balancing(&self, index: usize) -> bool {
        self.balancing.get(index).copied().unwrap_or(false)
    }

    /// Number of channels currently balancing.
    pub fn balancing_count(&self) -> usize {
        self.balancing.iter().filter(|&&b| b).count()
    }

    /// Returns the cell at `index`, or `None` past the last voltage channel.
    pub fn cell(&self, index: usize) -> Option<Cell> {
        let voltage = *self.voltages.get(index)?;
        Some(Cell {
            voltage,
            temperature: self.temperatures.get(index).copied(),
            is_balancing: self.is_balancing(index),
        })
    }

    /// Iterates over all cells in channel order.
    pub fn cells(&self) -> impl Iterator<Item = Cell> + '_ {
        (0..self.voltages.len()).filter_map(move |i| self.cell(i))
    }
}

/// Immutable snapshot of the whole pack.
///
/// Every ingestion cycle builds a new `Pack`; nothing mutates one after
/// construction.
#[derive(Debug, Clone, PartialEq)]
pub struct Pack {
    layout: ChannelLayout,
    segments: Vec<Segment>,
}

impl Pack {
    /// Builds a pack snapshot from raw per-segment readings.
    ///
    /// # Arguments
    ///
    /// * `layout` - Expected channel counts for every segment
    /// * `readings` - One entry per segment, in display order
    ///
    /// # Returns
    ///
    /// * `Result<Pack>` - Validated snapshot
    ///
    /// # Errors
    ///
    /// Returns `MalformedReading` if:
    /// - A voltage or temperature array length differs from the layout
    /// - A balancing index is outside the voltage channels
    /// - A reading is NaN or infinite
    /// - A segment number is 0 or appears twice
    pub fn from_readings(layout: ChannelLayout, readings: Vec<SegmentReadings>) -> Result<Self> {
        let mut segments = Vec::with_capacity(readings.len());

        for reading in readings {
            let number = reading.segment_number;

            if number == 0 {
                return Err(DashboardError::MalformedReading(
                    "segment numbers are 1-based, got 0".to_string(),
                ));
            }

            if segments.iter().any(|s: &Segment| s.number == number) {
                return Err(DashboardError::MalformedReading(format!(
                    "duplicate segment {}",
                    number
                )));
            }

            if reading.voltages.len() != layout.voltage_channels {
                return Err(DashboardError::MalformedReading(format!(
                    "segment {}: expected {} voltages, got {}",
                    number,
                    layout.voltage_channels,
                    reading.voltages.len()
                )));
            }

            if reading.temperatures.len() != layout.temperature_channels {
                return Err(DashboardError::MalformedReading(format!(
                    "segment {}: expected {} temperatures, got {}",
                    number,
                    layout.temperature_channels,
                    reading.temperatures.len()
                )));
            }

            if let Some(bad) = reading
                .voltages
                .iter()
                .chain(reading.temperatures.iter())
                .find(|v| !v.is_finite())
            {
                return Err(DashboardError::MalformedReading(format!(
                    "segment {}: non-finite reading {}",
                    number, bad
                )));
            }

            let mut balancing = vec![false; layout.voltage_channels];
            for &index in &reading.balancing {
                match balancing.get_mut(index) {
                    Some(slot) => *slot = true,
                    None => {
                        return Err(DashboardError::MalformedReading(format!(
                            "segment {}: balancing index {} outside {} channels",
                            number, index, layout.voltage_channels
                        )))
                    }
                }
            }

            segments.push(Segment {
                number,
                voltages: reading.voltages,
                temperatures: reading.temperatures,
                balancing,
            });
        }

        Ok(Self { layout, segments })
    }

    /// Channel layout the snapshot was validated against.
    pub fn layout(&self) -> ChannelLayout {
        self.layout
    }

    /// Segments in display order.
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Looks up a segment by its 1-based number.
    pub fn segment(&self, number: u32) -> Option<&Segment> {
        self.segments.iter().find(|s| s.number == number)
    }

    /// All cell voltages across all segments.
    pub fn voltages(&self) -> impl Iterator<Item = f64> + '_ {
        self.segments.iter().flat_map(|s| s.voltages.iter().copied())
    }

    /// All temperatures across all segments.
    pub fn temperatures(&self) -> impl Iterator<Item = f64> + '_ {
        self.segments.iter().flat_map(|s| s.temperatures.iter().copied())
    }

    /// Total number of voltage channels in the pack.
    pub fn cell_count(&self) -> usize {
        self.segments.len() * self.layout.voltage_channels
    }
}
