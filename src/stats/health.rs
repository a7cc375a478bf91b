//! # Cell Health Classification
//!
//! Threshold checks used to flag segments and individual cells on the
//! segment grid.

use serde::Serialize;

use super::PackStats;
use crate::pack::Segment;

/// Voltage below which a cell is flagged (V).
pub const CELL_UNDERVOLTAGE_WARN: f64 = 3.3;

/// Voltage above which a cell is flagged (V).
pub const CELL_OVERVOLTAGE_WARN: f64 = 4.1;

/// Temperature above which a thermistor is flagged (°C).
pub const CELL_OVERTEMP_WARN: f64 = 38.0;

/// Tolerance when matching a temperature against the pack maximum (°C).
pub const MAX_TEMP_MATCH_TOLERANCE: f64 = 0.01;

/// Returns true if a voltage is outside the normal operating window.
#[inline]
pub fn voltage_out_of_range(voltage: f64) -> bool {
    voltage < CELL_UNDERVOLTAGE_WARN || voltage > CELL_OVERVOLTAGE_WARN
}

/// Returns true if any cell in the segment needs attention.
pub fn segment_has_warning(segment: &Segment) -> bool {
    segment.voltages().iter().any(|&v| voltage_out_of_range(v))
        || segment.temperatures().iter().any(|&t| t > CELL_OVERTEMP_WARN)
}

/// Display flags for one voltage channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct VoltageCellStatus {
    pub out_of_range: bool,
    pub is_balancing: bool,
    /// Cell holds the pack-wide minimum or maximum voltage.
    pub is_pack_extreme: bool,
}

/// Display flags for one thermistor channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct TemperatureCellStatus {
    pub over_temperature: bool,
    pub is_pack_max: bool,
}

/// Classifies the voltage channel at `index` of `segment`.
///
/// Returns `None` if `index` is past the last voltage channel.
pub fn classify_voltage_cell(
    segment: &Segment,
    index: usize,
    pack: &PackStats,
) -> Option<VoltageCellStatus> {
    let voltage = *segment.voltages().get(index)?;

    Some(VoltageCellStatus {
        out_of_range: voltage_out_of_range(voltage),
        is_balancing: segment.is_balancing(index),
        is_pack_extreme: voltage == pack.min_voltage || voltage == pack.max_voltage,
    })
}

/// Classifies a single thermistor reading.
pub fn classify_temperature_cell(temperature: f64, pack: &PackStats) -> TemperatureCellStatus {
    TemperatureCellStatus {
        over_temperature: temperature > CELL_OVERTEMP_WARN,
        is_pack_max: (temperature - pack.max_temp).abs() < MAX_TEMP_MATCH_TOLERANCE,
    }
}
