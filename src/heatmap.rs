//! # Heatmap Color Mapper
//!
//! Deterministic mapping from a cell measurement to a display color.
//!
//! ## Voltage
//!
//! Voltage colors encode the distance from nominal. The distance is
//! normalized by the larger of the two half-ranges (`max(4.2 - 3.7, 3.7 - 2.5)
//! = 1.2 V` with the defaults) and clamped to `0..=1`, then run through a
//! three-band gradient:
//!
//! | Band | Normalized | Colors |
//! |------|------------|--------|
//! | 1 | `[0, 0.33)` | green → yellow-green |
//! | 2 | `[0.33, 0.66)` | yellow → orange |
//! | 3 | `[0.66, 1]` | orange → red |
//!
//! ## Temperature
//!
//! Temperature colors are a linear position in `0..=60 °C` over five
//! 0.2-wide bands: blue → cyan → green → yellow → orange → red.
//!
//! ## Usage
//!
//! ```
//! use bms_dashboard::heatmap::{temperature_heat_color, voltage_heat_color, Rgb};
//!
//! assert_eq!(voltage_heat_color(3.7), Rgb::new(0, 255, 0));
//! assert_eq!(temperature_heat_color(0.0), Rgb::new(0, 0, 255));
//! assert_eq!(temperature_heat_color(60.0).to_string(), "rgb(255, 0, 0)");
//! ```

use std::fmt;

use serde::Serialize;

/// Nominal cell voltage (V).
pub const VOLTAGE_NOMINAL: f64 = 3.7;
/// Lower bound of the voltage scale (V).
pub const VOLTAGE_MIN: f64 = 2.5;
/// Upper bound of the voltage scale (V).
pub const VOLTAGE_MAX: f64 = 4.2;
/// Lower bound of the temperature scale (°C).
pub const TEMP_MIN: f64 = 0.0;
/// Upper bound of the temperature scale (°C).
pub const TEMP_MAX: f64 = 60.0;

/// 24-bit display color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    #[must_use]
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rgb({}, {}, {})", self.r, self.g, self.b)
    }
}

/// Rounds a channel intensity to the nearest integer and clamps it to `0..=255`.
#[inline]
fn channel(value: f64) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

/// Clamps a normalized position to `0..=1`. NaN maps to the far end.
#[inline]
fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        1.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Distance-from-nominal voltage scale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VoltageScale {
    pub nominal: f64,
    pub min: f64,
    pub max: f64,
}

impl Default for VoltageScale {
    fn default() -> Self {
        Self {
            nominal: VOLTAGE_NOMINAL,
            min: VOLTAGE_MIN,
            max: VOLTAGE_MAX,
        }
    }
}

impl VoltageScale {
    /// Normalized distance from nominal, `0.0` at nominal and `1.0` at the far bound.
    pub fn normalize(&self, voltage: f64) -> f64 {
        let distance = (voltage - self.nominal).abs();
        let max_distance = (self.max - self.nominal).abs().max((self.min - self.nominal).abs());

        if max_distance > 0.0 {
            clamp_unit(distance / max_distance)
        } else if distance > 0.0 {
            1.0
        } else {
            0.0
        }
    }

    /// Maps a voltage to its heatmap color.
    pub fn color(&self, voltage: f64) -> Rgb {
        let normalized = self.normalize(voltage);

        if normalized < 0.33 {
            let ratio = normalized * 3.0;
            Rgb::new(channel(ratio * 200.0), 255, 0)
        } else if normalized < 0.66 {
            let ratio = (normalized - 0.33) * 3.0;
            Rgb::new(255, channel(255.0 - ratio * 100.0), 0)
        } else {
            let ratio = (normalized - 0.66) * 3.0;
            Rgb::new(255, channel(155.0 - ratio * 155.0), 0)
        }
    }
}

/// Linear temperature scale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TemperatureScale {
    pub min: f64,
    pub max: f64,
}

impl Default for TemperatureScale {
    fn default() -> Self {
        Self {
            min: TEMP_MIN,
            max: TEMP_MAX,
        }
    }
}

impl TemperatureScale {
    /// Linear position of `temperature` inside the scale, clamped to `0..=1`.
    pub fn normalize(&self, temperature: f64) -> f64 {
        let span = self.max - self.min;
        if span > 0.0 {
            clamp_unit((temperature - self.min) / span)
        } else if temperature > self.min {
            1.0
        } else {
            0.0
        }
    }

    /// Maps a temperature to its heatmap color.
    pub fn color(&self, temperature: f64) -> Rgb {
        let normalized = self.normalize(temperature);

        if normalized < 0.2 {
            // Blue to cyan
            let ratio = normalized * 5.0;
            Rgb::new(0, channel(ratio * 200.0), 255)
        } else if normalized < 0.4 {
            // Cyan to green
            let ratio = (normalized - 0.2) * 5.0;
            Rgb::new(0, channel(200.0 + ratio * 55.0), channel(255.0 - ratio * 255.0))
        } else if normalized < 0.6 {
            // Green to yellow
            let ratio = (normalized - 0.4) * 5.0;
            Rgb::new(channel(ratio * 255.0), 255, 0)
        } else if normalized < 0.8 {
            // Yellow to orange
            let ratio = (normalized - 0.6) * 5.0;
            Rgb::new(255, channel(255.0 - ratio * 100.0), 0)
        } else {
            // Orange to red
            let ratio = (normalized - 0.8) * 5.0;
            Rgb::new(255, channel(155.0 - ratio * 155.0), 0)
        }
    }
}

/// Heatmap color for a cell voltage on the default scale.
pub fn voltage_heat_color(voltage: f64) -> Rgb {
    VoltageScale::default().color(voltage)
}

/// Heatmap color for a temperature on the default scale.
pub fn temperature_heat_color(temperature: f64) -> Rgb {
    TemperatureScale::default().color(temperature)
}
