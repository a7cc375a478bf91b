//! # Pack Source Module
//!
//! Collaborators that feed raw readings into the engine.
//!
//! This module handles:
//! - The [`PackSource`] seam the ingestion tick pulls snapshots through
//! - A simulated source standing in for the future serial link
//! - The connection state machine shown by presentation

pub mod link;

use async_trait::async_trait;
use rand::Rng;

use crate::error::Result;
use crate::pack::{ChannelLayout, SegmentReadings};

/// Lower bound of simulated cell voltages (V).
const SIM_VOLTAGE_BASE: f64 = 3.6;
/// Width of the simulated voltage band (V).
const SIM_VOLTAGE_SPAN: f64 = 0.4;
/// Lower bound of simulated temperatures (°C).
const SIM_TEMP_BASE: f64 = 25.0;
/// Width of the simulated temperature band (°C).
const SIM_TEMP_SPAN: f64 = 15.0;

/// Produces one set of raw readings per ingestion cycle.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PackSource: Send {
    /// Fetches the latest per-segment readings.
    async fn next_readings(&mut self) -> Result<Vec<SegmentReadings>>;
}

/// Random readings in plausible ranges for running without hardware.
#[derive(Debug)]
pub struct SimulatedPackSource<R> {
    segments: u32,
    layout: ChannelLayout,
    rng: R,
}

impl<R: Rng + Send> SimulatedPackSource<R> {
    /// Creates a simulator for `segments` segments with the given layout.
    pub fn new(segments: u32, layout: ChannelLayout, rng: R) -> Self {
        Self {
            segments,
            layout,
            rng,
        }
    }

    /// Generates one full set of readings.
    pub fn generate(&mut self) -> Vec<SegmentReadings> {
        (1..=self.segments)
            .map(|segment_number| {
                let voltages = (0..self.layout.voltage_channels)
                    .map(|_| SIM_VOLTAGE_BASE + self.rng.random::<f64>() * SIM_VOLTAGE_SPAN)
                    .collect();
                let temperatures = (0..self.layout.temperature_channels)
                    .map(|_| SIM_TEMP_BASE + self.rng.random::<f64>() * SIM_TEMP_SPAN)
                    .collect();

                let channels = self.layout.voltage_channels;
                let balancing = if channels > 0 && self.rng.random_bool(0.5) {
                    vec![
                        self.rng.random_range(0..channels),
                        self.rng.random_range(0..channels),
                    ]
                } else {
                    Vec::new()
                };

                SegmentReadings {
                    segment_number,
                    voltages,
                    temperatures,
                    balancing,
                }
            })
            .collect()
    }
}

#[async_trait]
impl<R: Rng + Send> PackSource for SimulatedPackSource<R> {
    async fn next_readings(&mut self) -> Result<Vec<SegmentReadings>> {
        Ok(self.generate())
    }
}
