//! # Synthetic Telemetry Model
//!
//! Generates plausible pack history before a real source is available.
//!
//! Seeded history follows a slowly draining state of charge with sinusoidal
//! cell delta, temperature and voltage curves plus a small bounded jitter.
//! Live samples are a bounded random walk from the previous sample, each
//! field perturbed independently.

use chrono::{DateTime, Utc};
use rand::Rng;

use super::TelemetrySample;

/// State of charge at the start of the seeded history (%).
const SEED_SOC_START: f64 = 85.0;
/// State of charge drop per seeded step (%).
const SEED_SOC_DRAIN_PER_STEP: f64 = 0.5;
/// State of charge drift per live tick (%).
const LIVE_SOC_DRAIN_PER_TICK: f64 = 0.1;

/// Uniform jitter in `[-span / 2, span / 2)`.
#[inline]
fn jitter<R: Rng>(rng: &mut R, span: f64) -> f64 {
    (rng.random::<f64>() - 0.5) * span
}

/// Builds the seeded sample `steps_ago` steps before the newest one.
///
/// # Arguments
///
/// * `steps_ago` - Distance from the newest sample (0 = newest)
/// * `total` - Number of samples being seeded
/// * `timestamp` - Time of this sample
/// * `rng` - Jitter source
pub fn seeded_sample<R: Rng>(
    steps_ago: usize,
    total: usize,
    timestamp: DateTime<Utc>,
    rng: &mut R,
) -> TelemetrySample {
    let i = steps_ago as f64;
    let elapsed = total.saturating_sub(1).saturating_sub(steps_ago) as f64;

    let soc = SEED_SOC_START - elapsed * SEED_SOC_DRAIN_PER_STEP;
    let cell_delta = 0.05 + (i * 0.3).sin() * 0.02;
    let temp_high = 35.0 + (i * 0.2).sin() * 5.0;
    let temp_avg = 30.0 + (i * 0.2).sin() * 4.0;
    let voltage_wave = (i * 0.4).sin() * 0.05;

    TelemetrySample {
        timestamp,
        soc: (soc + jitter(rng, 2.0)).clamp(0.0, 100.0),
        cell_delta: (cell_delta + jitter(rng, 0.01)).max(0.0),
        temp_high: temp_high + jitter(rng, 2.0),
        temp_avg: temp_avg + jitter(rng, 2.0),
        voltage_min: 3.65 + voltage_wave + jitter(rng, 0.02),
        voltage_max: 3.85 + voltage_wave + jitter(rng, 0.02),
        voltage_avg: 3.75 + voltage_wave + jitter(rng, 0.02),
    }
}

/// Derives the next live sample from the previous one.
pub fn next_sample<R: Rng>(
    previous: &TelemetrySample,
    timestamp: DateTime<Utc>,
    rng: &mut R,
) -> TelemetrySample {
    TelemetrySample {
        timestamp,
        soc: (previous.soc - LIVE_SOC_DRAIN_PER_TICK + jitter(rng, 0.5)).clamp(0.0, 100.0),
        cell_delta: (previous.cell_delta + jitter(rng, 0.005)).max(0.0),
        temp_high: previous.temp_high + jitter(rng, 1.0),
        temp_avg: previous.temp_avg + jitter(rng, 0.8),
        voltage_min: previous.voltage_min + jitter(rng, 0.01),
        voltage_max: previous.voltage_max + jitter(rng, 0.01),
        voltage_avg: previous.voltage_avg + jitter(rng, 0.01),
    }
}
