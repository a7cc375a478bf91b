//! # Telemetry Module
//!
//! Fixed-capacity rolling history of pack telemetry for streaming charts.
//!
//! This module handles:
//! - Seeding the window with synthetic history before a source is available
//! - Appending one sample per tick as a bounded random walk
//! - Evicting the oldest sample once the window is full (FIFO)
//! - Handing out immutable snapshots to readers
//!
//! ## Usage
//!
//! ```
//! use bms_dashboard::telemetry::TelemetryWindow;
//! use chrono::{Duration, Utc};
//!
//! let mut window = TelemetryWindow::new(31);
//! let mut rng = rand::rng();
//!
//! window.seed(31, Utc::now(), Duration::minutes(1), &mut rng);
//! window.tick(Utc::now() + Duration::seconds(5), &mut rng);
//!
//! let snapshot = window.snapshot();
//! assert_eq!(snapshot.len(), 31);
//! ```

pub mod model;

use std::collections::VecDeque;
use std::ops::Deref;
use std::sync::Arc;

use chrono::{DateTime, Duration, Local, Utc};
use rand::Rng;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{DashboardError, Result};

/// Default window capacity: 30 minutes of 1-minute history plus the current sample.
pub const DEFAULT_CAPACITY: usize = 31;

/// One point of the historical series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TelemetrySample {
    pub timestamp: DateTime<Utc>,
    /// State of charge (%).
    pub soc: f64,
    /// Max minus min cell voltage (V).
    pub cell_delta: f64,
    pub temp_high: f64,
    pub temp_avg: f64,
    pub voltage_min: f64,
    pub voltage_max: f64,
    pub voltage_avg: f64,
}

impl TelemetrySample {
    /// Chart axis label (`HH:MM`, local time).
    pub fn time_label(&self) -> String {
        self.timestamp.with_timezone(&Local).format("%H:%M").to_string()
    }
}

/// Immutable view of the window as of the last completed mutation.
#[derive(Debug, Clone)]
pub struct TelemetrySnapshot(Arc<[TelemetrySample]>);

impl TelemetrySnapshot {
    /// Snapshot with no samples.
    pub fn empty() -> Self {
        Self(Arc::from(Vec::new()))
    }
}

impl Deref for TelemetrySnapshot {
    type Target = [TelemetrySample];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Fixed-capacity, chronologically ordered sample buffer.
///
/// Index 0 is always the oldest retained sample. Only the telemetry tick
/// mutates the window; readers take a [`TelemetrySnapshot`].
#[derive(Debug, Clone)]
pub struct TelemetryWindow {
    samples: VecDeque<TelemetrySample>,
    capacity: usize,
}

impl Default for TelemetryWindow {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl TelemetryWindow {
    /// Creates an empty window. A capacity of 0 is raised to 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity + 1),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Most recent sample.
    pub fn latest(&self) -> Option<&TelemetrySample> {
        self.samples.back()
    }

    /// Oldest retained sample.
    pub fn oldest(&self) -> Option<&TelemetrySample> {
        self.samples.front()
    }

    /// Samples from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &TelemetrySample> {
        self.samples.iter()
    }

    /// Replaces the contents with `count` synthetic samples ending at `now`.
    ///
    /// Samples are spaced `step` apart. If `count` exceeds the capacity only
    /// the newest `capacity` samples are kept.
    ///
    /// # Arguments
    ///
    /// * `count` - Number of time steps to generate
    /// * `now` - Timestamp of the newest sample
    /// * `step` - Spacing between samples (1 minute by default)
    /// * `rng` - Jitter source
    pub fn seed<R: Rng>(&mut self, count: usize, now: DateTime<Utc>, step: Duration, rng: &mut R) {
        self.samples.clear();

        // Only the newest `capacity` samples survive, so older ones are never built
        let retained = count.min(self.capacity);
        for steps_ago in (0..retained).rev() {
            let timestamp = i32::try_from(steps_ago)
                .ok()
                .and_then(|n| step.checked_mul(n))
                .and_then(|offset| now.checked_sub_signed(offset));

            match timestamp {
                Some(timestamp) => {
                    let sample = model::seeded_sample(steps_ago, count, timestamp, rng);
                    self.append(sample);
                }
                None => warn!("Seed step {} out of time range, skipped", steps_ago),
            }
        }

        debug!("Seeded telemetry window with {} samples", self.samples.len());
    }

    /// Appends one sample derived from the most recent one.
    ///
    /// An empty window receives a fresh seeded sample instead. If `now`
    /// precedes the latest sample (the wall clock stepped back) the new
    /// sample reuses the latest timestamp, so ticks keep flowing.
    ///
    /// # Returns
    ///
    /// * `TelemetrySample` - The appended sample
    pub fn tick<R: Rng>(&mut self, now: DateTime<Utc>, rng: &mut R) -> TelemetrySample {
        let sample = match self.latest() {
            Some(previous) => {
                if now < previous.timestamp {
                    debug!("Clock behind latest sample by {}", previous.timestamp - now);
                }
                model::next_sample(previous, now.max(previous.timestamp), rng)
            }
            None => model::seeded_sample(0, 1, now, rng),
        };

        self.append(sample);
        sample
    }

    /// Appends an externally produced sample, evicting the oldest when full.
    ///
    /// # Returns
    ///
    /// * `Result<Option<TelemetrySample>>` - The evicted sample, if any
    ///
    /// # Errors
    ///
    /// Returns `MalformedReading` if the sample is older than the latest one.
    pub fn push(&mut self, sample: TelemetrySample) -> Result<Option<TelemetrySample>> {
        if let Some(latest) = self.latest() {
            if sample.timestamp < latest.timestamp {
                return Err(DashboardError::MalformedReading(format!(
                    "sample at {} precedes latest sample at {}",
                    sample.timestamp, latest.timestamp
                )));
            }
        }

        Ok(self.append(sample))
    }

    fn append(&mut self, sample: TelemetrySample) -> Option<TelemetrySample> {
        self.samples.push_back(sample);
        if self.samples.len() > self.capacity {
            self.samples.pop_front()
        } else {
            None
        }
    }

    /// Copies the current contents into an immutable snapshot.
    pub fn snapshot(&self) -> TelemetrySnapshot {
        TelemetrySnapshot(self.samples.iter().copied().collect())
    }
}
