//! # BMS Dashboard Library
//!
//! Telemetry aggregation and visualization engine for a multi-segment
//! battery pack.
//!
//! This library turns raw per-segment cell readings into validated pack
//! snapshots, pack and segment statistics, heatmap colors, a rolling
//! telemetry history and the presentation state (card order, partition bars)
//! a dashboard renders.

pub mod config;
pub mod dashboard;
pub mod error;
pub mod heatmap;
pub mod layout;
pub mod pack;
pub mod scheduler;
pub mod source;
pub mod stats;
pub mod telemetry;
