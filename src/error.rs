//! # Error Types
//!
//! Custom error types for the BMS dashboard engine using `thiserror`.
//!
//! Every error is local and non-retryable. A caller handed a
//! [`DashboardError::MalformedReading`] skips that snapshot and keeps the
//! last good state.

use thiserror::Error;

/// Main error type for the BMS dashboard engine
#[derive(Debug, Error)]
pub enum DashboardError {
    /// Raw readings do not match the configured channel layout
    #[error("Malformed reading: {0}")]
    MalformedReading(String),

    /// Aggregation over a zero-length set of measurements
    #[error("Empty input: {0}")]
    EmptyInput(String),

    /// Reorder index outside the card permutation
    #[error("Index {index} out of range (len {len})")]
    IndexOutOfRange { index: usize, len: usize },

    /// Telemetry source failed to produce readings
    #[error("Pack source error: {0}")]
    Source(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for the BMS dashboard engine
pub type Result<T> = std::result::Result<T, DashboardError>;
