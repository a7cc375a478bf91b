//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.
//!
//! Every section and field is optional; missing values fall back to the
//! defaults below.

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use tokio::time::Duration;

use crate::error::{DashboardError, Result};
use crate::heatmap::{TemperatureScale, VoltageScale};
use crate::pack::ChannelLayout;
use crate::source::link::LinkSettings;

/// Baud rates offered by the connection page.
pub const SUPPORTED_BAUD_RATES: &[u32] = &[9600, 19200, 38400, 57600, 115200, 230400, 460800, 921600];

/// Upper bound for the seeded history spacing (one day).
pub const MAX_SEED_STEP_S: u64 = 86_400;

/// Log levels accepted in `[logging].level`.
pub const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub pack: PackConfig,
    pub statistics: StatisticsConfig,
    pub heatmap: HeatmapConfig,
    pub telemetry: TelemetryConfig,
    pub layout: LayoutConfig,
    pub connection: ConnectionConfig,
    pub logging: LoggingConfig,
}

/// Pack geometry and ingestion cadence
#[derive(Debug, Deserialize, Clone)]
pub struct PackConfig {
    #[serde(default = "default_segments")]
    pub segments: u32,

    #[serde(default = "default_voltage_channels")]
    pub voltage_channels: usize,

    #[serde(default = "default_temperature_channels")]
    pub temperature_channels: usize,

    #[serde(default = "default_ingestion_interval_ms")]
    pub ingestion_interval_ms: u64,
}

/// Statistics policy values
#[derive(Debug, Deserialize, Clone)]
pub struct StatisticsConfig {
    #[serde(default = "default_imbalance_threshold_volts")]
    pub imbalance_threshold_volts: f64,

    /// Balancing target shown to the user; not used by the imbalance count.
    #[serde(default = "default_target_cell_delta_mv")]
    pub target_cell_delta_mv: f64,
}

/// Heatmap scale bounds
#[derive(Debug, Deserialize, Clone)]
pub struct HeatmapConfig {
    #[serde(default = "default_voltage_nominal")]
    pub voltage_nominal: f64,

    #[serde(default = "default_voltage_min")]
    pub voltage_min: f64,

    #[serde(default = "default_voltage_max")]
    pub voltage_max: f64,

    #[serde(default = "default_temp_min")]
    pub temp_min: f64,

    #[serde(default = "default_temp_max")]
    pub temp_max: f64,
}

/// Rolling telemetry window
#[derive(Debug, Deserialize, Clone)]
pub struct TelemetryConfig {
    #[serde(default = "default_buffer_capacity")]
    pub buffer_capacity: usize,

    #[serde(default = "default_seed_step_s")]
    pub seed_step_s: u64,

    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
}

/// Presentation layout values
#[derive(Debug, Deserialize, Clone)]
pub struct LayoutConfig {
    #[serde(default = "default_visibility_threshold_pct")]
    pub visibility_threshold_pct: f64,

    #[serde(default = "default_card_count")]
    pub card_count: usize,
}

/// Connection configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ConnectionConfig {
    #[serde(default = "default_port")]
    pub port: String,

    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    #[serde(default = "default_connect_delay_ms")]
    pub connect_delay_ms: u64,

    #[serde(default = "default_auto_connect")]
    pub auto_connect: bool,
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Directory for daily log files; empty disables file logging.
    #[serde(default)]
    pub log_dir: String,
}

// Default value functions
fn default_segments() -> u32 { 6 }
fn default_voltage_channels() -> usize { 24 }
fn default_temperature_channels() -> usize { 20 }
fn default_ingestion_interval_ms() -> u64 { 1000 }

fn default_imbalance_threshold_volts() -> f64 { crate::stats::IMBALANCE_THRESHOLD_VOLTS }
fn default_target_cell_delta_mv() -> f64 { 10.0 }

fn default_voltage_nominal() -> f64 { crate::heatmap::VOLTAGE_NOMINAL }
fn default_voltage_min() -> f64 { crate::heatmap::VOLTAGE_MIN }
fn default_voltage_max() -> f64 { crate::heatmap::VOLTAGE_MAX }
fn default_temp_min() -> f64 { crate::heatmap::TEMP_MIN }
fn default_temp_max() -> f64 { crate::heatmap::TEMP_MAX }

fn default_buffer_capacity() -> usize { crate::telemetry::DEFAULT_CAPACITY }
fn default_seed_step_s() -> u64 { 60 }
fn default_tick_interval_ms() -> u64 { 5000 }

fn default_visibility_threshold_pct() -> f64 { crate::layout::partition::DEFAULT_VISIBILITY_THRESHOLD_PCT }
fn default_card_count() -> usize { crate::layout::cards::DEFAULT_CARD_COUNT }

fn default_port() -> String { "/dev/ttyACM0".to_string() }
fn default_baud_rate() -> u32 { 115200 }
fn default_connect_delay_ms() -> u64 { 1000 }
fn default_auto_connect() -> bool { true }

fn default_log_level() -> String { "info".to_string() }

impl Default for PackConfig {
    fn default() -> Self {
        Self {
            segments: default_segments(),
            voltage_channels: default_voltage_channels(),
            temperature_channels: default_temperature_channels(),
            ingestion_interval_ms: default_ingestion_interval_ms(),
        }
    }
}

impl Default for StatisticsConfig {
    fn default() -> Self {
        Self {
            imbalance_threshold_volts: default_imbalance_threshold_volts(),
            target_cell_delta_mv: default_target_cell_delta_mv(),
        }
    }
}

impl Default for HeatmapConfig {
    fn default() -> Self {
        Self {
            voltage_nominal: default_voltage_nominal(),
            voltage_min: default_voltage_min(),
            voltage_max: default_voltage_max(),
            temp_min: default_temp_min(),
            temp_max: default_temp_max(),
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: default_buffer_capacity(),
            seed_step_s: default_seed_step_s(),
            tick_interval_ms: default_tick_interval_ms(),
        }
    }
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            visibility_threshold_pct: default_visibility_threshold_pct(),
            card_count: default_card_count(),
        }
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            baud_rate: default_baud_rate(),
            connect_delay_ms: default_connect_delay_ms(),
            auto_connect: default_auto_connect(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            log_dir: String::new(),
        }
    }
}

fn invalid(message: &str) -> DashboardError {
    DashboardError::Config(toml::de::Error::custom(message))
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    ///
    /// * `Result<Config>` - Loaded and validated configuration
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use bms_dashboard::config::Config;
    ///
    /// let config = Config::load("config/dashboard.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Parse and validate configuration from a TOML string
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    pub fn validate(&self) -> Result<()> {
        // Pack geometry
        if self.pack.segments == 0 {
            return Err(invalid("segments must be greater than 0"));
        }

        if self.pack.voltage_channels == 0 || self.pack.temperature_channels == 0 {
            return Err(invalid("voltage_channels and temperature_channels must be greater than 0"));
        }

        // Timing fields
        if self.pack.ingestion_interval_ms == 0 || self.pack.ingestion_interval_ms > 60000 {
            return Err(invalid("ingestion_interval_ms must be between 1 and 60000"));
        }

        if self.telemetry.tick_interval_ms == 0 || self.telemetry.tick_interval_ms > 600000 {
            return Err(invalid("tick_interval_ms must be between 1 and 600000"));
        }

        if self.telemetry.seed_step_s == 0 || self.telemetry.seed_step_s > MAX_SEED_STEP_S {
            return Err(invalid("seed_step_s must be between 1 and 86400"));
        }

        if self.telemetry.buffer_capacity == 0 {
            return Err(invalid("buffer_capacity must be greater than 0"));
        }

        if self.connection.connect_delay_ms > 60000 {
            return Err(invalid("connect_delay_ms must be at most 60000"));
        }

        // Statistics policy
        if !(self.statistics.imbalance_threshold_volts > 0.0) {
            return Err(invalid("imbalance_threshold_volts must be greater than 0"));
        }

        if !(5.0..=100.0).contains(&self.statistics.target_cell_delta_mv) {
            return Err(invalid("target_cell_delta_mv must be between 5 and 100"));
        }

        // Heatmap bounds
        let h = &self.heatmap;
        if !(h.voltage_min < h.voltage_max) {
            return Err(invalid("voltage_min must be less than voltage_max"));
        }

        if h.voltage_nominal < h.voltage_min || h.voltage_nominal > h.voltage_max {
            return Err(invalid("voltage_nominal must be within voltage_min and voltage_max"));
        }

        if !(h.temp_min < h.temp_max) {
            return Err(invalid("temp_min must be less than temp_max"));
        }

        // Layout
        let threshold = self.layout.visibility_threshold_pct;
        if !(threshold > 0.0 && threshold < 100.0) {
            return Err(invalid("visibility_threshold_pct must be between 0 and 100 (exclusive)"));
        }

        if self.layout.card_count == 0 {
            return Err(invalid("card_count must be greater than 0"));
        }

        // Logging
        if !LOG_LEVELS.contains(&self.logging.level.to_ascii_lowercase().as_str()) {
            return Err(invalid(&format!("logging level must be one of: {:?}", LOG_LEVELS)));
        }

        // Connection
        if self.connection.port.is_empty() {
            return Err(invalid("connection port cannot be empty"));
        }

        if !SUPPORTED_BAUD_RATES.contains(&self.connection.baud_rate) {
            return Err(invalid(&format!(
                "baud_rate must be one of: {:?}",
                SUPPORTED_BAUD_RATES
            )));
        }

        Ok(())
    }

    /// Per-segment channel counts
    pub fn channel_layout(&self) -> ChannelLayout {
        ChannelLayout::new(self.pack.voltage_channels, self.pack.temperature_channels)
    }

    pub fn voltage_scale(&self) -> VoltageScale {
        VoltageScale {
            nominal: self.heatmap.voltage_nominal,
            min: self.heatmap.voltage_min,
            max: self.heatmap.voltage_max,
        }
    }

    pub fn temperature_scale(&self) -> TemperatureScale {
        TemperatureScale {
            min: self.heatmap.temp_min,
            max: self.heatmap.temp_max,
        }
    }

    pub fn ingestion_interval(&self) -> Duration {
        Duration::from_millis(self.pack.ingestion_interval_ms)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.telemetry.tick_interval_ms)
    }

    /// Spacing of seeded history samples, capped at one day
    pub fn seed_step(&self) -> chrono::Duration {
        let seconds = self.telemetry.seed_step_s.min(MAX_SEED_STEP_S) as i64;
        chrono::Duration::try_seconds(seconds).unwrap_or(chrono::Duration::days(1))
    }

    pub fn link_settings(&self) -> LinkSettings {
        LinkSettings {
            port: self.connection.port.clone(),
            baud_rate: self.connection.baud_rate,
            connect_delay: Duration::from_millis(self.connection.connect_delay_ms),
        }
    }
}
