//! # BMS Dashboard
//!
//! Headless battery pack monitor.
//!
//! Runs the ingestion and telemetry ticks against a simulated pack and prints
//! one JSON status line per telemetry tick on stdout. Logs go to stderr and,
//! when configured, to a daily rolling file.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_json::json;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use bms_dashboard::config::{Config, LoggingConfig};
use bms_dashboard::dashboard::{Dashboard, PackView};
use bms_dashboard::heatmap::Rgb;
use bms_dashboard::layout::cards::{CardOrder, PowerReadings};
use bms_dashboard::scheduler::{Scheduler, SchedulerSettings};
use bms_dashboard::source::link::{ConnectionState, Link};
use bms_dashboard::source::SimulatedPackSource;
use bms_dashboard::telemetry::{TelemetrySample, TelemetryWindow};

/// File name prefix for rolling log files
const LOG_FILE_NAME: &str = "bms-dashboard.log";

/// Main entry point for the BMS dashboard
///
/// # Control Flow
///
/// 1. **Initialization**
///    - Load configuration from the path given as the first argument, or use defaults
///    - Set up logging with tracing subscriber
///    - Start the connection handshake
///    - Seed the telemetry window and start the scheduler
///
/// 2. **Main Loop**
///    - Print a status line whenever the telemetry window changes
///    - Log connection state transitions
///    - Handle Ctrl+C for graceful shutdown
///
/// 3. **Graceful Shutdown**
///    - Abort both ticks and drop the connection
///
/// # Errors
///
/// Returns error if the configuration file cannot be loaded or the log
/// directory cannot be created.
///
/// # Examples
///
/// ```bash
/// cargo run --release -- config/dashboard.toml
/// ```
#[tokio::main]
async fn main() -> Result<()> {
    let config = match std::env::args().nth(1) {
        Some(path) => Config::load(&path)
            .with_context(|| format!("Failed to load configuration from {}", path))?,
        None => Config::default(),
    };

    let _log_guard = init_logging(&config.logging)?;

    info!("BMS Dashboard v{} starting...", env!("CARGO_PKG_VERSION"));

    let mut link = Link::new(config.link_settings());
    let mut link_state = link.subscribe();
    if config.connection.auto_connect {
        link.connect();
    }

    let mut rng = StdRng::from_os_rng();
    let mut window = TelemetryWindow::new(config.telemetry.buffer_capacity);
    window.seed(
        config.telemetry.buffer_capacity,
        Utc::now(),
        config.seed_step(),
        &mut rng,
    );

    let source = SimulatedPackSource::new(
        config.pack.segments,
        config.channel_layout(),
        StdRng::from_os_rng(),
    );

    let mut scheduler = Scheduler::start(
        SchedulerSettings::from_config(&config),
        Dashboard::from_config(&config),
        source,
        window,
        rng,
    );

    let cards = CardOrder::new(config.layout.card_count);
    let mut telemetry = scheduler.telemetry();
    let views = scheduler.views();

    info!("Press Ctrl+C to exit");

    loop {
        tokio::select! {
            changed = telemetry.changed() => {
                if changed.is_err() {
                    warn!("Telemetry tick stopped unexpectedly");
                    break;
                }

                let snapshot = telemetry.borrow_and_update().clone();
                if let Some(sample) = snapshot.last() {
                    let view = views.borrow().clone();
                    let line = status_line(sample, view.as_deref(), link.state(), &cards);
                    println!("{}", line);
                }
            }

            changed = link_state.changed() => {
                if changed.is_ok() {
                    let state = *link_state.borrow_and_update();
                    info!("Connection: {}", state.label());
                }
            }

            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down...");
                break;
            }
        }
    }

    scheduler.shutdown().await;
    link.disconnect();

    Ok(())
}

/// Build the tracing filter for the configured level.
///
/// The configured level is the default directive; `RUST_LOG` directives are
/// added on top of it.
fn log_filter(level: &str) -> EnvFilter {
    let level = level.parse::<LevelFilter>().unwrap_or(LevelFilter::INFO);
    EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy()
}

/// Set up logging to stderr and, if `log_dir` is set, a daily rolling file.
///
/// Returns the file writer guard, which must stay alive until exit.
fn init_logging(logging: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_filter(log_filter(&logging.level));

    if logging.log_dir.is_empty() {
        tracing_subscriber::registry().with(stderr_layer).init();
        return Ok(None);
    }

    let log_dir = Path::new(&logging.log_dir);
    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("Failed to create log directory: {}", log_dir.display()))?;

    let file_appender = tracing_appender::rolling::daily(log_dir, LOG_FILE_NAME);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_filter(log_filter(&logging.level));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .init();

    info!("Logging to {}/{}", log_dir.display(), LOG_FILE_NAME);
    Ok(Some(guard))
}

/// One JSON status line: newest telemetry sample, pack statistics, cards,
/// per-segment heatmaps and the balancing bar.
fn status_line(
    sample: &TelemetrySample,
    view: Option<&PackView>,
    connection: ConnectionState,
    cards: &CardOrder,
) -> serde_json::Value {
    let power = PowerReadings {
        state_of_charge: sample.soc.round(),
        ..PowerReadings::default()
    };

    let Some(view) = view else {
        return json!({
            "time": sample.time_label(),
            "connection": connection,
            "telemetry": sample,
            "stats": null,
            "balancing": null,
            "balancing_shares": [],
            "segments": [],
            "cards": [],
        });
    };

    let card_values: Vec<_> = cards
        .cards()
        .map(|card| json!({ "label": card.label(), "value": card.value(&view.stats, &power) }))
        .collect();

    let segments: Vec<_> = view
        .heatmaps
        .iter()
        .map(|heatmap| {
            let colors = |rgbs: &[Rgb]| rgbs.iter().map(Rgb::to_string).collect::<Vec<_>>();
            json!({
                "number": heatmap.segment_number,
                "warning": heatmap.has_warning,
                "imbalance_count": view
                    .segment_stats(heatmap.segment_number)
                    .map(|s| s.imbalance_count),
                "voltage_colors": colors(&heatmap.voltage_colors),
                "temperature_colors": colors(&heatmap.temperature_colors),
            })
        })
        .collect();

    json!({
        "time": sample.time_label(),
        "connection": connection,
        "telemetry": sample,
        "stats": view.stats,
        "balancing": view.balancing,
        "balancing_shares": view.balancing_shares,
        "segments": segments,
        "cards": card_values,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use bms_dashboard::pack::{ChannelLayout, SegmentReadings};

    fn sample() -> TelemetrySample {
        TelemetrySample {
            timestamp: Utc::now(),
            soc: 84.6,
            cell_delta: 0.05,
            temp_high: 35.0,
            temp_avg: 30.0,
            voltage_min: 3.65,
            voltage_max: 3.85,
            voltage_avg: 3.75,
        }
    }

    #[test]
    fn test_log_file_name() {
        assert_eq!(LOG_FILE_NAME, "bms-dashboard.log");
    }

    #[test]
    fn test_status_line_without_view() {
        let line = status_line(&sample(), None, ConnectionState::Connecting, &CardOrder::default());

        assert_eq!(line["connection"], "connecting");
        assert!(line["stats"].is_null());
        assert_eq!(line["cards"].as_array().unwrap().len(), 0);
        assert_eq!(line["telemetry"]["soc"], 84.6);
    }

    fn one_segment() -> Vec<SegmentReadings> {
        vec![SegmentReadings {
            segment_number: 1,
            voltages: vec![3.7, 3.8],
            temperatures: vec![30.0],
            balancing: vec![0],
        }]
    }

    fn small_config() -> Config {
        let mut config = Config::default();
        config.pack.voltage_channels = 2;
        config.pack.temperature_channels = 1;
        config
    }

    #[test]
    fn test_status_line_with_view() {
        let mut dashboard = Dashboard::new(ChannelLayout::new(2, 1));
        let view = dashboard.ingest(one_segment()).unwrap();

        let mut cards = CardOrder::default();
        cards.reorder(2, 0).unwrap();

        let line = status_line(&sample(), Some(&view), ConnectionState::Connected, &cards);
        let rendered = line["cards"].as_array().unwrap();

        assert_eq!(line["connection"], "connected");
        assert_eq!(line["stats"]["balancing_active"], true);
        assert_eq!(rendered.len(), 9);
        assert_eq!(rendered[0]["label"], "State of Charge");
        assert_eq!(rendered[0]["value"], "85%");
        assert_eq!(rendered[1]["label"], "Total Voltage");
        assert_eq!(rendered[1]["value"], "7.5V");
    }

    #[test]
    fn test_status_line_segments_and_shares() {
        let mut dashboard = Dashboard::new(ChannelLayout::new(2, 1));
        let view = dashboard.ingest(one_segment()).unwrap();

        let line = status_line(&sample(), Some(&view), ConnectionState::Connected, &CardOrder::default());
        let segment = &line["segments"][0];

        assert_eq!(segment["number"], 1);
        assert_eq!(segment["warning"], false);
        assert_eq!(segment["voltage_colors"][0], "rgb(0, 255, 0)");
        assert_eq!(segment["temperature_colors"].as_array().unwrap().len(), 1);

        let shares = line["balancing_shares"].as_array().unwrap();
        assert_eq!(shares.len(), 2);
        assert_eq!(shares[0]["content"], "Balanced");
        assert_eq!(shares[0]["percentage"], 50.0);
        assert_eq!(shares[1]["placement"], "inline");
    }

    #[test]
    fn test_heatmap_config_changes_emitted_colors() {
        let mut config = small_config();
        config.heatmap.voltage_nominal = 3.8;
        config.heatmap.temp_max = 40.0;

        let default_view = Dashboard::from_config(&small_config()).ingest(one_segment()).unwrap();
        let custom_view = Dashboard::from_config(&config).ingest(one_segment()).unwrap();

        let cards = CardOrder::default();
        let default_line = status_line(&sample(), Some(&default_view), ConnectionState::Connected, &cards);
        let custom_line = status_line(&sample(), Some(&custom_view), ConnectionState::Connected, &cards);

        let default_segment = &default_line["segments"][0];
        let custom_segment = &custom_line["segments"][0];
        assert_eq!(custom_segment["voltage_colors"][0], "rgb(46, 255, 0)");
        assert_ne!(custom_segment["voltage_colors"][0], default_segment["voltage_colors"][0]);
        assert_ne!(
            custom_segment["temperature_colors"][0],
            default_segment["temperature_colors"][0]
        );
    }

    #[test]
    fn test_visibility_threshold_changes_emitted_placement() {
        let mut config = small_config();
        config.layout.visibility_threshold_pct = 60.0;

        let view = Dashboard::from_config(&config).ingest(one_segment()).unwrap();
        let line = status_line(&sample(), Some(&view), ConnectionState::Connected, &CardOrder::default());

        assert_eq!(line["balancing_shares"][0]["placement"], "overlay");
        assert_eq!(line["balancing_shares"][1]["placement"], "overlay");
    }

    #[test]
    fn test_log_filter_uses_configured_level() {
        // RUST_LOG would add its own directives
        if std::env::var_os("RUST_LOG").is_none() {
            assert_eq!(log_filter("debug").max_level_hint(), Some(LevelFilter::DEBUG));
            assert_eq!(log_filter("bogus").max_level_hint(), Some(LevelFilter::INFO));
        }
    }
}
