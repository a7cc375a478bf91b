//! # Scheduler
//!
//! Owns the two periodic ticks that drive dashboard state.
//!
//! - The ingestion tick pulls readings from a [`PackSource`] and publishes a
//!   new [`PackView`] on success.
//! - The telemetry tick appends one sample to the [`TelemetryWindow`] and
//!   publishes a fresh [`TelemetrySnapshot`].
//!
//! The ticks are independent and never assumed to fire together. Readers
//! hold `watch` receivers and always see the last completed update. Both
//! tasks are aborted by [`Scheduler::shutdown`] or when the scheduler is
//! dropped.

use std::sync::Arc;

use chrono::Utc;
use rand::Rng;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, interval_at, Duration, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::dashboard::{Dashboard, PackView};
use crate::source::PackSource;
use crate::telemetry::{TelemetrySnapshot, TelemetryWindow};

/// Tick periods for the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerSettings {
    pub ingestion_interval: Duration,
    pub tick_interval: Duration,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            ingestion_interval: Duration::from_millis(1000),
            tick_interval: Duration::from_millis(5000),
        }
    }
}

impl SchedulerSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            ingestion_interval: config.ingestion_interval(),
            tick_interval: config.tick_interval(),
        }
    }
}

/// Running ingestion and telemetry ticks.
///
/// Must be created inside a Tokio runtime.
#[derive(Debug)]
pub struct Scheduler {
    views: watch::Receiver<Option<Arc<PackView>>>,
    telemetry: watch::Receiver<TelemetrySnapshot>,
    ingestion_task: Option<JoinHandle<()>>,
    telemetry_task: Option<JoinHandle<()>>,
}

impl Scheduler {
    /// Starts both ticks.
    ///
    /// Ingestion runs immediately and then every `ingestion_interval`. The
    /// first telemetry tick fires one `tick_interval` after start; the window
    /// is published as-is until then.
    ///
    /// # Arguments
    ///
    /// * `settings` - Tick periods
    /// * `dashboard` - Engine that turns readings into views
    /// * `source` - Provider of raw readings
    /// * `window` - Telemetry history, usually pre-seeded
    /// * `rng` - Jitter source for the telemetry random walk
    pub fn start<S, R>(
        settings: SchedulerSettings,
        dashboard: Dashboard,
        source: S,
        window: TelemetryWindow,
        rng: R,
    ) -> Self
    where
        S: PackSource + 'static,
        R: Rng + Send + 'static,
    {
        let (view_tx, views) = watch::channel(dashboard.view());
        let (telemetry_tx, telemetry) = watch::channel(window.snapshot());

        let ingestion_task = tokio::spawn(run_ingestion(
            settings.ingestion_interval,
            dashboard,
            source,
            view_tx,
        ));
        let telemetry_task = tokio::spawn(run_telemetry(
            settings.tick_interval,
            window,
            rng,
            telemetry_tx,
        ));

        info!(
            "Scheduler started (ingestion every {:?}, telemetry every {:?})",
            settings.ingestion_interval, settings.tick_interval
        );

        Self {
            views,
            telemetry,
            ingestion_task: Some(ingestion_task),
            telemetry_task: Some(telemetry_task),
        }
    }

    /// Receiver of the current pack view. `None` until the first successful ingest.
    pub fn views(&self) -> watch::Receiver<Option<Arc<PackView>>> {
        self.views.clone()
    }

    /// Receiver of the current telemetry snapshot.
    pub fn telemetry(&self) -> watch::Receiver<TelemetrySnapshot> {
        self.telemetry.clone()
    }

    /// Latest published pack view.
    pub fn current_view(&self) -> Option<Arc<PackView>> {
        self.views.borrow().clone()
    }

    /// Latest published telemetry snapshot.
    pub fn current_telemetry(&self) -> TelemetrySnapshot {
        self.telemetry.borrow().clone()
    }

    pub fn is_running(&self) -> bool {
        self.ingestion_task.is_some() || self.telemetry_task.is_some()
    }

    /// Stops both ticks and waits for the tasks to finish.
    pub async fn shutdown(&mut self) {
        for handle in [self.ingestion_task.take(), self.telemetry_task.take()]
            .into_iter()
            .flatten()
        {
            handle.abort();
            // Cancellation is the expected outcome
            let _ = handle.await;
        }
        info!("Scheduler stopped");
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        for handle in [self.ingestion_task.take(), self.telemetry_task.take()]
            .into_iter()
            .flatten()
        {
            handle.abort();
        }
    }
}

async fn run_ingestion<S: PackSource>(
    period: Duration,
    mut dashboard: Dashboard,
    mut source: S,
    views: watch::Sender<Option<Arc<PackView>>>,
) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;

        let readings = match source.next_readings().await {
            Ok(readings) => readings,
            Err(e) => {
                warn!("Pack source failed: {}", e);
                continue;
            }
        };

        // Rejected snapshots are logged by the engine
        if let Ok(view) = dashboard.ingest(readings) {
            views.send_replace(Some(view));
        }
    }
}

async fn run_telemetry<R: Rng>(
    period: Duration,
    mut window: TelemetryWindow,
    mut rng: R,
    snapshots: watch::Sender<TelemetrySnapshot>,
) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;

        let sample = window.tick(Utc::now(), &mut rng);
        debug!(
            "Telemetry tick: soc {:.1}%, delta {:.3}V ({} samples)",
            sample.soc,
            sample.cell_delta,
            window.len()
        );
        snapshots.send_replace(window.snapshot());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DashboardError;
    use crate::pack::{ChannelLayout, SegmentReadings};
    use crate::source::MockPackSource;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::sleep;

    fn layout() -> ChannelLayout {
        ChannelLayout::new(2, 1)
    }

    fn snapshot(voltage: f64) -> Vec<SegmentReadings> {
        vec![SegmentReadings {
            segment_number: 1,
            voltages: vec![voltage, voltage],
            temperatures: vec![30.0],
            balancing: vec![],
        }]
    }

    fn settings() -> SchedulerSettings {
        SchedulerSettings {
            ingestion_interval: Duration::from_millis(100),
            tick_interval: Duration::from_millis(500),
        }
    }

    fn counting_source(calls: Arc<AtomicUsize>) -> MockPackSource {
        let mut source = MockPackSource::new();
        source.expect_next_readings().returning(move || {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(snapshot(3.7))
        });
        source
    }

    fn seeded_window(count: usize, capacity: usize) -> TelemetryWindow {
        let mut window = TelemetryWindow::new(capacity);
        let mut rng = StdRng::seed_from_u64(1);
        window.seed(
            count,
            Utc::now() - chrono::Duration::minutes(1),
            chrono::Duration::minutes(1),
            &mut rng,
        );
        window
    }

    fn start(source: MockPackSource, window: TelemetryWindow) -> Scheduler {
        Scheduler::start(
            settings(),
            Dashboard::new(layout()),
            source,
            window,
            StdRng::seed_from_u64(7),
        )
    }

    #[test]
    fn test_settings_from_config() {
        let settings = SchedulerSettings::from_config(&Config::default());
        assert_eq!(settings, SchedulerSettings::default());
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_ingest_is_immediate() {
        let calls = Arc::new(AtomicUsize::new(0));
        let scheduler = start(counting_source(Arc::clone(&calls)), TelemetryWindow::new(4));

        let mut views = scheduler.views();
        views.changed().await.unwrap();

        let view = scheduler.current_view().unwrap();
        assert_eq!(view.sequence, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ingestion_follows_interval() {
        let calls = Arc::new(AtomicUsize::new(0));
        let scheduler = start(counting_source(Arc::clone(&calls)), TelemetryWindow::new(4));

        sleep(Duration::from_millis(450)).await;

        // Ticks at 0, 100, 200, 300, 400
        assert_eq!(calls.load(Ordering::SeqCst), 5);
        assert_eq!(scheduler.current_view().unwrap().sequence, 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_source_error_keeps_previous_view() {
        let calls = AtomicUsize::new(0);
        let mut source = MockPackSource::new();
        source
            .expect_next_readings()
            .returning(move || match calls.fetch_add(1, Ordering::SeqCst) {
                0 => Ok(snapshot(3.7)),
                1 => Err(DashboardError::Source("link down".to_string())),
                _ => Ok(vec![]),
            });

        let scheduler = start(source, TelemetryWindow::new(4));
        sleep(Duration::from_millis(350)).await;

        // Error and empty snapshots never replace the first view
        let view = scheduler.current_view().unwrap();
        assert_eq!(view.sequence, 1);
        assert!((view.stats.total_voltage - 7.4).abs() < 1e-9);
    }

    #[tokio::test(start_paused = true)]
    async fn test_telemetry_tick_appends_sample() {
        let calls = Arc::new(AtomicUsize::new(0));
        let scheduler = start(counting_source(calls), seeded_window(3, 31));

        assert_eq!(scheduler.current_telemetry().len(), 3);

        sleep(Duration::from_millis(499)).await;
        assert_eq!(scheduler.current_telemetry().len(), 3);

        sleep(Duration::from_millis(2)).await;
        let snapshot = scheduler.current_telemetry();
        assert_eq!(snapshot.len(), 4);
        assert!(snapshot[3].timestamp >= snapshot[2].timestamp);
    }

    #[tokio::test(start_paused = true)]
    async fn test_telemetry_keeps_ticking_when_clock_is_behind() {
        let mut window = TelemetryWindow::new(10);
        let ahead = Utc::now() + chrono::Duration::hours(1);
        window.seed(2, ahead, chrono::Duration::minutes(1), &mut StdRng::seed_from_u64(1));

        let calls = Arc::new(AtomicUsize::new(0));
        let scheduler = start(counting_source(calls), window);

        sleep(Duration::from_millis(1001)).await;
        let snapshot = scheduler.current_telemetry();
        assert_eq!(snapshot.len(), 4);
        assert_eq!(snapshot[3].timestamp, ahead);
    }

    #[tokio::test(start_paused = true)]
    async fn test_telemetry_window_stays_bounded() {
        let calls = Arc::new(AtomicUsize::new(0));
        let scheduler = start(counting_source(calls), seeded_window(5, 5));

        sleep(Duration::from_millis(2600)).await;
        assert_eq!(scheduler.current_telemetry().len(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_both_ticks() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut scheduler = start(counting_source(Arc::clone(&calls)), TelemetryWindow::new(4));

        sleep(Duration::from_millis(150)).await;
        scheduler.shutdown().await;
        assert!(!scheduler.is_running());

        let ingested = calls.load(Ordering::SeqCst);
        let telemetry = scheduler.current_telemetry().len();
        sleep(Duration::from_secs(5)).await;

        assert_eq!(calls.load(Ordering::SeqCst), ingested);
        assert_eq!(scheduler.current_telemetry().len(), telemetry);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_aborts_ticks() {
        let calls = Arc::new(AtomicUsize::new(0));
        let scheduler = start(counting_source(Arc::clone(&calls)), TelemetryWindow::new(4));
        let views = scheduler.views();

        sleep(Duration::from_millis(50)).await;
        drop(scheduler);
        let ingested = calls.load(Ordering::SeqCst);

        sleep(Duration::from_secs(1)).await;
        assert_eq!(calls.load(Ordering::SeqCst), ingested);
        assert!(views.borrow().is_some());
    }
}
