//! # Connection Link
//!
//! Connection state shown in the system banner.
//!
//! The transport handshake is a timer-based stand-in: `connect()` moves to
//! `Connecting` and reaches `Connected` after the configured delay. The
//! connected flag is for presentation only; statistics never read it.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration};
use tracing::info;

/// Connection lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

impl ConnectionState {
    pub fn label(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "Disconnected",
            ConnectionState::Connecting => "Connecting...",
            ConnectionState::Connected => "Connected",
        }
    }
}

/// Port settings for the link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkSettings {
    pub port: String,
    pub baud_rate: u32,
    pub connect_delay: Duration,
}

/// Connection state machine with a watchable state.
///
/// Must be used inside a Tokio runtime. Dropping the link cancels a pending
/// handshake.
pub struct Link {
    settings: LinkSettings,
    state: Arc<watch::Sender<ConnectionState>>,
    pending: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for Link {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Link")
            .field("port", &self.settings.port)
            .field("state", &*self.state.borrow())
            .finish_non_exhaustive()
    }
}

impl Link {
    pub fn new(settings: LinkSettings) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            settings,
            state: Arc::new(state),
            pending: None,
        }
    }

    pub fn settings(&self) -> &LinkSettings {
        &self.settings
    }

    /// Current state.
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Receiver notified on every state change.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// Starts the handshake. No-op unless disconnected.
    pub fn connect(&mut self) {
        if self.state() != ConnectionState::Disconnected {
            return;
        }

        info!(
            "Connecting to {} at {} baud",
            self.settings.port, self.settings.baud_rate
        );
        self.state.send_replace(ConnectionState::Connecting);

        let state = Arc::clone(&self.state);
        let delay = self.settings.connect_delay;
        let port = self.settings.port.clone();
        self.pending = Some(tokio::spawn(async move {
            sleep(delay).await;
            state.send_replace(ConnectionState::Connected);
            info!("Connected to {}", port);
        }));
    }

    /// Drops the connection, cancelling any pending handshake.
    pub fn disconnect(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }

        if self.state.send_replace(ConnectionState::Disconnected) != ConnectionState::Disconnected {
            info!("Disconnected from {}", self.settings.port);
        }
    }

    /// Connects when disconnected, disconnects otherwise.
    pub fn toggle(&mut self) {
        if self.state() == ConnectionState::Disconnected {
            self.connect();
        } else {
            self.disconnect();
        }
    }
}

impl Drop for Link {
    fn drop(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn link() -> Link {
        Link::new(LinkSettings {
            port: "/dev/ttyACM0".to_string(),
            baud_rate: 115_200,
            connect_delay: Duration::from_millis(1000),
        })
    }

    #[test]
    fn test_starts_disconnected() {
        let link = link();
        assert_eq!(link.state(), ConnectionState::Disconnected);
        assert!(!link.is_connected());
    }

    #[test]
    fn test_state_labels() {
        assert_eq!(ConnectionState::Connecting.label(), "Connecting...");
        assert_eq!(ConnectionState::Connected.label(), "Connected");
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_after_delay() {
        let mut link = link();
        link.connect();
        assert_eq!(link.state(), ConnectionState::Connecting);

        sleep(Duration::from_millis(999)).await;
        assert_eq!(link.state(), ConnectionState::Connecting);

        sleep(Duration::from_millis(2)).await;
        assert!(link.is_connected());
    }

    #[tokio::test(start_paused = true)]
    async fn test_subscriber_sees_transitions() {
        let mut link = link();
        let mut rx = link.subscribe();

        link.connect();
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), ConnectionState::Connecting);

        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), ConnectionState::Connected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_cancels_handshake() {
        let mut link = link();
        link.connect();
        link.disconnect();

        sleep(Duration::from_millis(2000)).await;
        assert_eq!(link.state(), ConnectionState::Disconnected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_while_connecting_is_noop() {
        let mut link = link();
        link.connect();
        sleep(Duration::from_millis(500)).await;
        link.connect();

        // Still completes on the first schedule
        sleep(Duration::from_millis(501)).await;
        assert!(link.is_connected());
    }

    #[tokio::test(start_paused = true)]
    async fn test_toggle() {
        let mut link = link();
        link.toggle();
        sleep(Duration::from_millis(1001)).await;
        assert!(link.is_connected());

        link.toggle();
        assert_eq!(link.state(), ConnectionState::Disconnected);
    }
}
