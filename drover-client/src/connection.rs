//! Connection lifecycle
//!
//! One driver task per channel walks the state machine:
//!
//! ```text
//! Unconnected --connect()--> Dialing --pong--> Connected
//!                               ^                  |
//!                               +--- probe fails --+
//! any --disconnect()--> Closing --> Unconnected
//! ```

use std::sync::atomic::Ordering;
use std::sync::{Arc, PoisonError};
use std::time::Duration;
use tracing::{debug, info, warn};

use drover_core::dto::methods;
use drover_core::dto::ping::{Ping, Pong};

use crate::ControlChannel;

/// Observable state of the channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Unconnected,
    Dialing,
    Connected,
    Closing,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Unconnected => write!(f, "unconnected"),
            ConnectionState::Dialing => write!(f, "dialing"),
            ConnectionState::Connected => write!(f, "connected"),
            ConnectionState::Closing => write!(f, "closing"),
        }
    }
}

impl ControlChannel {
    /// Current state of the connection
    pub fn state(&self) -> ConnectionState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, next: ConnectionState) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        *state = next;
        self.connected
            .store(next == ConnectionState::Connected, Ordering::Release);
    }

    /// Start the driver task
    ///
    /// Only the first call has an effect; later calls are no-ops so every
    /// component can call it without coordinating.
    pub fn connect(self: &Arc<Self>) {
        if self.started.swap(true, Ordering::AcqRel) {
            return;
        }

        self.set_state(ConnectionState::Dialing);
        let channel = Arc::clone(self);
        let handle = tokio::spawn(async move { channel.drive().await });

        *self.driver.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
    }

    /// Close the channel and wait for the driver task to exit
    pub async fn disconnect(&self) {
        self.set_state(ConnectionState::Closing);
        self.closing.cancel();

        let handle = self
            .driver
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!("Connection driver task panicked: {}", e);
            }
        }

        self.set_state(ConnectionState::Unconnected);
        info!("Control channel closed");
    }

    /// Wait until the channel reports connected or the timeout elapses
    pub async fn wait_until_connected(&self, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        while !self.is_connected() {
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        true
    }

    /// Driver loop: probe, update state, sleep until the next tick
    async fn drive(self: Arc<Self>) {
        info!("Dialing orchestrator at {}", self.base_url);

        loop {
            let alive = tokio::select! {
                _ = self.closing.cancelled() => break,
                alive = self.probe() => alive,
            };

            match (self.state(), alive) {
                (ConnectionState::Dialing, true) => {
                    self.set_state(ConnectionState::Connected);
                    info!("Control channel connected");
                }
                (ConnectionState::Connected, false) => {
                    warn!("Liveness probe failed, reconnecting");
                    self.reset_transport();
                    self.set_state(ConnectionState::Dialing);
                }
                (ConnectionState::Dialing, false) => {
                    debug!("Orchestrator not reachable yet");
                }
                _ => {}
            }

            tokio::select! {
                _ = self.closing.cancelled() => break,
                _ = tokio::time::sleep(self.ping_interval) => {}
            }
        }

        debug!("Connection driver exiting");
    }

    /// One liveness ping, bounded by the ping interval
    async fn probe(&self) -> bool {
        let organization_id = self.credentials.organization_id.clone();
        let ping = self.raw_call::<_, Pong>(methods::PING_SEND, &organization_id, Ping::default());

        match tokio::time::timeout(self.ping_interval.max(Duration::from_secs(1)), ping).await {
            Ok(Ok(pong)) if pong.is_pong() => true,
            Ok(Ok(pong)) => {
                warn!("Unexpected liveness reply: {:?}", pong.send);
                false
            }
            Ok(Err(e)) => {
                debug!("Liveness probe failed: {}", e);
                false
            }
            Err(_) => {
                debug!("Liveness probe timed out");
                false
            }
        }
    }
}
