//! Shutdown state machine.
//!
//! # States
//! ```text
//! Running → Draining → ShuttingDown → Stopped
//! ```
//!
//! - Draining: health gate flipped, listener still accepting while upstream
//!   load balancers notice the failing probe
//! - ShuttingDown: listener closed, in-flight requests get the timeout budget
//! - Stopped: reached whatever the shutdown outcome was

use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;

use crate::config::ServerConfig;
use crate::health::HealthGate;
use crate::http::server::{ServerHandle, ShutdownError};

/// Lifecycle phase of the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Running,
    Draining,
    ShuttingDown,
    Stopped,
}

/// Drives the server from running to stopped.
pub struct LifecycleController {
    health: HealthGate,
    shutdown_delay: Duration,
    shutdown_timeout: Duration,
    state: watch::Sender<LifecycleState>,
}

impl LifecycleController {
    pub fn new(health: HealthGate, shutdown_delay: Duration, shutdown_timeout: Duration) -> Self {
        let (state, _) = watch::channel(LifecycleState::Running);
        Self {
            health,
            shutdown_delay,
            shutdown_timeout,
            state,
        }
    }

    /// Controller using the shutdown durations from `config`.
    pub fn from_config(health: HealthGate, config: &ServerConfig) -> Self {
        Self::new(health, config.shutdown_delay, config.shutdown_timeout)
    }

    pub fn state(&self) -> LifecycleState {
        *self.state.borrow()
    }

    /// Observe state transitions.
    pub fn subscribe(&self) -> watch::Receiver<LifecycleState> {
        self.state.subscribe()
    }

    fn transition(&self, next: LifecycleState) {
        let previous = self.state.send_replace(next);
        tracing::debug!(from = ?previous, to = ?next, "Lifecycle transition");
    }

    /// Wait for `signal`, then run the shutdown sequence against `server`.
    ///
    /// Always ends in [`LifecycleState::Stopped`]; the shutdown outcome is
    /// logged and returned for inspection only.
    pub async fn run<F>(&self, server: ServerHandle, signal: F) -> Result<(), ShutdownError>
    where
        F: Future<Output = ()>,
    {
        self.transition(LifecycleState::Running);
        signal.await;
        self.stop(server).await
    }

    /// Run the shutdown sequence now.
    pub async fn stop(&self, server: ServerHandle) -> Result<(), ShutdownError> {
        tracing::info!("stopping HTTP server");

        self.transition(LifecycleState::Draining);
        tracing::info!("update health check to return service unavailable (503)");
        self.health.set_unhealthy();

        tracing::info!(delay = ?self.shutdown_delay, "wait before calling http shutdown");
        tokio::time::sleep(self.shutdown_delay).await;

        self.transition(LifecycleState::ShuttingDown);
        let result = server.shutdown(self.shutdown_timeout).await;
        match &result {
            Ok(()) => tracing::info!("finish shutdown HTTP server"),
            Err(e) => tracing::error!(error = %e, "failed shutdown http server"),
        }

        self.transition(LifecycleState::Stopped);
        result
    }
}
