//! Per-connection serving and lifecycle tracking.
//!
//! # Responsibilities
//! - Serve one TCP connection with hyper (HTTP/1.1 and HTTP/2)
//! - Dispatch requests into the axum router
//! - Drop the connection for aborted or overdue responses
//! - Close keep-alive connections that stay idle too long
//! - Drain gracefully when the server shuts down

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use axum::Router;
use hyper::body::Incoming;
use hyper::Request;
use hyper_util::rt::{TokioExecutor, TokioIo, TokioTimer};
use hyper_util::server::conn::auto::Builder;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::Notify;
use tokio::time::Instant;
use tower::ServiceExt;

use crate::config::ServerConfig;
use crate::http::response::is_aborted;
use crate::lifecycle::shutdown::ShutdownSignal;

/// Source of connection IDs; only uniqueness matters.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Generate a new unique connection ID.
    pub fn new() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Connection state for lifecycle tracking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Connection is active and processing requests.
    Active,
    /// Connection is draining (no new requests, finishing in-flight).
    Draining,
    /// Connection is closed.
    Closed,
}

/// Why a request produced no response.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("response aborted by handler")]
    Aborted,
    #[error("response not produced within {0:?}")]
    WriteTimeout(Duration),
}

/// Settings shared by every connection of a server.
pub struct ConnectionSettings {
    builder: Builder<TokioExecutor>,
    idle_timeout: Option<Duration>,
    write_timeout: Option<Duration>,
}

impl ConnectionSettings {
    pub fn from_config(config: &ServerConfig) -> Self {
        let mut builder = Builder::new(TokioExecutor::new());
        if let Some(read_timeout) = config.read_timeout() {
            builder
                .http1()
                .timer(TokioTimer::new())
                .header_read_timeout(read_timeout);
        }

        Self {
            builder,
            idle_timeout: config.idle_timeout(),
            write_timeout: config.write_timeout(),
        }
    }
}

/// In-flight request accounting for idle detection.
struct Activity {
    in_flight: AtomicUsize,
    last_active: Mutex<Instant>,
    changed: Notify,
}

impl Activity {
    fn new() -> Self {
        Self {
            in_flight: AtomicUsize::new(0),
            last_active: Mutex::new(Instant::now()),
            changed: Notify::new(),
        }
    }

    fn begin(self: &Arc<Self>) -> RequestGuard {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        self.changed.notify_waiters();
        RequestGuard {
            activity: Arc::clone(self),
        }
    }

    fn last_active(&self) -> Instant {
        *self.last_active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Resolves once nothing has been in flight for `timeout`.
    async fn idle(&self, timeout: Option<Duration>) {
        let Some(timeout) = timeout else {
            return std::future::pending().await;
        };

        loop {
            let changed = self.changed.notified();
            if self.in_flight.load(Ordering::SeqCst) > 0 {
                changed.await;
                continue;
            }

            tokio::select! {
                _ = tokio::time::sleep_until(self.last_active() + timeout) => {
                    let quiet = self.in_flight.load(Ordering::SeqCst) == 0
                        && self.last_active() + timeout <= Instant::now();
                    if quiet {
                        return;
                    }
                }
                _ = changed => {}
            }
        }
    }
}

struct RequestGuard {
    activity: Arc<Activity>,
}

impl Drop for RequestGuard {
    fn drop(&mut self) {
        *self
            .activity
            .last_active
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Instant::now();
        self.activity.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.activity.changed.notify_waiters();
    }
}

/// Serve one accepted connection until it closes.
///
/// On `shutdown` (or idle timeout) the connection stops taking new requests
/// and finishes the in-flight ones.
pub async fn serve_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    router: Router,
    settings: Arc<ConnectionSettings>,
    mut shutdown: ShutdownSignal,
) {
    let id = ConnectionId::new();
    let activity = Arc::new(Activity::new());
    let write_timeout = settings.write_timeout;

    let dispatch_activity = Arc::clone(&activity);
    let service = hyper::service::service_fn(move |req: Request<Incoming>| {
        let router = router.clone();
        let activity = Arc::clone(&dispatch_activity);
        async move {
            let _guard = activity.begin();
            let call = router.oneshot(req);
            let result = match write_timeout {
                Some(limit) => match tokio::time::timeout(limit, call).await {
                    Ok(result) => result,
                    Err(_) => {
                        tracing::warn!(timeout = ?limit, "Response not produced in time, closing connection");
                        return Err(DispatchError::WriteTimeout(limit));
                    }
                },
                None => call.await,
            };
            let response = match result {
                Ok(response) => response,
                Err(never) => match never {},
            };
            if is_aborted(&response) {
                tracing::debug!("Response aborted by handler, closing connection");
                return Err(DispatchError::Aborted);
            }
            Ok(response)
        }
    });

    let conn = settings
        .builder
        .serve_connection_with_upgrades(TokioIo::new(stream), service);
    tokio::pin!(conn);

    let mut state = ConnectionState::Active;
    while state != ConnectionState::Closed {
        tokio::select! {
            result = conn.as_mut() => {
                if let Err(e) = result {
                    tracing::debug!(connection_id = %id, peer_addr = %peer_addr, error = %e, "Connection ended with error");
                }
                state = ConnectionState::Closed;
            }
            _ = shutdown.recv(), if state == ConnectionState::Active => {
                tracing::trace!(connection_id = %id, "Draining connection for shutdown");
                conn.as_mut().graceful_shutdown();
                state = ConnectionState::Draining;
            }
            _ = activity.idle(settings.idle_timeout), if state == ConnectionState::Active => {
                tracing::debug!(connection_id = %id, peer_addr = %peer_addr, "Closing idle connection");
                conn.as_mut().graceful_shutdown();
                state = ConnectionState::Draining;
            }
        }
    }

    tracing::trace!(connection_id = %id, "Connection closed");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_id_unique() {
        let id1 = ConnectionId::new();
        let id2 = ConnectionId::new();
        assert_ne!(id1, id2);
        assert!(id1.to_string().starts_with("conn-"));
    }

    #[tokio::test(start_paused = true)]
    async fn idle_resolves_after_quiet_period() {
        let activity = Arc::new(Activity::new());
        let started = Instant::now();
        activity.idle(Some(Duration::from_secs(5))).await;
        assert!(started.elapsed() >= Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn idle_waits_for_in_flight_requests() {
        let activity = Arc::new(Activity::new());
        let guard = activity.begin();

        let waiter = {
            let activity = Arc::clone(&activity);
            tokio::spawn(async move { activity.idle(Some(Duration::from_secs(1))).await })
        };

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(!waiter.is_finished());

        drop(guard);
        let released = Instant::now();
        waiter.await.unwrap();
        assert!(released.elapsed() >= Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn idle_without_timeout_never_resolves() {
        let activity = Activity::new();
        let result =
            tokio::time::timeout(Duration::from_secs(3600), activity.idle(None)).await;
        assert!(result.is_err());
    }
}
