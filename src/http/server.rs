//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum Router with the built-in and caller routes
//! - Wire up middleware (trace span, panic recovery, request ID, JSON)
//! - Accept connections and hand each one to its own task
//! - Stop accepting and drain connections within a deadline on shutdown

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::FromRef,
    routing::{get, post},
    Router,
};
use thiserror::Error;
use tokio::task::{JoinError, JoinHandle, JoinSet};

use crate::config::ServerConfig;
use crate::health::{liveness, HealthGate};
use crate::http::dependency::ServerDependency;
use crate::http::handlers::create_user;
use crate::http::middleware;
use crate::http::response::{method_not_allowed, not_found};
use crate::lifecycle::shutdown::Shutdown;
use crate::net::connection::{serve_connection, ConnectionSettings};
use crate::net::listener::{Listener, ListenerError};

/// Pause after a failed accept (e.g. file descriptor exhaustion).
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(50);

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub health: HealthGate,
    pub dependency: ServerDependency,
}

impl FromRef<AppState> for HealthGate {
    fn from_ref(state: &AppState) -> Self {
        state.health.clone()
    }
}

impl FromRef<AppState> for ServerDependency {
    fn from_ref(state: &AppState) -> Self {
        state.dependency.clone()
    }
}

/// Error returned by [`ServerHandle::shutdown`].
#[derive(Debug, Error)]
pub enum ShutdownError {
    #[error("accept loop failed: {0}")]
    AcceptLoop(#[from] JoinError),

    #[error("{remaining} connection(s) still open after {timeout:?}, forced closed")]
    Timeout { timeout: Duration, remaining: usize },
}

/// HTTP server for the service.
pub struct HttpServer {
    router: Router,
    config: ServerConfig,
    health: HealthGate,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: ServerConfig, dependency: ServerDependency) -> Self {
        let health = HealthGate::new();
        let state = AppState {
            health: health.clone(),
            dependency,
        };

        Self {
            router: Self::build_routes(state),
            config,
            health,
        }
    }

    fn build_routes(state: AppState) -> Router {
        Router::new()
            .route("/health", get(liveness))
            .route("/users", post(create_user))
            .with_state(state)
    }

    /// Register additional caller routes. They get the full middleware chain.
    pub fn merge(mut self, routes: Router) -> Self {
        self.router = self.router.merge(routes);
        self
    }

    /// Handle to the flag served by `/health`.
    pub fn health(&self) -> HealthGate {
        self.health.clone()
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Final router: routes, fallbacks and middleware.
    pub fn into_router(self) -> Router {
        let router = self
            .router
            .fallback(not_found)
            .method_not_allowed_fallback(method_not_allowed);
        middleware::apply(router)
    }

    /// Bind the configured address.
    pub async fn bind(&self) -> Result<Listener, ListenerError> {
        Listener::bind(&self.config).await
    }

    /// Start accepting connections in the background.
    pub fn start(self, listener: Listener) -> Result<ServerHandle, std::io::Error> {
        let local_addr = listener.local_addr()?;
        let settings = Arc::new(ConnectionSettings::from_config(&self.config));
        let app = self.into_router();
        let shutdown = Shutdown::new();

        let accept = tokio::spawn(accept_loop(listener, app, settings, shutdown.clone()));

        tracing::info!(address = %local_addr, "HTTP server started");
        Ok(ServerHandle {
            local_addr,
            shutdown,
            accept,
        })
    }
}

async fn accept_loop(
    listener: Listener,
    app: Router,
    settings: Arc<ConnectionSettings>,
    shutdown: Shutdown,
) -> JoinSet<()> {
    let mut stop = shutdown.subscribe();
    let mut connections = JoinSet::new();

    loop {
        tokio::select! {
            biased;
            _ = stop.recv() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer_addr)) => {
                    connections.spawn(serve_connection(
                        stream,
                        peer_addr,
                        app.clone(),
                        Arc::clone(&settings),
                        shutdown.subscribe(),
                    ));
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Accept failed");
                    tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                }
            },
            Some(_) = connections.join_next(), if !connections.is_empty() => {}
        }
    }

    tracing::info!(
        open_connections = connections.len(),
        "HTTP server stopped accepting connections"
    );
    connections
}

/// Running server.
///
/// Dropping the handle leaves the server running detached.
pub struct ServerHandle {
    local_addr: SocketAddr,
    shutdown: Shutdown,
    accept: JoinHandle<JoinSet<()>>,
}

impl ServerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting, let open connections finish their in-flight requests,
    /// and abort whatever is still running after `timeout`.
    pub async fn shutdown(self, timeout: Duration) -> Result<(), ShutdownError> {
        self.shutdown.trigger();
        let mut connections = self.accept.await?;

        tracing::debug!(
            open_connections = connections.len(),
            timeout = ?timeout,
            "Draining connections"
        );

        let drained = tokio::time::timeout(timeout, async {
            while connections.join_next().await.is_some() {}
        })
        .await;

        match drained {
            Ok(()) => Ok(()),
            Err(_) => {
                let remaining = connections.len();
                connections.shutdown().await;
                Err(ShutdownError::Timeout { timeout, remaining })
            }
        }
    }
}
