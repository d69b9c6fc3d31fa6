//! HTTP Service Scaffold
//!
//! Boots an HTTP listener behind panic recovery, request correlation and JSON
//! response middleware, serves a liveness probe, and shuts down in stages on
//! SIGINT/SIGTERM.
//!
//! ```text
//!   config.json ──▶ logging ──▶ HttpServer ──▶ LifecycleController
//!                                   │                  │
//!                                   │   signal ───────▶│ health 503
//!                                   │                  │ sleep(delay)
//!                                   ◀──────────────────│ drain(timeout)
//!                                                      ▼
//!                                                   Stopped
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use axum::BoxError;
use clap::Parser;

use service_scaffold::config::{load_config, AppConfig};
use service_scaffold::http::{HttpServer, ServerDependency};
use service_scaffold::lifecycle::{shutdown_signal, LifecycleController};
use service_scaffold::observability::logging;

#[derive(Parser)]
#[command(name = "service-scaffold")]
#[command(about = "Minimal HTTP service with staged graceful shutdown", long_about = None)]
struct Cli {
    /// Path to the JSON config file.
    config: Option<PathBuf>,
}

/// Read the config under the bootstrap subscriber so failures are logged.
fn read_config(cli: Cli) -> Option<AppConfig> {
    tracing::dispatcher::with_default(&logging::bootstrap(), || {
        let Some(path) = cli.config else {
            tracing::error!("arg config path can't empty");
            return None;
        };
        match load_config(&path) {
            Ok(config) => Some(config),
            Err(e) => {
                tracing::error!(path = %path.display(), "{}", e);
                None
            }
        }
    })
}

#[tokio::main]
async fn main() -> ExitCode {
    let Some(config) = read_config(Cli::parse()) else {
        return ExitCode::FAILURE;
    };
    logging::init(&config.log);

    let dependency = ServerDependency::new(|_request_id, username| async move {
        tracing::info!("user {} created", username);
        Ok::<(), BoxError>(())
    });

    let server = HttpServer::new(config.http.clone(), dependency);
    let health = server.health();

    tracing::info!(address = %config.http.address(), "starting HTTP server");
    let listener = match server.bind().await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(error = %e, "can't start serving HTTP requests");
            return ExitCode::FAILURE;
        }
    };
    let handle = match server.start(listener) {
        Ok(handle) => handle,
        Err(e) => {
            tracing::error!(error = %e, "can't start serving HTTP requests");
            return ExitCode::FAILURE;
        }
    };

    let controller = LifecycleController::from_config(health, &config.http);
    // Shutdown failures are already logged by the controller.
    let _ = controller.run(handle, shutdown_signal()).await;

    tracing::info!("Shutdown complete");
    ExitCode::SUCCESS
}
