//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the service.
//! All types derive Serde traits for deserialization from the JSON config file.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::duration;

/// Root configuration document.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Logging settings.
    pub log: LogConfig,

    /// HTTP listener and shutdown settings.
    pub http: ServerConfig,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct LogConfig {
    /// Minimum severity code (`debug`, `info`, `warn`, `error`, `critical`).
    pub severity: String,

    /// Output selector. Empty selects the structured JSON sink, anything else
    /// the plain default formatter.
    pub handler: String,
}

impl LogConfig {
    /// Whether the structured sink is selected.
    pub fn uses_structured_sink(&self) -> bool {
        self.handler.is_empty()
    }
}

/// HTTP server configuration.
///
/// Zero idle/read/write timeouts disable the corresponding limit. A zero
/// shutdown timeout forces connections closed as soon as shutdown starts.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host or IP to bind. Empty binds all interfaces.
    pub host: String,

    /// TCP port. Defaults to 8080 when omitted; an explicit 0 asks the OS
    /// for an ephemeral port.
    pub port: u16,

    /// Keep-alive connections with nothing in flight are closed after this.
    #[serde(with = "duration::nanos")]
    pub idle_timeout: Duration,

    /// Maximum time to read request headers.
    #[serde(with = "duration::nanos")]
    pub read_timeout: Duration,

    /// Maximum time to produce a response.
    #[serde(with = "duration::nanos")]
    pub write_timeout: Duration,

    /// Wait between failing health checks and stopping the listener.
    #[serde(with = "duration::nanos")]
    pub shutdown_delay: Duration,

    /// Budget for in-flight connections to finish once shutdown starts.
    #[serde(with = "duration::nanos")]
    pub shutdown_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            idle_timeout: Duration::ZERO,
            read_timeout: Duration::ZERO,
            write_timeout: Duration::ZERO,
            shutdown_delay: Duration::ZERO,
            shutdown_timeout: Duration::ZERO,
        }
    }
}

impl ServerConfig {
    /// `host:port` string used for binding and logging.
    pub fn address(&self) -> String {
        let host = if self.host.is_empty() { "0.0.0.0" } else { &self.host };
        format!("{}:{}", host, self.port)
    }

    pub fn idle_timeout(&self) -> Option<Duration> {
        non_zero(self.idle_timeout)
    }

    pub fn read_timeout(&self) -> Option<Duration> {
        non_zero(self.read_timeout)
    }

    pub fn write_timeout(&self) -> Option<Duration> {
        non_zero(self.write_timeout)
    }
}

fn non_zero(d: Duration) -> Option<Duration> {
    if d.is_zero() {
        None
    } else {
        Some(d)
    }
}
