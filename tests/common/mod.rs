//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::io::Write;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::Router;
use serde_json::Value;
use service_scaffold::config::ServerConfig;
use service_scaffold::health::HealthGate;
use service_scaffold::http::{HttpServer, ServerDependency, ServerHandle};
use service_scaffold::net::Listener;
use service_scaffold::observability::{CloudLogLayer, Severity};
use tracing::subscriber::DefaultGuard;
use tracing_subscriber::layer::SubscriberExt;

/// Config bound to an ephemeral loopback port.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".into(),
        port: 0,
        ..Default::default()
    }
}

pub struct TestServer {
    pub handle: ServerHandle,
    pub health: HealthGate,
    pub addr: SocketAddr,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

/// Start a server with extra routes on an ephemeral port.
pub async fn start_server(
    config: ServerConfig,
    dependency: ServerDependency,
    routes: Router,
) -> TestServer {
    let server = HttpServer::new(config, dependency).merge(routes);
    let health = server.health();
    let listener = Listener::bind(server.config()).await.unwrap();
    let handle = server.start(listener).unwrap();
    let addr = handle.local_addr();
    TestServer {
        handle,
        health,
        addr,
    }
}

/// HTTP client that never goes through a proxy.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}

/// In-memory destination for the structured sink.
#[derive(Clone, Default)]
pub struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    pub fn records(&self) -> Vec<Value> {
        let bytes = self.0.lock().unwrap();
        String::from_utf8_lossy(&bytes)
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    pub fn with_severity(&self, severity: &str) -> Vec<Value> {
        self.records()
            .into_iter()
            .filter(|r| r["severity"] == severity)
            .collect()
    }
}

impl Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Route this thread's events into a structured sink.
///
/// Only reliable on a current-thread runtime, where the server tasks run on
/// the test thread.
pub fn capture_logs(threshold: Severity) -> (DefaultGuard, CapturedLogs) {
    let captured = CapturedLogs::default();
    let writer = captured.clone();
    let subscriber =
        tracing_subscriber::registry().with(CloudLogLayer::new(threshold, move || writer.clone()));
    (tracing::subscriber::set_default(subscriber), captured)
}
