//! Structured logging setup.
//!
//! # Responsibilities
//! - Parse the configured severity threshold
//! - Install the global subscriber (structured sink or plain formatter)
//! - Provide the scoped bootstrap subscriber used before config is loaded
//!
//! # Design Decisions
//! - An unparseable severity is reported, never fatal; INFO is used instead
//! - The threshold applies to both outputs
//! - Output goes to stderr

use tracing::Dispatch;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::config::LogConfig;
use crate::observability::severity::{ParseSeverityError, Severity};
use crate::observability::sink::CloudLogLayer;

/// Parse the threshold code, falling back to the default on failure.
pub fn resolve_severity(code: &str) -> (Severity, Option<ParseSeverityError>) {
    match code.parse::<Severity>() {
        Ok(severity) => (severity, None),
        Err(e) => (Severity::default(), Some(e)),
    }
}

/// Install the process-wide subscriber described by `config`.
///
/// Returns the threshold actually in effect.
pub fn init(config: &LogConfig) -> Severity {
    let (severity, parse_error) = resolve_severity(&config.severity);

    let result = if config.uses_structured_sink() {
        tracing_subscriber::registry()
            .with(CloudLogLayer::new(severity, std::io::stderr))
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_filter(severity.level_filter()),
            )
            .try_init()
    };

    if let Err(e) = result {
        tracing::warn!(error = %e, "Global subscriber already installed");
    }

    if let Some(e) = parse_error {
        tracing::error!(error = %e, "failed parse severity level");
    }

    tracing::debug!(
        severity = %severity,
        handler = %config.handler,
        "Logging initialized"
    );
    severity
}

/// Plain formatter used until the config has been read.
///
/// Honours `RUST_LOG`, defaulting to `info`.
pub fn bootstrap() -> Dispatch {
    let subscriber = tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr));
    Dispatch::new(subscriber)
}
