//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → tracing events (tracing::info!, crate::critical!, ...)
//!     → inside the per-request span carrying request_id
//!
//! Consumers:
//!     → sink.rs (structured JSON, one record per line, stderr)
//!     → or the plain tracing_subscriber formatter
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Request ID flows from the request span into every record
//! - Critical is an explicit severity, not a magic level number

pub mod logging;
pub mod severity;
pub mod sink;

pub use severity::{ParseSeverityError, Severity, CRITICAL_FIELD};
pub use sink::CloudLogLayer;

/// Emit a critical record.
///
/// Expands to an error-level event tagged `critical = true`, which the
/// structured sink renders with the `CRITICAL` severity.
#[macro_export]
macro_rules! critical {
    ($($arg:tt)+) => {
        ::tracing::error!(critical = true, $($arg)+)
    };
}
