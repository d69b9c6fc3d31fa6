//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (JSON)
//!     → loader.rs (read & deserialize)
//!     → duration.rs (integer nanoseconds → Duration)
//!     → AppConfig (immutable)
//!     → LogConfig to observability, ServerConfig to http + lifecycle
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; there is no reload
//! - All fields have defaults to allow minimal configs
//! - Any read or parse failure is fatal at startup

pub mod duration;
pub mod loader;
pub mod schema;

pub use loader::{load_config, ConfigError};
pub use schema::{AppConfig, LogConfig, ServerConfig};
