//! HTTP Service Scaffold Library

pub mod config;
pub mod health;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;

pub use config::schema::AppConfig;
pub use health::HealthGate;
pub use http::{HttpServer, ServerDependency};
pub use lifecycle::{LifecycleController, LifecycleState, Shutdown};
