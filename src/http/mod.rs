//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection (net::connection)
//!     → server.rs (router with fallbacks)
//!     → middleware/ (span, panic recovery)
//!     → request.rs (request ID)
//!     → response.rs (JSON content type)
//!     → handlers.rs / health::liveness
//!     → dependency.rs (injected business operations)
//! ```

pub mod dependency;
pub mod handlers;
pub mod middleware;
pub mod request;
pub mod response;
pub mod server;

pub use dependency::ServerDependency;
pub use request::{RequestId, X_REQUEST_ID};
pub use response::Aborted;
pub use server::{HttpServer, ServerHandle, ShutdownError};
