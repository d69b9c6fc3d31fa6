//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! listener.rs (bind, accept)
//!     → connection.rs (one task per connection, hyper auto HTTP/1 + HTTP/2)
//!     → axum Router (http::server)
//! ```
//!
//! # Design Decisions
//! - Each connection watches the shared shutdown signal and drains itself
//! - Idle keep-alive connections are closed once nothing is in flight
//! - Aborted responses close the connection without writing a status line

pub mod connection;
pub mod listener;

pub use connection::{ConnectionSettings, DispatchError};
pub use listener::{Listener, ListenerError};
