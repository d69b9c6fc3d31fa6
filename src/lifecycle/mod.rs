//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → resolve the shutdown future
//!
//! Controller (controller.rs):
//!     Running → signal → Draining (health 503, sleep delay)
//!     → ShuttingDown (stop accept, drain within timeout) → Stopped
//!
//! Shutdown (shutdown.rs):
//!     Broadcast "stop" to the accept loop and every connection task
//! ```
//!
//! # Design Decisions
//! - Health flips before the listener closes so load balancers move traffic first
//! - Shutdown has timeout: remaining connections are aborted after the deadline
//! - Shutdown failures are logged, never fatal

pub mod controller;
pub mod shutdown;
pub mod signals;

pub use controller::{LifecycleController, LifecycleState};
pub use shutdown::{Shutdown, ShutdownSignal};
pub use signals::shutdown_signal;
