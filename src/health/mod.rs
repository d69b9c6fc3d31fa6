//! Health reporting subsystem.
//!
//! # Data Flow
//! ```text
//! Shutdown sequence (lifecycle::controller):
//!     Signal received
//!     → gate.rs set_unhealthy()
//!
//! Liveness probe (liveness.rs):
//!     GET /health
//!     → gate.rs is_unhealthy()
//!     → 200 {"status": 1} | 503 {"status": 0}
//! ```
//!
//! # Design Decisions
//! - The gate is injected into both sides; there is no global flag
//! - The flag only ever moves from healthy to unhealthy

pub mod gate;
pub mod liveness;

pub use gate::HealthGate;
pub use liveness::liveness;
