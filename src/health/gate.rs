//! Process health flag.
//!
//! # States
//! - Healthy: liveness probe answers 200, upstream keeps routing traffic
//! - Unhealthy: liveness probe answers 503
//!
//! # State Transitions
//! ```text
//! Healthy → Unhealthy: shutdown begins (once, never reversed)
//! ```

use std::sync::{Arc, PoisonError, RwLock};

/// Shared health flag.
///
/// Cloning yields another handle to the same flag. Readers never block each
/// other; the single writer takes the lock once.
#[derive(Debug, Clone, Default)]
pub struct HealthGate {
    unhealthy: Arc<RwLock<bool>>,
}

impl HealthGate {
    /// Create a gate in the healthy state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the process unhealthy. Idempotent.
    pub fn set_unhealthy(&self) {
        let mut unhealthy = self.unhealthy.write().unwrap_or_else(PoisonError::into_inner);
        *unhealthy = true;
    }

    /// Current state.
    pub fn is_unhealthy(&self) -> bool {
        *self.unhealthy.read().unwrap_or_else(PoisonError::into_inner)
    }
}
