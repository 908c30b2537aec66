//! Local health gate.
//!
//! # Responsibilities
//! - Hold the "this node is failed" flag toggled by operators
//! - Expose it to the health-check filter as a read-only capability
//!
//! # Design Decisions
//! - A single atomic; readers never block
//! - Transitions are logged since they drain or restore the node

use std::sync::atomic::{AtomicBool, Ordering};

use crate::health::context::LocalHealth;
use crate::observability::metrics;

/// Operator-controlled local health flag.
#[derive(Debug, Default)]
pub struct LocalHealthState {
    failed: AtomicBool,
}

impl LocalHealthState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report this node as unhealthy to every health-check probe.
    pub fn set_failed(&self) {
        if !self.failed.swap(true, Ordering::AcqRel) {
            tracing::warn!("Local health check set to failed");
        }
        metrics::record_local_health(true);
    }

    /// Resume normal health-check handling.
    pub fn set_ok(&self) {
        if self.failed.swap(false, Ordering::AcqRel) {
            tracing::info!("Local health check restored");
        }
        metrics::record_local_health(false);
    }
}

impl LocalHealth for LocalHealthState {
    fn is_failed(&self) -> bool {
        self.failed.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toggle() {
        let state = LocalHealthState::new();
        assert!(!state.is_failed());

        state.set_failed();
        state.set_failed();
        assert!(state.is_failed());

        state.set_ok();
        assert!(!state.is_failed());
    }
}
