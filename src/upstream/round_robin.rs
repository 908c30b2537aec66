//! Round-robin host selection.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use crate::upstream::{LoadBalancer, host::Host};

/// Round-robin selector.
/// Stores an internal counter to rotate through hosts.
#[derive(Debug, Default)]
pub struct RoundRobin {
    counter: AtomicUsize,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LoadBalancer for RoundRobin {
    fn next_host(&self, hosts: &[Arc<Host>]) -> Option<Arc<Host>> {
        if hosts.is_empty() {
            return None;
        }

        // Skip unavailable hosts, at most one full rotation
        let start_count = self.counter.fetch_add(1, Ordering::Relaxed);
        let len = hosts.len();

        for i in 0..len {
            let index = (start_count + i) % len;
            let host = &hosts[index];
            if host.is_available() {
                return Some(host.clone());
            }
        }
        None
    }
}
