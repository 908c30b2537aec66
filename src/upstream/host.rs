//! Upstream host abstraction.
//!
//! # Responsibilities
//! - Represent a single member of a cluster
//! - Hold its health as reported by the health-tracking subsystem
//! - Track in-flight requests

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use std::ops::Deref;

use crate::config::schema::HostHealth;

impl HostHealth {
    fn from_u8(val: u8) -> Self {
        match val {
            1 => HostHealth::Degraded,
            2 => HostHealth::Unhealthy,
            _ => HostHealth::Healthy,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            HostHealth::Healthy => 0,
            HostHealth::Degraded => 1,
            HostHealth::Unhealthy => 2,
        }
    }
}

/// A single cluster member.
#[derive(Debug)]
pub struct Host {
    /// The address of the host.
    pub addr: SocketAddr,
    /// Current health (0=Healthy, 1=Degraded, 2=Unhealthy).
    health: AtomicU8,
    /// Number of requests currently forwarded to this host.
    active_requests: AtomicUsize,
}

impl Host {
    /// Create a new host.
    pub fn new(addr: SocketAddr, health: HostHealth) -> Self {
        Self {
            addr,
            health: AtomicU8::new(health.as_u8()),
            active_requests: AtomicUsize::new(0),
        }
    }

    pub fn health(&self) -> HostHealth {
        HostHealth::from_u8(self.health.load(Ordering::Relaxed))
    }

    /// Record a new health state. Returns the previous one.
    pub fn set_health(&self, health: HostHealth) -> HostHealth {
        HostHealth::from_u8(self.health.swap(health.as_u8(), Ordering::Relaxed))
    }

    /// Healthy and degraded hosts receive traffic.
    pub fn is_available(&self) -> bool {
        self.health() != HostHealth::Unhealthy
    }

    pub fn active_requests(&self) -> usize {
        self.active_requests.load(Ordering::Relaxed)
    }

    /// Count a request against this host until the guard is dropped.
    pub fn acquire(self: &Arc<Self>) -> HostGuard {
        self.active_requests.fetch_add(1, Ordering::Relaxed);
        HostGuard { host: self.clone() }
    }
}

/// A RAII guard that manages the in-flight request count.
#[derive(Debug)]
pub struct HostGuard {
    pub host: Arc<Host>,
}

impl Deref for HostGuard {
    type Target = Host;
    fn deref(&self) -> &Self::Target {
        &self.host
    }
}

impl Drop for HostGuard {
    fn drop(&mut self) {
        self.host.active_requests.fetch_sub(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_transitions() {
        let host = Host::new("127.0.0.1:3000".parse().unwrap(), HostHealth::Healthy);
        assert!(host.is_available());

        assert_eq!(host.set_health(HostHealth::Degraded), HostHealth::Healthy);
        assert!(host.is_available());

        host.set_health(HostHealth::Unhealthy);
        assert!(!host.is_available());
        assert_eq!(host.health(), HostHealth::Unhealthy);
    }

    #[test]
    fn test_guard_counts_requests() {
        let host = Arc::new(Host::new("127.0.0.1:3000".parse().unwrap(), HostHealth::Healthy));
        {
            let _a = host.acquire();
            let _b = host.acquire();
            assert_eq!(host.active_requests(), 2);
        }
        assert_eq!(host.active_requests(), 0);
    }
}
