//! Upstream cluster subsystem.
//!
//! # Data Flow
//! ```text
//! ClusterConfig[] (static membership)
//!     → manager.rs (registry keyed by cluster name)
//!     → cluster.rs (members + membership counters)
//!     → host.rs (per-host health, set from outside)
//!
//! Health-check filter → manager.rs (membership counters, read-only)
//! Request hand-off   → cluster.rs → round_robin.rs → host
//! ```
//!
//! # Design Decisions
//! - Host health is an input; no probing or outlier detection here
//! - Degraded hosts still receive traffic and count as available
//! - Registry reloads keep runtime health of surviving hosts

pub mod cluster;
pub mod host;
pub mod manager;
pub mod round_robin;

use std::sync::Arc;

use crate::upstream::host::Host;

pub use cluster::Cluster;
pub use manager::{ClusterManager, UpstreamError};

/// Host selection strategy.
pub trait LoadBalancer: Send + Sync + std::fmt::Debug {
    /// Pick the next available host, if any.
    fn next_host(&self, hosts: &[Arc<Host>]) -> Option<Arc<Host>>;
}
