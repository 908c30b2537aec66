//! Read-only capabilities the health-check filter consumes.

/// Process-wide local health gate.
pub trait LocalHealth: Send + Sync {
    /// True when this node should report itself unhealthy.
    fn is_failed(&self) -> bool;
}

/// Live membership counters of one cluster.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MembershipStats {
    pub total: u64,
    pub healthy: u64,
    pub degraded: u64,
}

impl MembershipStats {
    /// Hosts able to serve traffic.
    pub fn available(&self) -> u64 {
        self.healthy + self.degraded
    }
}

/// Lookup of clusters by name.
pub trait ClusterRegistry: Send + Sync {
    /// Membership counters of `name`, or `None` if the cluster is unknown.
    fn membership(&self, name: &str) -> Option<MembershipStats>;
}
