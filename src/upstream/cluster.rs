//! A named group of upstream hosts.

use std::net::SocketAddr;
use std::sync::Arc;

use crate::config::schema::HostHealth;
use crate::health::context::MembershipStats;
use crate::upstream::{host::{Host, HostGuard}, round_robin::RoundRobin, LoadBalancer};

/// Cluster with a fixed member list and live member health.
#[derive(Debug)]
pub struct Cluster {
    name: String,
    hosts: Vec<Arc<Host>>,
    lb: Box<dyn LoadBalancer>,
}

impl Cluster {
    pub fn new(name: impl Into<String>, hosts: Vec<Arc<Host>>) -> Self {
        Self {
            name: name.into(),
            hosts,
            lb: Box::new(RoundRobin::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn hosts(&self) -> &[Arc<Host>] {
        &self.hosts
    }

    pub fn host(&self, addr: &SocketAddr) -> Option<&Arc<Host>> {
        self.hosts.iter().find(|h| h.addr == *addr)
    }

    /// Select an available host for a request.
    pub fn pick(&self) -> Option<HostGuard> {
        self.lb.next_host(&self.hosts).map(|h| h.acquire())
    }

    /// Current membership counters.
    pub fn membership(&self) -> MembershipStats {
        let mut stats = MembershipStats {
            total: self.hosts.len() as u64,
            ..MembershipStats::default()
        };
        for host in &self.hosts {
            match host.health() {
                HostHealth::Healthy => stats.healthy += 1,
                HostHealth::Degraded => stats.degraded += 1,
                HostHealth::Unhealthy => {}
            }
        }
        stats
    }
}
