//! Cluster registry.
//!
//! # Responsibilities
//! - Hold the clusters known to this node, keyed by name
//! - Serve membership counters to the health-check filter
//! - Apply host health reported from outside
//! - Reconcile with a reloaded configuration

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use dashmap::DashMap;
use thiserror::Error;

use crate::config::schema::{ClusterConfig, HostHealth};
use crate::health::context::{ClusterRegistry, MembershipStats};
use crate::observability::metrics;
use crate::upstream::{cluster::Cluster, host::Host};

/// Errors from runtime registry updates.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("unknown cluster '{0}'")]
    UnknownCluster(String),

    #[error("host {addr} is not a member of cluster '{cluster}'")]
    UnknownHost { cluster: String, addr: SocketAddr },
}

/// Registry of clusters by name.
#[derive(Debug, Default)]
pub struct ClusterManager {
    clusters: DashMap<String, Arc<Cluster>>,
}

impl ClusterManager {
    /// Create a registry from configuration.
    pub fn new(configs: &[ClusterConfig]) -> Self {
        let manager = Self::default();
        manager.sync(configs);
        manager
    }

    /// Replace the cluster set with `configs`. Hosts that survive the
    /// reload keep their runtime health.
    pub fn sync(&self, configs: &[ClusterConfig]) {
        for config in configs {
            let previous: HashMap<SocketAddr, Arc<Host>> = self
                .clusters
                .get(&config.name)
                .map(|c| c.hosts().iter().map(|h| (h.addr, h.clone())).collect())
                .unwrap_or_default();

            let mut hosts = Vec::with_capacity(config.hosts.len());
            for host in &config.hosts {
                match host.address.parse::<SocketAddr>() {
                    Ok(addr) => hosts.push(
                        previous
                            .get(&addr)
                            .cloned()
                            .unwrap_or_else(|| Arc::new(Host::new(addr, host.health))),
                    ),
                    Err(_) => {
                        tracing::warn!(cluster = %config.name, address = %host.address, "Invalid host address");
                    }
                }
            }

            let cluster = Arc::new(Cluster::new(config.name.clone(), hosts));
            metrics::record_cluster_membership(cluster.name(), cluster.membership());
            self.clusters.insert(config.name.clone(), cluster);
        }

        self.clusters
            .retain(|name, _| configs.iter().any(|c| &c.name == name));

        tracing::info!(clusters = self.clusters.len(), "Cluster registry synced");
    }

    pub fn get(&self, name: &str) -> Option<Arc<Cluster>> {
        self.clusters.get(name).map(|c| c.value().clone())
    }

    /// All clusters, sorted by name.
    pub fn clusters(&self) -> Vec<Arc<Cluster>> {
        let mut clusters: Vec<_> = self.clusters.iter().map(|c| c.value().clone()).collect();
        clusters.sort_by(|a, b| a.name().cmp(b.name()));
        clusters
    }

    /// Record the health of one host. Returns the previous health.
    pub fn set_host_health(
        &self,
        cluster: &str,
        addr: SocketAddr,
        health: HostHealth,
    ) -> Result<HostHealth, UpstreamError> {
        let entry = self
            .get(cluster)
            .ok_or_else(|| UpstreamError::UnknownCluster(cluster.to_string()))?;
        let host = entry.host(&addr).ok_or_else(|| UpstreamError::UnknownHost {
            cluster: cluster.to_string(),
            addr,
        })?;

        let previous = host.set_health(health);
        if previous != health {
            tracing::info!(cluster = %cluster, host = %addr, from = ?previous, to = ?health, "Host health changed");
        }
        metrics::record_cluster_membership(cluster, entry.membership());
        Ok(previous)
    }
}

impl ClusterRegistry for ClusterManager {
    fn membership(&self, name: &str) -> Option<MembershipStats> {
        self.clusters.get(name).map(|c| c.membership())
    }
}
