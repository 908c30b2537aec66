//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the health-check proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Identity of this proxy node.
    pub node: NodeConfig,

    /// Health-check interception settings.
    pub health_check: HealthCheckConfig,

    /// Static cluster membership fed into the cluster registry.
    pub clusters: Vec<ClusterConfig>,

    /// Where non-intercepted requests are handed off.
    pub upstream: UpstreamConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Admin API settings.
    pub admin: AdminConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Identity of the local node.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Cluster this proxy belongs to. Reported in the
    /// `x-envoy-upstream-healthchecked-cluster` response header.
    pub cluster_name: String,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            cluster_name: "local".to_string(),
        }
    }
}

/// Health-check interception configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthCheckConfig {
    /// When true, matching requests are forwarded unless the node is
    /// failed or a cached response can be reused.
    pub pass_through_mode: bool,

    /// Cache window in milliseconds. Absent disables the cache.
    pub cache_time_ms: Option<u64>,

    /// Header rules identifying a health-check request (AND semantics).
    pub headers: Vec<HeaderMatchConfig>,

    /// Ordered cluster thresholds consulted when no cache is configured.
    pub cluster_min_healthy_percentages: Vec<ClusterThresholdConfig>,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            pass_through_mode: false,
            cache_time_ms: None,
            headers: vec![HeaderMatchConfig {
                name: ":path".to_string(),
                exact: Some("/healthz".to_string()),
                ..HeaderMatchConfig::default()
            }],
            cluster_min_healthy_percentages: Vec::new(),
        }
    }
}

/// A single header match rule.
///
/// At most one of `exact`, `prefix`, `suffix`, `regex`, `present`, `range`
/// may be set; none means "header is present".
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct HeaderMatchConfig {
    /// Header name. `:path`, `:method` and `:authority` address the request line.
    pub name: String,
    pub exact: Option<String>,
    pub prefix: Option<String>,
    pub suffix: Option<String>,
    /// Full-match regular expression.
    pub regex: Option<String>,
    /// `true` requires the header, `false` requires it to be absent.
    pub present: Option<bool>,
    pub range: Option<RangeConfig>,
    /// Invert the result of the rule.
    pub invert_match: bool,
}

/// Integer range `[start, end)`.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
pub struct RangeConfig {
    pub start: i64,
    pub end: i64,
}

/// Minimum healthy percentage for one cluster.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClusterThresholdConfig {
    /// Cluster name as known to the registry.
    pub cluster: String,

    /// Minimum percentage (0-100) of healthy plus degraded hosts.
    pub percent: f64,
}

/// Static cluster definition.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClusterConfig {
    /// Unique cluster name.
    pub name: String,

    /// Member hosts.
    #[serde(default)]
    pub hosts: Vec<HostConfig>,
}

/// Cluster member definition.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HostConfig {
    /// Host address (e.g., "127.0.0.1:3000").
    pub address: String,

    /// Initial health of the host.
    #[serde(default)]
    pub health: HostHealth,
}

/// Health of a cluster member as reported by the health-tracking subsystem.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum HostHealth {
    #[default]
    Healthy,
    Degraded,
    Unhealthy,
}

/// Upstream hand-off configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Cluster receiving non-intercepted requests.
    pub cluster: Option<String>,
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable admin API.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,

    /// Admin API bind address.
    pub bind_address: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            // WARNING: This is a placeholder! Change this in production.
            api_key: "CHANGE_ME_IN_PRODUCTION".to_string(),
            bind_address: "127.0.0.1:8081".to_string(),
        }
    }
}
