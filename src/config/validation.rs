//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check referential integrity (upstream references an existing cluster)
//! - Validate value ranges (percentages, cache window, addresses)
//! - Compile header rules once to surface regex and name errors early
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system
//! - Thresholds on undefined clusters are legal (they evaluate unhealthy)

use std::collections::HashSet;
use std::net::SocketAddr;

use axum::http::HeaderValue;
use thiserror::Error;

use crate::config::schema::ProxyConfig;
use crate::http::matcher::{HeaderMatcher, MatcherError};

/// Longest accepted cache window (one day).
pub const MAX_CACHE_TIME_MS: u64 = 24 * 60 * 60 * 1000;

/// A single semantic configuration error.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("invalid {field} address '{value}'")]
    InvalidAddress { field: &'static str, value: String },

    #[error("health_check.cache_time_ms must be greater than zero")]
    ZeroCacheTime,

    #[error("health_check.cache_time_ms must not exceed {max}, got {value}")]
    CacheTimeTooLarge { value: u64, max: u64 },

    #[error("health_check.headers must contain at least one rule")]
    NoHeaderRules,

    #[error("health_check.headers: {0}")]
    HeaderRule(#[from] MatcherError),

    #[error("threshold for cluster '{cluster}' must be within [0, 100], got {percent}")]
    PercentOutOfRange { cluster: String, percent: f64 },

    #[error("node.cluster_name '{0}' is not a valid header value")]
    InvalidNodeCluster(String),

    #[error("cluster name must not be empty")]
    EmptyClusterName,

    #[error("cluster '{0}' is defined more than once")]
    DuplicateCluster(String),

    #[error("invalid host address '{address}' in cluster '{cluster}'")]
    InvalidHost { cluster: String, address: String },

    #[error("upstream.cluster '{0}' is not defined")]
    UnknownUpstream(String),

    #[error("timeouts.request_secs must be greater than zero")]
    ZeroRequestTimeout,
}

/// Validate a parsed configuration.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_address(&mut errors, "listener", &config.listener.bind_address);
    if config.admin.enabled {
        check_address(&mut errors, "admin", &config.admin.bind_address);
    }
    if config.observability.metrics_enabled {
        check_address(&mut errors, "metrics", &config.observability.metrics_address);
    }

    if HeaderValue::from_str(&config.node.cluster_name).is_err() {
        errors.push(ValidationError::InvalidNodeCluster(config.node.cluster_name.clone()));
    }

    let health_check = &config.health_check;
    match health_check.cache_time_ms {
        Some(0) => errors.push(ValidationError::ZeroCacheTime),
        Some(value) if value > MAX_CACHE_TIME_MS => {
            errors.push(ValidationError::CacheTimeTooLarge {
                value,
                max: MAX_CACHE_TIME_MS,
            })
        }
        _ => {}
    }
    if health_check.headers.is_empty() {
        errors.push(ValidationError::NoHeaderRules);
    }
    for rule in &health_check.headers {
        if let Err(e) = HeaderMatcher::from_config(rule) {
            errors.push(e.into());
        }
    }
    for threshold in &health_check.cluster_min_healthy_percentages {
        if !(0.0..=100.0).contains(&threshold.percent) {
            errors.push(ValidationError::PercentOutOfRange {
                cluster: threshold.cluster.clone(),
                percent: threshold.percent,
            });
        }
    }

    let mut names = HashSet::new();
    for cluster in &config.clusters {
        if cluster.name.is_empty() {
            errors.push(ValidationError::EmptyClusterName);
        } else if !names.insert(cluster.name.as_str()) {
            errors.push(ValidationError::DuplicateCluster(cluster.name.clone()));
        }
        for host in &cluster.hosts {
            if host.address.parse::<SocketAddr>().is_err() {
                errors.push(ValidationError::InvalidHost {
                    cluster: cluster.name.clone(),
                    address: host.address.clone(),
                });
            }
        }
    }

    if let Some(upstream) = &config.upstream.cluster {
        if !names.contains(upstream.as_str()) {
            errors.push(ValidationError::UnknownUpstream(upstream.clone()));
        }
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::ZeroRequestTimeout);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_address(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field,
            value: value.to_string(),
        });
    }
}
