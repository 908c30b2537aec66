//! Admin API.
//!
//! # Responsibilities
//! - Report local health, cache state and cluster membership
//! - Toggle the local health flag (fail / ok)
//! - Override host health for draining and testing
//!
//! # Design Decisions
//! - Served on a separate listener, disabled by default
//! - Every route requires a bearer API key

pub mod auth;
pub mod handlers;

use std::sync::Arc;

use arc_swap::ArcSwap;
use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};

use crate::health::{HealthCheckFilterConfig, LocalHealthState};
use crate::upstream::ClusterManager;
use self::auth::admin_auth_middleware;
use self::handlers::*;

/// Shared state of the admin API.
#[derive(Clone)]
pub struct AdminState {
    pub local_health: Arc<LocalHealthState>,
    pub clusters: Arc<ClusterManager>,
    pub filter_config: Arc<ArcSwap<HealthCheckFilterConfig>>,
    pub api_key: Arc<str>,
}

pub fn setup_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/clusters", get(get_clusters))
        .route("/admin/clusters/{cluster}/hosts/{address}", put(set_host_health))
        .route("/healthcheck/fail", post(healthcheck_fail))
        .route("/healthcheck/ok", post(healthcheck_ok))
        .layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware))
        .with_state(state)
}
