use std::net::SocketAddr;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::admin::AdminState;
use crate::config::schema::HostHealth;
use crate::health::LocalHealth;
use crate::upstream::UpstreamError;

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub local_health: &'static str,
    pub pass_through_mode: bool,
    pub cache: Option<CacheStatus>,
}

#[derive(Serialize)]
pub struct CacheStatus {
    pub window_ms: u128,
    pub fresh: bool,
    pub cached: &'static str,
}

#[derive(Serialize)]
pub struct ClusterStatus {
    pub name: String,
    pub total: u64,
    pub healthy: u64,
    pub degraded: u64,
    pub hosts: Vec<HostStatus>,
}

#[derive(Serialize)]
pub struct HostStatus {
    pub address: String,
    pub health: HostHealth,
    pub active_requests: usize,
}

#[derive(Deserialize)]
pub struct SetHostHealth {
    pub health: HostHealth,
}

#[derive(Serialize)]
pub struct HostHealthChange {
    pub previous: HostHealth,
    pub current: HostHealth,
}

#[derive(Debug, Error)]
pub enum AdminError {
    #[error("invalid host address '{0}'")]
    InvalidAddress(String),

    #[error(transparent)]
    Upstream(#[from] UpstreamError),
}

impl IntoResponse for AdminError {
    fn into_response(self) -> Response {
        let status = match self {
            AdminError::InvalidAddress(_) => StatusCode::BAD_REQUEST,
            AdminError::Upstream(_) => StatusCode::NOT_FOUND,
        };
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

fn local_health_label(state: &AdminState) -> &'static str {
    if state.local_health.is_failed() {
        "failed"
    } else {
        "ok"
    }
}

pub async fn get_status(State(state): State<AdminState>) -> Json<SystemStatus> {
    let filter_config = state.filter_config.load();
    let cache = filter_config.cache_manager().map(|cache| CacheStatus {
        window_ms: cache.timeout().as_millis(),
        fresh: cache.use_cached_response(),
        cached: cache.cached_response().label(),
    });

    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        local_health: local_health_label(&state),
        pass_through_mode: filter_config.pass_through_mode(),
        cache,
    })
}

pub async fn get_clusters(State(state): State<AdminState>) -> Json<Vec<ClusterStatus>> {
    let statuses = state
        .clusters
        .clusters()
        .iter()
        .map(|cluster| {
            let stats = cluster.membership();
            ClusterStatus {
                name: cluster.name().to_string(),
                total: stats.total,
                healthy: stats.healthy,
                degraded: stats.degraded,
                hosts: cluster
                    .hosts()
                    .iter()
                    .map(|h| HostStatus {
                        address: h.addr.to_string(),
                        health: h.health(),
                        active_requests: h.active_requests(),
                    })
                    .collect(),
            }
        })
        .collect();

    Json(statuses)
}

pub async fn set_host_health(
    State(state): State<AdminState>,
    Path((cluster, address)): Path<(String, String)>,
    Json(body): Json<SetHostHealth>,
) -> Result<Json<HostHealthChange>, AdminError> {
    let addr: SocketAddr = address
        .parse()
        .map_err(|_| AdminError::InvalidAddress(address.clone()))?;
    let previous = state.clusters.set_host_health(&cluster, addr, body.health)?;

    Ok(Json(HostHealthChange {
        previous,
        current: body.health,
    }))
}

pub async fn healthcheck_fail(State(state): State<AdminState>) -> Json<serde_json::Value> {
    state.local_health.set_failed();
    Json(serde_json::json!({ "local_health": local_health_label(&state) }))
}

pub async fn healthcheck_ok(State(state): State<AdminState>) -> Json<serde_json::Value> {
    state.local_health.set_ok();
    Json(serde_json::json!({ "local_health": local_health_label(&state) }))
}
