//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber
//! - Emit the per-request access line
//!
//! # Design Decisions
//! - `RUST_LOG` overrides the configured level
//! - Access lines go to the `access_log` target at debug level so they can
//!   be enabled independently

use axum::http::{Method, StatusCode};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::schema::ObservabilityConfig;
use crate::http::filter::StreamInfo;

/// Default filter directive for a configured level.
pub fn default_directive(level: &str) -> String {
    format!("healthcheck_proxy={level},access_log={level},tower_http={level}")
}

/// Install the global subscriber. Safe to call once per process.
pub fn init_logging(config: &ObservabilityConfig) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_directive(&config.log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// One line per finished request.
pub fn access_log(
    request_id: &str,
    method: &Method,
    path: &str,
    status: StatusCode,
    info: &StreamInfo,
) {
    tracing::debug!(
        target: "access_log",
        request_id = %request_id,
        method = %method,
        path = %path,
        status = status.as_u16(),
        health_check = info.is_health_check(),
        flags = %info.response_flags(),
        "request"
    );
}
