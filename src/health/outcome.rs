//! Health-check outcome value type.

use axum::http::{HeaderMap, HeaderName, StatusCode};

/// Marks a response from a node that serves at reduced capacity.
pub static X_ENVOY_DEGRADED: HeaderName = HeaderName::from_static("x-envoy-degraded");

/// Result of a health-check decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

/// A health-check result as sent to the prober.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthCheckOutcome {
    pub status: HealthStatus,
    pub degraded: bool,
}

impl HealthCheckOutcome {
    pub const HEALTHY: Self = Self {
        status: HealthStatus::Healthy,
        degraded: false,
    };

    pub const UNHEALTHY: Self = Self {
        status: HealthStatus::Unhealthy,
        degraded: false,
    };

    pub fn is_healthy(&self) -> bool {
        self.status == HealthStatus::Healthy
    }

    /// HTTP status carried by the reply.
    pub fn status_code(&self) -> StatusCode {
        match self.status {
            HealthStatus::Healthy => StatusCode::OK,
            HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Derive the outcome from a response that has already been produced,
    /// locally or by a backend. Any 2xx is healthy.
    pub fn from_response(status: StatusCode, headers: &HeaderMap) -> Self {
        Self {
            status: if status.is_success() {
                HealthStatus::Healthy
            } else {
                HealthStatus::Unhealthy
            },
            degraded: headers.contains_key(&X_ENVOY_DEGRADED),
        }
    }

    pub fn label(&self) -> &'static str {
        match (self.status, self.degraded) {
            (HealthStatus::Healthy, false) => "healthy",
            (HealthStatus::Healthy, true) => "degraded",
            (HealthStatus::Unhealthy, _) => "unhealthy",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_from_response() {
        let mut headers = HeaderMap::new();
        assert_eq!(
            HealthCheckOutcome::from_response(StatusCode::NO_CONTENT, &headers),
            HealthCheckOutcome::HEALTHY
        );
        assert_eq!(
            HealthCheckOutcome::from_response(StatusCode::INTERNAL_SERVER_ERROR, &headers),
            HealthCheckOutcome::UNHEALTHY
        );

        headers.insert(X_ENVOY_DEGRADED.clone(), HeaderValue::from_static(""));
        let outcome = HealthCheckOutcome::from_response(StatusCode::OK, &headers);
        assert!(outcome.is_healthy());
        assert!(outcome.degraded);
        assert_eq!(outcome.label(), "degraded");
        assert_eq!(outcome.status_code(), StatusCode::OK);
    }
}
