//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the forwarding handler
//! - Wire up middleware (health check, timeout, request ID, tracing)
//! - Bind server to listener
//! - Forward requests to the configured upstream cluster
//! - Apply configuration reloads without dropping connections
//! - Start the admin API when enabled

use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use axum::{
    body::Body,
    extract::State,
    http::uri::{Authority, PathAndQuery, Scheme},
    http::{Request, StatusCode, Uri},
    middleware,
    response::{IntoResponse, Response},
    Router,
};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::admin::{setup_admin_router, AdminState};
use crate::config::{ConfigError, ProxyConfig};
use crate::health::{HealthCheckFilterConfig, LocalHealthState};
use crate::http::filter::ResponseFlag;
use crate::http::middleware::health_check::{health_check_middleware, HealthCheckState};
use crate::http::request::{propagate_request_id_layer, request_id, set_request_id_layer};
use crate::upstream::ClusterManager;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ArcSwap<ProxyConfig>>,
    pub clusters: Arc<ClusterManager>,
    pub local_health: Arc<LocalHealthState>,
    pub filter_config: Arc<ArcSwap<HealthCheckFilterConfig>>,
    pub client: Client<HttpConnector, Body>,
}

/// HTTP server for the health-checking proxy.
pub struct HttpServer {
    router: Router,
    config: ProxyConfig,
    state: AppState,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    ///
    /// Must be called from within a Tokio runtime when a cache window is
    /// configured, since the cache timer is spawned here.
    pub fn new(config: ProxyConfig) -> Result<Self, ConfigError> {
        let local_health = Arc::new(LocalHealthState::new());
        let clusters = Arc::new(ClusterManager::new(&config.clusters));
        let filter_config = HealthCheckFilterConfig::from_config(
            &config.health_check,
            &config.node,
            local_health.clone(),
            clusters.clone(),
        )?;

        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());

        let state = AppState {
            config: Arc::new(ArcSwap::from_pointee(config.clone())),
            clusters,
            local_health,
            filter_config: Arc::new(ArcSwap::from_pointee(filter_config)),
            client,
        };

        let router = Self::build_router(&config, state.clone());
        Ok(Self {
            router,
            config,
            state,
        })
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &ProxyConfig, state: AppState) -> Router {
        let health_check = HealthCheckState {
            filter_config: state.filter_config.clone(),
        };

        Router::new()
            .fallback(proxy_handler)
            .with_state(state)
            .layer(middleware::from_fn_with_state(health_check, health_check_middleware))
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(propagate_request_id_layer())
            .layer(TraceLayer::new_for_http())
            .layer(set_request_id_layer())
    }

    /// Run the server, accepting connections on the given listener.
    ///
    /// Configuration updates received on `config_updates` are applied live.
    /// Returns once `shutdown` fires and in-flight requests have drained.
    pub async fn run(
        self,
        listener: TcpListener,
        mut config_updates: mpsc::UnboundedReceiver<ProxyConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            node_cluster = %self.config.node.cluster_name,
            pass_through = self.config.health_check.pass_through_mode,
            "HTTP server starting"
        );

        if self.config.admin.enabled {
            self.spawn_admin(shutdown.resubscribe()).await?;
        }

        let state = self.state.clone();
        tokio::spawn(async move {
            while let Some(new_config) = config_updates.recv().await {
                apply_config(&state, new_config);
            }
        });

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received, draining connections");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    async fn spawn_admin(&self, mut shutdown: broadcast::Receiver<()>) -> Result<(), std::io::Error> {
        let admin_state = AdminState {
            local_health: self.state.local_health.clone(),
            clusters: self.state.clusters.clone(),
            filter_config: self.state.filter_config.clone(),
            api_key: Arc::from(self.config.admin.api_key.as_str()),
        };
        let listener = TcpListener::bind(&self.config.admin.bind_address).await?;
        tracing::info!(address = %listener.local_addr()?, "Admin API listening");

        let app = setup_admin_router(admin_state);
        tokio::spawn(async move {
            let result = axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown.recv().await;
                })
                .await;
            if let Err(e) = result {
                tracing::error!(error = %e, "Admin API server failed");
            }
        });
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    /// Process-wide local health flag.
    pub fn local_health(&self) -> &Arc<LocalHealthState> {
        &self.state.local_health
    }

    /// Live cluster membership.
    pub fn clusters(&self) -> &Arc<ClusterManager> {
        &self.state.clusters
    }

    /// Current health-check filter configuration.
    pub fn filter_config(&self) -> Arc<HealthCheckFilterConfig> {
        self.state.filter_config.load_full()
    }
}

/// Apply a reloaded configuration. A config that cannot be turned into a
/// filter is rejected as a whole.
fn apply_config(state: &AppState, config: ProxyConfig) {
    let filter_config = match HealthCheckFilterConfig::from_config(
        &config.health_check,
        &config.node,
        state.local_health.clone(),
        state.clusters.clone(),
    ) {
        Ok(filter_config) => filter_config,
        Err(e) => {
            tracing::error!(error = %e, "Rejected config update, keeping current configuration");
            return;
        }
    };

    let current = state.config.load();
    if current.listener.bind_address != config.listener.bind_address
        || current.admin.bind_address != config.admin.bind_address
        || current.admin.enabled != config.admin.enabled
    {
        tracing::warn!("Listener and admin changes require a restart");
    }

    state.clusters.sync(&config.clusters);
    state.filter_config.store(Arc::new(filter_config));
    tracing::info!(
        clusters = config.clusters.len(),
        pass_through = config.health_check.pass_through_mode,
        cache_time_ms = ?config.health_check.cache_time_ms,
        "Configuration applied"
    );
    state.config.store(Arc::new(config));
}

/// Forward a request to a host of the upstream cluster.
async fn proxy_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let request_id = request_id(request.headers()).to_string();
    let config = state.config.load();

    let Some(cluster_name) = config.upstream.cluster.as_deref() else {
        return local_error(StatusCode::SERVICE_UNAVAILABLE, "no upstream configured", ResponseFlag::NoHealthyUpstream);
    };
    let Some(host) = state.clusters.get(cluster_name).and_then(|c| c.pick()) else {
        tracing::warn!(request_id = %request_id, cluster = %cluster_name, "No healthy upstream host");
        return local_error(StatusCode::SERVICE_UNAVAILABLE, "no healthy upstream", ResponseFlag::NoHealthyUpstream);
    };

    let (parts, body) = request.into_parts();

    let mut uri_parts = parts.uri.clone().into_parts();
    uri_parts.scheme = Some(Scheme::HTTP);
    uri_parts.authority = Authority::from_str(&host.addr.to_string()).ok();
    if uri_parts.path_and_query.is_none() {
        uri_parts.path_and_query = Some(PathAndQuery::from_static("/"));
    }
    let uri = match Uri::from_parts(uri_parts) {
        Ok(uri) => uri,
        Err(e) => {
            tracing::error!(request_id = %request_id, error = %e, "Failed to build upstream URI");
            return (StatusCode::BAD_GATEWAY, "invalid upstream uri").into_response();
        }
    };

    let mut upstream_request = Request::from_parts(parts, body);
    *upstream_request.uri_mut() = uri;

    match state.client.request(upstream_request).await {
        Ok(response) => {
            tracing::debug!(
                request_id = %request_id,
                upstream = %host.addr,
                status = response.status().as_u16(),
                "Upstream responded"
            );
            let (parts, body) = response.into_parts();
            Response::from_parts(parts, Body::new(body))
        }
        Err(e) => {
            tracing::error!(request_id = %request_id, upstream = %host.addr, error = %e, "Upstream error");
            local_error(StatusCode::BAD_GATEWAY, "upstream connect error", ResponseFlag::UpstreamConnectionFailure)
        }
    }
}

fn local_error(status: StatusCode, body: &'static str, flag: ResponseFlag) -> Response {
    let mut response = (status, body).into_response();
    response.extensions_mut().insert(flag);
    response
}
