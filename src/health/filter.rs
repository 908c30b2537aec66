//! Health-check interception filter.
//!
//! # Responsibilities
//! - Classify each request against the configured header rules
//! - Decide whether to answer locally or let the request through
//! - Resolve the outcome (local gate, cache, cluster thresholds)
//! - Annotate responses of health-check and locally-failed streams
//!
//! # State Machine
//! ```text
//! decode_headers: match? → health_check_request
//!                 intercept? → handling (StopIteration)
//! decode_data / decode_trailers: end of request && handling → on_complete
//! encode_headers: health_check_request → cache refresh + cluster header
//!                 else local gate failed → immediate-fail header
//! ```
//!
//! # Design Decisions
//! - One filter per request; the shared parts live in `HealthCheckFilterConfig`
//! - The outcome is resolved by an ordered cascade, first decisive step wins
//! - Request bodies of intercepted probes are dropped, never buffered

use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::http::header::InvalidHeaderValue;
use axum::http::{request, response, HeaderMap, HeaderName, HeaderValue};

use crate::config::schema::{HealthCheckConfig, NodeConfig};
use crate::health::cache::HealthCheckCacheManager;
use crate::health::context::{ClusterRegistry, LocalHealth};
use crate::health::outcome::{HealthCheckOutcome, X_ENVOY_DEGRADED};
use crate::http::filter::{
    DecoderFilterCallbacks, FilterDataStatus, FilterHeadersStatus, FilterTrailersStatus,
    ResponseFlag,
};
use crate::http::matcher::{AndMatcher, Matcher, MatcherError};

/// Names the cluster of the node that answered a health check.
pub static X_ENVOY_UPSTREAM_HEALTHCHECKED_CLUSTER: HeaderName =
    HeaderName::from_static("x-envoy-upstream-healthchecked-cluster");

/// Tells observers that this node failed its own health gate.
pub static X_ENVOY_IMMEDIATE_HEALTH_CHECK_FAIL: HeaderName =
    HeaderName::from_static("x-envoy-immediate-health-check-fail");

/// Errors building the shared filter configuration.
#[derive(Debug, thiserror::Error)]
pub enum FilterConfigError {
    #[error(transparent)]
    Matcher(#[from] MatcherError),

    #[error("cluster name is not a valid header value: {0}")]
    ClusterName(#[from] InvalidHeaderValue),
}

/// Minimum share of available hosts required of one cluster.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterThreshold {
    pub cluster: String,
    pub min_healthy_percent: f64,
}

/// State shared by every health-check filter of one configuration.
pub struct HealthCheckFilterConfig {
    pass_through_mode: bool,
    header_match: Box<dyn Matcher>,
    cache_manager: Option<Arc<HealthCheckCacheManager>>,
    cluster_min_healthy_percentages: Vec<ClusterThreshold>,
    local_health: Arc<dyn LocalHealth>,
    clusters: Arc<dyn ClusterRegistry>,
    local_cluster: HeaderValue,
}

impl HealthCheckFilterConfig {
    /// Build from configuration. Creates the cache (and its timer) when a
    /// cache window is configured, so must run inside a tokio runtime.
    pub fn from_config(
        config: &HealthCheckConfig,
        node: &NodeConfig,
        local_health: Arc<dyn LocalHealth>,
        clusters: Arc<dyn ClusterRegistry>,
    ) -> Result<Self, FilterConfigError> {
        let header_match = Box::new(AndMatcher::from_config(&config.headers)?);
        let cache_manager = config
            .cache_time_ms
            .map(|ms| Arc::new(HealthCheckCacheManager::new(Duration::from_millis(ms))));
        let thresholds = config
            .cluster_min_healthy_percentages
            .iter()
            .map(|t| ClusterThreshold {
                cluster: t.cluster.clone(),
                min_healthy_percent: t.percent,
            })
            .collect();

        Ok(Self {
            pass_through_mode: config.pass_through_mode,
            header_match,
            cache_manager,
            cluster_min_healthy_percentages: thresholds,
            local_health,
            clusters,
            local_cluster: HeaderValue::from_str(&node.cluster_name)?,
        })
    }

    /// Assemble from already-built parts.
    pub fn new(
        pass_through_mode: bool,
        header_match: Box<dyn Matcher>,
        cache_manager: Option<Arc<HealthCheckCacheManager>>,
        cluster_min_healthy_percentages: Vec<ClusterThreshold>,
        local_health: Arc<dyn LocalHealth>,
        clusters: Arc<dyn ClusterRegistry>,
        local_cluster: HeaderValue,
    ) -> Self {
        Self {
            pass_through_mode,
            header_match,
            cache_manager,
            cluster_min_healthy_percentages,
            local_health,
            clusters,
            local_cluster,
        }
    }

    pub fn cache_manager(&self) -> Option<&Arc<HealthCheckCacheManager>> {
        self.cache_manager.as_ref()
    }

    pub fn pass_through_mode(&self) -> bool {
        self.pass_through_mode
    }

    fn use_cached_response(&self) -> bool {
        self.cache_manager
            .as_ref()
            .is_some_and(|cache| cache.use_cached_response())
    }
}

/// Per-request health-check filter.
pub struct HealthCheckFilter {
    config: Arc<HealthCheckFilterConfig>,
    health_check_request: bool,
    handling: bool,
}

impl HealthCheckFilter {
    pub fn new(config: Arc<HealthCheckFilterConfig>) -> Self {
        Self {
            config,
            health_check_request: false,
            handling: false,
        }
    }

    pub fn is_health_check_request(&self) -> bool {
        self.health_check_request
    }

    /// Whether this request is answered locally.
    pub fn is_handling(&self) -> bool {
        self.handling
    }

    pub fn decode_headers(
        &mut self,
        headers: &request::Parts,
        end_stream: bool,
        callbacks: &mut dyn DecoderFilterCallbacks,
    ) -> FilterHeadersStatus {
        if self.config.header_match.matches(headers) {
            self.health_check_request = true;
            callbacks.stream_info().set_health_check(true);

            // Probes must not consume trace sampling budget.
            callbacks.active_span().set_sampled(false);

            // Outside pass-through mode we always answer. Otherwise only when
            // the node is failed or a cached response is available.
            if !self.config.pass_through_mode
                || self.config.local_health.is_failed()
                || self.config.use_cached_response()
            {
                self.handling = true;
            }
        }

        if end_stream && self.handling {
            self.on_complete(callbacks);
        }

        if self.handling {
            FilterHeadersStatus::StopIteration
        } else {
            FilterHeadersStatus::Continue
        }
    }

    pub fn decode_data(
        &mut self,
        _data: &Bytes,
        end_stream: bool,
        callbacks: &mut dyn DecoderFilterCallbacks,
    ) -> FilterDataStatus {
        if end_stream && self.handling {
            self.on_complete(callbacks);
        }

        if self.handling {
            FilterDataStatus::StopIterationNoBuffer
        } else {
            FilterDataStatus::Continue
        }
    }

    pub fn decode_trailers(
        &mut self,
        _trailers: &HeaderMap,
        callbacks: &mut dyn DecoderFilterCallbacks,
    ) -> FilterTrailersStatus {
        if self.handling {
            self.on_complete(callbacks);
        }

        if self.handling {
            FilterTrailersStatus::StopIteration
        } else {
            FilterTrailersStatus::Continue
        }
    }

    /// Annotate the response of this stream, local reply or forwarded.
    pub fn encode_headers(&mut self, response: &mut response::Parts) -> FilterHeadersStatus {
        if self.health_check_request {
            if let Some(cache) = &self.config.cache_manager {
                if !cache.use_cached_response() {
                    cache.set_cached_response(HealthCheckOutcome::from_response(
                        response.status,
                        &response.headers,
                    ));
                }
            }

            response.headers.insert(
                X_ENVOY_UPSTREAM_HEALTHCHECKED_CLUSTER.clone(),
                self.config.local_cluster.clone(),
            );
        } else if self.config.local_health.is_failed() {
            response.headers.insert(
                X_ENVOY_IMMEDIATE_HEALTH_CHECK_FAIL.clone(),
                HeaderValue::from_static("true"),
            );
        }

        FilterHeadersStatus::Continue
    }

    fn on_complete(&self, callbacks: &mut dyn DecoderFilterCallbacks) {
        debug_assert!(self.handling);

        let outcome = self.resolve_outcome();
        if !outcome.is_healthy() {
            callbacks
                .stream_info()
                .set_response_flag(ResponseFlag::FailedLocalHealthCheck);
        }

        tracing::debug!(
            outcome = outcome.label(),
            status = outcome.status_code().as_u16(),
            "Answering health check locally"
        );

        let degraded = outcome.degraded;
        callbacks.send_local_reply(outcome.status_code(), "", &|headers: &mut HeaderMap| {
            if degraded {
                headers.insert(X_ENVOY_DEGRADED.clone(), HeaderValue::from_static(""));
            }
        });
    }

    fn resolve_outcome(&self) -> HealthCheckOutcome {
        // 1. Local gate overrides everything.
        if self.config.local_health.is_failed() {
            return HealthCheckOutcome::UNHEALTHY;
        }

        // 2. Cached outcome, verbatim.
        if let Some(cache) = &self.config.cache_manager {
            return cache.cached_response();
        }

        // 3. Cluster thresholds.
        if !self.config.cluster_min_healthy_percentages.is_empty() {
            return evaluate_cluster_thresholds(
                &self.config.cluster_min_healthy_percentages,
                self.config.clusters.as_ref(),
            );
        }

        // 4. Nothing to consult.
        HealthCheckOutcome::HEALTHY
    }
}

/// Check clusters in table order; the first one below its threshold
/// (or unknown) makes the node unhealthy.
pub fn evaluate_cluster_thresholds(
    thresholds: &[ClusterThreshold],
    clusters: &dyn ClusterRegistry,
) -> HealthCheckOutcome {
    for threshold in thresholds {
        let Some(stats) = clusters.membership(&threshold.cluster) else {
            tracing::debug!(cluster = %threshold.cluster, "Health check cluster not found");
            return HealthCheckOutcome::UNHEALTHY;
        };

        if stats.total == 0 {
            // An empty cluster only satisfies a 0% requirement.
            if threshold.min_healthy_percent == 0.0 {
                continue;
            }
            tracing::debug!(cluster = %threshold.cluster, "Health check cluster is empty");
            return HealthCheckOutcome::UNHEALTHY;
        }

        let required = stats.total as f64 * threshold.min_healthy_percent / 100.0;
        if (stats.available() as f64) < required {
            tracing::debug!(
                cluster = %threshold.cluster,
                available = stats.available(),
                total = stats.total,
                min_healthy_percent = threshold.min_healthy_percent,
                "Health check cluster below threshold"
            );
            return HealthCheckOutcome::UNHEALTHY;
        }
    }

    HealthCheckOutcome::HEALTHY
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use axum::http::{Request, StatusCode};

    use crate::config::schema::HeaderMatchConfig;
    use crate::health::context::MembershipStats;
    use crate::health::local::LocalHealthState;
    use crate::health::outcome::HealthStatus;
    use crate::http::filter::StreamInfo;
    use crate::http::matcher::HeaderMatcher;
    use crate::observability::tracing::Span;

    #[derive(Default)]
    struct FakeSpan {
        sampled: Option<bool>,
    }

    impl Span for FakeSpan {
        fn set_sampled(&mut self, sampled: bool) {
            self.sampled = Some(sampled);
        }
    }

    #[derive(Default)]
    struct FakeCallbacks {
        info: StreamInfo,
        span: FakeSpan,
        replies: Vec<(StatusCode, HeaderMap)>,
    }

    impl DecoderFilterCallbacks for FakeCallbacks {
        fn stream_info(&mut self) -> &mut StreamInfo {
            &mut self.info
        }

        fn active_span(&mut self) -> &mut dyn Span {
            &mut self.span
        }

        fn send_local_reply(
            &mut self,
            status: StatusCode,
            body: &str,
            modify_headers: &dyn Fn(&mut HeaderMap),
        ) {
            assert!(body.is_empty());
            let mut headers = HeaderMap::new();
            modify_headers(&mut headers);
            self.replies.push((status, headers));
        }
    }

    #[derive(Default)]
    struct FakeClusters {
        clusters: HashMap<String, MembershipStats>,
        lookups: std::sync::Mutex<Vec<String>>,
    }

    impl FakeClusters {
        fn with(mut self, name: &str, total: u64, healthy: u64, degraded: u64) -> Self {
            self.clusters.insert(
                name.to_string(),
                MembershipStats {
                    total,
                    healthy,
                    degraded,
                },
            );
            self
        }

        fn looked_up(&self) -> Vec<String> {
            self.lookups.lock().unwrap().clone()
        }
    }

    impl ClusterRegistry for FakeClusters {
        fn membership(&self, name: &str) -> Option<MembershipStats> {
            self.lookups.lock().unwrap().push(name.to_string());
            self.clusters.get(name).copied()
        }
    }

    struct Fixture {
        pass_through_mode: bool,
        cache: Option<Arc<HealthCheckCacheManager>>,
        thresholds: Vec<ClusterThreshold>,
        local_health: Arc<LocalHealthState>,
        clusters: Arc<FakeClusters>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                pass_through_mode: false,
                cache: None,
                thresholds: Vec::new(),
                local_health: Arc::new(LocalHealthState::new()),
                clusters: Arc::new(FakeClusters::default()),
            }
        }

        fn config(&self) -> Arc<HealthCheckFilterConfig> {
            let matcher = HeaderMatcher::from_config(&HeaderMatchConfig {
                name: ":path".into(),
                exact: Some("/healthz".into()),
                ..HeaderMatchConfig::default()
            })
            .unwrap();

            Arc::new(HealthCheckFilterConfig::new(
                self.pass_through_mode,
                Box::new(matcher),
                self.cache.clone(),
                self.thresholds.clone(),
                self.local_health.clone(),
                self.clusters.clone(),
                HeaderValue::from_static("edge"),
            ))
        }

        fn filter(&self) -> HealthCheckFilter {
            HealthCheckFilter::new(self.config())
        }
    }

    fn threshold(cluster: &str, percent: f64) -> ClusterThreshold {
        ClusterThreshold {
            cluster: cluster.to_string(),
            min_healthy_percent: percent,
        }
    }

    fn request(path: &str) -> request::Parts {
        Request::builder().uri(path).body(()).unwrap().into_parts().0
    }

    fn response(status: StatusCode) -> response::Parts {
        axum::http::Response::builder()
            .status(status)
            .body(())
            .unwrap()
            .into_parts()
            .0
    }

    /// Run a header-only probe through the filter and return the reply status.
    fn probe(filter: &mut HealthCheckFilter, callbacks: &mut FakeCallbacks) -> StatusCode {
        let status = filter.decode_headers(&request("/healthz"), true, callbacks);
        assert_eq!(status, FilterHeadersStatus::StopIteration);
        assert_eq!(callbacks.replies.len(), 1);
        callbacks.replies[0].0
    }

    #[test]
    fn test_non_matching_request_passes_through() {
        let fixture = Fixture::new();
        fixture.local_health.set_failed();
        let mut filter = fixture.filter();
        let mut cb = FakeCallbacks::default();

        assert_eq!(
            filter.decode_headers(&request("/api"), false, &mut cb),
            FilterHeadersStatus::Continue
        );
        assert_eq!(
            filter.decode_data(&Bytes::from_static(b"x"), true, &mut cb),
            FilterDataStatus::Continue
        );
        assert_eq!(
            filter.decode_trailers(&HeaderMap::new(), &mut cb),
            FilterTrailersStatus::Continue
        );

        assert!(!filter.is_health_check_request());
        assert!(!filter.is_handling());
        assert!(cb.replies.is_empty());
        assert!(!cb.info.is_health_check());
        assert_eq!(cb.span.sampled, None);
    }

    #[tokio::test]
    async fn test_non_matching_request_leaves_cache_alone() {
        let mut fixture = Fixture::new();
        fixture.cache = Some(Arc::new(HealthCheckCacheManager::new(Duration::from_secs(60))));
        let mut filter = fixture.filter();
        let mut cb = FakeCallbacks::default();

        filter.decode_headers(&request("/api"), true, &mut cb);
        let mut resp = response(StatusCode::INTERNAL_SERVER_ERROR);
        filter.encode_headers(&mut resp);

        let cache = fixture.cache.as_ref().unwrap();
        assert!(!cache.use_cached_response());
        assert!(resp.headers.get(&X_ENVOY_UPSTREAM_HEALTHCHECKED_CLUSTER).is_none());
        assert!(resp.headers.get(&X_ENVOY_IMMEDIATE_HEALTH_CHECK_FAIL).is_none());
    }

    #[test]
    fn test_matching_request_is_marked_and_unsampled() {
        let fixture = Fixture::new();
        let mut filter = fixture.filter();
        let mut cb = FakeCallbacks::default();

        assert_eq!(probe(&mut filter, &mut cb), StatusCode::OK);
        assert!(filter.is_health_check_request());
        assert!(cb.info.is_health_check());
        assert_eq!(cb.span.sampled, Some(false));
        assert!(!cb.info.has_response_flag(ResponseFlag::FailedLocalHealthCheck));
    }

    #[test]
    fn test_waits_for_end_of_body() {
        let fixture = Fixture::new();
        let mut filter = fixture.filter();
        let mut cb = FakeCallbacks::default();

        assert_eq!(
            filter.decode_headers(&request("/healthz"), false, &mut cb),
            FilterHeadersStatus::StopIteration
        );
        assert!(cb.replies.is_empty());

        assert_eq!(
            filter.decode_data(&Bytes::from_static(b"ping"), false, &mut cb),
            FilterDataStatus::StopIterationNoBuffer
        );
        assert!(cb.replies.is_empty());

        assert_eq!(
            filter.decode_data(&Bytes::from_static(b"pong"), true, &mut cb),
            FilterDataStatus::StopIterationNoBuffer
        );
        assert_eq!(cb.replies.len(), 1);
        assert_eq!(cb.replies[0].0, StatusCode::OK);
    }

    #[test]
    fn test_trailers_complete_request() {
        let fixture = Fixture::new();
        let mut filter = fixture.filter();
        let mut cb = FakeCallbacks::default();

        filter.decode_headers(&request("/healthz"), false, &mut cb);
        filter.decode_data(&Bytes::from_static(b"ping"), false, &mut cb);
        assert_eq!(
            filter.decode_trailers(&HeaderMap::new(), &mut cb),
            FilterTrailersStatus::StopIteration
        );
        assert_eq!(cb.replies.len(), 1);
    }

    #[tokio::test]
    async fn test_local_failure_wins_over_everything() {
        let mut fixture = Fixture::new();
        fixture.pass_through_mode = true;
        let cache = Arc::new(HealthCheckCacheManager::new(Duration::from_secs(60)));
        cache.set_cached_response(HealthCheckOutcome::HEALTHY);
        fixture.cache = Some(cache);
        fixture.thresholds = vec![threshold("web", 0.0)];
        fixture.clusters = Arc::new(FakeClusters::default().with("web", 1, 1, 0));
        fixture.local_health.set_failed();

        let mut filter = fixture.filter();
        let mut cb = FakeCallbacks::default();

        assert_eq!(probe(&mut filter, &mut cb), StatusCode::SERVICE_UNAVAILABLE);
        assert!(cb.info.has_response_flag(ResponseFlag::FailedLocalHealthCheck));
        assert!(cb.replies[0].1.get(&X_ENVOY_DEGRADED).is_none());
        assert!(fixture.clusters.looked_up().is_empty());
    }

    #[tokio::test]
    async fn test_pass_through_forwards_when_healthy_and_cache_stale() {
        let mut fixture = Fixture::new();
        fixture.pass_through_mode = true;
        fixture.cache = Some(Arc::new(HealthCheckCacheManager::new(Duration::from_secs(60))));
        let mut filter = fixture.filter();
        let mut cb = FakeCallbacks::default();

        assert_eq!(
            filter.decode_headers(&request("/healthz"), true, &mut cb),
            FilterHeadersStatus::Continue
        );
        assert!(cb.replies.is_empty());
        assert!(cb.info.is_health_check());

        // The backend answers; its status fills the cache.
        let mut resp = response(StatusCode::INTERNAL_SERVER_ERROR);
        filter.encode_headers(&mut resp);

        let cache = fixture.cache.as_ref().unwrap();
        assert!(cache.use_cached_response());
        assert_eq!(cache.cached_response(), HealthCheckOutcome::UNHEALTHY);
        assert_eq!(
            resp.headers.get(&X_ENVOY_UPSTREAM_HEALTHCHECKED_CLUSTER).unwrap(),
            "edge"
        );

        // The next probe is answered from the cache.
        let mut filter = fixture.filter();
        let mut cb = FakeCallbacks::default();
        assert_eq!(probe(&mut filter, &mut cb), StatusCode::SERVICE_UNAVAILABLE);
        assert!(cb.info.has_response_flag(ResponseFlag::FailedLocalHealthCheck));
    }

    #[test]
    fn test_pass_through_intercepts_when_failed() {
        let mut fixture = Fixture::new();
        fixture.pass_through_mode = true;
        fixture.local_health.set_failed();
        let mut filter = fixture.filter();
        let mut cb = FakeCallbacks::default();

        assert_eq!(probe(&mut filter, &mut cb), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_cached_degraded_response_is_replayed() {
        let mut fixture = Fixture::new();
        let cache = Arc::new(HealthCheckCacheManager::new(Duration::from_secs(60)));
        cache.set_cached_response(HealthCheckOutcome {
            status: HealthStatus::Healthy,
            degraded: true,
        });
        fixture.cache = Some(cache);
        // Thresholds are ignored once a cache is configured.
        fixture.thresholds = vec![threshold("missing", 100.0)];

        let mut filter = fixture.filter();
        let mut cb = FakeCallbacks::default();

        assert_eq!(probe(&mut filter, &mut cb), StatusCode::OK);
        assert!(cb.replies[0].1.contains_key(&X_ENVOY_DEGRADED));
        assert!(fixture.clusters.looked_up().is_empty());
    }

    #[tokio::test]
    async fn test_stale_cache_still_fetched_once_committed() {
        let mut fixture = Fixture::new();
        let cache = Arc::new(HealthCheckCacheManager::new(Duration::from_secs(60)));
        cache.set_cached_response(HealthCheckOutcome::UNHEALTHY);
        fixture.cache = Some(cache.clone());

        let mut filter = fixture.filter();
        let mut cb = FakeCallbacks::default();
        filter.decode_headers(&request("/healthz"), false, &mut cb);

        // A tick lands between the decision and completion.
        cache.on_timer();
        filter.decode_data(&Bytes::new(), true, &mut cb);

        assert_eq!(cb.replies[0].0, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_local_reply_refreshes_stale_cache() {
        let mut fixture = Fixture::new();
        fixture.cache = Some(Arc::new(HealthCheckCacheManager::new(Duration::from_secs(60))));
        let mut filter = fixture.filter();
        let mut cb = FakeCallbacks::default();

        assert_eq!(probe(&mut filter, &mut cb), StatusCode::OK);
        let mut resp = response(cb.replies[0].0);
        resp.headers = cb.replies[0].1.clone();
        filter.encode_headers(&mut resp);

        let cache = fixture.cache.as_ref().unwrap();
        assert!(cache.use_cached_response());
        assert_eq!(cache.cached_response(), HealthCheckOutcome::HEALTHY);
    }

    #[tokio::test]
    async fn test_fresh_cache_is_not_overwritten() {
        let mut fixture = Fixture::new();
        let cache = Arc::new(HealthCheckCacheManager::new(Duration::from_secs(60)));
        cache.set_cached_response(HealthCheckOutcome::HEALTHY);
        fixture.cache = Some(cache.clone());

        let mut filter = fixture.filter();
        let mut cb = FakeCallbacks::default();
        filter.decode_headers(&request("/healthz"), true, &mut cb);

        let mut resp = response(StatusCode::SERVICE_UNAVAILABLE);
        filter.encode_headers(&mut resp);
        assert_eq!(cache.cached_response(), HealthCheckOutcome::HEALTHY);
    }

    #[test]
    fn test_cluster_below_threshold_stops_evaluation() {
        let mut fixture = Fixture::new();
        fixture.thresholds = vec![threshold("a", 50.0), threshold("b", 0.0)];
        fixture.clusters = Arc::new(FakeClusters::default().with("a", 10, 3, 1).with("b", 0, 0, 0));
        let mut filter = fixture.filter();
        let mut cb = FakeCallbacks::default();

        assert_eq!(probe(&mut filter, &mut cb), StatusCode::SERVICE_UNAVAILABLE);
        assert!(cb.info.has_response_flag(ResponseFlag::FailedLocalHealthCheck));
        assert_eq!(fixture.clusters.looked_up(), vec!["a".to_string()]);
    }

    #[test]
    fn test_degraded_hosts_count_as_available() {
        let clusters = FakeClusters::default().with("a", 10, 3, 2);
        assert_eq!(
            evaluate_cluster_thresholds(&[threshold("a", 50.0)], &clusters),
            HealthCheckOutcome::HEALTHY
        );
    }

    #[test]
    fn test_empty_cluster_with_zero_threshold_is_healthy() {
        let clusters = FakeClusters::default().with("b", 0, 0, 0);
        assert_eq!(
            evaluate_cluster_thresholds(&[threshold("b", 0.0)], &clusters),
            HealthCheckOutcome::HEALTHY
        );
    }

    #[test]
    fn test_empty_cluster_with_nonzero_threshold_is_unhealthy() {
        let clusters = FakeClusters::default().with("b", 0, 0, 0).with("c", 4, 4, 0);
        assert_eq!(
            evaluate_cluster_thresholds(&[threshold("b", 0.1), threshold("c", 0.0)], &clusters),
            HealthCheckOutcome::UNHEALTHY
        );
        assert_eq!(clusters.looked_up(), vec!["b".to_string()]);
    }

    #[test]
    fn test_missing_cluster_is_unhealthy_at_any_position() {
        let clusters = FakeClusters::default().with("a", 2, 2, 0);
        assert_eq!(
            evaluate_cluster_thresholds(&[threshold("gone", 0.0), threshold("a", 0.0)], &clusters),
            HealthCheckOutcome::UNHEALTHY
        );
        assert_eq!(
            evaluate_cluster_thresholds(&[threshold("a", 0.0), threshold("gone", 0.0)], &clusters),
            HealthCheckOutcome::UNHEALTHY
        );
    }

    #[test]
    fn test_exact_threshold_is_met() {
        let clusters = FakeClusters::default().with("a", 4, 2, 0);
        assert_eq!(
            evaluate_cluster_thresholds(&[threshold("a", 50.0)], &clusters),
            HealthCheckOutcome::HEALTHY
        );
        assert_eq!(
            evaluate_cluster_thresholds(&[threshold("a", 50.1)], &clusters),
            HealthCheckOutcome::UNHEALTHY
        );
    }

    #[test]
    fn test_no_cache_no_thresholds_is_healthy() {
        let fixture = Fixture::new();
        let mut filter = fixture.filter();
        let mut cb = FakeCallbacks::default();

        assert_eq!(probe(&mut filter, &mut cb), StatusCode::OK);
    }

    #[test]
    fn test_failed_node_marks_regular_responses() {
        let fixture = Fixture::new();
        fixture.local_health.set_failed();
        let mut filter = fixture.filter();
        let mut cb = FakeCallbacks::default();

        filter.decode_headers(&request("/api"), true, &mut cb);
        let mut resp = response(StatusCode::OK);
        filter.encode_headers(&mut resp);

        assert_eq!(
            resp.headers.get(&X_ENVOY_IMMEDIATE_HEALTH_CHECK_FAIL).unwrap(),
            "true"
        );
        assert!(resp.headers.get(&X_ENVOY_UPSTREAM_HEALTHCHECKED_CLUSTER).is_none());
    }

    #[test]
    fn test_health_check_response_gets_cluster_header_not_fail_header() {
        let fixture = Fixture::new();
        fixture.local_health.set_failed();
        let mut filter = fixture.filter();
        let mut cb = FakeCallbacks::default();

        probe(&mut filter, &mut cb);
        let mut resp = response(StatusCode::SERVICE_UNAVAILABLE);
        filter.encode_headers(&mut resp);

        assert_eq!(
            resp.headers.get(&X_ENVOY_UPSTREAM_HEALTHCHECKED_CLUSTER).unwrap(),
            "edge"
        );
        assert!(resp.headers.get(&X_ENVOY_IMMEDIATE_HEALTH_CHECK_FAIL).is_none());
    }

    #[test]
    fn test_classification_is_per_request() {
        let fixture = Fixture::new();
        let config = fixture.config();

        let mut first = HealthCheckFilter::new(config.clone());
        let mut cb = FakeCallbacks::default();
        probe(&mut first, &mut cb);

        let second = HealthCheckFilter::new(config);
        assert!(!second.is_health_check_request());
        assert!(!second.is_handling());
    }
}
