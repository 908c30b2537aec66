//! Health-check middleware.
//! Runs the health-check filter inside the axum request pipeline.

use std::sync::Arc;
use std::time::Instant;

use arc_swap::ArcSwap;
use axum::{
    body::{Body, Bytes, HttpBody},
    extract::State,
    http::{HeaderMap, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use http_body_util::BodyExt;

use crate::health::filter::{HealthCheckFilter, HealthCheckFilterConfig};
use crate::http::filter::{DecoderFilterCallbacks, FilterHeadersStatus, ResponseFlag, StreamInfo};
use crate::http::request::request_id;
use crate::observability::{logging, metrics};
use crate::observability::tracing::{Span, TraceContext};

/// State for the health-check middleware.
#[derive(Clone)]
pub struct HealthCheckState {
    /// Swapped wholesale on config reload.
    pub filter_config: Arc<ArcSwap<HealthCheckFilterConfig>>,
}

/// Pipeline side of one stream.
struct LocalStream {
    info: StreamInfo,
    trace: TraceContext,
    local_reply: Option<Response>,
}

impl LocalStream {
    fn new(trace: TraceContext) -> Self {
        Self {
            info: StreamInfo::default(),
            trace,
            local_reply: None,
        }
    }
}

impl DecoderFilterCallbacks for LocalStream {
    fn stream_info(&mut self) -> &mut StreamInfo {
        &mut self.info
    }

    fn active_span(&mut self) -> &mut dyn Span {
        &mut self.trace
    }

    fn send_local_reply(
        &mut self,
        status: StatusCode,
        body: &str,
        modify_headers: &dyn Fn(&mut HeaderMap),
    ) {
        let mut response = Response::new(Body::from(body.to_string()));
        *response.status_mut() = status;
        modify_headers(response.headers_mut());
        self.local_reply = Some(response);
    }
}

pub async fn health_check_middleware(
    State(state): State<HealthCheckState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let start = Instant::now();
    let mut filter = HealthCheckFilter::new(state.filter_config.load_full());

    let (mut parts, body) = request.into_parts();
    let mut stream = LocalStream::new(TraceContext::from_headers(&parts.headers));
    let request_id = request_id(&parts.headers).to_string();
    let method = parts.method.clone();
    let path = parts.uri.path().to_string();

    let end_stream = body.is_end_stream();
    let response = match filter.decode_headers(&parts, end_stream, &mut stream) {
        FilterHeadersStatus::Continue => {
            stream.trace.inject(&mut parts.headers);
            next.run(Request::from_parts(parts, body)).await
        }
        FilterHeadersStatus::StopIteration => {
            match drain_request(&mut filter, body, &mut stream).await {
                Ok(()) => stream
                    .local_reply
                    .take()
                    .unwrap_or_else(|| StatusCode::INTERNAL_SERVER_ERROR.into_response()),
                Err(e) => {
                    // No outcome was computed; the cache must not see this reply.
                    tracing::warn!(request_id = %request_id, error = %e, "Health check request body aborted");
                    metrics::record_request(method.as_str(), StatusCode::BAD_REQUEST.as_u16(), start);
                    logging::access_log(&request_id, &method, &path, StatusCode::BAD_REQUEST, &stream.info);
                    return (StatusCode::BAD_REQUEST, "request body error").into_response();
                }
            }
        }
    };

    let (mut parts, body) = response.into_parts();
    if let Some(flag) = parts.extensions.get::<ResponseFlag>().copied() {
        stream.info.set_response_flag(flag);
    }
    filter.encode_headers(&mut parts);

    if filter.is_health_check_request() {
        metrics::record_health_check(parts.status.as_u16(), filter.is_handling());
    }
    metrics::record_request(method.as_str(), parts.status.as_u16(), start);
    logging::access_log(&request_id, &method, &path, parts.status, &stream.info);

    parts.extensions.insert(stream.info);
    Response::from_parts(parts, body)
}

/// Feed body frames to the filter until it answers. Data is dropped.
async fn drain_request(
    filter: &mut HealthCheckFilter,
    mut body: Body,
    stream: &mut LocalStream,
) -> Result<(), axum::Error> {
    while stream.local_reply.is_none() && filter.is_handling() {
        match body.frame().await {
            Some(frame) => match frame?.into_data() {
                Ok(data) => {
                    let end_stream = body.is_end_stream();
                    filter.decode_data(&data, end_stream, stream);
                }
                Err(frame) => {
                    if let Ok(trailers) = frame.into_trailers() {
                        filter.decode_trailers(&trailers, stream);
                    }
                }
            },
            None => {
                filter.decode_data(&Bytes::new(), true, stream);
            }
        }
    }
    Ok(())
}
