//! HTTP transport: RPC-over-POST, health probes, OpenAPI and WebFinger.
//!
//! | Route | Behaviour |
//! |---|---|
//! | `POST /v1/rpc/{method}` | protobuf (or framed) body dispatched to `method` |
//! | `GET /health/live` | 200 until stopping |
//! | `GET /health/ready` | 200 only when ready, else 503 |
//! | `GET /openapi.yaml` | the OpenAPI document loaded at startup |
//! | `GET /.well-known/webfinger` | the `WebFinger` route, rendered as JSON |

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode as HttpStatus, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Json;
use prost::Message as _;
use serde::{Deserialize, Serialize};
use tower::limit::GlobalConcurrencyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::debug;

use crate::dispatch::Dispatcher;
use crate::proto::frame::{FRAME_CONTENT_TYPE, decode_frame};
use crate::proto::{WebFingerRequest, WebFingerResponse};
use crate::services::{WEBFINGER, WebFingerDocument};
use crate::types::{Metadata, Protocol, RequestEnvelope, ResponseEnvelope, StatusCode, TRACEPARENT};
use crate::version::version_string;

/// Caller deadline for HTTP requests, in milliseconds.
pub const REQUEST_TIMEOUT_HEADER: &str = "x-request-timeout-ms";

/// Status of the dispatched request, as a snake_case code.
pub const STATUS_HEADER: &str = "x-njall-status";

pub const PROTOBUF_CONTENT_TYPE: &str = "application/x-protobuf";

const YAML_CONTENT_TYPE: &str = "text/yaml";

/// Shared state for HTTP handlers.
#[derive(Debug, Clone)]
pub struct HttpState {
    dispatcher: Arc<Dispatcher>,
    openapi: Bytes,
}

impl HttpState {
    pub fn new(dispatcher: Arc<Dispatcher>, openapi: impl Into<Bytes>) -> Self {
        Self {
            dispatcher,
            openapi: openapi.into(),
        }
    }
}

/// JSON body of every HTTP error response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: StatusCode,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthBody {
    pub status: String,
    pub version: String,
}

#[derive(Debug, Deserialize)]
struct WebFingerQuery {
    #[serde(default)]
    resource: String,
}

/// Build the HTTP router. `max_concurrent_requests` bounds in-flight
/// requests across all routes.
pub fn router(state: HttpState, max_concurrent_requests: usize) -> Router {
    Router::new()
        .route("/v1/rpc/{method}", post(rpc))
        .route("/health/live", get(live))
        .route("/health/ready", get(ready))
        .route("/openapi.yaml", get(openapi))
        .route("/.well-known/webfinger", get(webfinger))
        .with_state(state)
        .layer(GlobalConcurrencyLimitLayer::new(max_concurrent_requests))
        .layer(TraceLayer::new_for_http())
}

// =============================================================================
// Handlers
// =============================================================================

async fn rpc(
    State(state): State<HttpState>,
    Path(method): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let mut metadata = from_headers(&headers);
    let payload = if is_framed(&headers) {
        match unframe(&body, &mut metadata) {
            Ok(payload) => payload,
            Err(response) => return response,
        }
    } else {
        body
    };

    let mut request = RequestEnvelope::new(method, payload).with_metadata(metadata);
    if let Some(timeout) = request_timeout(&headers) {
        request = request.with_timeout(timeout);
    }

    let response = state.dispatcher.dispatch(Protocol::Http, request).await;
    into_http_response(response)
}

async fn live(State(state): State<HttpState>) -> Response {
    let health = state.dispatcher.health();
    health_response(health.is_live(), health.state().as_str())
}

async fn ready(State(state): State<HttpState>) -> Response {
    let health = state.dispatcher.health();
    health_response(health.is_ready(), health.state().as_str())
}

async fn openapi(State(state): State<HttpState>) -> Response {
    (
        [(header::CONTENT_TYPE, YAML_CONTENT_TYPE)],
        state.openapi.clone(),
    )
        .into_response()
}

async fn webfinger(
    State(state): State<HttpState>,
    Query(query): Query<WebFingerQuery>,
    headers: HeaderMap,
) -> Response {
    let payload = WebFingerRequest {
        resource: query.resource,
    }
    .encode_to_vec();
    let request = RequestEnvelope::new(WEBFINGER, payload).with_metadata(from_headers(&headers));
    let response = state.dispatcher.dispatch(Protocol::Http, request).await;
    if !response.status().is_ok() {
        return into_http_response(response);
    }

    let (status, payload, metadata, _) = response.into_parts();
    match WebFingerResponse::decode(payload) {
        Ok(document) => {
            let mut http = Json(WebFingerDocument::from(document)).into_response();
            apply_metadata(http.headers_mut(), &metadata, status);
            http
        }
        Err(e) => error_response(
            StatusCode::Internal,
            format!("malformed WebFinger response: {e}"),
            &metadata,
        ),
    }
}

// =============================================================================
// Conversions
// =============================================================================

fn from_headers(headers: &HeaderMap) -> Metadata {
    headers
        .iter()
        .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str(), v)))
        .collect()
}

fn request_timeout(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(REQUEST_TIMEOUT_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_timeout_ms)
}

/// Parse a millisecond timeout. Zero or malformed values mean no deadline.
pub fn parse_timeout_ms(value: &str) -> Option<Duration> {
    let ms: u64 = value.trim().parse().ok()?;
    if ms == 0 {
        None
    } else {
        Some(Duration::from_millis(ms))
    }
}

fn is_framed(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .is_some_and(|v| v.trim().eq_ignore_ascii_case(FRAME_CONTENT_TYPE))
}

/// Unwrap a framed body into the embedded payload.
///
/// The frame's trace ids become the request's `traceparent` unless the
/// caller already sent one as a header.
fn unframe(body: &[u8], metadata: &mut Metadata) -> Result<Bytes, Response> {
    let message = decode_frame(body).map_err(|e| {
        debug!(error = %e, "Rejecting malformed frame");
        error_response(StatusCode::InvalidArgument, e.to_string(), &Metadata::new())
    })?;

    if let Some(obs) = &message.traceparent {
        if !metadata.contains_key(TRACEPARENT) && obs.trace_id.len() == 16 && obs.span_id.len() == 8
        {
            metadata.insert(
                TRACEPARENT,
                format!(
                    "00-{}-{}-01",
                    hex::encode(&obs.trace_id),
                    hex::encode(&obs.span_id)
                ),
            );
        }
    }

    Ok(message
        .message
        .map(|any| Bytes::from(any.value))
        .unwrap_or_default())
}

fn into_http_response(response: ResponseEnvelope) -> Response {
    let (status, payload, metadata, message) = response.into_parts();
    if !status.is_ok() {
        return error_response(status, message.unwrap_or_default(), &metadata);
    }
    let mut http = (
        [(header::CONTENT_TYPE, PROTOBUF_CONTENT_TYPE)],
        payload,
    )
        .into_response();
    apply_metadata(http.headers_mut(), &metadata, status);
    http
}

fn error_response(status: StatusCode, message: String, metadata: &Metadata) -> Response {
    let code = HttpStatus::from_u16(status.http_status()).unwrap_or(HttpStatus::INTERNAL_SERVER_ERROR);
    let mut http = (
        code,
        Json(ErrorBody {
            code: status,
            message,
        }),
    )
        .into_response();
    apply_metadata(http.headers_mut(), metadata, status);
    http
}

fn apply_metadata(headers: &mut HeaderMap, metadata: &Metadata, status: StatusCode) {
    for (key, value) in metadata.iter() {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(key.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            headers.insert(name, value);
        }
    }
    headers.insert(
        HeaderName::from_static(STATUS_HEADER),
        HeaderValue::from_static(status.as_str()),
    );
}

fn health_response(healthy: bool, state: &str) -> Response {
    let code = if healthy {
        HttpStatus::OK
    } else {
        HttpStatus::SERVICE_UNAVAILABLE
    };
    (
        code,
        Json(HealthBody {
            status: state.to_string(),
            version: version_string(),
        }),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::frame::encode_frame;
    use crate::proto::{EchoRequest, Observability, pack_any};

    #[test]
    fn timeout_ms_zero_means_none() {
        assert_eq!(parse_timeout_ms("1500"), Some(Duration::from_millis(1500)));
        assert_eq!(parse_timeout_ms("0"), None);
        assert_eq!(parse_timeout_ms("soon"), None);
    }

    #[test]
    fn framed_content_type_ignores_parameters() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/vnd.njall.frame; charset=binary"),
        );
        assert!(is_framed(&headers));
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(PROTOBUF_CONTENT_TYPE));
        assert!(!is_framed(&headers));
    }

    #[test]
    fn unframe_extracts_payload_and_trace() {
        let inner = EchoRequest { text: "hi".into() };
        let frame = encode_frame(&crate::proto::Message {
            message: Some(pack_any(&inner)),
            traceparent: Some(Observability {
                trace_id: vec![0xab; 16],
                span_id: vec![0xcd; 8],
            }),
            ..Default::default()
        });

        let mut metadata = Metadata::new();
        let payload = unframe(&frame, &mut metadata).unwrap();
        assert_eq!(EchoRequest::decode(payload).unwrap(), inner);
        assert_eq!(
            metadata.get(TRACEPARENT),
            Some(format!("00-{}-{}-01", "ab".repeat(16), "cd".repeat(8)).as_str())
        );
    }

    #[test]
    fn unframe_keeps_header_traceparent() {
        let frame = encode_frame(&crate::proto::Message {
            traceparent: Some(Observability {
                trace_id: vec![0xab; 16],
                span_id: vec![0xcd; 8],
            }),
            ..Default::default()
        });
        let mut metadata = Metadata::new();
        metadata.insert(TRACEPARENT, "from-header");
        unframe(&frame, &mut metadata).unwrap();
        assert_eq!(metadata.get(TRACEPARENT), Some("from-header"));
    }

    #[test]
    fn error_response_carries_status_header() {
        let response = error_response(StatusCode::NotFound, "no route".into(), &Metadata::new());
        assert_eq!(response.status(), HttpStatus::NOT_FOUND);
        assert_eq!(response.headers()[STATUS_HEADER], "not_found");
    }
}
