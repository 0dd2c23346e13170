//! gRPC transport for `larpconnect.njall.v1.MessageService`.
//!
//! One tower service answers every `/<service>/<method>` path. Bodies pass
//! through [`BytesCodec`] untouched and the method segment becomes the
//! envelope's method identifier, so adding a route needs no transport change.
//! The caller's `grpc-timeout` is handed to the dispatcher as the envelope
//! deadline.

use std::time::Duration;

use bytes::Bytes;
use tokio::sync::watch;
use tonic::codegen::*;
use tonic_health::ServingStatus;
use tonic_health::server::HealthReporter as GrpcHealthReporter;

use crate::dispatch::Dispatcher;
use crate::grpc::{
    BytesCodec, GRPC_TIMEOUT_HEADER, from_metadata_map, parse_grpc_timeout, to_metadata_map,
};
use crate::health::HealthState;
use crate::proto::SERVICE_NAME;
use crate::types::{Protocol, RequestEnvelope, ResponseEnvelope};

/// Path prefix for every method of the service.
pub fn service_path_prefix() -> String {
    format!("/{SERVICE_NAME}/")
}

/// Tower service dispatching every unary method of the message service.
#[derive(Debug, Clone)]
pub struct MessageServiceServer {
    dispatcher: Arc<Dispatcher>,
}

impl MessageServiceServer {
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self { dispatcher }
    }
}

impl<B> Service<http::Request<B>> for MessageServiceServer
where
    B: Body + Send + 'static,
    B::Error: Into<StdError> + Send + 'static,
{
    type Response = http::Response<tonic::body::Body>;
    type Error = std::convert::Infallible;
    type Future = BoxFuture<Self::Response, Self::Error>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: http::Request<B>) -> Self::Future {
        let method = req
            .uri()
            .path()
            .strip_prefix(&service_path_prefix())
            .filter(|m| !m.is_empty() && !m.contains('/'))
            .map(str::to_string);

        let Some(method) = method else {
            return Box::pin(async move { Ok(unimplemented_response()) });
        };

        let timeout = req
            .headers()
            .get(GRPC_TIMEOUT_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_grpc_timeout);

        let svc = DispatchUnary {
            dispatcher: self.dispatcher.clone(),
            method,
            timeout,
        };
        Box::pin(async move {
            let mut grpc = tonic::server::Grpc::new(BytesCodec);
            Ok(grpc.unary(svc, req).await)
        })
    }
}

impl tonic::server::NamedService for MessageServiceServer {
    const NAME: &'static str = SERVICE_NAME;
}

fn unimplemented_response() -> http::Response<tonic::body::Body> {
    let mut response = http::Response::new(tonic::body::Body::default());
    let headers = response.headers_mut();
    headers.insert(
        tonic::Status::GRPC_STATUS,
        (tonic::Code::Unimplemented as i32).into(),
    );
    headers.insert(
        http::header::CONTENT_TYPE,
        tonic::metadata::GRPC_CONTENT_TYPE,
    );
    response
}

struct DispatchUnary {
    dispatcher: Arc<Dispatcher>,
    method: String,
    timeout: Option<Duration>,
}

impl tonic::server::UnaryService<Bytes> for DispatchUnary {
    type Response = Bytes;
    type Future = BoxFuture<tonic::Response<Bytes>, tonic::Status>;

    fn call(&mut self, request: tonic::Request<Bytes>) -> Self::Future {
        let dispatcher = self.dispatcher.clone();
        let method = std::mem::take(&mut self.method);
        let timeout = self.timeout;
        Box::pin(async move {
            let (metadata, _extensions, payload) = request.into_parts();
            let mut envelope =
                RequestEnvelope::new(method, payload).with_metadata(from_metadata_map(&metadata));
            if let Some(timeout) = timeout {
                envelope = envelope.with_timeout(timeout);
            }
            into_grpc_response(dispatcher.dispatch(Protocol::Grpc, envelope).await)
        })
    }
}

fn into_grpc_response(
    response: ResponseEnvelope,
) -> std::result::Result<tonic::Response<Bytes>, tonic::Status> {
    let (status, payload, metadata, message) = response.into_parts();
    let metadata = to_metadata_map(&metadata);
    if status.is_ok() {
        let mut response = tonic::Response::new(payload);
        *response.metadata_mut() = metadata;
        Ok(response)
    } else {
        Err(tonic::Status::with_metadata(
            tonic::Code::from_i32(status.grpc_code()),
            message.unwrap_or_default(),
            metadata,
        ))
    }
}

/// Publish `state` on the standard `grpc.health.v1` service, both for the
/// whole server and for the message service.
pub async fn publish_health(state: HealthState, reporter: &GrpcHealthReporter) {
    let status = match state {
        HealthState::Ready => ServingStatus::Serving,
        HealthState::NotReady | HealthState::Stopping => ServingStatus::NotServing,
    };
    reporter.set_service_status("", status).await;
    reporter.set_service_status(SERVICE_NAME, status).await;
}

/// Mirror the health reporter into the standard `grpc.health.v1` service.
///
/// Runs until the reporter is dropped.
pub async fn mirror_health(mut state: watch::Receiver<HealthState>, reporter: GrpcHealthReporter) {
    loop {
        let current = *state.borrow_and_update();
        publish_health(current, &reporter).await;
        if state.changed().await.is_err() {
            break;
        }
    }
}
