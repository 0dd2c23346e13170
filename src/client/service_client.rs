//! [`ServiceClient`]: raw and typed unary calls against njalld over gRPC.
//!
//! Calls go through [`BytesCodec`], so any method name can be invoked with a
//! pre-encoded payload. The typed helpers encode and decode the built-in
//! contracts on top of [`ServiceClient::call`].

use std::time::Duration;

use bytes::Bytes;
use tonic::codegen::http::uri::PathAndQuery;
use tonic::metadata::{Ascii, MetadataValue};
use tonic::transport::Channel;
use tonic_health::pb::HealthCheckRequest;
use tonic_health::pb::health_check_response::ServingStatus;
use tonic_health::pb::health_client::HealthClient;
use tracing::debug;

use crate::grpc::{BytesCodec, GRPC_TIMEOUT_HEADER, format_grpc_timeout, from_metadata_map};
use crate::proto::{EchoReply, EchoRequest, Empty, Message, SERVICE_NAME};
use crate::proto::{WebFingerRequest, WebFingerResponse};
use crate::services::{GET_MESSAGE, GREET, WEBFINGER};
use crate::types::{ResponseEnvelope, StatusCode};
use crate::{NjallError, Result};

/// A client for a remote njalld gRPC endpoint.
#[derive(Debug, Clone)]
pub struct ServiceClient {
    channel: Channel,
    timeout: Option<Duration>,
}

impl ServiceClient {
    /// Connect to a njalld server at the given address.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let client = ServiceClient::connect("http://127.0.0.1:9090").await?;
    /// ```
    pub async fn connect(addr: impl Into<String>) -> Result<Self> {
        let addr = addr.into();
        let channel = Channel::from_shared(addr.clone())
            .map_err(|e| NjallError::Configuration(format!("invalid address {addr}: {e}")))?
            .connect()
            .await
            .map_err(|e| NjallError::Transport(format!("failed to connect to {addr}: {e}")))?;
        Ok(Self {
            channel,
            timeout: None,
        })
    }

    /// Deadline sent with every typed call.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Invoke `method` with an already-encoded payload.
    ///
    /// Non-OK statuses come back as an error envelope rather than `Err`;
    /// `Err` is reserved for failures to reach the service at all.
    pub async fn call(
        &self,
        method: &str,
        payload: Bytes,
        timeout: Option<Duration>,
    ) -> Result<ResponseEnvelope> {
        let path: PathAndQuery = format!("/{SERVICE_NAME}/{method}")
            .parse()
            .map_err(|e| NjallError::Configuration(format!("invalid method {method:?}: {e}")))?;

        let mut grpc = tonic::client::Grpc::new(self.channel.clone());
        grpc.ready()
            .await
            .map_err(|e| NjallError::Transport(format!("service was not ready: {e}")))?;

        let mut request = tonic::Request::new(payload);
        if let Some(timeout) = timeout {
            let value: MetadataValue<Ascii> = format_grpc_timeout(timeout)
                .parse()
                .map_err(|e| NjallError::Configuration(format!("invalid timeout: {e}")))?;
            request.metadata_mut().insert(GRPC_TIMEOUT_HEADER, value);
        }

        debug!(method, "Calling");
        match grpc.unary(request, path, BytesCodec).await {
            Ok(response) => {
                let (metadata, payload, _) = response.into_parts();
                Ok(ResponseEnvelope::ok(payload).with_metadata(from_metadata_map(&metadata)))
            }
            Err(status) => Ok(from_status(&status)),
        }
    }

    /// Encode `request`, call `method`, and decode the reply as `R`.
    pub async fn call_typed<Q, R>(&self, method: &str, request: &Q) -> Result<R>
    where
        Q: prost::Message,
        R: prost::Message + Default,
    {
        let response = self
            .call(method, Bytes::from(request.encode_to_vec()), self.timeout)
            .await?;
        let (status, payload, _, message) = response.into_parts();
        if !status.is_ok() {
            return Err(NjallError::Rpc {
                status,
                message: message.unwrap_or_default(),
            });
        }
        Ok(R::decode(payload)?)
    }

    pub async fn get_message(&self) -> Result<Message> {
        self.call_typed(GET_MESSAGE, &Empty {}).await
    }

    /// Send `text` to `Greet` and return the echoed text.
    pub async fn greet(&self, text: impl Into<String>) -> Result<String> {
        let reply: EchoReply = self
            .call_typed(GREET, &EchoRequest { text: text.into() })
            .await?;
        Ok(reply.text)
    }

    pub async fn web_finger(&self, resource: impl Into<String>) -> Result<WebFingerResponse> {
        self.call_typed(
            WEBFINGER,
            &WebFingerRequest {
                resource: resource.into(),
            },
        )
        .await
    }

    /// Query `grpc.health.v1.Health/Check` for `service` (empty for the
    /// whole server).
    pub async fn health(&self, service: &str) -> Result<ServingStatus> {
        let response = HealthClient::new(self.channel.clone())
            .check(HealthCheckRequest {
                service: service.to_string(),
            })
            .await
            .map_err(|status| NjallError::Rpc {
                status: StatusCode::from_grpc_code(status.code() as i32),
                message: status.message().to_string(),
            })?;
        Ok(ServingStatus::try_from(response.into_inner().status).unwrap_or(ServingStatus::Unknown))
    }
}

/// Convert a [`tonic::Status`] into an error envelope, keeping trailers.
///
/// The channel enforces `grpc-timeout` locally and reports an expired
/// deadline as `Cancelled`, so both codes map to `DeadlineExceeded`.
fn from_status(status: &tonic::Status) -> ResponseEnvelope {
    let code = match status.code() {
        tonic::Code::Cancelled | tonic::Code::DeadlineExceeded => StatusCode::DeadlineExceeded,
        code => StatusCode::from_grpc_code(code as i32),
    };
    ResponseEnvelope::error(code, status.message())
        .with_metadata(from_metadata_map(status.metadata()))
}
