//! Request resolution against the route table.

use std::sync::Arc;

use bytes::Bytes;
use futures_util::future::BoxFuture;
use tracing::debug;

use super::{HandlerError, RouteTable};
use crate::dispatch::CallContext;
use crate::types::{Protocol, RequestEnvelope, StatusCode};

type Invoke =
    Box<dyn FnOnce(CallContext) -> BoxFuture<'static, Result<Bytes, HandlerError>> + Send>;

/// A handler bound to its decoded request, ready to run exactly once.
pub struct BoundCall {
    method: Arc<str>,
    invoke: Invoke,
}

impl BoundCall {
    pub(crate) fn new(method: Arc<str>, invoke: Invoke) -> Self {
        Self { method, invoke }
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub(crate) fn method_arc(&self) -> Arc<str> {
        self.method.clone()
    }

    /// Run the handler; resolves to the encoded response message.
    pub fn invoke(self, ctx: CallContext) -> BoxFuture<'static, Result<Bytes, HandlerError>> {
        (self.invoke)(ctx)
    }
}

impl std::fmt::Debug for BoundCall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundCall")
            .field("method", &self.method)
            .finish_non_exhaustive()
    }
}

/// Why a request could not be bound to a handler.
#[derive(Debug, thiserror::Error)]
pub enum RouteError {
    #[error("no route for {protocol} method {method:?}")]
    NotFound { protocol: Protocol, method: String },

    #[error("payload for {method} is not a valid {type_name}: {source}")]
    InvalidArgument {
        method: String,
        type_name: String,
        #[source]
        source: prost::DecodeError,
    },
}

impl RouteError {
    pub fn status(&self) -> StatusCode {
        match self {
            RouteError::NotFound { .. } => StatusCode::NotFound,
            RouteError::InvalidArgument { .. } => StatusCode::InvalidArgument,
        }
    }
}

/// Maps request envelopes to bound handlers. Pure lookup; cheap to clone.
#[derive(Debug, Clone)]
pub struct Router {
    table: Arc<RouteTable>,
}

impl Router {
    pub fn new(table: Arc<RouteTable>) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &Arc<RouteTable> {
        &self.table
    }

    /// Find the route for `request` and decode its payload.
    ///
    /// No handler runs here; the returned [`BoundCall`] is invoked by the
    /// dispatcher.
    pub fn resolve(
        &self,
        protocol: Protocol,
        request: &RequestEnvelope,
    ) -> Result<BoundCall, RouteError> {
        let method = request.method();
        let entry = self
            .table
            .get(protocol, method)
            .ok_or_else(|| RouteError::NotFound {
                protocol,
                method: method.to_string(),
            })?;

        entry.bind(request.payload()).map_err(|source| {
            debug!(%protocol, method, type_name = entry.request_type(), error = %source, "Payload decode failed");
            RouteError::InvalidArgument {
                method: method.to_string(),
                type_name: entry.request_type().to_string(),
                source,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::{EchoReply, EchoRequest};
    use crate::routing::Handler;
    use async_trait::async_trait;
    use prost::Message as _;

    struct Echo;

    #[async_trait]
    impl Handler for Echo {
        type Request = EchoRequest;
        type Response = EchoReply;

        async fn handle(
            &self,
            _ctx: CallContext,
            request: EchoRequest,
        ) -> Result<EchoReply, HandlerError> {
            Ok(EchoReply { text: request.text })
        }
    }

    fn router() -> Router {
        Router::new(Arc::new(
            RouteTable::builder().grpc("Greet", Echo).build().unwrap(),
        ))
    }

    #[test]
    fn resolves_registered_method() {
        let payload = EchoRequest { text: "hi".into() }.encode_to_vec();
        let call = router()
            .resolve(Protocol::Grpc, &RequestEnvelope::new("Greet", payload))
            .unwrap();
        assert_eq!(call.method(), "Greet");
    }

    #[test]
    fn unknown_method_is_not_found() {
        let err = router()
            .resolve(Protocol::Grpc, &RequestEnvelope::new("Unknown", Bytes::new()))
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::NotFound);
    }

    #[test]
    fn wrong_protocol_is_not_found() {
        let err = router()
            .resolve(Protocol::Http, &RequestEnvelope::new("Greet", Bytes::new()))
            .unwrap_err();
        assert!(matches!(err, RouteError::NotFound { protocol: Protocol::Http, .. }));
    }

    #[test]
    fn undecodable_payload_is_invalid_argument() {
        // Field 1 declared as a 10-byte string with only 2 bytes present.
        let payload = Bytes::from_static(&[0x0a, 0x0a, b'h', b'i']);
        let err = router()
            .resolve(Protocol::Grpc, &RequestEnvelope::new("Greet", payload))
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::InvalidArgument);
        assert!(err.to_string().contains("larpconnect.njall.v1.EchoRequest"));
    }
}
