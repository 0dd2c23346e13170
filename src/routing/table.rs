//! Immutable route table and its builder.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use futures_util::future::BoxFuture;
use prost::Message as _;
use prost::Name;

use super::{BoundCall, Handler, HandlerError};
use crate::dispatch::CallContext;
use crate::types::Protocol;
use crate::{NjallError, Result};

type Binder = Arc<
    dyn Fn(&Bytes) -> std::result::Result<BoundCall, prost::DecodeError> + Send + Sync,
>;

/// A registered handler with its declared message types.
#[derive(Clone)]
pub struct RouteEntry {
    protocol: Protocol,
    method: Arc<str>,
    request_type: String,
    response_type: String,
    binder: Binder,
}

impl RouteEntry {
    fn new<H: Handler>(protocol: Protocol, method: Arc<str>, handler: Arc<H>) -> Self {
        let bound_method = method.clone();
        let binder: Binder = Arc::new(move |payload: &Bytes| {
            let request = H::Request::decode(payload.clone())?;
            let handler = handler.clone();
            Ok(BoundCall::new(
                bound_method.clone(),
                Box::new(move |ctx: CallContext| -> BoxFuture<'static, _> {
                    Box::pin(async move {
                        let response = handler.handle(ctx, request).await?;
                        Ok::<_, HandlerError>(Bytes::from(response.encode_to_vec()))
                    })
                }),
            ))
        });

        Self {
            protocol,
            method,
            request_type: H::Request::full_name(),
            response_type: H::Response::full_name(),
            binder,
        }
    }

    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    /// Fully-qualified protobuf name of the request message.
    pub fn request_type(&self) -> &str {
        &self.request_type
    }

    /// Fully-qualified protobuf name of the response message.
    pub fn response_type(&self) -> &str {
        &self.response_type
    }

    /// Decode `payload` as the request type and bind it to the handler.
    pub(crate) fn bind(&self, payload: &Bytes) -> std::result::Result<BoundCall, prost::DecodeError> {
        (self.binder)(payload)
    }
}

impl std::fmt::Debug for RouteEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteEntry")
            .field("protocol", &self.protocol)
            .field("method", &self.method)
            .field("request_type", &self.request_type)
            .field("response_type", &self.response_type)
            .finish_non_exhaustive()
    }
}

/// Mapping from `(protocol, method)` to a handler. Built once, then read-only.
#[derive(Debug, Default)]
pub struct RouteTable {
    routes: HashMap<Protocol, HashMap<Arc<str>, RouteEntry>>,
}

impl RouteTable {
    pub fn builder() -> RouteTableBuilder {
        RouteTableBuilder::new()
    }

    pub fn get(&self, protocol: Protocol, method: &str) -> Option<&RouteEntry> {
        self.routes.get(&protocol)?.get(method)
    }

    /// Registered method identifiers for `protocol`, sorted.
    pub fn methods(&self, protocol: Protocol) -> Vec<&str> {
        let mut methods: Vec<&str> = self
            .routes
            .get(&protocol)
            .map(|routes| routes.keys().map(|m| &**m).collect())
            .unwrap_or_default();
        methods.sort_unstable();
        methods
    }

    pub fn entries(&self) -> impl Iterator<Item = &RouteEntry> {
        self.routes.values().flat_map(|routes| routes.values())
    }

    /// Number of `(protocol, method)` registrations.
    pub fn len(&self) -> usize {
        self.routes.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Builder for [`RouteTable`].
///
/// Registration errors are deferred and reported by [`build`](Self::build),
/// so calls can be chained.
#[derive(Debug, Default)]
pub struct RouteTableBuilder {
    table: RouteTable,
    error: Option<NjallError>,
}

impl RouteTableBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `method` on every protocol.
    pub fn route<H: Handler>(self, method: impl Into<String>, handler: H) -> Self {
        self.register(&Protocol::ALL, method.into(), Arc::new(handler))
    }

    /// Register `handler` for `method` on gRPC only.
    pub fn grpc<H: Handler>(self, method: impl Into<String>, handler: H) -> Self {
        self.register(&[Protocol::Grpc], method.into(), Arc::new(handler))
    }

    /// Register `handler` for `method` on HTTP only.
    pub fn http<H: Handler>(self, method: impl Into<String>, handler: H) -> Self {
        self.register(&[Protocol::Http], method.into(), Arc::new(handler))
    }

    fn register<H: Handler>(
        mut self,
        protocols: &[Protocol],
        method: String,
        handler: Arc<H>,
    ) -> Self {
        if self.error.is_some() {
            return self;
        }
        if method.trim().is_empty() {
            self.error = Some(NjallError::Configuration(
                "route method identifier must not be empty".to_string(),
            ));
            return self;
        }

        let method: Arc<str> = method.into();
        for &protocol in protocols {
            let routes = self.table.routes.entry(protocol).or_default();
            if routes.contains_key(&method) {
                self.error = Some(NjallError::DuplicateRoute {
                    protocol: protocol.to_string(),
                    method: method.to_string(),
                });
                return self;
            }
            routes.insert(
                method.clone(),
                RouteEntry::new(protocol, method.clone(), handler.clone()),
            );
        }
        self
    }

    pub fn build(self) -> Result<RouteTable> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.table),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::{EchoReply, EchoRequest};
    use async_trait::async_trait;

    struct Echo;

    #[async_trait]
    impl Handler for Echo {
        type Request = EchoRequest;
        type Response = EchoReply;

        async fn handle(
            &self,
            _ctx: CallContext,
            request: EchoRequest,
        ) -> std::result::Result<EchoReply, HandlerError> {
            Ok(EchoReply { text: request.text })
        }
    }

    #[test]
    fn route_registers_both_protocols() {
        let table = RouteTable::builder().route("Greet", Echo).build().unwrap();
        assert_eq!(table.len(), 2);
        for protocol in Protocol::ALL {
            let entry = table.get(protocol, "Greet").unwrap();
            assert_eq!(entry.protocol(), protocol);
            assert_eq!(entry.request_type(), "larpconnect.njall.v1.EchoRequest");
            assert_eq!(entry.response_type(), "larpconnect.njall.v1.EchoReply");
        }
    }

    #[test]
    fn single_protocol_registration() {
        let table = RouteTable::builder()
            .grpc("Greet", Echo)
            .http("Echo", Echo)
            .build()
            .unwrap();
        assert!(table.get(Protocol::Grpc, "Greet").is_some());
        assert!(table.get(Protocol::Http, "Greet").is_none());
        assert_eq!(table.methods(Protocol::Http), vec!["Echo"]);
    }

    #[test]
    fn duplicate_route_is_rejected() {
        let err = RouteTable::builder()
            .route("Greet", Echo)
            .http("Greet", Echo)
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            NjallError::DuplicateRoute { ref protocol, ref method }
                if protocol == "http" && method == "Greet"
        ));
        assert!(err.is_startup());
    }

    #[test]
    fn empty_method_is_rejected() {
        let err = RouteTable::builder().route("  ", Echo).build().unwrap_err();
        assert!(matches!(err, NjallError::Configuration(_)));
    }

    #[test]
    fn methods_are_sorted() {
        let table = RouteTable::builder()
            .route("WebFinger", Echo)
            .route("Greet", Echo)
            .route("GetMessage", Echo)
            .build()
            .unwrap();
        assert_eq!(
            table.methods(Protocol::Grpc),
            vec!["GetMessage", "Greet", "WebFinger"]
        );
    }
}
