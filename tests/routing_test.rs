//! Route table construction and resolution through the public API.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use prost::Message as _;

use njall::dispatch::CallContext;
use njall::proto::{EchoReply, EchoRequest, Empty};
use njall::routing::{Handler, HandlerError, RouteError, RouteTable, Router};
use njall::services::{self, GET_MESSAGE, GREET, WEBFINGER};
use njall::types::{Protocol, RequestEnvelope, StatusCode};
use njall::NjallError;

struct Upper;

#[async_trait]
impl Handler for Upper {
    type Request = EchoRequest;
    type Response = EchoReply;

    async fn handle(&self, _ctx: CallContext, request: EchoRequest) -> Result<EchoReply, HandlerError> {
        Ok(EchoReply {
            text: request.text.to_uppercase(),
        })
    }
}

struct Nothing;

#[async_trait]
impl Handler for Nothing {
    type Request = Empty;
    type Response = Empty;

    async fn handle(&self, _ctx: CallContext, _request: Empty) -> Result<Empty, HandlerError> {
        Ok(Empty {})
    }
}

#[test]
fn default_routes_cover_both_protocols() {
    let table = services::default_routes(8080).build().unwrap();
    for protocol in Protocol::ALL {
        assert_eq!(table.methods(protocol), vec![GET_MESSAGE, GREET, WEBFINGER]);
    }
    assert_eq!(table.len(), 6);

    let greet = table.get(Protocol::Grpc, GREET).unwrap();
    assert_eq!(greet.request_type(), "larpconnect.njall.v1.EchoRequest");
    assert_eq!(greet.response_type(), "larpconnect.njall.v1.EchoReply");

    let get_message = table.get(Protocol::Http, GET_MESSAGE).unwrap();
    assert_eq!(get_message.request_type(), "google.protobuf.Empty");
    assert_eq!(get_message.response_type(), "larpconnect.njall.v1.Message");
}

#[test]
fn duplicate_registration_fails_build() {
    let err = RouteTable::builder()
        .grpc("Upper", Upper)
        .route("Upper", Nothing)
        .build()
        .unwrap_err();
    match err {
        NjallError::DuplicateRoute { protocol, method } => {
            assert_eq!(protocol, "grpc");
            assert_eq!(method, "Upper");
        }
        other => panic!("expected DuplicateRoute, got {other:?}"),
    }
}

#[test]
fn same_method_on_distinct_protocols_is_allowed() {
    let table = RouteTable::builder()
        .grpc("Upper", Upper)
        .http("Upper", Nothing)
        .build()
        .unwrap();
    assert_eq!(
        table.get(Protocol::Grpc, "Upper").unwrap().request_type(),
        "larpconnect.njall.v1.EchoRequest"
    );
    assert_eq!(
        table.get(Protocol::Http, "Upper").unwrap().request_type(),
        "google.protobuf.Empty"
    );
}

#[test]
fn empty_method_is_rejected() {
    let err = RouteTable::builder().route("  ", Upper).build().unwrap_err();
    assert!(err.is_startup());
}

#[test]
fn method_lookup_is_case_sensitive() {
    let router = Router::new(Arc::new(RouteTable::builder().route("Upper", Upper).build().unwrap()));
    let err = router
        .resolve(Protocol::Grpc, &RequestEnvelope::new("upper", Bytes::new()))
        .unwrap_err();
    assert!(matches!(err, RouteError::NotFound { .. }));
    assert_eq!(err.status(), StatusCode::NotFound);
}

#[test]
fn resolve_decodes_payload() {
    let router = Router::new(Arc::new(RouteTable::builder().route("Upper", Upper).build().unwrap()));
    let payload = EchoRequest { text: "x".into() }.encode_to_vec();
    let call = router
        .resolve(Protocol::Http, &RequestEnvelope::new("Upper", payload))
        .unwrap();
    assert_eq!(call.method(), "Upper");

    let err = router
        .resolve(
            Protocol::Http,
            &RequestEnvelope::new("Upper", Bytes::from_static(&[0x0a, 0x05, b'a'])),
        )
        .unwrap_err();
    assert_eq!(err.status(), StatusCode::InvalidArgument);
    assert!(err.to_string().contains("larpconnect.njall.v1.EchoRequest"));
}
