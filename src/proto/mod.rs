//! Protobuf contracts for the `larpconnect.njall.v1` package.
//!
//! These are hand-written prost messages mirroring the wire schema, so the
//! crate builds without `protoc`. Field tags are part of the contract and must
//! not be renumbered.
//!
//! ```text
//! service MessageService {
//!   rpc GetMessage(google.protobuf.Empty) returns (Message);
//!   rpc Greet(EchoRequest) returns (EchoReply);
//!   rpc WebFinger(WebFingerRequest) returns (WebFingerResponse);
//! }
//! ```

pub mod frame;

/// Protobuf package of the service contracts.
pub const PACKAGE: &str = "larpconnect.njall.v1";

/// Fully-qualified gRPC service name; gRPC paths are `/{SERVICE_NAME}/{method}`.
pub const SERVICE_NAME: &str = "larpconnect.njall.v1.MessageService";

/// Prefix applied to unqualified `ProtoDef::protobuf_name` values.
pub const NAMESPACE: &str = "larpconnect.njall.v1.";

/// Type URL prefix used when packing messages into `Any`.
pub const TYPE_URL_PREFIX: &str = "type.googleapis.com/";

macro_rules! impl_name {
    ($ty:ty, $package:expr, $name:literal) => {
        impl ::prost::Name for $ty {
            const NAME: &'static str = $name;
            const PACKAGE: &'static str = $package;
        }
    };
}

/// Envelope message exchanged between services.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Message {
    #[prost(string, tag = "1")]
    pub message_type: String,
    #[prost(message, optional, tag = "2")]
    pub message: Option<::prost_types::Any>,
    #[prost(message, optional, tag = "3")]
    pub traceparent: Option<Observability>,
    #[prost(message, optional, tag = "4")]
    pub proto: Option<ProtoDef>,
    #[prost(message, optional, tag = "5")]
    pub mime: Option<MimeType>,
}

/// Trace identifiers carried alongside a message.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Observability {
    #[prost(bytes = "vec", tag = "1")]
    pub trace_id: Vec<u8>,
    #[prost(bytes = "vec", tag = "2")]
    pub span_id: Vec<u8>,
}

/// Names the protobuf type of an embedded payload.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProtoDef {
    #[prost(string, tag = "1")]
    pub protobuf_name: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct MimeType {
    #[prost(string, tag = "1")]
    pub r#type: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct EchoRequest {
    #[prost(string, tag = "1")]
    pub text: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct EchoReply {
    #[prost(string, tag = "1")]
    pub text: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct WebFingerRequest {
    #[prost(string, tag = "1")]
    pub resource: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct WebFingerResponse {
    #[prost(string, tag = "1")]
    pub resource: String,
    #[prost(uint32, tag = "2")]
    pub port: u32,
    #[prost(message, repeated, tag = "3")]
    pub links: Vec<WebFingerLink>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct WebFingerLink {
    #[prost(string, tag = "1")]
    pub rel: String,
    #[prost(string, tag = "2")]
    pub href: String,
    #[prost(string, tag = "3")]
    pub r#type: String,
}

/// `google.protobuf.Empty`
#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct Empty {}

/// `google.protobuf.StringValue`
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct StringValue {
    #[prost(string, tag = "1")]
    pub value: String,
}

impl_name!(Message, PACKAGE, "Message");
impl_name!(Observability, PACKAGE, "Observability");
impl_name!(ProtoDef, PACKAGE, "ProtoDef");
impl_name!(MimeType, PACKAGE, "MimeType");
impl_name!(EchoRequest, PACKAGE, "EchoRequest");
impl_name!(EchoReply, PACKAGE, "EchoReply");
impl_name!(WebFingerRequest, PACKAGE, "WebFingerRequest");
impl_name!(WebFingerResponse, PACKAGE, "WebFingerResponse");
impl_name!(WebFingerLink, PACKAGE, "WebFingerLink");
impl_name!(Empty, "google.protobuf", "Empty");
impl_name!(StringValue, "google.protobuf", "StringValue");

/// Pack a message into `google.protobuf.Any`.
pub fn pack_any<M: ::prost::Message + ::prost::Name>(message: &M) -> ::prost_types::Any {
    ::prost_types::Any {
        type_url: format!("{TYPE_URL_PREFIX}{}", M::full_name()),
        value: message.encode_to_vec(),
    }
}

/// Unpack `google.protobuf.Any` into `M`, returning `None` on a type mismatch.
pub fn unpack_any<M: ::prost::Message + ::prost::Name + Default>(
    any: &::prost_types::Any,
) -> Option<Result<M, ::prost::DecodeError>> {
    let type_name = any.type_url.rsplit('/').next().unwrap_or_default();
    if type_name != M::full_name() {
        return None;
    }
    Some(M::decode(any.value.as_slice()))
}
