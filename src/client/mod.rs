//! Client library for connecting to njalld.
//!
//! Provides [`ServiceClient`], which calls `larpconnect.njall.v1.MessageService`
//! methods over gRPC and queries the standard health service.

mod service_client;

pub use service_client::ServiceClient;
