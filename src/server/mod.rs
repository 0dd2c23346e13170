//! gRPC and HTTP transports plus server bootstrap.
//!
//! This module provides:
//! - Configuration loading and validation (`config`)
//! - The gRPC service for `larpconnect.njall.v1.MessageService` (`grpc`)
//! - The HTTP router: RPC-over-POST, health probes, OpenAPI, WebFinger (`http`)
//! - Startup and graceful shutdown (`lifecycle`)
//!
//! Both transports feed the same [`Dispatcher`](crate::dispatch::Dispatcher).

pub mod config;
pub mod grpc;
pub mod http;
mod lifecycle;

pub use config::{Config, ServerSettings};
pub use grpc::MessageServiceServer;
pub use lifecycle::{RunningServer, Server};
