//! Njall - request-handling core for the LarpConnect server
//!
//! Every inbound request, whether it arrives over gRPC or HTTP, becomes a
//! [`RequestEnvelope`](types::RequestEnvelope). The
//! [`Dispatcher`](dispatch::Dispatcher) resolves it against an immutable
//! [`RouteTable`](routing::RouteTable), applies a deadline, invokes the handler
//! with a cancellable [`CallContext`](dispatch::CallContext), and returns a
//! [`ResponseEnvelope`](types::ResponseEnvelope) carrying a
//! [`StatusCode`](types::StatusCode) and W3C `traceparent` metadata.
//!
//! # Handler Example
//!
//! ```rust,no_run
//! use async_trait::async_trait;
//! use njall::dispatch::CallContext;
//! use njall::proto::{EchoReply, EchoRequest};
//! use njall::routing::{Handler, HandlerError, RouteTable};
//!
//! struct Shout;
//!
//! #[async_trait]
//! impl Handler for Shout {
//!     type Request = EchoRequest;
//!     type Response = EchoReply;
//!
//!     async fn handle(&self, _ctx: CallContext, req: EchoRequest) -> Result<EchoReply, HandlerError> {
//!         Ok(EchoReply { text: req.text.to_uppercase() })
//!     }
//! }
//!
//! # fn main() -> njall::Result<()> {
//! let table = RouteTable::builder().route("Shout", Shout).build()?;
//! assert_eq!(table.len(), 2);
//! # Ok(())
//! # }
//! ```
//!
//! # Serving
//!
//! ```rust,no_run
//! # async fn run() -> njall::Result<()> {
//! let settings = njall::server::Config::default().validate()?;
//! let server = njall::server::Server::start(settings).await?;
//! server.run_until(async { let _ = tokio::signal::ctrl_c().await; }).await
//! # }
//! ```

pub mod clock;
pub mod dispatch;
pub mod error;
pub mod health;
pub mod id;
pub mod proto;
pub mod routing;
pub mod services;
pub mod telemetry;
pub mod trace;
pub mod types;
pub mod version;

#[cfg(any(feature = "server", feature = "client"))]
pub mod grpc;

#[cfg(feature = "server")]
pub mod server;

#[cfg(feature = "client")]
pub mod client;

pub use error::{NjallError, Result};
pub use version::{PKG_VERSION, version_string};
