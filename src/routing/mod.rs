//! Route table, handler trait and request resolution.
//!
//! ```text
//! RequestEnvelope ──► Router::resolve ──► RouteTable[(protocol, method)]
//!                          │                      │
//!                          │ NotFound             │ decode payload as Handler::Request
//!                          ▼                      ▼
//!                     RouteError          BoundCall ──► Dispatcher
//! ```

mod router;
mod table;
mod traits;

pub use router::{BoundCall, RouteError, Router};
pub use table::{RouteEntry, RouteTable, RouteTableBuilder};
pub use traits::{Handler, HandlerError};
