//! Handler execution under deadlines with cooperative cancellation.

mod context;
mod dispatcher;

pub use context::{CallContext, CancelSignal};
pub use dispatcher::{Dispatcher, effective_deadline};
