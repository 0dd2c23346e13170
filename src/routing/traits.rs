//! Handler trait and handler-reported errors

use async_trait::async_trait;

use crate::dispatch::CallContext;
use crate::types::StatusCode;

/// Failures a handler reports back to the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HandlerError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("unavailable: {0}")]
    Unavailable(String),

    /// The handler stopped because its cancellation signal fired.
    #[error("cancelled")]
    Cancelled,

    #[error("internal error: {0}")]
    Internal(String),
}

impl HandlerError {
    pub fn status(&self) -> StatusCode {
        match self {
            HandlerError::InvalidArgument(_) => StatusCode::InvalidArgument,
            HandlerError::NotFound(_) => StatusCode::NotFound,
            HandlerError::Unavailable(_) => StatusCode::Unavailable,
            // Cancellation only fires once the deadline has passed.
            HandlerError::Cancelled => StatusCode::DeadlineExceeded,
            HandlerError::Internal(_) => StatusCode::Internal,
        }
    }
}

/// A unary request handler with a declared request and response message type.
///
/// Handlers run on their own task and must not block. Long-running handlers
/// should check [`CallContext::is_cancelled`] or race
/// [`CallContext::cancelled`] and return [`HandlerError::Cancelled`] promptly.
#[async_trait]
pub trait Handler: Send + Sync + 'static {
    type Request: prost::Message + prost::Name + Default + Send + 'static;
    type Response: prost::Message + prost::Name + Send + 'static;

    async fn handle(
        &self,
        ctx: CallContext,
        request: Self::Request,
    ) -> std::result::Result<Self::Response, HandlerError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert_eq!(
            HandlerError::InvalidArgument("x".into()).status(),
            StatusCode::InvalidArgument
        );
        assert_eq!(
            HandlerError::NotFound("x".into()).status(),
            StatusCode::NotFound
        );
        assert_eq!(
            HandlerError::Unavailable("x".into()).status(),
            StatusCode::Unavailable
        );
        assert_eq!(
            HandlerError::Cancelled.status(),
            StatusCode::DeadlineExceeded
        );
        assert_eq!(
            HandlerError::Internal("boom".into()).status(),
            StatusCode::Internal
        );
    }
}
