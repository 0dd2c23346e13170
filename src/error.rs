//! Njall error types

/// Crate-level errors: startup, configuration, codecs and transports.
///
/// Request-level failures never surface as `NjallError`; they are mapped to a
/// [`StatusCode`](crate::types::StatusCode) on the response envelope instead.
#[derive(Debug, thiserror::Error)]
pub enum NjallError {
    // Configuration errors
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("route already registered: {protocol} {method}")]
    DuplicateRoute { protocol: String, method: String },

    // Data errors
    #[error("frame error: {0}")]
    Frame(String),

    #[error("protobuf decode error: {0}")]
    Decode(#[from] prost::DecodeError),

    // Runtime errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("transport error: {0}")]
    Transport(String),

    /// A remote call completed with a non-OK status.
    #[error("request failed ({status}): {message}")]
    Rpc {
        status: crate::types::StatusCode,
        message: String,
    },

    #[error("startup failed: {0}")]
    Startup(String),

    #[error("shutdown timed out after {0:?}")]
    ShutdownTimeout(std::time::Duration),
}

impl NjallError {
    /// Whether this error happened before the server began serving traffic.
    pub fn is_startup(&self) -> bool {
        matches!(
            self,
            NjallError::Configuration(_)
                | NjallError::DuplicateRoute { .. }
                | NjallError::Startup(_)
        )
    }
}

/// Result type alias for Njall operations
pub type Result<T> = std::result::Result<T, NjallError>;
