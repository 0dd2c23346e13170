//! Status codes surfaced on every response envelope

use serde::{Deserialize, Serialize};

/// Outcome of a dispatched request.
///
/// Every failure inside the core is one of these codes; transports translate
/// them to gRPC status codes or HTTP status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusCode {
    Ok,
    /// No route matches the method identifier.
    NotFound,
    /// The payload failed to decode against the route's declared message type,
    /// or the handler rejected its input.
    InvalidArgument,
    /// The handler did not complete before the request deadline.
    DeadlineExceeded,
    /// Unmapped handler failure, including panics.
    Internal,
    /// The health reporter is not `Ready`.
    Unavailable,
}

impl StatusCode {
    /// Stable snake_case name, used in metrics labels and HTTP error bodies.
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusCode::Ok => "ok",
            StatusCode::NotFound => "not_found",
            StatusCode::InvalidArgument => "invalid_argument",
            StatusCode::DeadlineExceeded => "deadline_exceeded",
            StatusCode::Internal => "internal",
            StatusCode::Unavailable => "unavailable",
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, StatusCode::Ok)
    }

    /// Numeric gRPC status code.
    pub fn grpc_code(&self) -> i32 {
        match self {
            StatusCode::Ok => 0,
            StatusCode::InvalidArgument => 3,
            StatusCode::DeadlineExceeded => 4,
            StatusCode::NotFound => 5,
            StatusCode::Internal => 13,
            StatusCode::Unavailable => 14,
        }
    }

    /// Map a numeric gRPC status code back to the taxonomy.
    ///
    /// Codes outside the taxonomy collapse to `Internal`.
    pub fn from_grpc_code(code: i32) -> Self {
        match code {
            0 => StatusCode::Ok,
            3 => StatusCode::InvalidArgument,
            4 => StatusCode::DeadlineExceeded,
            5 => StatusCode::NotFound,
            14 => StatusCode::Unavailable,
            _ => StatusCode::Internal,
        }
    }

    /// HTTP status code used by the REST transport.
    pub fn http_status(&self) -> u16 {
        match self {
            StatusCode::Ok => 200,
            StatusCode::InvalidArgument => 400,
            StatusCode::NotFound => 404,
            StatusCode::Internal => 500,
            StatusCode::Unavailable => 503,
            StatusCode::DeadlineExceeded => 504,
        }
    }
}

impl std::fmt::Display for StatusCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [StatusCode; 6] = [
        StatusCode::Ok,
        StatusCode::NotFound,
        StatusCode::InvalidArgument,
        StatusCode::DeadlineExceeded,
        StatusCode::Internal,
        StatusCode::Unavailable,
    ];

    #[test]
    fn grpc_codes_map_back() {
        for code in ALL {
            assert_eq!(StatusCode::from_grpc_code(code.grpc_code()), code);
        }
    }

    #[test]
    fn unknown_grpc_code_is_internal() {
        // 12 = UNIMPLEMENTED, 16 = UNAUTHENTICATED
        assert_eq!(StatusCode::from_grpc_code(12), StatusCode::Internal);
        assert_eq!(StatusCode::from_grpc_code(16), StatusCode::Internal);
    }

    #[test]
    fn serde_uses_snake_case() {
        let json = serde_json::to_string(&StatusCode::DeadlineExceeded).unwrap();
        assert_eq!(json, "\"deadline_exceeded\"");
        assert_eq!(StatusCode::DeadlineExceeded.as_str(), "deadline_exceeded");
    }

    #[test]
    fn http_statuses() {
        assert_eq!(StatusCode::NotFound.http_status(), 404);
        assert_eq!(StatusCode::Unavailable.http_status(), 503);
        assert_eq!(StatusCode::DeadlineExceeded.http_status(), 504);
    }
}
