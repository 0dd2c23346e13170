//! Telemetry metric name constants.
//!
//! Centralised metric names for dispatch operations. Consumers install
//! their own `metrics` recorder (e.g. prometheus, statsd); without a
//! recorder installed, all metric calls are no-ops.
//!
//! # Metric naming conventions
//!
//! All metrics are prefixed with `njall_`. Counters end in `_total`,
//! histograms use meaningful units (e.g. `_seconds`).
//!
//! # Common labels
//!
//! - `protocol`: inbound transport: "grpc" or "http"
//! - `method`: method identifier, or "unknown" when no route matched
//! - `status`: outcome as a snake_case status code (e.g. "ok", "not_found")

/// Total requests that produced a response envelope.
///
/// Labels: `protocol`, `method`, `status`.
pub const REQUESTS_TOTAL: &str = "njall_requests_total";

/// Request duration in seconds, measured from dispatch to response.
///
/// Labels: `protocol`, `method`.
pub const REQUEST_DURATION_SECONDS: &str = "njall_request_duration_seconds";

/// Total handler invocations abandoned because their deadline passed.
///
/// Labels: `protocol`, `method`.
pub const DEADLINE_EXCEEDED_TOTAL: &str = "njall_deadline_exceeded_total";

/// Total cancellation signals observed by handlers.
///
/// Labels: `method`.
pub const CANCELLATIONS_OBSERVED_TOTAL: &str = "njall_cancellations_observed_total";
