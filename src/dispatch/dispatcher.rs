//! Dispatcher: runs bound handlers under a deadline.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{Instrument, Span, debug, error, instrument, warn};

use super::context::{CallContext, CancelOnDrop};
use crate::health::HealthReporter;
use crate::id::IdGenerator;
use crate::routing::Router;
use crate::telemetry;
use crate::trace::TraceContext;
use crate::types::{Metadata, Protocol, RequestEnvelope, ResponseEnvelope, StatusCode, TRACEPARENT};

/// Method label used when no route matched, to bound label cardinality.
const UNKNOWN_METHOD: &str = "unknown";

/// Converts request envelopes into exactly one response envelope each.
///
/// Every accepted request runs on its own tokio task. The dispatcher waits
/// for it up to the effective deadline, then answers `DeadlineExceeded` and
/// fires the task's cancellation signal; the task itself is left to notice
/// and wind down.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    router: Router,
    health: HealthReporter,
    ids: Arc<IdGenerator>,
    default_deadline: Option<Duration>,
}

impl Dispatcher {
    pub fn new(router: Router, health: HealthReporter, ids: Arc<IdGenerator>) -> Self {
        Self {
            router,
            health,
            ids,
            default_deadline: None,
        }
    }

    /// Server-side upper bound applied to every request.
    pub fn with_default_deadline(mut self, deadline: Duration) -> Self {
        self.default_deadline = Some(deadline);
        self
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn health(&self) -> &HealthReporter {
        &self.health
    }

    pub fn default_deadline(&self) -> Option<Duration> {
        self.default_deadline
    }

    #[instrument(
        name = "dispatch",
        skip(self, request),
        fields(
            method = request.method(),
            trace_id = tracing::field::Empty,
            parent_span_id = tracing::field::Empty,
            span_id = tracing::field::Empty,
            status = tracing::field::Empty,
        )
    )]
    pub async fn dispatch(&self, protocol: Protocol, request: RequestEnvelope) -> ResponseEnvelope {
        let start = std::time::Instant::now();
        let trace = TraceContext::from_metadata(request.metadata(), &self.ids);
        let span = Span::current();
        span.record("trace_id", trace.trace_id().as_str());
        span.record("parent_span_id", trace.parent_span_id().as_str());
        span.record("span_id", trace.span_id().as_str());

        let (method_label, response) = self.run(protocol, request, trace).await;
        span.record("status", response.status().as_str());

        let mut metadata = Metadata::new();
        metadata.insert(TRACEPARENT, trace.to_traceparent());
        Self::record_request(protocol, &method_label, response.status(), start);
        response.with_metadata(metadata)
    }

    async fn run(
        &self,
        protocol: Protocol,
        request: RequestEnvelope,
        trace: TraceContext,
    ) -> (String, ResponseEnvelope) {
        if !self.health.is_ready() {
            debug!(state = %self.health.state(), "Rejecting request, not ready");
            return (
                UNKNOWN_METHOD.to_string(),
                ResponseEnvelope::error(
                    StatusCode::Unavailable,
                    format!("server is {}", self.health.state()),
                ),
            );
        }

        let call = match self.router.resolve(protocol, &request) {
            Ok(call) => call,
            Err(e) => {
                debug!(error = %e, "Route resolution failed");
                let label = match e.status() {
                    StatusCode::NotFound => UNKNOWN_METHOD.to_string(),
                    _ => request.method().to_string(),
                };
                return (label, ResponseEnvelope::error(e.status(), e.to_string()));
            }
        };
        let method = call.method_arc();
        let label = method.to_string();

        let deadline = effective_deadline(
            request.received_at(),
            request.deadline(),
            self.default_deadline,
        );
        if deadline.is_some_and(|d| d <= Instant::now()) {
            Self::record_deadline_exceeded(protocol, &label);
            return (
                label,
                ResponseEnvelope::error(
                    StatusCode::DeadlineExceeded,
                    "deadline expired before the handler started",
                ),
            );
        }

        let (cancel_guard, cancel) = CancelOnDrop::pair(method.clone());
        let ctx = CallContext::new(
            protocol,
            method,
            request.metadata().clone(),
            deadline,
            trace,
            cancel,
        );
        let mut task = tokio::spawn(call.invoke(ctx).in_current_span());

        let joined = match deadline {
            Some(deadline) => match tokio::time::timeout_at(deadline, &mut task).await {
                Ok(joined) => joined,
                Err(_) => {
                    // Cooperative: the task keeps running until it notices.
                    drop(cancel_guard);
                    warn!("Deadline exceeded, cancelling handler");
                    Self::record_deadline_exceeded(protocol, &label);
                    return (
                        label,
                        ResponseEnvelope::error(
                            StatusCode::DeadlineExceeded,
                            "handler did not complete before the deadline",
                        ),
                    );
                }
            },
            None => task.await,
        };

        let response = match joined {
            Ok(Ok(payload)) => ResponseEnvelope::ok(payload),
            Ok(Err(e)) => {
                debug!(error = %e, "Handler returned error");
                ResponseEnvelope::error(e.status(), e.to_string())
            }
            Err(e) if e.is_panic() => {
                error!("Handler panicked");
                ResponseEnvelope::error(StatusCode::Internal, "handler panicked")
            }
            Err(e) => {
                error!(error = %e, "Handler task failed");
                ResponseEnvelope::error(StatusCode::Internal, "handler task failed")
            }
        };
        (label, response)
    }

    fn record_request(protocol: Protocol, method: &str, status: StatusCode, start: std::time::Instant) {
        let elapsed = start.elapsed().as_secs_f64();
        metrics::counter!(telemetry::REQUESTS_TOTAL,
            "protocol" => protocol.as_str(),
            "method" => method.to_owned(),
            "status" => status.as_str(),
        )
        .increment(1);
        metrics::histogram!(telemetry::REQUEST_DURATION_SECONDS,
            "protocol" => protocol.as_str(),
            "method" => method.to_owned(),
        )
        .record(elapsed);
    }

    fn record_deadline_exceeded(protocol: Protocol, method: &str) {
        metrics::counter!(telemetry::DEADLINE_EXCEEDED_TOTAL,
            "protocol" => protocol.as_str(),
            "method" => method.to_owned(),
        )
        .increment(1);
    }
}

/// The earlier of the caller's deadline and `received_at + default`.
pub fn effective_deadline(
    received_at: Instant,
    caller: Option<Instant>,
    default: Option<Duration>,
) -> Option<Instant> {
    let server = default.map(|d| received_at + d);
    match (caller, server) {
        (Some(c), Some(s)) => Some(c.min(s)),
        (c, s) => c.or(s),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn effective_deadline_takes_the_minimum() {
        let now = Instant::now();
        let caller = now + Duration::from_secs(5);

        assert_eq!(effective_deadline(now, None, None), None);
        assert_eq!(effective_deadline(now, Some(caller), None), Some(caller));
        assert_eq!(
            effective_deadline(now, None, Some(Duration::from_secs(30))),
            Some(now + Duration::from_secs(30))
        );
        assert_eq!(
            effective_deadline(now, Some(caller), Some(Duration::from_secs(30))),
            Some(caller)
        );
        assert_eq!(
            effective_deadline(now, Some(caller), Some(Duration::from_secs(1))),
            Some(now + Duration::from_secs(1))
        );
    }
}
