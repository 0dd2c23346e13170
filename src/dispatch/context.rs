//! Per-invocation context handed to handlers.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::watch;
use tokio::time::Instant;
use tracing::debug;

use crate::telemetry;
use crate::trace::TraceContext;
use crate::types::{Metadata, Protocol};

/// Cooperative cancellation signal for one handler invocation.
///
/// Fired by the dispatcher when the deadline passes or the caller goes away.
/// The first time a handler notices it, the observation is recorded once,
/// no matter how many clones of the context check it afterwards.
#[derive(Debug, Clone)]
pub struct CancelSignal {
    rx: watch::Receiver<bool>,
    observed: Arc<AtomicBool>,
    method: Arc<str>,
}

impl CancelSignal {
    pub(crate) fn new(rx: watch::Receiver<bool>, method: Arc<str>) -> Self {
        Self {
            rx,
            observed: Arc::new(AtomicBool::new(false)),
            method,
        }
    }

    /// Non-blocking check.
    pub fn is_cancelled(&self) -> bool {
        let cancelled = *self.rx.borrow();
        if cancelled {
            self.observe();
        }
        cancelled
    }

    /// Resolves once the signal fires. Never resolves if it never fires.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        // The sender fires on drop, so a closed channel has already fired.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
        if *rx.borrow() {
            self.observe();
        } else {
            std::future::pending::<()>().await;
        }
    }

    /// Whether a handler has noticed the signal.
    pub fn was_observed(&self) -> bool {
        self.observed.load(Ordering::Acquire)
    }

    fn observe(&self) {
        if !self.observed.swap(true, Ordering::AcqRel) {
            debug!(method = %self.method, "Handler observed cancellation");
            metrics::counter!(
                telemetry::CANCELLATIONS_OBSERVED_TOTAL,
                "method" => self.method.to_string(),
            )
            .increment(1);
        }
    }
}

/// Fires the paired [`CancelSignal`] when dropped.
pub(crate) struct CancelOnDrop(watch::Sender<bool>);

impl CancelOnDrop {
    pub(crate) fn pair(method: Arc<str>) -> (Self, CancelSignal) {
        let (tx, rx) = watch::channel(false);
        (Self(tx), CancelSignal::new(rx, method))
    }
}

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.send_replace(true);
    }
}

/// Everything a handler may need besides its decoded request.
#[derive(Debug, Clone)]
pub struct CallContext {
    protocol: Protocol,
    method: Arc<str>,
    metadata: Metadata,
    deadline: Option<Instant>,
    trace: TraceContext,
    cancel: CancelSignal,
}

impl CallContext {
    pub(crate) fn new(
        protocol: Protocol,
        method: Arc<str>,
        metadata: Metadata,
        deadline: Option<Instant>,
        trace: TraceContext,
        cancel: CancelSignal,
    ) -> Self {
        Self {
            protocol,
            method,
            metadata,
            deadline,
            trace,
            cancel,
        }
    }

    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    /// Request metadata as received from the transport.
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Effective deadline: the earlier of the caller's and the server default.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn trace(&self) -> &TraceContext {
        &self.trace
    }

    pub fn cancel_signal(&self) -> &CancelSignal {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub async fn cancelled(&self) {
        self.cancel.cancelled().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn not_cancelled_until_fired() {
        let (guard, signal) = CancelOnDrop::pair("Greet".into());
        assert!(!signal.is_cancelled());
        assert!(!signal.was_observed());
        drop(guard);
        assert!(signal.is_cancelled());
        assert!(signal.was_observed());
    }

    #[tokio::test]
    async fn cancelled_resolves_after_fire() {
        let (guard, signal) = CancelOnDrop::pair("Greet".into());
        let waiter = tokio::spawn({
            let signal = signal.clone();
            async move { signal.cancelled().await }
        });
        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());
        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert!(signal.was_observed());
    }

    #[test]
    fn clones_share_observation() {
        let (guard, signal) = CancelOnDrop::pair("Greet".into());
        let clone = signal.clone();
        drop(guard);
        assert!(clone.is_cancelled());
        assert!(signal.was_observed());
    }

    #[test]
    fn cancelled_is_pending_until_fired() {
        let (guard, signal) = CancelOnDrop::pair("Greet".into());
        let mut waiter = tokio_test::task::spawn(signal.cancelled());
        tokio_test::assert_pending!(waiter.poll());
        drop(guard);
        assert!(waiter.is_woken());
        tokio_test::assert_ready!(waiter.poll());
    }
}
