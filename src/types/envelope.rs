//! Protocol-agnostic request and response envelopes

use std::time::Duration;

use bytes::Bytes;
use tokio::time::Instant;

use super::{Metadata, StatusCode};

/// An inbound call as seen by the router, independent of transport.
///
/// Built by a transport when a request arrives and handed to the dispatcher
/// by value; there are no mutators once it has been constructed.
#[derive(Debug, Clone)]
pub struct RequestEnvelope {
    method: String,
    payload: Bytes,
    metadata: Metadata,
    deadline: Option<Instant>,
    received_at: Instant,
}

impl RequestEnvelope {
    /// Create an envelope received now, with no metadata and no deadline.
    pub fn new(method: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            method: method.into(),
            payload: payload.into(),
            metadata: Metadata::new(),
            deadline: None,
            received_at: Instant::now(),
        }
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Set the deadline as a time budget relative to when the request was received.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Some(self.received_at + timeout);
        self
    }

    /// Set an absolute deadline.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Caller-supplied deadline, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn received_at(&self) -> Instant {
        self.received_at
    }
}

/// The single response produced for a request.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseEnvelope {
    status: StatusCode,
    payload: Bytes,
    metadata: Metadata,
    message: Option<String>,
}

impl ResponseEnvelope {
    /// Successful response carrying an encoded response message.
    pub fn ok(payload: impl Into<Bytes>) -> Self {
        Self {
            status: StatusCode::Ok,
            payload: payload.into(),
            metadata: Metadata::new(),
            message: None,
        }
    }

    /// Error response with an empty payload.
    pub fn error(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            payload: Bytes::new(),
            metadata: Metadata::new(),
            message: Some(message.into()),
        }
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Human-readable error description; `None` on success.
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn into_parts(self) -> (StatusCode, Bytes, Metadata, Option<String>) {
        (self.status, self.payload, self.metadata, self.message)
    }
}
