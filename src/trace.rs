//! W3C `traceparent` propagation.
//!
//! ```text
//! traceparent: 00-<32 hex trace id>-<16 hex parent span id>-<2 hex flags>
//! ```

use crate::id::IdGenerator;
use crate::types::{Metadata, TRACEPARENT};

/// Parent span reported when a request arrives without a trace.
pub const ROOT_PARENT_SPAN_ID: [u8; 8] = [0x11; 8];

const SAMPLED: u8 = 0x01;

/// Trace identifiers for a single dispatched request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraceContext {
    trace_id: [u8; 16],
    parent_span_id: [u8; 8],
    span_id: [u8; 8],
    flags: u8,
}

impl TraceContext {
    /// Continue the caller's trace, or start a new one.
    ///
    /// A missing or malformed `traceparent` starts a fresh trace rooted at
    /// [`ROOT_PARENT_SPAN_ID`]. The span id is always new.
    pub fn from_metadata(metadata: &Metadata, ids: &IdGenerator) -> Self {
        let mut span_id = [0u8; 8];
        ids.random().fill(&mut span_id);

        match metadata.get(TRACEPARENT).and_then(parse_traceparent) {
            Some((trace_id, parent_span_id, flags)) => Self {
                trace_id,
                parent_span_id,
                span_id,
                flags,
            },
            None => Self {
                trace_id: ids.generate_bytes(),
                parent_span_id: ROOT_PARENT_SPAN_ID,
                span_id,
                flags: SAMPLED,
            },
        }
    }

    pub fn trace_id(&self) -> String {
        hex::encode(self.trace_id)
    }

    pub fn parent_span_id(&self) -> String {
        hex::encode(self.parent_span_id)
    }

    pub fn span_id(&self) -> String {
        hex::encode(self.span_id)
    }

    /// `traceparent` value naming this request's span as the parent.
    pub fn to_traceparent(&self) -> String {
        format!(
            "00-{}-{}-{:02x}",
            self.trace_id(),
            self.span_id(),
            self.flags
        )
    }
}

/// Returns `(trace_id, parent_span_id, flags)` for a well-formed header.
fn parse_traceparent(value: &str) -> Option<([u8; 16], [u8; 8], u8)> {
    let mut parts = value.trim().split('-');
    let version = parts.next()?;
    let trace = parts.next()?;
    let parent = parts.next()?;
    let flags = parts.next()?;

    let mut version_byte = [0u8; 1];
    hex::decode_to_slice(version, &mut version_byte).ok()?;
    // 0xff is reserved as invalid; version 00 has exactly four fields.
    if version_byte[0] == 0xff || (version_byte[0] == 0 && parts.next().is_some()) {
        return None;
    }

    let mut trace_id = [0u8; 16];
    let mut parent_span_id = [0u8; 8];
    let mut flag_byte = [0u8; 1];
    hex::decode_to_slice(trace, &mut trace_id).ok()?;
    hex::decode_to_slice(parent, &mut parent_span_id).ok()?;
    hex::decode_to_slice(flags, &mut flag_byte).ok()?;

    if trace_id == [0; 16] || parent_span_id == [0; 8] {
        return None;
    }
    Some((trace_id, parent_span_id, flag_byte[0]))
}

#[cfg(test)]
mod tests {
    use super::*;

    const INCOMING: &str = "00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01";

    fn with_traceparent(value: &str) -> Metadata {
        let mut metadata = Metadata::new();
        metadata.insert(TRACEPARENT, value);
        metadata
    }

    #[test]
    fn continues_incoming_trace() {
        let ids = IdGenerator::system();
        let ctx = TraceContext::from_metadata(&with_traceparent(INCOMING), &ids);
        assert_eq!(ctx.trace_id(), "4bf92f3577b34da6a3ce929d0e0e4736");
        assert_eq!(ctx.parent_span_id(), "00f067aa0ba902b7");
        assert_ne!(ctx.span_id(), "00f067aa0ba902b7");
        assert_eq!(ctx.span_id().len(), 16);
    }

    #[test]
    fn starts_new_trace_without_header() {
        let ids = IdGenerator::system();
        let ctx = TraceContext::from_metadata(&Metadata::new(), &ids);
        assert_eq!(ctx.trace_id().len(), 32);
        assert_eq!(ctx.parent_span_id(), "1111111111111111");
    }

    #[test]
    fn malformed_header_starts_new_trace() {
        let ids = IdGenerator::system();
        for bad in [
            "garbage",
            "00-xyz-00f067aa0ba902b7-01",
            "00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7",
            "ff-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01",
            "00-00000000000000000000000000000000-00f067aa0ba902b7-01",
            "00-4bf92f3577b34da6a3ce929d0e0e4736-0000000000000000-01",
            "00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01-extra",
        ] {
            let ctx = TraceContext::from_metadata(&with_traceparent(bad), &ids);
            assert_eq!(ctx.parent_span_id(), "1111111111111111", "{bad}");
        }
    }

    #[test]
    fn outgoing_header_names_own_span() {
        let ids = IdGenerator::system();
        let ctx = TraceContext::from_metadata(&with_traceparent(INCOMING), &ids);
        let header = ctx.to_traceparent();
        assert_eq!(
            header,
            format!("00-4bf92f3577b34da6a3ce929d0e0e4736-{}-01", ctx.span_id())
        );
        assert_eq!(parse_traceparent(&header).map(|(t, _, _)| t), Some(ctx.trace_id));
    }

    #[test]
    fn span_ids_differ_per_request() {
        let ids = IdGenerator::system();
        let a = TraceContext::from_metadata(&Metadata::new(), &ids);
        let b = TraceContext::from_metadata(&Metadata::new(), &ids);
        assert_ne!(a.span_id(), b.span_id());
        assert_ne!(a.trace_id(), b.trace_id());
    }
}
