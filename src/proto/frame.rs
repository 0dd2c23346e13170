//! Versioned framing for [`Message`].
//!
//! ```text
//! [version:2][length:4][payload:length]
//! ```
//!
//! Both integers are big-endian. Decoding qualifies bare `ProtoDef` names with
//! [`NAMESPACE`] so receivers always see fully-qualified type names.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use prost::Message as _;

use super::{Message, NAMESPACE};
use crate::{NjallError, Result};

/// Current frame version.
pub const FRAME_VERSION: u16 = 0x01;

/// Size of the version + length header.
pub const FRAME_HEADER_SIZE: usize = 6;

/// Media type for framed HTTP bodies.
pub const FRAME_CONTENT_TYPE: &str = "application/vnd.njall.frame";

/// Encode a message into a single frame.
pub fn encode_frame(message: &Message) -> Bytes {
    let len = message.encoded_len();
    let mut buf = BytesMut::with_capacity(FRAME_HEADER_SIZE + len);
    buf.put_u16(FRAME_VERSION);
    buf.put_u32(len as u32);
    // BytesMut grows on demand, so encoding cannot run out of capacity.
    let _ = message.encode(&mut buf);
    buf.freeze()
}

/// Decode a frame produced by [`encode_frame`].
///
/// Trailing bytes after the declared payload are ignored.
pub fn decode_frame(mut data: &[u8]) -> Result<Message> {
    if data.len() < FRAME_HEADER_SIZE {
        return Err(NjallError::Frame(format!(
            "incomplete frame header: expected {FRAME_HEADER_SIZE} bytes, got {}",
            data.len()
        )));
    }

    let version = data.get_u16();
    if version != FRAME_VERSION {
        return Err(NjallError::Frame(format!(
            "unsupported frame version {version:#06x}"
        )));
    }

    let len = data.get_u32() as usize;
    if data.len() < len {
        return Err(NjallError::Frame(format!(
            "incomplete frame: expected {len} payload bytes, got {}",
            data.len()
        )));
    }

    let mut message = Message::decode(&data[..len])
        .map_err(|e| NjallError::Frame(format!("failed to decode protobuf message: {e}")))?;
    qualify_type_name(&mut message);
    Ok(message)
}

fn qualify_type_name(message: &mut Message) {
    if let Some(proto) = message.proto.as_mut() {
        if !proto.protobuf_name.is_empty() && !proto.protobuf_name.starts_with(NAMESPACE) {
            proto.protobuf_name = format!("{NAMESPACE}{}", proto.protobuf_name);
        }
    }
}
