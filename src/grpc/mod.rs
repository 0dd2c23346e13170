//! gRPC wire helpers shared by the server and the client.

mod codec;
mod metadata;
mod timeout;

pub use codec::{BytesCodec, BytesDecoder, BytesEncoder};
pub use metadata::{from_metadata_map, to_metadata_map};
pub use timeout::{GRPC_TIMEOUT_HEADER, format_grpc_timeout, parse_grpc_timeout};
