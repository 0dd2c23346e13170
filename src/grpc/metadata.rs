//! Conversions between tonic metadata and envelope [`Metadata`].

use tonic::metadata::{Ascii, KeyAndValueRef, MetadataKey, MetadataMap, MetadataValue};
use tracing::debug;

use crate::types::Metadata;

/// Textual gRPC metadata as envelope metadata. Binary entries are dropped.
pub fn from_metadata_map(map: &MetadataMap) -> Metadata {
    map.iter()
        .filter_map(|entry| match entry {
            KeyAndValueRef::Ascii(key, value) => {
                value.to_str().ok().map(|v| (key.as_str().to_string(), v.to_string()))
            }
            KeyAndValueRef::Binary(..) => None,
        })
        .collect()
}

/// Envelope metadata as gRPC metadata. Entries that are not valid ASCII
/// metadata are skipped.
pub fn to_metadata_map(metadata: &Metadata) -> MetadataMap {
    let mut map = MetadataMap::new();
    for (key, value) in metadata.iter() {
        match (
            MetadataKey::<Ascii>::from_bytes(key.as_bytes()),
            MetadataValue::<Ascii>::try_from(value),
        ) {
            (Ok(key), Ok(value)) => {
                map.insert(key, value);
            }
            _ => debug!(key, "Dropping metadata entry not valid for gRPC"),
        }
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_drops_binary() {
        let mut map = MetadataMap::new();
        map.insert("x-caller", MetadataValue::from_static("svc-a"));
        map.insert_bin("blob-bin", MetadataValue::from_bytes(b"\x00\x01"));
        let metadata = from_metadata_map(&map);
        assert_eq!(metadata.get("x-caller"), Some("svc-a"));
        assert_eq!(metadata.len(), 1);
        assert_eq!(
            to_metadata_map(&metadata)
                .get("x-caller")
                .and_then(|v| v.to_str().ok()),
            Some("svc-a")
        );
    }

    #[test]
    fn invalid_keys_are_skipped() {
        let mut metadata = Metadata::new();
        metadata.insert("bad key", "v");
        metadata.insert("good", "v");
        let map = to_metadata_map(&metadata);
        assert_eq!(map.len(), 1);
        assert!(map.get("good").is_some());
    }
}
