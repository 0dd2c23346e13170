//! Request and response metadata

use std::collections::BTreeMap;

/// Metadata key carrying W3C trace context.
pub const TRACEPARENT: &str = "traceparent";

/// Header/trailer metadata attached to an envelope.
///
/// Keys are case-insensitive and stored lower-cased. Only textual values are
/// carried; binary gRPC metadata (`-bin` keys) is dropped by the transports.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
    entries: BTreeMap<String, String>,
}

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value, replacing any previous value for the same key.
    pub fn insert(&mut self, key: impl AsRef<str>, value: impl Into<String>) {
        self.entries
            .insert(key.as_ref().to_ascii_lowercase(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .get(&key.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: AsRef<str>, V: Into<String>> FromIterator<(K, V)> for Metadata {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut metadata = Metadata::new();
        for (key, value) in iter {
            metadata.insert(key, value);
        }
        metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_case_insensitive() {
        let mut metadata = Metadata::new();
        metadata.insert("TraceParent", "00-abc");
        assert_eq!(metadata.get("traceparent"), Some("00-abc"));
        assert_eq!(metadata.get("TRACEPARENT"), Some("00-abc"));
        assert_eq!(metadata.len(), 1);
    }

    #[test]
    fn insert_replaces() {
        let mut metadata: Metadata = [("a", "1")].into_iter().collect();
        metadata.insert("A", "2");
        assert_eq!(metadata.get("a"), Some("2"));
        assert_eq!(metadata.len(), 1);
    }
}
