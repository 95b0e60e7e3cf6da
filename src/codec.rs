//! Pluggable codec registry.
//!
//! A codec is resolved by the suffix of a reference's path, trying
//! progressively shorter right-hand dot-groups: for `abc.edn.gz` the
//! registry first tries the key `"edn.gz"`, then falls back to `"gz"`.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::DurableRefError;
use crate::opts::SharedOpts;

/// Encodes and decodes values to and from bytes for one registered suffix.
pub trait Codec: Send + Sync {
    /// Serialize `value` to bytes.
    fn encode(&self, value: &serde_json::Value, opts: &SharedOpts) -> Result<Vec<u8>, DurableRefError>;
    /// Deserialize bytes back into a value.
    fn decode(&self, bytes: &[u8], opts: &SharedOpts) -> Result<serde_json::Value, DurableRefError>;
}

/// String-keyed registry of [`Codec`] implementations.
#[derive(Clone, Default)]
pub struct CodecRegistry {
    codecs: HashMap<String, Arc<dyn Codec>>,
}

impl CodecRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `codec` under `suffix` (e.g. `"edn"`, `"edn.gz"`). A
    /// second registration under the same suffix replaces the first.
    pub fn register(&mut self, suffix: impl Into<String>, codec: Arc<dyn Codec>) {
        self.codecs.insert(suffix.into(), codec);
    }

    /// Resolve the codec for `path` by trying progressively shorter
    /// suffixes of its dot-groups, right to left.
    #[tracing::instrument(skip(self))]
    pub fn resolve(&self, path: &str) -> Result<Arc<dyn Codec>, DurableRefError> {
        for suffix in suffix_candidates(path) {
            if let Some(codec) = self.codecs.get(suffix) {
                tracing::debug!(suffix, "resolved codec");
                return Ok(codec.clone());
            }
        }
        Err(DurableRefError::UnknownFormat {
            path: path.to_string(),
        })
    }

    /// Resolve a codec for `path` and encode `value` with it.
    pub fn encode(
        &self,
        path: &str,
        value: &serde_json::Value,
        opts: &SharedOpts,
    ) -> Result<Vec<u8>, DurableRefError> {
        self.resolve(path)?.encode(value, opts)
    }

    /// Resolve a codec for `path` and decode `bytes` with it.
    pub fn decode(
        &self,
        path: &str,
        bytes: &[u8],
        opts: &SharedOpts,
    ) -> Result<serde_json::Value, DurableRefError> {
        self.resolve(path)?.decode(bytes, opts)
    }
}

/// Yield the dot-group suffixes of `path`'s final segment, longest first:
/// for `"abc.edn.gz"` this yields `"edn.gz"` then `"gz"`. The leading
/// hash-like first group is never itself considered a suffix.
fn suffix_candidates(path: &str) -> impl Iterator<Item = &str> {
    let name = path.rsplit('/').next().unwrap_or(path);
    // Byte offset of the start of each dot-group in `name`.
    let mut offsets = vec![0usize];
    for (idx, byte) in name.bytes().enumerate() {
        if byte == b'.' {
            offsets.push(idx + 1);
        }
    }
    // Skip the leading group (the hash/identifier), keep one offset per
    // remaining group, longest suffix (earliest offset) first.
    offsets.remove(0);
    offsets.into_iter().map(move |offset| &name[offset..])
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Upper;
    impl Codec for Upper {
        fn encode(&self, value: &serde_json::Value, _opts: &SharedOpts) -> Result<Vec<u8>, DurableRefError> {
            Ok(value.to_string().to_uppercase().into_bytes())
        }
        fn decode(&self, bytes: &[u8], _opts: &SharedOpts) -> Result<serde_json::Value, DurableRefError> {
            Ok(serde_json::Value::String(String::from_utf8_lossy(bytes).to_string()))
        }
    }

    #[test]
    fn it_resolves_simple_suffix() {
        let mut reg = CodecRegistry::new();
        reg.register("edn", Arc::new(Upper));
        assert!(reg.resolve("abc123.edn").is_ok());
    }

    #[test]
    fn it_falls_back_right_to_left_on_compound_suffix() {
        let mut reg = CodecRegistry::new();
        reg.register("gz", Arc::new(Upper));
        // "edn.gz" is not registered, only "gz" is -- must fall back.
        assert!(reg.resolve("abc123.edn.gz").is_ok());
    }

    #[test]
    fn it_prefers_longest_matching_suffix() {
        struct Marker(&'static str);
        impl Codec for Marker {
            fn encode(&self, _v: &serde_json::Value, _o: &SharedOpts) -> Result<Vec<u8>, DurableRefError> {
                Ok(self.0.as_bytes().to_vec())
            }
            fn decode(&self, _b: &[u8], _o: &SharedOpts) -> Result<serde_json::Value, DurableRefError> {
                unimplemented!()
            }
        }
        let mut reg = CodecRegistry::new();
        reg.register("gz", Arc::new(Marker("short")));
        reg.register("edn.gz", Arc::new(Marker("long")));
        let codec = reg.resolve("abc123.edn.gz").unwrap();
        let encoded = codec.encode(&serde_json::Value::Null, &SharedOpts::default()).unwrap();
        assert_eq!(encoded, b"long");
    }

    #[test]
    fn it_errors_on_unknown_format() {
        let reg = CodecRegistry::new();
        let err = reg.resolve("abc123.bogus").unwrap_err();
        assert!(matches!(err, DurableRefError::UnknownFormat { .. }));
    }
}
