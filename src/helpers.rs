//! Minimal in-memory backend and toy codecs.
//!
//! Gated behind `cfg(any(test, feature = "helpers"))`, mirroring how the
//! teacher crate keeps its own test/demo storage backends out of the
//! production surface: available to this crate's own test suite
//! unconditionally, and to downstream users who opt into the `helpers`
//! feature for a quick-start backend without reaching for a real object
//! store.

use std::collections::HashMap;
use std::io::{Read, Write as _};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::backend::{Backend, BackendRegistry, CasFn};
use crate::codec::{Codec, CodecRegistry};
use crate::error::DurableRefError;
use crate::opts::{DeleteOpts, ReadOpts, SharedOpts, WriteOpts};
use crate::reference::Registry;

struct Entry {
    bytes: Vec<u8>,
    edition: u64,
}

/// A process-local, in-memory [`Backend`] keyed by inner URI. Implements
/// the full optional capability set, so it exercises all three mutable
/// reference kinds.
#[derive(Default)]
pub struct MemoryBackend {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryBackend {
    /// An empty backend.
    pub fn new() -> Self {
        Self::default()
    }
}

#[derive(Debug, thiserror::Error)]
#[error("cas conflict: {0}")]
struct CasConflict(String);

#[async_trait]
impl Backend for MemoryBackend {
    async fn read(&self, inner_uri: &str, _opts: &ReadOpts) -> Result<Option<Vec<u8>>, DurableRefError> {
        Ok(self.entries.lock().get(inner_uri).map(|e| e.bytes.clone()))
    }

    async fn write(&self, inner_uri: &str, bytes: Vec<u8>, _opts: &WriteOpts) -> Result<(), DurableRefError> {
        let mut entries = self.entries.lock();
        let edition = entries.get(inner_uri).map(|e| e.edition + 1).unwrap_or(0);
        entries.insert(inner_uri.to_string(), Entry { bytes, edition });
        Ok(())
    }

    async fn delete(&self, inner_uri: &str, _opts: &DeleteOpts) -> Result<(), DurableRefError> {
        self.entries.lock().remove(inner_uri);
        Ok(())
    }

    async fn resolve(&self, inner_uri: &str) -> Result<Option<(Vec<u8>, u64)>, DurableRefError> {
        Ok(self.entries.lock().get(inner_uri).map(|e| (e.bytes.clone(), e.edition)))
    }

    async fn replace(
        &self,
        inner_uri: &str,
        edition: Option<u64>,
        content: Option<Vec<u8>>,
    ) -> Result<Option<u64>, DurableRefError> {
        let mut entries = self.entries.lock();
        let current_edition = entries.get(inner_uri).map(|e| e.edition);

        match (edition, current_edition) {
            (None, Some(_)) => {
                return Err(DurableRefError::backend(CasConflict("key already exists".to_string())));
            }
            (Some(expected), Some(actual)) if expected != actual => {
                return Err(DurableRefError::backend(CasConflict("edition mismatch".to_string())));
            }
            (Some(_), None) => {
                return Err(DurableRefError::backend(CasConflict("key does not exist".to_string())));
            }
            _ => {}
        }

        match content {
            Some(bytes) => {
                let next_edition = current_edition.map(|e| e + 1).unwrap_or(0);
                entries.insert(inner_uri.to_string(), Entry { bytes, edition: next_edition });
                Ok(Some(next_edition))
            }
            None => {
                entries.remove(inner_uri);
                Ok(None)
            }
        }
    }

    async fn atomic_swap(&self, inner_uri: &str, mut f: CasFn, _opts: &SharedOpts) -> Result<Vec<u8>, DurableRefError> {
        let mut entries = self.entries.lock();
        let current = entries.get(inner_uri).map(|e| e.bytes.clone()).unwrap_or_default();
        let next = f(&current)?;
        let next_edition = entries.get(inner_uri).map(|e| e.edition + 1).unwrap_or(0);
        entries.insert(inner_uri.to_string(), Entry { bytes: next.clone(), edition: next_edition });
        Ok(next)
    }

    fn supports_resolve_replace(&self) -> bool {
        true
    }

    fn supports_native_atomic_swap(&self) -> bool {
        true
    }
}

/// Like [`MemoryBackend`], but reports no native [`Backend::atomic_swap`]
/// support -- only the edition-tagged `resolve`/`replace` pair. Registered
/// under a separate scheme so that `atomic:` references against it are
/// forced through the core's generic CAS retry loop
/// ([`crate::reference::atomic`]) instead of delegating to a backend's own
/// atomic primitive, exercising the part of the spec [`MemoryBackend`]
/// alone never reaches.
#[derive(Default)]
pub struct ResolveReplaceBackend {
    entries: Mutex<HashMap<String, Entry>>,
}

impl ResolveReplaceBackend {
    /// An empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Test-only hook: overwrite `inner_uri`'s stored bytes and bump its
    /// edition as a real writer would, synchronously and without going
    /// through [`Backend::write`]. Used from inside a synchronous CAS
    /// swap closure to deterministically force a conflict against the
    /// generic CAS retry loop.
    #[cfg(test)]
    pub(crate) fn force_write(&self, inner_uri: &str, bytes: Vec<u8>) {
        let mut entries = self.entries.lock();
        let edition = entries.get(inner_uri).map(|e| e.edition + 1).unwrap_or(0);
        entries.insert(inner_uri.to_string(), Entry { bytes, edition });
    }
}

#[async_trait]
impl Backend for ResolveReplaceBackend {
    async fn read(&self, inner_uri: &str, _opts: &ReadOpts) -> Result<Option<Vec<u8>>, DurableRefError> {
        Ok(self.entries.lock().get(inner_uri).map(|e| e.bytes.clone()))
    }

    async fn write(&self, inner_uri: &str, bytes: Vec<u8>, _opts: &WriteOpts) -> Result<(), DurableRefError> {
        let mut entries = self.entries.lock();
        let edition = entries.get(inner_uri).map(|e| e.edition + 1).unwrap_or(0);
        entries.insert(inner_uri.to_string(), Entry { bytes, edition });
        Ok(())
    }

    async fn delete(&self, inner_uri: &str, _opts: &DeleteOpts) -> Result<(), DurableRefError> {
        self.entries.lock().remove(inner_uri);
        Ok(())
    }

    async fn resolve(&self, inner_uri: &str) -> Result<Option<(Vec<u8>, u64)>, DurableRefError> {
        Ok(self.entries.lock().get(inner_uri).map(|e| (e.bytes.clone(), e.edition)))
    }

    async fn replace(
        &self,
        inner_uri: &str,
        edition: Option<u64>,
        content: Option<Vec<u8>>,
    ) -> Result<Option<u64>, DurableRefError> {
        let mut entries = self.entries.lock();
        let current_edition = entries.get(inner_uri).map(|e| e.edition);

        match (edition, current_edition) {
            (None, Some(_)) => {
                return Err(DurableRefError::backend(CasConflict("key already exists".to_string())));
            }
            (Some(expected), Some(actual)) if expected != actual => {
                return Err(DurableRefError::backend(CasConflict("edition mismatch".to_string())));
            }
            (Some(_), None) => {
                return Err(DurableRefError::backend(CasConflict("key does not exist".to_string())));
            }
            _ => {}
        }

        match content {
            Some(bytes) => {
                let next_edition = current_edition.map(|e| e + 1).unwrap_or(0);
                entries.insert(inner_uri.to_string(), Entry { bytes, edition: next_edition });
                Ok(Some(next_edition))
            }
            None => {
                entries.remove(inner_uri);
                Ok(None)
            }
        }
    }

    fn supports_resolve_replace(&self) -> bool {
        true
    }

    fn supports_native_atomic_swap(&self) -> bool {
        false
    }
}

/// Plain JSON codec, registered under the `"json"` suffix.
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode(&self, value: &serde_json::Value, _opts: &SharedOpts) -> Result<Vec<u8>, DurableRefError> {
        serde_json::to_vec(value).map_err(DurableRefError::codec)
    }

    fn decode(&self, bytes: &[u8], _opts: &SharedOpts) -> Result<serde_json::Value, DurableRefError> {
        serde_json::from_slice(bytes).map_err(DurableRefError::codec)
    }
}

/// Gzip-wrapped JSON codec, registered under the `"gz"` suffix, to
/// demonstrate the compound-suffix fallback (`edn.gz`/`json.gz` -> `gz`
/// when no codec is registered for the full compound suffix).
pub struct GzipJsonCodec;

impl Codec for GzipJsonCodec {
    fn encode(&self, value: &serde_json::Value, opts: &SharedOpts) -> Result<Vec<u8>, DurableRefError> {
        let json = JsonCodec.encode(value, opts)?;
        let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(&json).map_err(DurableRefError::codec)?;
        encoder.finish().map_err(DurableRefError::codec)
    }

    fn decode(&self, bytes: &[u8], opts: &SharedOpts) -> Result<serde_json::Value, DurableRefError> {
        let mut decoder = flate2::read::GzDecoder::new(bytes);
        let mut json = Vec::new();
        decoder.read_to_end(&mut json).map_err(DurableRefError::codec)?;
        JsonCodec.decode(&json, opts)
    }
}

/// Build a [`Registry`] wired with [`MemoryBackend`] under the `mem`
/// scheme, [`ResolveReplaceBackend`] under the `mem-cas` scheme, and
/// [`JsonCodec`]/[`GzipJsonCodec`] under the `json`/`gz` suffixes. Used by
/// this crate's own test suite and available to downstream users who
/// enable the `helpers` feature.
pub fn test_registry() -> Registry {
    let mut codecs = CodecRegistry::new();
    codecs.register("json", Arc::new(JsonCodec) as Arc<dyn Codec>);
    codecs.register("gz", Arc::new(GzipJsonCodec) as Arc<dyn Codec>);

    let mut backends = BackendRegistry::new();
    backends.register("mem", Arc::new(MemoryBackend::new()) as Arc<dyn Backend>);
    backends.register("mem-cas", Arc::new(ResolveReplaceBackend::new()) as Arc<dyn Backend>);

    Registry::new(codecs, backends)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn it_round_trips_through_memory_backend() {
        let backend = MemoryBackend::new();
        backend.write("a", b"hello".to_vec(), &WriteOpts::default()).await.unwrap();
        let read = backend.read("a", &ReadOpts::default()).await.unwrap();
        assert_eq!(read, Some(b"hello".to_vec()));
    }

    #[tokio::test]
    async fn it_rejects_replace_on_edition_mismatch() {
        let backend = MemoryBackend::new();
        backend.write("a", b"v1".to_vec(), &WriteOpts::default()).await.unwrap();
        let (_, edition) = backend.resolve("a").await.unwrap().unwrap();
        let err = backend.replace("a", Some(edition + 1), Some(b"v2".to_vec())).await.unwrap_err();
        assert!(matches!(err, DurableRefError::BackendError(_)));
    }

    #[tokio::test]
    async fn it_deletes_idempotently_via_replace() {
        let backend = MemoryBackend::new();
        assert_eq!(backend.replace("missing", None, None).await.unwrap(), None);
    }

    #[tokio::test]
    async fn it_reports_resolve_replace_only() {
        let backend = ResolveReplaceBackend::new();
        assert!(backend.supports_resolve_replace());
        assert!(!backend.supports_native_atomic_swap());
        let err = backend
            .atomic_swap("a", Box::new(|_: &[u8]| Ok(Vec::new())), &SharedOpts::default())
            .await
            .unwrap_err();
        assert!(matches!(err, DurableRefError::UnsupportedOperation { .. }));
    }

    #[tokio::test]
    async fn it_round_trips_and_cas_via_resolve_replace_backend() {
        let backend = ResolveReplaceBackend::new();
        backend.write("a", b"v1".to_vec(), &WriteOpts::default()).await.unwrap();
        let (bytes, edition) = backend.resolve("a").await.unwrap().unwrap();
        assert_eq!(bytes, b"v1");
        backend.replace("a", Some(edition), Some(b"v2".to_vec())).await.unwrap();
        assert_eq!(backend.read("a", &ReadOpts::default()).await.unwrap(), Some(b"v2".to_vec()));
    }

    #[test]
    fn it_round_trips_gzip_json() {
        let codec = GzipJsonCodec;
        let opts = SharedOpts::default();
        let value = serde_json::json!({"a": [1, 2, 3]});
        let encoded = codec.encode(&value, &opts).unwrap();
        let decoded = codec.decode(&encoded, &opts).unwrap();
        assert_eq!(decoded, value);
    }
}
