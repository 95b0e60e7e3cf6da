//! Pluggable storage backend registry.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::DurableRefError;
use crate::opts::{DeleteOpts, ReadOpts, SharedOpts, WriteOpts};

/// A function applied to the current bytes of an atomically-swapped cell,
/// producing the bytes to write in their place. Returning `Err` aborts the
/// swap without writing anything.
pub type CasFn = Box<dyn FnMut(&[u8]) -> Result<Vec<u8>, DurableRefError> + Send>;

/// A storage primitive addressed by inner URI.
///
/// The plain `read`/`write`/`delete` trio is mandatory. `resolve`/`replace`
/// (an edition-tagged compare-and-swap pair) and `atomic_swap` (a native
/// read-modify-write primitive) are optional; a backend that implements
/// neither leaves the Atomic reference kind unsupported for its scheme.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Read the bytes stored at `inner_uri`, or `None` if absent.
    async fn read(&self, inner_uri: &str, opts: &ReadOpts) -> Result<Option<Vec<u8>>, DurableRefError>;

    /// Write `bytes` at `inner_uri`, replacing any existing content.
    async fn write(&self, inner_uri: &str, bytes: Vec<u8>, opts: &WriteOpts) -> Result<(), DurableRefError>;

    /// Delete `inner_uri`. Deleting an absent key is not an error.
    async fn delete(&self, inner_uri: &str, opts: &DeleteOpts) -> Result<(), DurableRefError>;

    /// Read the current bytes and edition at `inner_uri`, or `None` if
    /// absent. The edition is an opaque, backend-assigned token that
    /// strictly increases across successful writes to the same key.
    async fn resolve(&self, _inner_uri: &str) -> Result<Option<(Vec<u8>, u64)>, DurableRefError> {
        Err(DurableRefError::UnsupportedOperation {
            uri: _inner_uri.to_string(),
            operation: "resolve".to_string(),
        })
    }

    /// Compare-and-swap: write `content` (or delete, if `None`) at
    /// `inner_uri` only if the current edition equals `edition`
    /// (`None` meaning "key must not currently exist"). On success,
    /// returns the new edition (`None` if the key was deleted).
    async fn replace(
        &self,
        inner_uri: &str,
        _edition: Option<u64>,
        _content: Option<Vec<u8>>,
    ) -> Result<Option<u64>, DurableRefError> {
        Err(DurableRefError::UnsupportedOperation {
            uri: inner_uri.to_string(),
            operation: "replace".to_string(),
        })
    }

    /// Native read-modify-write: apply `f` to the current bytes (`&[]` if
    /// absent) and store the result, atomically with respect to other
    /// callers of `atomic_swap` on the same key. Returns the bytes written.
    async fn atomic_swap(
        &self,
        inner_uri: &str,
        _f: CasFn,
        _opts: &SharedOpts,
    ) -> Result<Vec<u8>, DurableRefError> {
        Err(DurableRefError::UnsupportedOperation {
            uri: inner_uri.to_string(),
            operation: "atomic_swap".to_string(),
        })
    }

    /// Whether this backend overrides [`Backend::resolve`]/[`Backend::replace`].
    fn supports_resolve_replace(&self) -> bool {
        false
    }

    /// Whether this backend overrides [`Backend::atomic_swap`] natively.
    fn supports_native_atomic_swap(&self) -> bool {
        false
    }
}

/// String-keyed registry of [`Backend`] implementations, dispatched by the
/// inner URI's scheme.
#[derive(Clone, Default)]
pub struct BackendRegistry {
    backends: HashMap<String, Arc<dyn Backend>>,
}

impl BackendRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `backend` under `scheme` (e.g. `"mem"`, `"s3"`, `"file"`).
    /// A second registration under the same scheme replaces the first.
    pub fn register(&mut self, scheme: impl Into<String>, backend: Arc<dyn Backend>) {
        self.backends.insert(scheme.into(), backend);
    }

    /// Resolve the backend registered for `scheme`.
    #[tracing::instrument(skip(self))]
    pub fn resolve(&self, scheme: &str) -> Result<Arc<dyn Backend>, DurableRefError> {
        self.backends
            .get(scheme)
            .cloned()
            .ok_or_else(|| DurableRefError::UnknownScheme {
                scheme: scheme.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Noop;
    #[async_trait]
    impl Backend for Noop {
        async fn read(&self, _inner_uri: &str, _opts: &ReadOpts) -> Result<Option<Vec<u8>>, DurableRefError> {
            Ok(None)
        }
        async fn write(&self, _inner_uri: &str, _bytes: Vec<u8>, _opts: &WriteOpts) -> Result<(), DurableRefError> {
            Ok(())
        }
        async fn delete(&self, _inner_uri: &str, _opts: &DeleteOpts) -> Result<(), DurableRefError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn it_resolves_registered_scheme() {
        let mut reg = BackendRegistry::new();
        reg.register("mem", Arc::new(Noop));
        assert!(reg.resolve("mem").is_ok());
    }

    #[tokio::test]
    async fn it_errors_on_unregistered_scheme() {
        let reg = BackendRegistry::new();
        let err = reg.resolve("s3").unwrap_err();
        assert!(matches!(err, DurableRefError::UnknownScheme { .. }));
    }

    #[tokio::test]
    async fn it_defaults_unsupported_capabilities() {
        let backend = Noop;
        assert!(!backend.supports_resolve_replace());
        assert!(!backend.supports_native_atomic_swap());
        assert!(backend.resolve("mem://x").await.is_err());
    }
}
