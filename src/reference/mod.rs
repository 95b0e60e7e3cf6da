//! Reference handles: the public surface tying URIs, codecs, backends,
//! and the intern pool together into the four reference kinds.

pub mod atomic;
pub mod readonly;
pub mod value;
pub mod volatile;

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::backend::BackendRegistry;
use crate::codec::CodecRegistry;
use crate::error::DurableRefError;
use crate::intern::InternPool;
use crate::opts::{DeleteOpts, ReadOpts, SharedOpts, WriteOpts};
use crate::uri::{Descriptor, Kind};

pub use value::persist;

/// Recover the Value reference that produced `_value`, if its decoded
/// type carries a back-link to its origin and that reference is still
/// live.
///
/// This crate's decode boundary is `serde_json::Value`/generic `T` via
/// `serde_json::from_value` (see `SPEC_FULL.md` §4), and plain owned JSON
/// values have nowhere to attach such a pointer, so this is always `None`
/// here -- the hook exists so a downstream value type that *can* carry
/// attached metadata has somewhere to plug in, per the origin back-link
/// being optional (spec.md §3, §9).
pub fn existing_ref<T>(_value: &T) -> Option<Reference> {
    None
}

/// Shared codec/backend registries and the process-wide Value intern pool.
///
/// Cheap to clone: every field is an `Arc`. Applications typically build
/// one `Registry` at startup and clone it into whatever holds their
/// references.
#[derive(Clone)]
pub struct Registry {
    /// Registered codecs, dispatched by path suffix.
    pub codecs: Arc<CodecRegistry>,
    /// Registered backends, dispatched by inner URI scheme.
    pub backends: Arc<BackendRegistry>,
    pub(crate) intern: Arc<InternPool<value::ValueCache>>,
}

impl Registry {
    /// Build a registry from a codec registry and a backend registry.
    pub fn new(codecs: CodecRegistry, backends: BackendRegistry) -> Self {
        Self {
            codecs: Arc::new(codecs),
            backends: Arc::new(backends),
            intern: Arc::new(InternPool::new()),
        }
    }
}

#[derive(Clone)]
enum State {
    Value(Arc<value::ValueCache>),
    Volatile,
    Atomic,
    ReadOnly,
}

/// A single durable reference. Which operations are available depends on
/// its [`Kind`]; calling an operation an instance's kind does not support
/// returns [`DurableRefError::ReadOnly`] or
/// [`DurableRefError::UnsupportedOperation`].
#[derive(Clone)]
pub struct Reference {
    uri: Descriptor,
    registry: Registry,
    state: State,
}

impl Reference {
    /// Parse `uri` and build a reference handle for it.
    pub fn open(uri: &str, registry: Registry) -> Result<Self, DurableRefError> {
        let descriptor = Descriptor::parse(uri)?;
        Self::from_descriptor(descriptor, registry)
    }

    pub(crate) fn from_descriptor(uri: Descriptor, registry: Registry) -> Result<Self, DurableRefError> {
        let state = match uri.kind() {
            Kind::Value => {
                let key = uri.to_string();
                let cache = registry.intern.get_or_insert_with(&key, value::ValueCache::new);
                State::Value(cache)
            }
            Kind::Volatile => State::Volatile,
            Kind::Atomic => State::Atomic,
            Kind::ReadOnly => State::ReadOnly,
        };
        Ok(Reference { uri, registry, state })
    }

    /// The normalized, lowercase reference URI.
    pub fn uri(&self) -> String {
        self.uri.to_string()
    }

    /// The kind this reference was classified as.
    pub fn kind(&self) -> Kind {
        self.uri.kind()
    }

    /// `true` for [`Kind::Value`] and [`Kind::ReadOnly`].
    pub fn is_read_only(&self) -> bool {
        matches!(self.uri.kind(), Kind::Value | Kind::ReadOnly)
    }

    /// Read and decode the current value.
    ///
    /// For [`Kind::Value`], this populates (or reuses) the shared,
    /// interned cache and verifies the SHA-1 checksum embedded in the URI.
    /// For every other kind, this reads the backend directly, uncached.
    pub async fn deref<T: DeserializeOwned>(&self, opts: &ReadOpts) -> Result<T, DurableRefError> {
        let json = match &self.state {
            State::Value(cache) => value::deref(&self.uri, &self.registry, cache, opts).await?,
            State::Volatile | State::Atomic | State::ReadOnly => {
                volatile::deref(&self.uri, &self.registry, opts).await?
            }
        };
        serde_json::from_value(json).map_err(DurableRefError::codec)
    }

    /// Unconditionally overwrite the value. [`Kind::Volatile`] and
    /// [`Kind::Atomic`] both support this (for Atomic it bypasses
    /// compare-and-swap, same as [`Reference::reset`]); every other kind
    /// returns [`DurableRefError::ReadOnly`].
    pub async fn overwrite<T: Serialize>(&self, value: T, opts: &WriteOpts) -> Result<(), DurableRefError> {
        match &self.state {
            State::Volatile | State::Atomic => {
                let json = serde_json::to_value(value).map_err(DurableRefError::codec)?;
                volatile::overwrite(&self.uri, &self.registry, json, opts).await
            }
            _ => Err(DurableRefError::ReadOnly { uri: self.uri.to_string() }),
        }
    }

    /// Delete the value. Idempotent: deleting an already-absent value is
    /// not an error. [`Kind::Volatile`] and [`Kind::Atomic`] both support
    /// this.
    pub async fn delete(&self, opts: &DeleteOpts) -> Result<(), DurableRefError> {
        match &self.state {
            State::Volatile | State::Atomic => volatile::delete(&self.uri, &self.registry, opts).await,
            _ => Err(DurableRefError::ReadOnly { uri: self.uri.to_string() }),
        }
    }

    /// Unconditionally overwrite the value, bypassing compare-and-swap.
    /// Only [`Kind::Atomic`] supports this.
    pub async fn reset<T: Serialize>(&self, value: T, opts: &WriteOpts) -> Result<(), DurableRefError> {
        match &self.state {
            State::Atomic => {
                let json = serde_json::to_value(value).map_err(DurableRefError::codec)?;
                atomic::reset(&self.uri, &self.registry, json, opts).await
            }
            _ => Err(DurableRefError::UnsupportedOperation {
                uri: self.uri.to_string(),
                operation: "reset".to_string(),
            }),
        }
    }

    /// Atomically read-modify-write the value: `f` is applied to the
    /// current value and the result is stored, retrying against
    /// concurrent writers as needed. Only [`Kind::Atomic`] supports this.
    pub async fn atomic_swap<T, F>(&self, f: F, opts: &SharedOpts) -> Result<T, DurableRefError>
    where
        T: Serialize + DeserializeOwned,
        F: FnMut(T) -> T + Send,
    {
        match &self.state {
            State::Atomic => atomic::atomic_swap(&self.uri, &self.registry, f, opts).await,
            _ => Err(DurableRefError::UnsupportedOperation {
                uri: self.uri.to_string(),
                operation: "atomic_swap".to_string(),
            }),
        }
    }

    /// Drop the cached decoded value, if any. The next `deref` from any
    /// live reference to the same URI re-fetches from the backend. A
    /// no-op for every kind but [`Kind::Value`].
    pub fn evict(&self) {
        if let State::Value(cache) = &self.state {
            cache.evict();
        }
    }
}

impl PartialEq for Reference {
    fn eq(&self, other: &Self) -> bool {
        self.uri == other.uri
    }
}

impl Eq for Reference {}

impl std::hash::Hash for Reference {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.uri.hash(state);
    }
}

impl std::fmt::Debug for Reference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reference").field("uri", &self.uri.to_string()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> Registry {
        crate::helpers::test_registry()
    }

    #[tokio::test]
    async fn it_rejects_mutation_on_value_kind() {
        let reg = registry();
        let value_ref = persist("mem://bucket/x.json", serde_json::json!({"a": 1}), &reg, &WriteOpts::default())
            .await
            .unwrap();
        let err = value_ref.overwrite(serde_json::json!({"a": 2}), &WriteOpts::default()).await.unwrap_err();
        assert!(matches!(err, DurableRefError::ReadOnly { .. }));
    }

    #[tokio::test]
    async fn it_equates_references_by_uri_and_kind_only() {
        let reg = registry();
        let a = Reference::open("value:mem://bucket/abc.json", reg.clone()).unwrap();
        let b = Reference::open("VALUE:MEM://BUCKET/ABC.JSON", reg).unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn it_has_no_origin_back_link_for_plain_json_values() {
        let reg = registry();
        let r = persist("mem://bucket/x.json", serde_json::json!(1), &reg, &WriteOpts::default())
            .await
            .unwrap();
        let value: serde_json::Value = r.deref(&ReadOpts::default()).await.unwrap();
        assert!(existing_ref(&value).is_none());
    }
}
