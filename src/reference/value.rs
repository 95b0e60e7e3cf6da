//! Value kind: immutable, content-addressed, cached, interned.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Mutex;

use crate::error::DurableRefError;
use crate::opts::{ReadOpts, WriteOpts};
use crate::uri::{Descriptor, Kind};

use super::{Reference, Registry};

/// Lazily-populated decoded-value cache for one canonical Value URI.
/// Interned by URI (see [`Registry::intern`]), so every live [`Reference`]
/// to the same URI shares one cell: populate it once here, and every
/// other handle observes the cached value too.
pub struct ValueCache {
    cell: Mutex<Option<serde_json::Value>>,
}

impl ValueCache {
    pub(crate) fn new() -> Self {
        Self {
            cell: Mutex::new(None),
        }
    }

    /// A cache pre-populated with `value`, used by [`persist`] so the
    /// encoder's input doubles as the cached value and the first `deref`
    /// doesn't re-read and re-decode what was just written.
    pub(crate) fn populated(value: serde_json::Value) -> Self {
        Self {
            cell: Mutex::new(Some(value)),
        }
    }

    pub(crate) fn evict(&self) {
        if let Ok(mut guard) = self.cell.try_lock() {
            *guard = None;
        }
    }
}

/// Encode `value`, hash the encoded bytes, and derive a content-addressed
/// child URI from `base_uri` (whose final path segment supplies the
/// target format, e.g. `mem://bucket/x.edn.gz` persists in `edn.gz`
/// format). If a reference to the derived URI is already live in the
/// intern pool its bytes are already known-correct, so the backend write
/// is skipped entirely; otherwise the encoded bytes are written before
/// the new reference is interned and returned.
#[tracing::instrument(skip(value, registry, opts))]
pub async fn persist<T: Serialize>(
    base_uri: &str,
    value: T,
    registry: &Registry,
    opts: &WriteOpts,
) -> Result<Reference, DurableRefError> {
    let base = Descriptor::parse(base_uri)?;
    let json = serde_json::to_value(value).map_err(DurableRefError::codec)?;
    let format = format_of(&base);
    let encoded = registry.codecs.encode(&format_probe(&format), &json, &opts.shared)?;
    let digest = crate::hash::sha1_hex(&encoded);
    let inner = derive_inner(&base, &digest, &format);
    let child_uri = Descriptor::from_parts(Kind::Value, inner.clone());
    let key = child_uri.to_string();

    if let Some(cache) = registry.intern.get(&key) {
        tracing::debug!(uri = %key, "persist: uri already interned, skipping write");
        return Ok(Reference {
            uri: child_uri,
            registry: registry.clone(),
            state: super::State::Value(cache),
        });
    }

    let scheme = child_uri.scheme()?;
    let backend = registry.backends.resolve(scheme)?;
    backend.write(&inner, encoded, opts).await?;

    let cache = registry.intern.get_or_insert_with(&key, || ValueCache::populated(json));
    Ok(Reference {
        uri: child_uri,
        registry: registry.clone(),
        state: super::State::Value(cache),
    })
}

/// Read (if not already cached), verify, and decode the value behind a
/// Value reference's canonical URI.
pub(crate) async fn deref(
    uri: &Descriptor,
    registry: &Registry,
    cache: &Arc<ValueCache>,
    opts: &ReadOpts,
) -> Result<serde_json::Value, DurableRefError> {
    let mut guard = cache.cell.lock().await;
    if !opts.shared.consistent {
        if let Some(value) = guard.as_ref() {
            return Ok(value.clone());
        }
    }

    let scheme = uri.scheme()?;
    let backend = registry.backends.resolve(scheme)?;
    let bytes = backend
        .read(uri.inner(), opts)
        .await?
        .ok_or_else(|| DurableRefError::MissingValue { uri: uri.to_string() })?;

    let digest = crate::hash::sha1_hex(&bytes);
    if !uri.last_path_segment().starts_with(&digest) {
        tracing::warn!(uri = %uri.to_string(), computed = %digest, "checksum mismatch");
        return Err(DurableRefError::ChecksumMismatch {
            uri: uri.to_string(),
            computed: digest,
        });
    }

    let decoded = registry.codecs.decode(uri.last_path_segment(), &bytes, &opts.shared)?;
    *guard = Some(decoded.clone());
    Ok(decoded)
}

/// Extract the format (everything after the first dot-group) from
/// `base`'s final path segment.
fn format_of(base: &Descriptor) -> String {
    let segment = base.last_path_segment();
    match segment.split_once('.') {
        Some((_, format)) => format.to_string(),
        None => segment.to_string(),
    }
}

/// Build a throwaway path with `format` as its suffix, for codec
/// resolution purposes only (the hash prefix is irrelevant to suffix
/// matching).
fn format_probe(format: &str) -> String {
    format!("x.{format}")
}

/// Replace the final path segment of `base`'s inner URI with
/// `<digest>.<format>`, keeping the directory portion intact.
fn derive_inner(base: &Descriptor, digest: &str, format: &str) -> String {
    let inner = base.inner();
    match inner.rfind('/') {
        Some(idx) => format!("{}/{digest}.{format}", &inner[..idx]),
        None => format!("{digest}.{format}"),
    }
}
