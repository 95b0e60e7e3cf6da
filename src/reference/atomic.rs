//! Atomic kind: mutable, uncached, compare-and-swap.
//!
//! Prefers a backend's native [`Backend::atomic_swap`][crate::backend::Backend::atomic_swap]
//! when available. Otherwise falls back to a generic optimistic
//! read-modify-write loop built on the edition-tagged
//! [`Backend::resolve`][crate::backend::Backend::resolve]/[`Backend::replace`][crate::backend::Backend::replace]
//! pair, retrying on conflict until the write succeeds or the caller's
//! back-off hook aborts it.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::backend::Backend;
use crate::error::DurableRefError;
use crate::opts::{SharedOpts, WriteOpts};
use crate::uri::Descriptor;

use super::Registry;

pub(crate) async fn reset(
    uri: &Descriptor,
    registry: &Registry,
    value: serde_json::Value,
    opts: &WriteOpts,
) -> Result<(), DurableRefError> {
    let scheme = uri.scheme()?;
    let backend = registry.backends.resolve(scheme)?;
    let encoded = registry.codecs.encode(uri.last_path_segment(), &value, &opts.shared)?;
    backend.write(uri.inner(), encoded, opts).await
}

pub(crate) async fn atomic_swap<T, F>(
    uri: &Descriptor,
    registry: &Registry,
    mut f: F,
    opts: &SharedOpts,
) -> Result<T, DurableRefError>
where
    T: Serialize + DeserializeOwned,
    F: FnMut(T) -> T + Send,
{
    let scheme = uri.scheme()?;
    let backend = registry.backends.resolve(scheme)?;
    let path = uri.last_path_segment().to_string();
    let inner = uri.inner().to_string();

    if backend.supports_native_atomic_swap() {
        return native_atomic_swap(backend.as_ref(), registry, &inner, &path, f, opts).await;
    }

    if !backend.supports_resolve_replace() {
        return Err(DurableRefError::UnsupportedOperation {
            uri: uri.to_string(),
            operation: "atomic_swap".to_string(),
        });
    }

    generic_cas_loop(backend.as_ref(), registry, &inner, &path, &mut f, opts).await
}

async fn native_atomic_swap<T, F>(
    backend: &dyn Backend,
    registry: &Registry,
    inner: &str,
    path: &str,
    mut f: F,
    opts: &SharedOpts,
) -> Result<T, DurableRefError>
where
    T: Serialize + DeserializeOwned,
    F: FnMut(T) -> T + Send,
{
    let codecs = registry.codecs.clone();
    let path_owned = path.to_string();
    let opts_owned = opts.clone();

    let raw = backend
        .atomic_swap(
            inner,
            Box::new(move |current: &[u8]| -> Result<Vec<u8>, DurableRefError> {
                let decoded_json = if current.is_empty() {
                    serde_json::Value::Null
                } else {
                    codecs.decode(&path_owned, current, &opts_owned)?
                };
                let decoded: T = serde_json::from_value(decoded_json).map_err(DurableRefError::codec)?;
                let next = f(decoded);
                let next_json = serde_json::to_value(next).map_err(DurableRefError::codec)?;
                codecs.encode(&path_owned, &next_json, &opts_owned)
            }),
            opts,
        )
        .await?;

    let decoded = registry.codecs.decode(path, &raw, opts)?;
    serde_json::from_value(decoded).map_err(DurableRefError::codec)
}

async fn generic_cas_loop<T, F>(
    backend: &dyn Backend,
    registry: &Registry,
    inner: &str,
    path: &str,
    f: &mut F,
    opts: &SharedOpts,
) -> Result<T, DurableRefError>
where
    T: Serialize + DeserializeOwned,
    F: FnMut(T) -> T + Send,
{
    let mut attempt = 0usize;
    loop {
        if attempt > 0 {
            if let Some(backoff) = &opts.cas_backoff {
                backoff(attempt)?;
            }
            tracing::warn!(uri = inner, attempt, "atomic_swap: cas conflict, retrying");
        }

        let current = backend.resolve(inner).await?;
        let (current_bytes, edition) = match current {
            Some((bytes, edition)) => (bytes, Some(edition)),
            None => (Vec::new(), None),
        };

        let decoded_json = if current_bytes.is_empty() {
            serde_json::Value::Null
        } else {
            registry.codecs.decode(path, &current_bytes, opts)?
        };
        let decoded: T = serde_json::from_value(decoded_json).map_err(DurableRefError::codec)?;
        let next = f(decoded);
        let next_json = serde_json::to_value(&next).map_err(DurableRefError::codec)?;
        let next_bytes = registry.codecs.encode(path, &next_json, opts)?;

        if next_bytes == current_bytes {
            tracing::debug!(uri = inner, "atomic_swap: no-op, skipping write");
            return Ok(next);
        }

        match backend.replace(inner, edition, Some(next_bytes)).await {
            Ok(_) => return Ok(next),
            Err(_conflict) => {
                attempt += 1;
                continue;
            }
        }
    }
}
