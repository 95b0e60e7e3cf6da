//! Volatile kind: mutable, uncached, last-writer-wins.

use crate::error::DurableRefError;
use crate::opts::{DeleteOpts, ReadOpts, WriteOpts};
use crate::uri::Descriptor;

use super::Registry;

pub(crate) async fn deref(
    uri: &Descriptor,
    registry: &Registry,
    opts: &ReadOpts,
) -> Result<serde_json::Value, DurableRefError> {
    let scheme = uri.scheme()?;
    let backend = registry.backends.resolve(scheme)?;
    let bytes = backend
        .read(uri.inner(), opts)
        .await?
        .ok_or_else(|| DurableRefError::MissingValue { uri: uri.to_string() })?;
    registry.codecs.decode(uri.last_path_segment(), &bytes, &opts.shared)
}

pub(crate) async fn overwrite(
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

pub(crate) async fn delete(uri: &Descriptor, registry: &Registry, opts: &DeleteOpts) -> Result<(), DurableRefError> {
    let scheme = uri.scheme()?;
    let backend = registry.backends.resolve(scheme)?;
    backend.delete(uri.inner(), opts).await
}
