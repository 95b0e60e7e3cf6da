use thiserror::Error;

/// The common error type used by this crate.
///
/// Every error a caller can observe from a [`Reference`](crate::Reference)
/// operation, a [`CodecRegistry`](crate::CodecRegistry) lookup, or a
/// [`BackendRegistry`](crate::BackendRegistry) lookup is one of these
/// variants. The core never swallows an error; adapter and codec failures
/// are wrapped here with their cause attached.
#[derive(Error, Debug)]
pub enum DurableRefError {
    /// The reference URI was malformed, or named an unknown kind prefix.
    #[error("invalid reference uri {uri:?}: {reason}")]
    InvalidUri {
        /// The URI that failed to parse.
        uri: String,
        /// Why it was rejected.
        reason: String,
    },

    /// No backend is registered for the inner URI's scheme.
    #[error("no backend registered for scheme {scheme:?}")]
    UnknownScheme {
        /// The unregistered scheme.
        scheme: String,
    },

    /// No codec is registered for any suffix of the path.
    #[error("no codec registered for format of path {path:?}")]
    UnknownFormat {
        /// The path whose suffix could not be resolved.
        path: String,
    },

    /// A Value reference's backend reported the bytes as absent.
    #[error("value missing at {uri:?}")]
    MissingValue {
        /// The URI that resolved to nothing.
        uri: String,
    },

    /// The SHA-1 hex of the retrieved bytes did not appear in the URI.
    #[error("checksum mismatch at {uri:?}: computed {computed}")]
    ChecksumMismatch {
        /// The URI the bytes were read from.
        uri: String,
        /// The SHA-1 hex actually computed over the bytes.
        computed: String,
    },

    /// A mutating operation was attempted on a Value or ReadOnly reference.
    #[error("{uri:?} is read-only")]
    ReadOnly {
        /// The URI of the read-only reference.
        uri: String,
    },

    /// `atomic_swap` was attempted on a non-atomic kind, or on a backend
    /// that supports neither native atomic swap nor the resolve/replace
    /// primitives the generic CAS loop needs.
    #[error("unsupported operation {operation} on {uri:?}")]
    UnsupportedOperation {
        /// The URI the operation was attempted against.
        uri: String,
        /// Name of the unsupported operation.
        operation: String,
    },

    /// An adapter-level I/O failure, with the original cause attached.
    #[error("backend error: {0}")]
    BackendError(#[source] anyhow::Error),

    /// An encode/decode failure, with the original cause attached.
    #[error("codec error: {0}")]
    CodecError(#[source] anyhow::Error),

    /// A CAS back-off hook elected to stop retrying.
    #[error("cas aborted after {attempts} attempt(s)")]
    CasAborted {
        /// Number of attempts made before the hook aborted.
        attempts: usize,
    },
}

impl DurableRefError {
    /// Wrap an arbitrary backend-adapter failure.
    pub fn backend<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::BackendError(anyhow::Error::new(error))
    }

    /// Wrap an arbitrary codec failure.
    pub fn codec<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::CodecError(anyhow::Error::new(error))
    }
}
