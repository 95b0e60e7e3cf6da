//! Typed option structs passed to backend and codec operations.

use std::sync::Arc;

/// Credentials handed opaquely to a backend; the core never inspects these.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    /// Backend-specific token, key id, connection string, or similar.
    pub token: Option<String>,
}

/// Options shared by every operation, regardless of reference kind.
#[derive(Clone, Default)]
pub struct SharedOpts {
    /// Credentials to hand to the backend for this call.
    pub credentials: Credentials,
    /// When `true`, a Value reference's `deref` bypasses its cache and
    /// re-reads the backend even if a cached decoded value is present.
    pub consistent: bool,
    /// Invoked before each retry of the Atomic generic CAS loop, with the
    /// zero-based attempt number that is about to run. Returning `Err`
    /// aborts the loop and propagates that error to the caller.
    pub cas_backoff: Option<Arc<dyn Fn(usize) -> Result<(), crate::error::DurableRefError> + Send + Sync>>,
}

impl std::fmt::Debug for SharedOpts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedOpts")
            .field("credentials", &self.credentials)
            .field("consistent", &self.consistent)
            .field("cas_backoff", &self.cas_backoff.is_some())
            .finish()
    }
}

/// Options for a read (`deref`) operation.
#[derive(Debug, Clone, Default)]
pub struct ReadOpts {
    /// Options shared with every other operation kind.
    pub shared: SharedOpts,
}

/// Options for a write (`persist`, `overwrite`, `reset`) operation.
#[derive(Debug, Clone, Default)]
pub struct WriteOpts {
    /// Options shared with every other operation kind.
    pub shared: SharedOpts,
}

/// Options for a `delete` operation.
#[derive(Debug, Clone, Default)]
pub struct DeleteOpts {
    /// Options shared with every other operation kind.
    pub shared: SharedOpts,
}
