//! URI-addressed durable references over pluggable codecs and storage
//! backends.
//!
//! A reference is a URI of the form `<kind>:<inner-uri>` (or a bare
//! inner URI, for the degenerate read-only kind). The `<kind>` selects
//! one of three active behaviors:
//!
//! - [`uri::Kind::Value`] — immutable, content-addressed by SHA-1,
//!   cached, and interned process-wide so every live reference to the
//!   same URI shares one decoded value.
//! - [`uri::Kind::Volatile`] — mutable, uncached, last-writer-wins.
//! - [`uri::Kind::Atomic`] — mutable, uncached, compare-and-swap.
//!
//! Concrete storage (an [`backend::Backend`]) and encoding
//! (a [`codec::Codec`]) are pluggable, registered by string key in a
//! [`backend::BackendRegistry`] and [`codec::CodecRegistry`] respectively,
//! and bundled together with the process-wide intern pool in a
//! [`reference::Registry`].
//!
//! ```no_run
//! # #[cfg(feature = "helpers")]
//! # async fn example() -> Result<(), durable_ref::DurableRefError> {
//! use durable_ref::{opts::{ReadOpts, WriteOpts}, reference::{persist, Reference}};
//!
//! let registry = durable_ref::helpers::test_registry();
//! let value = persist("mem://bucket/x.json", serde_json::json!({"hello": "world"}), &registry, &WriteOpts::default()).await?;
//! let back: serde_json::Value = value.deref(&ReadOpts::default()).await?;
//! assert_eq!(back, serde_json::json!({"hello": "world"}));
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod codec;
pub mod error;
pub mod hash;
pub mod intern;
pub mod opts;
pub mod reference;
pub mod uri;

#[cfg(any(test, feature = "helpers"))]
pub mod helpers;

pub use error::DurableRefError;
pub use reference::{existing_ref, persist, Reference, Registry};
pub use uri::{Descriptor, Kind};
