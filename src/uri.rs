//! Parsing and classification of reference URIs.
//!
//! A reference URI has the shape `<kind>:<inner-uri>`, where `<kind>` is
//! one of `value`, `volatile`, `atomic`, or is simply absent (a bare inner
//! URI, denoting a read-only reference). See the crate-level documentation
//! for the full grammar.

use crate::error::DurableRefError;

/// The kind prefix of a reference URI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    /// Immutable, content-addressed, cached, interned.
    Value,
    /// Mutable, uncached, no coordination between writers.
    Volatile,
    /// Mutable, uncached, compare-and-swap.
    Atomic,
    /// Bare inner URI; read-only.
    ReadOnly,
}

impl Kind {
    fn as_prefix(self) -> Option<&'static str> {
        match self {
            Kind::Value => Some("value"),
            Kind::Volatile => Some("volatile"),
            Kind::Atomic => Some("atomic"),
            Kind::ReadOnly => None,
        }
    }

    fn parse_prefix(prefix: &str) -> Option<Kind> {
        match prefix {
            "value" => Some(Kind::Value),
            "volatile" => Some(Kind::Volatile),
            "atomic" => Some(Kind::Atomic),
            _ => None,
        }
    }
}

/// A parsed, normalized reference URI.
///
/// Re-parsing [`Descriptor::to_string`]'s output always yields an equal
/// [`Descriptor`] (spec property 3: URI idempotence).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Descriptor {
    kind: Kind,
    /// The inner URI, stripped of the kind prefix, always lowercase.
    inner: String,
}

impl Descriptor {
    /// Parse a reference URI string into a [`Descriptor`].
    ///
    /// The whole string is lowercased before any further processing, so the
    /// original case of user input is never preserved across re-parsing.
    pub fn parse(uri: &str) -> Result<Self, DurableRefError> {
        let lower = uri.to_lowercase();

        if let Some((kind, rest)) = split_kind_prefix(&lower) {
            if rest.is_empty() {
                return Err(DurableRefError::InvalidUri {
                    uri: uri.to_string(),
                    reason: "missing inner uri".to_string(),
                });
            }
            if kind == Kind::Value && !has_valid_content_hash(rest) {
                return Err(DurableRefError::InvalidUri {
                    uri: uri.to_string(),
                    reason: "value uri's last path segment must start with a 40 lowercase hex digit sha1"
                        .to_string(),
                });
            }
            return Ok(Descriptor {
                kind,
                inner: rest.to_string(),
            });
        }

        if lower.is_empty() {
            return Err(DurableRefError::InvalidUri {
                uri: uri.to_string(),
                reason: "empty uri".to_string(),
            });
        }

        Ok(Descriptor {
            kind: Kind::ReadOnly,
            inner: lower,
        })
    }

    /// The kind this descriptor was classified as.
    pub fn kind(&self) -> Kind {
        self.kind
    }

    /// The inner URI (kind prefix stripped; identity for [`Kind::ReadOnly`]).
    pub fn inner(&self) -> &str {
        &self.inner
    }

    /// The inner scheme, i.e. the component of the inner URI before the
    /// first `:`.
    pub fn scheme(&self) -> Result<&str, DurableRefError> {
        self.inner
            .split_once(':')
            .map(|(scheme, _)| scheme)
            .ok_or_else(|| DurableRefError::InvalidUri {
                uri: self.to_string(),
                reason: "inner uri has no scheme".to_string(),
            })
    }

    /// The last `/`-delimited path segment of the inner URI, which for
    /// Value references must be `<40 lowercase hex digits>.<format>`.
    pub fn last_path_segment(&self) -> &str {
        self.inner.rsplit('/').next().unwrap_or(&self.inner)
    }

    /// Build a [`Descriptor`] directly from parts, bypassing string parsing.
    /// Used internally when deriving a content-addressed child URI.
    pub(crate) fn from_parts(kind: Kind, inner: String) -> Self {
        Descriptor { kind, inner }
    }
}

impl std::fmt::Display for Descriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.kind.as_prefix() {
            Some(prefix) => write!(f, "{prefix}:{}", self.inner),
            None => write!(f, "{}", self.inner),
        }
    }
}

/// Split `text` into a `(kind, rest)` pair at the first `:`, but only if
/// the portion before the `:` is literally one of the three kind tokens
/// (`value`, `volatile`, `atomic`). Any other pre-colon text -- including
/// an ordinary inner-URI scheme like `mem`, `file`, `s3`, `redis`,
/// `dynamodb` -- is not a kind prefix at all, and `None` here means the
/// caller falls through to treating the whole string as a bare, read-only
/// inner URI.
fn split_kind_prefix(text: &str) -> Option<(Kind, &str)> {
    let (candidate, rest) = text.split_once(':')?;
    let kind = Kind::parse_prefix(candidate)?;
    Some((kind, rest))
}

/// Whether `inner_uri`'s last path segment begins with a 40 lowercase hex
/// digit SHA-1, as required for Value kind (spec §6.1).
fn has_valid_content_hash(inner_uri: &str) -> bool {
    let segment = inner_uri.rsplit('/').next().unwrap_or(inner_uri);
    let first_group = segment.split('.').next().unwrap_or(segment);
    crate::hash::is_sha1_hex(first_group)
}

#[cfg(test)]
mod tests {
    use super::*;

    const HASH: &str = "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";

    #[test]
    fn it_parses_value_kind() {
        let uri = format!("value:mem://t/{HASH}.edn");
        let d = Descriptor::parse(&uri).unwrap();
        assert_eq!(d.kind(), Kind::Value);
        assert_eq!(d.inner(), format!("mem://t/{HASH}.edn"));
    }

    #[test]
    fn it_rejects_value_uri_without_a_valid_hash_prefix() {
        let err = Descriptor::parse("value:mem://t/not-a-hash.edn").unwrap_err();
        assert!(matches!(err, DurableRefError::InvalidUri { .. }));
    }

    #[test]
    fn it_parses_volatile_and_atomic() {
        assert_eq!(
            Descriptor::parse("volatile:mem://t/x.edn").unwrap().kind(),
            Kind::Volatile
        );
        assert_eq!(
            Descriptor::parse("atomic:mem://t/ctr.edn").unwrap().kind(),
            Kind::Atomic
        );
    }

    #[test]
    fn it_treats_bare_uri_as_read_only() {
        let d = Descriptor::parse("mem://t/x.edn").unwrap();
        assert_eq!(d.kind(), Kind::ReadOnly);
        assert_eq!(d.inner(), "mem://t/x.edn");
    }

    #[test]
    fn it_normalizes_to_lowercase() {
        let uri = format!("VALUE:MEM://T/{}.EDN", HASH.to_uppercase());
        let d = Descriptor::parse(&uri).unwrap();
        assert_eq!(d.to_string(), format!("value:mem://t/{HASH}.edn"));
    }

    #[test]
    fn it_treats_a_non_kind_prefix_as_part_of_a_bare_inner_uri() {
        // "bogus" isn't one of the three kind tokens, so the whole string
        // is a bare, read-only inner URI -- not an error.
        let d = Descriptor::parse("bogus:mem://t/x.edn").unwrap();
        assert_eq!(d.kind(), Kind::ReadOnly);
        assert_eq!(d.inner(), "bogus:mem://t/x.edn");
    }

    #[test]
    fn it_rejects_empty_uri() {
        assert!(Descriptor::parse("").is_err());
    }

    #[test]
    fn it_is_idempotent_under_reparsing() {
        for uri in [
            format!("value:mem://t/{HASH}.edn"),
            "volatile:mem://t/x.edn".to_string(),
            "atomic:mem://t/ctr.edn".to_string(),
            "mem://t/x.edn".to_string(),
        ] {
            let d = Descriptor::parse(&uri).unwrap();
            let roundtripped = Descriptor::parse(&d.to_string()).unwrap();
            assert_eq!(d, roundtripped);
        }
    }

    #[test]
    fn it_extracts_scheme_and_last_segment() {
        let uri = format!("value:s3://bucket/a/b/{HASH}.edn.gz");
        let d = Descriptor::parse(&uri).unwrap();
        assert_eq!(d.scheme().unwrap(), "s3");
        assert_eq!(d.last_path_segment(), format!("{HASH}.edn.gz"));
    }

    proptest::proptest! {
        #[test]
        fn it_is_idempotent_for_any_scheme_and_path(
            scheme in "[a-z][a-z0-9]{1,8}",
            path in "[a-z0-9/]{1,16}",
            ext in "[a-z]{1,4}",
        ) {
            for kind in ["volatile", "atomic"] {
                let uri = format!("{kind}:{scheme}://bucket/{path}.{ext}");
                let d = Descriptor::parse(&uri).unwrap();
                let roundtripped = Descriptor::parse(&d.to_string()).unwrap();
                prop_assert_eq!(d, roundtripped);
            }
        }

        #[test]
        fn it_is_idempotent_for_value_kind_with_a_valid_hash(
            scheme in "[a-z][a-z0-9]{1,8}",
            ext in "[a-z]{1,4}",
        ) {
            let uri = format!("value:{scheme}://bucket/{HASH}.{ext}");
            let d = Descriptor::parse(&uri).unwrap();
            let roundtripped = Descriptor::parse(&d.to_string()).unwrap();
            prop_assert_eq!(d, roundtripped);
        }
    }
}
