//! ReadOnly kind: a bare inner URI with no kind prefix.
//!
//! Behaves like [`super::volatile`] for reads (uncached, no checksum to
//! verify) but accepts none of the mutating operations; every write,
//! delete, reset, or swap attempt returns [`DurableRefError::ReadOnly`]
//! or [`DurableRefError::UnsupportedOperation`] via the dispatch in
//! [`super::Reference`]. This module exists to document that contract;
//! the read path is shared with [`super::volatile::deref`].

#[cfg(test)]
mod tests {
    use crate::opts::{DeleteOpts, ReadOpts, SharedOpts, WriteOpts};
    use crate::reference::Reference;

    fn registry() -> crate::reference::Registry {
        crate::helpers::test_registry()
    }

    #[tokio::test]
    async fn it_reads_a_bare_uri() {
        let reg = registry();
        let volatile = Reference::open("volatile:mem://bucket/x.json", reg.clone()).unwrap();
        volatile.overwrite(serde_json::json!("hi"), &WriteOpts::default()).await.unwrap();

        let read_only = Reference::open("mem://bucket/x.json", reg).unwrap();
        let value: String = read_only.deref(&ReadOpts::default()).await.unwrap();
        assert_eq!(value, "hi");
    }

    #[tokio::test]
    async fn it_rejects_every_mutating_operation() {
        let reg = registry();
        let r = Reference::open("mem://bucket/x.json", reg).unwrap();

        assert!(r.overwrite(serde_json::json!(1), &WriteOpts::default()).await.is_err());
        assert!(r.delete(&DeleteOpts::default()).await.is_err());
        assert!(r.reset(serde_json::json!(1), &WriteOpts::default()).await.is_err());
        assert!(r.atomic_swap::<i64, _>(|v| v + 1, &SharedOpts::default()).await.is_err());
    }
}
