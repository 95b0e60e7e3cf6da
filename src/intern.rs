//! Process-wide, weak-keyed interning pool.
//!
//! Mirrors the teacher's `Cells` weak-reference cache: entries are held
//! weakly, so a reference that is no longer held by any caller silently
//! drops out of the pool instead of pinning memory forever. Dead entries
//! are pruned opportunistically whenever the pool is touched.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};

/// A weak-keyed pool of `Arc<T>` values, canonicalized by a `String` key.
pub struct InternPool<T> {
    entries: Mutex<HashMap<String, Weak<T>>>,
}

impl<T> Default for InternPool<T> {
    fn default() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }
}

impl<T> InternPool<T> {
    /// An empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the live interned value for `key`, if one still exists.
    pub fn get(&self, key: &str) -> Option<Arc<T>> {
        let entries = self.entries.lock().expect("intern pool lock poisoned");
        entries.get(key).and_then(Weak::upgrade)
    }

    /// Return the live interned value for `key`, or build and insert one
    /// with `make` if none is live. Concurrent calls may both run `make`;
    /// the loser's value is dropped and the winner's is returned, so `make`
    /// should be cheap and side-effect free beyond constructing `T`.
    pub fn get_or_insert_with(&self, key: &str, make: impl FnOnce() -> T) -> Arc<T> {
        let mut entries = self.entries.lock().expect("intern pool lock poisoned");
        if let Some(existing) = entries.get(key).and_then(Weak::upgrade) {
            return existing;
        }
        let value = Arc::new(make());
        entries.insert(key.to_string(), Arc::downgrade(&value));
        prune(&mut entries);
        value
    }

    /// `true` if `key` currently has a live interned entry.
    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Number of live entries (forces a prune first).
    pub fn live_count(&self) -> usize {
        let mut entries = self.entries.lock().expect("intern pool lock poisoned");
        prune(&mut entries);
        entries.len()
    }
}

fn prune<T>(entries: &mut HashMap<String, Weak<T>>) {
    entries.retain(|_, weak| weak.strong_count() > 0);
}
