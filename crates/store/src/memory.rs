//! In-memory object store used by tests and dry runs.

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};

use crate::{ObjectMeta, ObjectStore, StoreError};

#[derive(Debug, Clone)]
struct Entry {
    body: Vec<u8>,
    modified: DateTime<Utc>,
}

/// A `BTreeMap`-backed store. Keys list in lexicographic order, which is
/// stable enough for tests; timestamps can be pinned via
/// [`MemoryStore::put_with_modified`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, Entry>>,
    mutations: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an object with an explicit last-modified stamp.
    pub fn put_with_modified(&self, key: &str, body: &[u8], modified: DateTime<Utc>) {
        self.mutations.fetch_add(1, Ordering::Relaxed);
        let mut entries = self.entries.lock().expect("store lock poisoned");
        entries.insert(
            key.to_string(),
            Entry {
                body: body.to_vec(),
                modified,
            },
        );
    }

    /// Number of writes (put/copy/delete) since construction. Lets tests
    /// assert that a no-op run really was a no-op.
    pub fn mutation_count(&self) -> u64 {
        self.mutations.load(Ordering::Relaxed)
    }
}

impl ObjectStore for MemoryStore {
    fn list(&self, prefix: &str) -> Result<Vec<ObjectMeta>, StoreError> {
        let entries = self.entries.lock().expect("store lock poisoned");
        Ok(entries
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(key, entry)| ObjectMeta {
                key: key.clone(),
                last_modified: entry.modified,
                size: entry.body.len() as u64,
            })
            .collect())
    }

    fn exists(&self, key: &str) -> Result<bool, StoreError> {
        let entries = self.entries.lock().expect("store lock poisoned");
        Ok(entries.contains_key(key))
    }

    fn get(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        let entries = self.entries.lock().expect("store lock poisoned");
        entries
            .get(key)
            .map(|entry| entry.body.clone())
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    fn put(&self, key: &str, body: &[u8]) -> Result<(), StoreError> {
        self.put_with_modified(key, body, Utc::now());
        Ok(())
    }

    fn copy(&self, src: &str, dst: &str) -> Result<(), StoreError> {
        let body = self.get(src)?;
        self.mutations.fetch_add(1, Ordering::Relaxed);
        let mut entries = self.entries.lock().expect("store lock poisoned");
        entries.insert(
            dst.to_string(),
            Entry {
                body,
                modified: Utc::now(),
            },
        );
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.mutations.fetch_add(1, Ordering::Relaxed);
        let mut entries = self.entries.lock().expect("store lock poisoned");
        entries
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn list_filters_by_prefix_in_key_order() {
        let store = MemoryStore::new();
        store.put("in/d/b.csv", b"2").unwrap();
        store.put("in/d/a.csv", b"1").unwrap();
        store.put("out/d/c.csv", b"3").unwrap();

        let keys: Vec<String> = store
            .list("in/")
            .unwrap()
            .into_iter()
            .map(|m| m.key)
            .collect();
        assert_eq!(keys, vec!["in/d/a.csv", "in/d/b.csv"]);
    }

    #[test]
    fn copy_duplicates_body_under_new_key() {
        let store = MemoryStore::new();
        store.put("in/x.csv", b"payload").unwrap();
        store.copy("in/x.csv", "dest/good/in/x.csv").unwrap();

        assert!(store.exists("dest/good/in/x.csv").unwrap());
        assert_eq!(store.get("dest/good/in/x.csv").unwrap(), b"payload");
        // copy, not move
        assert!(store.exists("in/x.csv").unwrap());
    }

    #[test]
    fn copy_of_missing_source_is_not_found() {
        let store = MemoryStore::new();
        assert!(matches!(
            store.copy("in/absent.csv", "dest/bad/in/absent.csv"),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn delete_removes_and_errors_on_absent() {
        let store = MemoryStore::new();
        store.put("k", b"v").unwrap();
        store.delete("k").unwrap();
        assert!(!store.exists("k").unwrap());
        assert!(matches!(store.delete("k"), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn mutation_count_tracks_writes_only() {
        let store = MemoryStore::new();
        store.put("a", b"1").unwrap();
        store.copy("a", "b").unwrap();
        let before = store.mutation_count();

        let _ = store.list("").unwrap();
        let _ = store.exists("a").unwrap();
        let _ = store.get("a").unwrap();
        assert_eq!(store.mutation_count(), before);
    }

    #[test]
    fn pinned_timestamps_survive_listing() {
        let store = MemoryStore::new();
        let t = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        store.put_with_modified("in/a.csv", b"x", t);

        let listed = store.list("in/").unwrap();
        assert_eq!(listed[0].last_modified, t);
        assert_eq!(listed[0].size, 1);
    }
}
