//! Outcome archiver: the durable record the next scan relies on.
//!
//! The input object is copied (never moved) to its good or bad marker key.
//! A failed marker write is the most severe error in the pipeline: losing
//! it would make the next run reprocess an object whose data may already
//! be committed.

use diagnostics::{log_info, log_warn};
use store::ObjectStore;

use crate::error::ArchiveError;
use crate::keys;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Good,
    Bad,
}

pub struct Archiver<'a> {
    store: &'a dyn ObjectStore,
    destination: &'a str,
}

impl<'a> Archiver<'a> {
    pub fn new(store: &'a dyn ObjectStore, destination: &'a str) -> Self {
        Archiver { store, destination }
    }

    /// Copy `key` to its marker path and return the marker key.
    pub fn archive(&self, key: &str, outcome: Outcome) -> Result<String, ArchiveError> {
        let marker = match outcome {
            Outcome::Good => keys::good_key(self.destination, key),
            Outcome::Bad => keys::bad_key(self.destination, key),
        };
        self.store
            .copy(key, &marker)
            .map_err(|source| ArchiveError::Copy {
                key: key.to_string(),
                source,
            })?;
        log_info!("archived {key} as {marker}");
        Ok(marker)
    }

    /// Compensate for a mid-batch failure: objects already archived good
    /// in this run are re-marked bad and their good markers removed, so an
    /// all-or-nothing batch never records a partial success. This spans
    /// the object store, not a warehouse transaction.
    pub fn walk_back(&self, good_keys: &[String]) -> Result<(), ArchiveError> {
        for key in good_keys.iter().rev() {
            log_warn!("walking back good outcome for {key}");
            self.archive(key, Outcome::Bad)?;
            let stale = keys::good_key(self.destination, key);
            self.store
                .delete(&stale)
                .map_err(|source| ArchiveError::Delete { key: stale, source })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use store::MemoryStore;

    #[test]
    fn archive_copies_and_leaves_the_original() {
        let store = MemoryStore::new();
        store.put("in/d/x.csv", b"1,a\n").unwrap();

        let archiver = Archiver::new(&store, "dest");
        let marker = archiver.archive("in/d/x.csv", Outcome::Good).unwrap();

        assert_eq!(marker, "dest/good/in/d/x.csv");
        assert!(store.exists("dest/good/in/d/x.csv").unwrap());
        assert!(store.exists("in/d/x.csv").unwrap());
    }

    #[test]
    fn archive_of_missing_object_fails_loudly() {
        let store = MemoryStore::new();
        let archiver = Archiver::new(&store, "dest");
        let err = archiver.archive("in/d/absent.csv", Outcome::Bad).unwrap_err();
        assert!(matches!(err, ArchiveError::Copy { .. }));
    }

    #[test]
    fn walk_back_flips_good_to_bad_with_no_double_marker() {
        let store = MemoryStore::new();
        store.put("in/d/a.csv", b"1,a\n").unwrap();
        let archiver = Archiver::new(&store, "dest");
        archiver.archive("in/d/a.csv", Outcome::Good).unwrap();

        archiver.walk_back(&["in/d/a.csv".to_string()]).unwrap();

        assert!(store.exists("dest/bad/in/d/a.csv").unwrap());
        assert!(!store.exists("dest/good/in/d/a.csv").unwrap());
    }
}
