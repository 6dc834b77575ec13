//! Marker scanner: builds the worklist for one invocation.
//!
//! An object qualifies when it sits under the source prefix, is not in an
//! archive sub-path, matches the filename pattern, and has neither a good
//! nor a bad marker. The existence check is the idempotency gate: a
//! previously successful or previously failed attempt is never silently
//! retried; operators clear the bad marker to force one.

use diagnostics::{log_debug, log_info};
use store::{ObjectMeta, ObjectStore};

use crate::config::FeedConfig;
use crate::error::DiscoveryError;
use crate::keys;

/// Scan the source prefix and return the ordered worklist.
///
/// Under `truncate` the result is at most the single most recently
/// modified match (latest snapshot wins); otherwise all matches in
/// ascending last-modified order, capped at `file_limit` when set. An
/// empty result is a normal no-op, not a failure.
pub fn scan(store: &dyn ObjectStore, config: &FeedConfig) -> Result<Vec<ObjectMeta>, DiscoveryError> {
    let pattern = config.doc_pattern()?;
    let prefix = config.source_prefix();

    let mut candidates = store.list(&prefix)?;
    candidates.sort_by_key(|meta| meta.last_modified);

    let mut selected: Vec<ObjectMeta> = Vec::new();
    for meta in candidates {
        if !config.truncate {
            if let Some(limit) = config.file_limit {
                if selected.len() == limit {
                    log_info!("reached file limit of {limit}");
                    break;
                }
            }
        }
        if keys::in_archive(&meta.key) {
            continue;
        }
        if !pattern.is_match(&meta.key) {
            continue;
        }
        if is_marked(store, config, &meta.key)? {
            continue;
        }

        if config.truncate {
            // latest snapshot wins
            match selected.first() {
                None => selected.push(meta),
                Some(current) if meta.last_modified > current.last_modified => {
                    selected[0] = meta;
                }
                Some(_) => {}
            }
        } else {
            selected.push(meta);
        }
    }

    Ok(selected)
}

fn is_marked(
    store: &dyn ObjectStore,
    config: &FeedConfig,
    key: &str,
) -> Result<bool, DiscoveryError> {
    let probe = |marker: String| -> Result<bool, DiscoveryError> {
        store.exists(&marker).map_err(|source| DiscoveryError::Probe {
            key: marker,
            source,
        })
    };

    if probe(keys::good_key(&config.destination, key))? {
        log_debug!("{key} was processed as good already");
        return Ok(true);
    }
    if probe(keys::bad_key(&config.destination, key))? {
        log_debug!("{key} was processed as bad already");
        return Ok(true);
    }
    Ok(false)
}
