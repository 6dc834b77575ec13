//! Run loop: one invocation of the protocol over one feed.
//!
//! SCANNING -> (EMPTY | PROCESSING); per object: transform -> load ->
//! archive. The loop is fail-fast, not best-effort: the first object that
//! cannot be fully committed-and-archived-good ends the run with a
//! non-zero exit, even if later objects would have succeeded. A scheduled
//! job simply re-runs on its next interval, and the markers make the
//! re-run skip everything already settled.

use diagnostics::{log_debug, log_error, log_info};
use store::{ObjectMeta, ObjectStore, StoreError};
use thiserror::Error;

use crate::archiver::{Archiver, Outcome};
use crate::config::FeedConfig;
use crate::error::{ArchiveError, DiscoveryError};
use crate::keys;
use crate::loader::{LoadSpec, SwapLoader};
use crate::report::RunReport;
use crate::scanner;
use crate::sql::{CopyCredentials, CopyOptions, LoadMode};
use crate::tabular;
use crate::warehouse::Warehouse;

/// Failures that abort the run without routing an object to the bad
/// marker: nothing was proven wrong with the data itself.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("configuration rejected: {0}")]
    Config(String),

    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    #[error("fetching {key} failed: {source}")]
    Retrieve {
        key: String,
        #[source]
        source: StoreError,
    },

    #[error(transparent)]
    Archive(#[from] ArchiveError),
}

/// A fatal abort, carrying whatever accounting had accumulated so the
/// caller can still print the report.
#[derive(Debug, Error)]
#[error("{error}")]
pub struct RunFailure {
    pub report: RunReport,
    #[source]
    pub error: RunError,
}

/// Everything one invocation needs, passed explicitly.
pub struct RunContext<'a> {
    pub store: &'a dyn ObjectStore,
    pub warehouse: &'a mut dyn Warehouse,
    pub config: &'a FeedConfig,
    pub credentials: CopyCredentials,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ItemState {
    Pending,
    Succeeded,
    Failed,
}

struct WorkItem {
    meta: ObjectMeta,
    state: ItemState,
}

fn finalize(report: &mut RunReport, items: &[WorkItem]) {
    report.incomplete_list = items
        .iter()
        .filter(|item| item.state == ItemState::Pending)
        .map(|item| item.meta.key.clone())
        .collect();
    report.finish();
}

/// Execute one invocation. `Ok` covers both clean runs and data failures
/// (check [`RunReport::exit_code`]); `Err` is a fatal abort where the
/// protocol could not record an outcome.
pub fn run(ctx: RunContext<'_>) -> Result<RunReport, RunFailure> {
    let mut report = RunReport::new();

    macro_rules! abort {
        ($items:expr, $error:expr) => {{
            finalize(&mut report, $items);
            return Err(RunFailure {
                report,
                error: $error,
            });
        }};
    }

    if let Err(e) = ctx.config.validate() {
        abort!(&[], RunError::Config(e.to_string()));
    }
    // validate() already proved these parse
    let table_ref = match ctx.config.table_ref() {
        Ok(t) => t,
        Err(e) => abort!(&[], RunError::Config(e.to_string())),
    };
    let owner = match ctx.config.owner_ident() {
        Ok(o) => o,
        Err(e) => abort!(&[], RunError::Config(e.to_string())),
    };
    let grants = match ctx.config.grant_idents() {
        Ok(g) => g,
        Err(e) => abort!(&[], RunError::Config(e.to_string())),
    };

    let worklist = match scanner::scan(ctx.store, ctx.config) {
        Ok(w) => w,
        Err(e) => abort!(&[], e.into()),
    };

    report.objects = worklist.len();
    if worklist.is_empty() {
        log_info!("no unprocessed objects under the source prefix");
        report.finish();
        return Ok(report);
    }

    if ctx.config.truncate {
        let key = worklist[0].key.as_str();
        let modified = worklist[0].last_modified.to_rfc3339();
        log_info!("truncate is set; processing only {key} (modified {modified})");
    }

    let mut items: Vec<WorkItem> = worklist
        .into_iter()
        .map(|meta| WorkItem {
            meta,
            state: ItemState::Pending,
        })
        .collect();

    let archiver = Archiver::new(ctx.store, &ctx.config.destination);
    let options = CopyOptions {
        delimiter: ctx.config.batch_delim,
        null_as: ctx.config.null_as.clone(),
    };
    let mode = if ctx.config.truncate {
        LoadMode::Replace
    } else {
        LoadMode::Append
    };
    let mut goods_this_run: Vec<String> = Vec::new();

    for idx in 0..items.len() {
        let key = items[idx].meta.key.clone();
        log_info!("processing {key}");

        let raw = match ctx.store.get(&key) {
            Ok(raw) => raw,
            Err(source) => abort!(&items, RunError::Retrieve { key, source }),
        };

        // Transform, then load; either failure routes this object to the
        // bad marker and ends the run.
        let attempt: Result<Vec<String>, (bool, String)> = match tabular::transform(&raw, ctx.config)
        {
            Err(content_error) => Err((content_error.is_empty_input(), content_error.to_string())),
            Ok(data) => {
                let mut loader = SwapLoader {
                    store: ctx.store,
                    warehouse: &mut *ctx.warehouse,
                    bucket: &ctx.config.bucket,
                    credentials: &ctx.credentials,
                    options: options.clone(),
                };
                let spec = LoadSpec {
                    table: table_ref.clone(),
                    batch_key: keys::batch_key(&ctx.config.destination, &key),
                    data,
                    mode,
                    owner: owner.clone(),
                    grants: grants.clone(),
                };
                loader
                    .load_one(spec)
                    .map_err(|load_error| (false, load_error.to_string()))
            }
        };

        match attempt {
            Ok(tables) => {
                report.loaded += 1;
                report.tables_loaded.extend(tables);
                if mode == LoadMode::Append {
                    // A crash in this window re-loads the object next run:
                    // append COPY is not idempotent across it.
                    log_debug!("append COPY committed for {key}; marker write pending");
                }
                if let Err(e) = archiver.archive(&key, Outcome::Good) {
                    abort!(&items, e.into());
                }
                items[idx].state = ItemState::Succeeded;
                goods_this_run.push(key.clone());
                report.processed += 1;
                report.good += 1;
                report.good_list.push(key);
            }
            Err((empty_input, why)) => {
                log_error!("processing {key} failed: {why}");
                items[idx].state = ItemState::Failed;
                report.failed += 1;
                report.bad += 1;
                report.bad_list.push(key.clone());
                if empty_input {
                    report.empty += 1;
                    report.empty_list.push(key.clone());
                }

                if let Err(e) = archiver.archive(&key, Outcome::Bad) {
                    abort!(&items, e.into());
                }
                if !goods_this_run.is_empty() {
                    if let Err(e) = archiver.walk_back(&goods_this_run) {
                        abort!(&items, e.into());
                    }
                    for walked in goods_this_run.drain(..) {
                        report.good -= 1;
                        report.bad += 1;
                        report.good_list.retain(|k| k != &walked);
                        report.bad_list.push(walked);
                    }
                }

                finalize(&mut report, &items);
                return Ok(report);
            }
        }
    }

    finalize(&mut report, &items);
    log_info!("finished all objects cleanly");
    Ok(report)
}
