//! sluice - idempotent object-processing and swap-load pipeline.
//!
//! Batch microservices in this family all share one shape: discover
//! unprocessed input objects, transform each into a normalized delimited
//! stream, stage it, bulk-load it into a warehouse table inside a single
//! swap-table transaction, and archive the input under a good/bad marker
//! so a re-run is a no-op. This crate is that shape as a reusable
//! component instead of a per-script copy.
//!
//! The moving parts, in control-flow order:
//!
//! - [`scanner`] builds the worklist (markers are the idempotency gate)
//! - [`tabular`] transforms raw payloads into normalized tables
//! - [`loader`] stages and commits via [`warehouse`] using [`sql`] scripts
//! - [`archiver`] records the outcome the next scan relies on
//! - [`run`] ties them together, fail-fast, and returns a [`report`]
//!
//! [`upstream`] serves the feeds that pull from a web API instead of the
//! object store.

pub mod archiver;
pub mod config;
pub mod error;
pub mod keys;
pub mod loader;
pub mod report;
pub mod run;
pub mod scanner;
pub mod sql;
pub mod tabular;
pub mod upstream;
pub mod warehouse;

pub use archiver::{Archiver, Outcome};
pub use config::{FeedConfig, load_config};
pub use error::{ArchiveError, ContentError, DiscoveryError, LoadError, UpstreamError};
pub use loader::{LoadSpec, SwapLoader};
pub use report::RunReport;
pub use run::{RunContext, RunError, RunFailure, run};
pub use sql::{CopyCredentials, CopyOptions, LoadMode, TableRef, TransactionScript};
pub use tabular::{Table, transform};
pub use warehouse::{PgWarehouse, RecordingWarehouse, Warehouse};
