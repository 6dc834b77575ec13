//! Error taxonomy for the pipeline.
//!
//! Each kind routes differently: `DiscoveryError` aborts before any object
//! is touched, `ContentError` and `LoadError` send the current object to
//! the bad marker and end the run, `ArchiveError` is the most severe
//! (a lost marker write would cause reprocessing on the next run), and
//! `UpstreamError` is the only kind that is ever retried.

use store::StoreError;
use thiserror::Error;

/// Input payload failed to parse or validate. Never retried; the data is
/// presumed unfixable without operator intervention.
#[derive(Debug, Error)]
pub enum ContentError {
    #[error("object is empty (zero bytes)")]
    Empty,

    #[error("object does not decode as UTF-8: {0}")]
    Encoding(String),

    #[error("object contains a header but zero data rows")]
    NoDataRows,

    #[error("expected {expected} columns, found {found}")]
    ColumnCount { expected: usize, found: usize },

    #[error("column {column} cannot be cast as {ty}: {value:?}")]
    BadCast {
        column: String,
        ty: &'static str,
        value: String,
    },

    #[error("malformed delimited input: {0}")]
    Malformed(String),
}

impl ContentError {
    /// Empty-ish payloads get their own accounting in the run report.
    pub fn is_empty_input(&self) -> bool {
        matches!(self, ContentError::Empty | ContentError::NoDataRows)
    }
}

/// Staging or warehouse transaction failure. The warehouse rolls the
/// transaction back itself; the loader does not retry.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("staging write failed: {0}")]
    Staging(#[from] StoreError),

    #[error("warehouse connection failed: {0}")]
    Connect(String),

    #[error("warehouse transaction failed: {0}")]
    Transaction(String),
}

/// The marker copy itself failed. This threatens the idempotency gate, so
/// the run must fail loudly.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("marker copy for {key} failed: {source}")]
    Copy {
        key: String,
        #[source]
        source: StoreError,
    },

    #[error("stale good marker {key} could not be removed: {source}")]
    Delete {
        key: String,
        #[source]
        source: StoreError,
    },
}

/// Could not enumerate or probe candidate objects. Fatal before any
/// processing starts.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("listing source prefix failed: {0}")]
    List(#[from] StoreError),

    #[error("marker probe for {key} failed: {source}")]
    Probe {
        key: String,
        #[source]
        source: StoreError,
    },

    #[error("bad filename pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// Upstream web API failure. Retried with capped exponential backoff, then
/// escalated to the caller.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{url} returned status {status}")]
    Status { status: u16, url: String },

    #[error("response from {url} did not parse: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

impl UpstreamError {
    /// Transport problems and server-side errors are worth another attempt;
    /// client errors and parse failures are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            UpstreamError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            UpstreamError::Status { status, .. } => *status >= 500 || *status == 429,
            UpstreamError::Decode { .. } => false,
        }
    }
}
