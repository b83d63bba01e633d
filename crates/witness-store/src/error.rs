// ABOUTME: Error taxonomy for the checkpoint store: not-found, query, transaction, and schema failures.
// ABOUTME: Every variant carries the region/log context of the operation that failed.

use thiserror::Error;

/// The underlying cause of a store failure: either SQLite itself or the
/// r2d2 connection pool in front of it.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    #[error(transparent)]
    Pool(#[from] r2d2::Error),
}

/// Errors returned by the checkpoint store.
///
/// `NotFound` is the normal outcome for a log that has never been written and
/// should be handled as a bootstrap case, not as a failure. Use
/// [`StoreError::is_not_found`] to tell it apart.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no checkpoint for log {log_id:?}")]
    NotFound { log_id: String },

    #[error("{op} failed in region {region:?}{}: {source}", log_suffix(.log_id))]
    Query {
        op: &'static str,
        region: String,
        log_id: Option<String>,
        #[source]
        source: BackendError,
    },

    #[error("could not begin transaction for log {log_id:?} in region {region:?}: {source}")]
    TransactionStart {
        region: String,
        log_id: String,
        #[source]
        source: BackendError,
    },

    #[error("could not commit checkpoint for log {log_id:?} in region {region:?}: {source}")]
    Commit {
        region: String,
        log_id: String,
        #[source]
        source: BackendError,
    },

    #[error("could not roll back transaction for log {log_id:?} in region {region:?}: {source}")]
    Rollback {
        region: String,
        log_id: String,
        #[source]
        source: BackendError,
    },

    #[error("timed out waiting for exclusive access to log {log_id:?} in region {region:?}")]
    Busy { region: String, log_id: String },

    #[error("checkpoint table unavailable: {source}")]
    SchemaUnavailable {
        #[source]
        source: BackendError,
    },

    #[error("could not create checkpoint table: {source}")]
    SchemaCreate {
        #[source]
        source: rusqlite::Error,
    },

    #[error("could not open checkpoint database: {source}")]
    Open {
        #[source]
        source: BackendError,
    },
}

impl StoreError {
    /// True when the error means "this log has no checkpoint yet".
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

fn log_suffix(log_id: &Option<String>) -> String {
    match log_id {
        Some(id) => format!(" for log {id:?}"),
        None => String::new(),
    }
}
