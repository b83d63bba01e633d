// ABOUTME: Shared "latest checkpoint" lookup used by both read and write sessions.
// ABOUTME: The lookup is generic over where a single-row query runs: the pool or an open transaction.

use rusqlite::{Connection, OptionalExtension, Row, ToSql};

use crate::error::{BackendError, StoreError};
use crate::pool::SqlitePool;
use crate::record::LogState;
use crate::schema::SELECT_LATEST;

/// Something that can run a query expected to return zero or one row.
pub(crate) trait SingleRowQuery {
    fn query_opt<T, F>(
        &self,
        sql: &str,
        params: &[&dyn ToSql],
        map: F,
    ) -> Result<Option<T>, BackendError>
    where
        F: FnOnce(&Row<'_>) -> rusqlite::Result<T>;
}

/// Checks out a pooled connection for each query. Outside any transaction.
pub(crate) struct PoolQuery<'a>(pub &'a SqlitePool);

impl SingleRowQuery for PoolQuery<'_> {
    fn query_opt<T, F>(
        &self,
        sql: &str,
        params: &[&dyn ToSql],
        map: F,
    ) -> Result<Option<T>, BackendError>
    where
        F: FnOnce(&Row<'_>) -> rusqlite::Result<T>,
    {
        let conn = self.0.get()?;
        Ok(conn.query_row(sql, params, map).optional()?)
    }
}

/// Runs on the connection that owns a session's open transaction.
pub(crate) struct TxQuery<'a>(pub &'a Connection);

impl SingleRowQuery for TxQuery<'_> {
    fn query_opt<T, F>(
        &self,
        sql: &str,
        params: &[&dyn ToSql],
        map: F,
    ) -> Result<Option<T>, BackendError>
    where
        F: FnOnce(&Row<'_>) -> rusqlite::Result<T>,
    {
        Ok(self.0.query_row(sql, params, map).optional()?)
    }
}

/// Fetch the current state of `log_id` in `region`.
///
/// Zero rows maps to [`StoreError::NotFound`]; anything else the executor
/// reports becomes [`StoreError::Query`].
pub(crate) fn lookup_latest<Q: SingleRowQuery>(
    query: &Q,
    region: &str,
    log_id: &str,
) -> Result<LogState, StoreError> {
    match query.query_opt(
        SELECT_LATEST,
        &[&region as &dyn ToSql, &log_id],
        LogState::from_row,
    ) {
        Ok(Some(state)) => Ok(state),
        Ok(None) => Err(StoreError::NotFound {
            log_id: log_id.to_string(),
        }),
        Err(source) => Err(StoreError::Query {
            op: "get_latest",
            region: region.to_string(),
            log_id: Some(log_id.to_string()),
            source,
        }),
    }
}
