// ABOUTME: Read and write sessions over one (region, log) pair of the checkpoint table.
// ABOUTME: A write session owns one transaction and ends by committing a new state or rolling back.

use std::fmt;
use std::sync::Arc;

use rusqlite::{ErrorCode, params};

use crate::error::{BackendError, StoreError};
use crate::locks::LogLease;
use crate::pool::PooledConnection;
use crate::query::{PoolQuery, TxQuery, lookup_latest};
use crate::record::LogState;
use crate::schema::UPSERT;
use crate::store::StoreInner;

/// Non-transactional lookup of a log's latest state.
pub struct ReadSession {
    store: Arc<StoreInner>,
    log_id: String,
}

impl ReadSession {
    pub(crate) fn new(store: Arc<StoreInner>, log_id: &str) -> Self {
        Self {
            store,
            log_id: log_id.to_string(),
        }
    }

    pub fn log_id(&self) -> &str {
        &self.log_id
    }

    /// Latest committed state, or [`StoreError::NotFound`] if the log has
    /// never been written in this region.
    pub fn get_latest(&self) -> Result<LogState, StoreError> {
        lookup_latest(&PoolQuery(&self.store.pool), &self.store.region, &self.log_id)
    }
}

/// One read-modify-commit cycle for a log, run as a single transaction.
///
/// The session ends with exactly one of [`set`](Self::set) or
/// [`close`](Self::close); both consume it. A session dropped without either
/// is rolled back, so its connection always returns to the pool.
///
/// The transaction is deferred: reads take a snapshot without locking, and
/// SQLite's database-wide write lock is only taken inside `set`. An open
/// session that only reads, or is abandoned, never blocks sessions on other
/// logs. If the snapshot went stale because another session committed
/// meanwhile, `set` writes in a fresh immediate transaction instead.
///
/// Two write sessions for the same log are not coordinated: if both read
/// before either commits, the later commit wins. Callers must ensure one
/// writer per log, or use
/// [`Store::write_ops_exclusive`](crate::Store::write_ops_exclusive).
pub struct WriteSession {
    conn: PooledConnection,
    store: Arc<StoreInner>,
    log_id: String,
    _lease: Option<LogLease>,
}

impl WriteSession {
    /// Check out a connection and open a deferred transaction on it.
    pub(crate) fn begin(
        store: Arc<StoreInner>,
        log_id: &str,
        lease: Option<LogLease>,
    ) -> Result<Self, StoreError> {
        let start_error = |source: BackendError| StoreError::TransactionStart {
            region: store.region.clone(),
            log_id: log_id.to_string(),
            source,
        };

        let conn = store.pool.get().map_err(|e| start_error(e.into()))?;
        conn.execute_batch("BEGIN DEFERRED")
            .map_err(|e| start_error(e.into()))?;

        tracing::debug!(region = %store.region, log_id, "write session opened");

        Ok(Self {
            conn,
            store,
            log_id: log_id.to_string(),
            _lease: lease,
        })
    }

    pub fn log_id(&self) -> &str {
        &self.log_id
    }

    /// Latest state as seen inside this session's transaction.
    pub fn get_latest(&self) -> Result<LogState, StoreError> {
        lookup_latest(&TxQuery(&self.conn), &self.store.region, &self.log_id)
    }

    /// Replace the log's state with `(checkpoint, range)` and commit.
    ///
    /// Inserts the first record for the log or overwrites both payload
    /// fields of the existing one. On failure nothing is committed.
    pub fn set(self, checkpoint: &[u8], range: &[u8]) -> Result<(), StoreError> {
        let result = match self.upsert_and_commit(checkpoint, range) {
            // A read snapshot cannot be upgraded once another connection has
            // written or is writing; SQLite reports that without waiting.
            Err(e) if e.sqlite_error_code() == Some(ErrorCode::DatabaseBusy) => {
                tracing::debug!(
                    region = %self.store.region,
                    log_id = %self.log_id,
                    "snapshot could not take the write lock, rewriting in an immediate transaction: {}",
                    e
                );
                self.rollback_quietly();
                self.conn
                    .execute_batch("BEGIN IMMEDIATE")
                    .and_then(|_| self.upsert_and_commit(checkpoint, range))
            }
            other => other,
        };

        match result {
            Ok(()) => {
                tracing::debug!(
                    region = %self.store.region,
                    log_id = %self.log_id,
                    checkpoint_len = checkpoint.len(),
                    range_len = range.len(),
                    "checkpoint committed"
                );
                Ok(())
            }
            Err(e) => {
                tracing::warn!(
                    region = %self.store.region,
                    log_id = %self.log_id,
                    "checkpoint commit failed: {}",
                    e
                );
                self.rollback_quietly();
                Err(StoreError::Commit {
                    region: self.store.region.clone(),
                    log_id: self.log_id.clone(),
                    source: e.into(),
                })
            }
        }
    }

    /// Abandon the session, discarding anything uncommitted.
    pub fn close(self) -> Result<(), StoreError> {
        self.conn
            .execute_batch("ROLLBACK")
            .map_err(|e| StoreError::Rollback {
                region: self.store.region.clone(),
                log_id: self.log_id.clone(),
                source: e.into(),
            })?;
        tracing::debug!(
            region = %self.store.region,
            log_id = %self.log_id,
            "write session abandoned"
        );
        Ok(())
    }

    fn upsert_and_commit(&self, checkpoint: &[u8], range: &[u8]) -> rusqlite::Result<()> {
        self.conn.execute(
            UPSERT,
            params![self.store.region, self.log_id, checkpoint, range],
        )?;
        self.conn.execute_batch("COMMIT")
    }

    fn rollback_quietly(&self) {
        if self.conn.is_autocommit() {
            return;
        }
        if let Err(e) = self.conn.execute_batch("ROLLBACK") {
            tracing::warn!(
                region = %self.store.region,
                log_id = %self.log_id,
                "rollback failed: {}",
                e
            );
        }
    }
}

impl fmt::Debug for ReadSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadSession")
            .field("region", &self.store.region)
            .field("log_id", &self.log_id)
            .finish()
    }
}

impl fmt::Debug for WriteSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WriteSession")
            .field("region", &self.store.region)
            .field("log_id", &self.log_id)
            .field("exclusive", &self._lease.is_some())
            .finish()
    }
}

impl Drop for WriteSession {
    fn drop(&mut self) {
        // Autocommit mode means the session already committed or rolled back.
        if !self.conn.is_autocommit() {
            tracing::warn!(
                region = %self.store.region,
                log_id = %self.log_id,
                "write session dropped without set or close, rolling back"
            );
            self.rollback_quietly();
        }
    }
}
