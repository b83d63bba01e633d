// ABOUTME: The checkpoint store: a connection pool bound to one region, handing out log sessions.
// ABOUTME: Provides the startup schema check, log enumeration, and read/write session factories.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use rusqlite::params;

use crate::error::{BackendError, StoreError};
use crate::locks::LogLocks;
use crate::pool::{self, PoolConfig, PoolStatus, SqlitePool};
use crate::schema::{self, SELECT_LOG_IDS};
use crate::session::{ReadSession, WriteSession};

pub(crate) struct StoreInner {
    pub(crate) pool: SqlitePool,
    pub(crate) region: String,
    locks: Arc<LogLocks>,
    lock_timeout: Duration,
}

/// Checkpoint storage for one region.
///
/// Cloning is cheap and clones share the pool, so a `Store` can be handed to
/// as many threads as there are logs being worked on.
#[derive(Clone)]
pub struct Store {
    inner: Arc<StoreInner>,
}

impl Store {
    /// Open a store over the database at `url` with default pool settings.
    pub fn open(url: &str, region: &str) -> Result<Self, StoreError> {
        Self::open_with(url, region, PoolConfig::default())
    }

    /// Open a store over the database at `url`. The database must exist;
    /// call [`init`](Self::init) to confirm the checkpoint table does too.
    pub fn open_with(url: &str, region: &str, config: PoolConfig) -> Result<Self, StoreError> {
        let lock_timeout = config.acquire_timeout;
        let pool = pool::build(url, &config).map_err(|e| StoreError::Open {
            source: BackendError::Pool(e),
        })?;

        tracing::info!(region, "checkpoint store opened");

        Ok(Self {
            inner: Arc::new(StoreInner {
                pool,
                region: region.to_string(),
                locks: Arc::new(LogLocks::default()),
                lock_timeout,
            }),
        })
    }

    pub fn region(&self) -> &str {
        &self.inner.region
    }

    pub fn pool_status(&self) -> PoolStatus {
        pool::status(&self.inner.pool)
    }

    /// Startup check that the checkpoint table exists and is queryable.
    /// This does not create or migrate anything.
    pub fn init(&self) -> Result<(), StoreError> {
        let conn = self
            .inner
            .pool
            .get()
            .map_err(|e| StoreError::SchemaUnavailable { source: e.into() })?;
        schema::probe(&conn)
    }

    /// Ids of every log with a record in this store's region.
    pub fn logs(&self) -> Result<HashSet<String>, StoreError> {
        let query_error = |source: BackendError| StoreError::Query {
            op: "logs",
            region: self.inner.region.clone(),
            log_id: None,
            source,
        };

        let conn = self.inner.pool.get().map_err(|e| query_error(e.into()))?;
        let mut stmt = conn
            .prepare(SELECT_LOG_IDS)
            .map_err(|e| query_error(e.into()))?;
        let rows = stmt
            .query_map(params![self.inner.region], |row| row.get::<_, String>(0))
            .map_err(|e| query_error(e.into()))?;

        let mut logs = HashSet::new();
        for row in rows {
            logs.insert(row.map_err(|e| query_error(e.into()))?);
        }
        Ok(logs)
    }

    /// Session for reading `log_id` outside any transaction. Does no I/O.
    pub fn read_ops(&self, log_id: &str) -> ReadSession {
        ReadSession::new(Arc::clone(&self.inner), log_id)
    }

    /// Begin a transaction for a read-modify-commit cycle on `log_id`.
    pub fn write_ops(&self, log_id: &str) -> Result<WriteSession, StoreError> {
        WriteSession::begin(Arc::clone(&self.inner), log_id, None)
    }

    /// Like [`write_ops`](Self::write_ops), but first waits for the
    /// in-process lock on `log_id`, held until the session ends. Fails with
    /// [`StoreError::Busy`] if the lock is not freed within the pool's
    /// acquire timeout.
    pub fn write_ops_exclusive(&self, log_id: &str) -> Result<WriteSession, StoreError> {
        let lease = self
            .inner
            .locks
            .acquire(log_id, self.inner.lock_timeout)
            .ok_or_else(|| StoreError::Busy {
                region: self.inner.region.clone(),
                log_id: log_id.to_string(),
            })?;
        WriteSession::begin(Arc::clone(&self.inner), log_id, Some(lease))
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("region", &self.inner.region)
            .field("pool", &pool::status(&self.inner.pool))
            .finish()
    }
}
