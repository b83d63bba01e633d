// ABOUTME: r2d2 connection pool over SQLite, shared by read and write sessions.
// ABOUTME: Every connection is opened without CREATE and set up with WAL and a busy timeout.

use std::time::Duration;

use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::OpenFlags;

pub(crate) type SqlitePool = r2d2::Pool<SqliteConnectionManager>;
pub(crate) type PooledConnection = r2d2::PooledConnection<SqliteConnectionManager>;

/// Sizing and timeout knobs for the connection pool.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Maximum number of open connections, idle or checked out.
    pub max_size: usize,
    /// How long a checkout waits for a connection before giving up.
    pub acquire_timeout: Duration,
    /// SQLite busy timeout applied to every connection.
    pub busy_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_size: 8,
            acquire_timeout: Duration::from_secs(5),
            busy_timeout: Duration::from_secs(5),
        }
    }
}

/// Point-in-time counters, mostly useful for tests and debug logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStatus {
    pub open: usize,
    pub idle: usize,
}

/// Build the pool and wait for its first connection, so a missing or
/// unreadable database is reported here rather than on first use.
///
/// The database must already exist: `SQLITE_OPEN_CREATE` is left out so a
/// mistyped path fails instead of silently producing an empty database.
pub(crate) fn build(url: &str, config: &PoolConfig) -> Result<SqlitePool, r2d2::Error> {
    let busy_timeout = config.busy_timeout;
    let manager = SqliteConnectionManager::file(url)
        .with_flags(
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_URI
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .with_init(move |conn| {
            conn.busy_timeout(busy_timeout)?;
            conn.execute_batch("PRAGMA journal_mode=WAL;")
        });

    r2d2::Pool::builder()
        .max_size(config.max_size.clamp(1, u32::MAX as usize) as u32)
        .min_idle(Some(1))
        .connection_timeout(config.acquire_timeout)
        .build(manager)
}

pub(crate) fn status(pool: &SqlitePool) -> PoolStatus {
    let state = pool.state();
    PoolStatus {
        open: state.connections as usize,
        idle: state.idle_connections as usize,
    }
}
