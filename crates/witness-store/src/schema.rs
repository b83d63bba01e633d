// ABOUTME: Table definition for persisted checkpoints and the one-shot provisioning routine.
// ABOUTME: The store itself never migrates; it only checks that the table is reachable.

use rusqlite::{Connection, OpenFlags};

use crate::error::{BackendError, StoreError};

/// Name of the checkpoint table.
pub const TABLE: &str = "chkpts";

// `range` is a keyword in SQLite's window syntax, so it is always quoted.
const CREATE_TABLE: &str = r#"CREATE TABLE chkpts (
    region TEXT NOT NULL,
    log_id TEXT NOT NULL,
    checkpoint BLOB,
    "range" BLOB,
    PRIMARY KEY (region, log_id)
)"#;

pub(crate) const SELECT_LATEST: &str =
    r#"SELECT checkpoint, "range" FROM chkpts WHERE region = ?1 AND log_id = ?2"#;

pub(crate) const SELECT_LOG_IDS: &str = "SELECT log_id FROM chkpts WHERE region = ?1";

pub(crate) const UPSERT: &str = r#"INSERT INTO chkpts (region, log_id, checkpoint, "range")
     VALUES (?1, ?2, ?3, ?4)
     ON CONFLICT (region, log_id) DO UPDATE SET
        checkpoint = excluded.checkpoint,
        "range" = excluded."range""#;

const PROBE: &str = "SELECT 1 FROM chkpts LIMIT 1";

/// Create the checkpoint table in the database at `url`, creating the
/// database file if needed. Fails if the table already exists.
pub fn create_schema(url: &str) -> Result<(), StoreError> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_URI;
    let conn = Connection::open_with_flags(url, flags)
        .map_err(|source| StoreError::SchemaCreate { source })?;
    conn.execute_batch(CREATE_TABLE)
        .map_err(|source| StoreError::SchemaCreate { source })?;
    tracing::info!("created {} table", TABLE);
    Ok(())
}

/// Confirm the checkpoint table exists and can be read.
pub(crate) fn probe(conn: &Connection) -> Result<(), StoreError> {
    let mut stmt = conn
        .prepare(PROBE)
        .map_err(|e| StoreError::SchemaUnavailable {
            source: BackendError::Sqlite(e),
        })?;
    stmt.exists([]).map_err(|e| StoreError::SchemaUnavailable {
        source: BackendError::Sqlite(e),
    })?;
    Ok(())
}
