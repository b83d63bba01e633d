// ABOUTME: Persistence traits a witness engine programs against: log listing, read ops, write ops.
// ABOUTME: The SQLite store implements them; terminal write operations consume the session.

use std::collections::HashSet;

use crate::error::StoreError;
use crate::record::LogState;
use crate::session::{ReadSession, WriteSession};
use crate::store::Store;

/// Read access to one log's latest state.
pub trait LogStateRead {
    fn get_latest(&self) -> Result<LogState, StoreError>;
}

/// A read-modify-commit cycle on one log. Exactly one of `set` or `close`
/// ends it.
pub trait LogStateWrite: LogStateRead {
    fn set(self, checkpoint: &[u8], range: &[u8]) -> Result<(), StoreError>;
    fn close(self) -> Result<(), StoreError>;
}

/// Durable per-log witness state for one region.
pub trait Persistence {
    type Read: LogStateRead;
    type Write: LogStateWrite;

    fn init(&self) -> Result<(), StoreError>;
    fn logs(&self) -> Result<HashSet<String>, StoreError>;
    fn read_ops(&self, log_id: &str) -> Self::Read;
    fn write_ops(&self, log_id: &str) -> Result<Self::Write, StoreError>;
}

impl LogStateRead for ReadSession {
    fn get_latest(&self) -> Result<LogState, StoreError> {
        ReadSession::get_latest(self)
    }
}

impl LogStateRead for WriteSession {
    fn get_latest(&self) -> Result<LogState, StoreError> {
        WriteSession::get_latest(self)
    }
}

impl LogStateWrite for WriteSession {
    fn set(self, checkpoint: &[u8], range: &[u8]) -> Result<(), StoreError> {
        WriteSession::set(self, checkpoint, range)
    }

    fn close(self) -> Result<(), StoreError> {
        WriteSession::close(self)
    }
}

impl Persistence for Store {
    type Read = ReadSession;
    type Write = WriteSession;

    fn init(&self) -> Result<(), StoreError> {
        Store::init(self)
    }

    fn logs(&self) -> Result<HashSet<String>, StoreError> {
        Store::logs(self)
    }

    fn read_ops(&self, log_id: &str) -> ReadSession {
        Store::read_ops(self, log_id)
    }

    fn write_ops(&self, log_id: &str) -> Result<WriteSession, StoreError> {
        Store::write_ops(self, log_id)
    }
}
