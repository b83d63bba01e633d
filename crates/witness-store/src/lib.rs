// ABOUTME: Transactional checkpoint persistence for a transparency-log witness.
// ABOUTME: Stores the latest checkpoint and range per (region, log) in SQLite behind read/write sessions.

pub mod error;
mod locks;
pub mod ops;
pub mod pool;
mod query;
pub mod record;
pub mod schema;
pub mod session;
pub mod store;

pub use error::{BackendError, StoreError};
pub use ops::{LogStateRead, LogStateWrite, Persistence};
pub use pool::{PoolConfig, PoolStatus};
pub use record::LogState;
pub use schema::create_schema;
pub use session::{ReadSession, WriteSession};
pub use store::Store;
