//! On-device store: the persisted login session, the health reading outbox
//! and sync bookkeeping.
//!
//! One [`Database`] owns one SQLite connection. Callers that share it across
//! tasks wrap it in `Arc<Mutex<_>>` and never hold the lock over an `.await`.

mod outbox;
mod schema;
mod session;
mod sync_state;

pub use outbox::*;
pub use schema::*;
pub use sync_state::*;

use std::path::Path;

use rusqlite::Connection;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// A stored row no longer parses.
    #[error("Corrupt stored value: {0}")]
    Corrupt(String),
}

pub type DbResult<T> = Result<T, DbError>;

pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open the store at `path`, creating the file and tables if needed.
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        Self::with_schema(Connection::open(path)?)
    }

    pub fn open_in_memory() -> DbResult<Self> {
        Self::with_schema(Connection::open_in_memory()?)
    }

    fn with_schema(conn: Connection) -> DbResult<Self> {
        conn.execute_batch(SCHEMA)?;
        tracing::debug!(path = ?conn.path(), "local store ready");
        Ok(Self { conn })
    }
}
