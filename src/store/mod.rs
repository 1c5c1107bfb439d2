//! SQLite persistence: retention store for calls plus the lookup directories
//!
//! One writer connection (behind a mutex) handles appends, pruning and
//! directory upserts. Aggregate and directory reads go through `ReadPool`,
//! a set of query-only connections; WAL keeps the two sides from blocking
//! each other.

pub mod calls;
pub mod directory;
pub mod migrations;
pub mod pool;

pub use calls::CallStore;
pub use directory::{CountryEntry, Directory, LabeledOption, TalkgroupEntry, TalkgroupRow, GLOBAL_COUNTRY};
pub use migrations::run_schema_migrations;
pub use pool::ReadPool;

use crate::sqlite_pragma::apply_optimized_pragmas;
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug)]
pub enum StoreError {
    Database(rusqlite::Error),
    Io(std::io::Error),
    Migration(String),
    Conflict(String),
    Poisoned,
    Task(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::Database(err)
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Io(err)
    }
}

impl From<tokio::task::JoinError> for StoreError {
    fn from(err: tokio::task::JoinError) -> Self {
        StoreError::Task(err.to_string())
    }
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Database(e) => write!(f, "Database error: {}", e),
            StoreError::Io(e) => write!(f, "IO error: {}", e),
            StoreError::Migration(msg) => write!(f, "Migration error: {}", msg),
            StoreError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            StoreError::Poisoned => write!(f, "Connection lock poisoned"),
            StoreError::Task(msg) => write!(f, "Blocking task failed: {}", msg),
        }
    }
}

impl std::error::Error for StoreError {}

/// Run a blocking store operation off the async runtime.
pub async fn run_blocking<T, F>(f: F) -> Result<T, StoreError>
where
    F: FnOnce() -> Result<T, StoreError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await?
}

pub(crate) fn lock(conn: &Mutex<Connection>) -> Result<MutexGuard<'_, Connection>, StoreError> {
    conn.lock().map_err(|_| StoreError::Poisoned)
}

/// Handle to the on-disk database; cheap to clone.
#[derive(Clone)]
pub struct Database {
    writer: Arc<Mutex<Connection>>,
    readers: Arc<ReadPool>,
}

impl Database {
    /// Open (or create) the database, apply PRAGMAs and migrations, open the read pool.
    pub fn open(
        db_path: impl AsRef<Path>,
        schema_dir: impl AsRef<Path>,
        read_pool_size: usize,
    ) -> Result<Self, StoreError> {
        let db_path = db_path.as_ref();

        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut conn = Connection::open(db_path)?;
        apply_optimized_pragmas(&conn)?;
        run_schema_migrations(&mut conn, schema_dir)?;

        let readers = ReadPool::open(db_path, read_pool_size)?;

        log::info!(
            "✅ SQLite database ready: {} (WAL, {} readers)",
            db_path.display(),
            readers.size()
        );

        Ok(Self {
            writer: Arc::new(Mutex::new(conn)),
            readers: Arc::new(readers),
        })
    }

    pub fn calls(&self) -> CallStore {
        CallStore::new(self.writer.clone(), self.readers.clone())
    }

    pub fn directory(&self) -> Directory {
        Directory::new(self.writer.clone(), self.readers.clone())
    }

    pub fn readers(&self) -> Arc<ReadPool> {
        self.readers.clone()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::Database;
    use tempfile::TempDir;

    pub const SCHEMA_DIR: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/sql");

    pub fn open_test_db() -> (TempDir, Database) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open(dir.path().join("test.db"), SCHEMA_DIR, 2).unwrap();
        (dir, db)
    }
}
