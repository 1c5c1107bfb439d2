use super::{lock, StoreError};
use crate::sqlite_pragma::apply_reader_pragmas;
use rusqlite::Connection;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Fixed set of query-only connections handed out round-robin.
pub struct ReadPool {
    conns: Vec<Mutex<Connection>>,
    next: AtomicUsize,
}

impl ReadPool {
    pub fn open(db_path: impl AsRef<Path>, size: usize) -> Result<Self, StoreError> {
        let conns = (0..size.max(1))
            .map(|_| {
                let conn = Connection::open(db_path.as_ref())?;
                apply_reader_pragmas(&conn)?;
                Ok(Mutex::new(conn))
            })
            .collect::<Result<Vec<_>, StoreError>>()?;

        Ok(Self {
            conns,
            next: AtomicUsize::new(0),
        })
    }

    pub fn size(&self) -> usize {
        self.conns.len()
    }

    /// Run `f` on an idle reader, or wait for the round-robin pick if all are busy.
    pub fn with_conn<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Connection) -> Result<T, StoreError>,
    {
        let n = self.conns.len();
        let start = self.next.fetch_add(1, Ordering::Relaxed) % n;

        for offset in 0..n {
            if let Ok(guard) = self.conns[(start + offset) % n].try_lock() {
                return f(&guard);
            }
        }

        let guard = lock(&self.conns[start])?;
        f(&guard)
    }
}
