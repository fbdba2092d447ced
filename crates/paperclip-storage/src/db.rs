//! Database connection management.
//!
//! A single rusqlite Connection behind a Mutex. WAL mode and the usual
//! PRAGMAs are applied on open, then pending migrations run.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use rusqlite::Connection;
use tracing::{debug, info};

use paperclip_core::error::PaperclipError;

use crate::migrations;

/// File name of the database inside the configured data directory.
pub const DATABASE_FILE: &str = "paperclip.db";

/// Thread-safe SQLite database wrapper.
pub struct Database {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl Database {
    /// Open (or create) a database at the given path.
    pub fn new(path: &Path) -> Result<Self, PaperclipError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)
            .map_err(|e| PaperclipError::Storage(format!("Failed to open database: {}", e)))?;
        configure(&conn, true)?;

        info!("Database opened at {}", path.display());
        Self::finish(conn, Some(path.to_path_buf()))
    }

    /// Open `paperclip.db` inside `data_dir`.
    pub fn open_in_dir(data_dir: &Path) -> Result<Self, PaperclipError> {
        Self::new(&data_dir.join(DATABASE_FILE))
    }

    /// Open an in-memory database (for testing).
    pub fn in_memory() -> Result<Self, PaperclipError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| PaperclipError::Storage(format!("Failed to open in-memory db: {}", e)))?;
        configure(&conn, false)?;
        debug!("In-memory database opened");
        Self::finish(conn, None)
    }

    fn finish(conn: Connection, path: Option<PathBuf>) -> Result<Self, PaperclipError> {
        let db = Self {
            conn: Mutex::new(conn),
            path,
        };
        db.with_conn(migrations::run_migrations)?;
        Ok(db)
    }

    /// Location on disk, `None` for in-memory databases.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Execute a closure with a reference to the underlying connection.
    ///
    /// The mutex is held for the duration of the closure.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, PaperclipError>
    where
        F: FnOnce(&Connection) -> Result<T, PaperclipError>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|e| PaperclipError::Storage(format!("Database lock poisoned: {}", e)))?;
        f(&conn)
    }
}

fn configure(conn: &Connection, on_disk: bool) -> Result<(), PaperclipError> {
    let pragmas = if on_disk {
        "PRAGMA journal_mode = WAL;
         PRAGMA synchronous = NORMAL;
         PRAGMA foreign_keys = ON;
         PRAGMA cache_size = -16384;"
    } else {
        "PRAGMA journal_mode = WAL;
         PRAGMA synchronous = NORMAL;
         PRAGMA foreign_keys = ON;"
    };
    conn.execute_batch(pragmas)
        .map_err(|e| PaperclipError::Storage(format!("Failed to set pragmas: {}", e)))
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").field("path", &self.path).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn count_signals(db: &Database) -> i64 {
        db.with_conn(|conn| {
            conn.query_row("SELECT COUNT(*) FROM frustration_signals", [], |row| row.get(0))
                .map_err(|e| PaperclipError::Storage(e.to_string()))
        })
        .unwrap()
    }

    #[test]
    fn test_in_memory_database() {
        let db = Database::in_memory().unwrap();
        assert_eq!(count_signals(&db), 0);
        assert!(db.path().is_none());
    }

    #[test]
    fn test_file_database_in_dir() {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = dir.path().join("data");
        let db = Database::open_in_dir(&data_dir).unwrap();

        assert_eq!(count_signals(&db), 0);
        let expected = data_dir.join(DATABASE_FILE);
        assert_eq!(db.path(), Some(expected.as_path()));
        assert!(expected.exists());
    }

    #[test]
    fn test_wal_mode_enabled() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(&dir.path().join("wal.db")).unwrap();
        let mode: String = db
            .with_conn(|conn| {
                conn.query_row("PRAGMA journal_mode", [], |row| row.get(0))
                    .map_err(|e| PaperclipError::Storage(e.to_string()))
            })
            .unwrap();
        assert_eq!(mode, "wal");
    }
}
