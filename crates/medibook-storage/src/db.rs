//! Database connection management.
//!
//! One rusqlite `Connection` behind a `Mutex`, shared by the user,
//! appointment and chat-log repositories. Booking writes that must land
//! together go through [`Database::with_transaction`].

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use rusqlite::{Connection, Transaction};
use tracing::{debug, info};

use medibook_core::error::MedibookError;

use crate::migrations;

/// File name of the booking database inside the data directory.
pub const DB_FILE_NAME: &str = "medibook.db";

/// Thread-safe SQLite database wrapper.
pub struct Database {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl Database {
    /// Open (or create) the booking database in `data_dir`.
    pub fn open_in_dir(data_dir: &Path) -> Result<Self, MedibookError> {
        Self::new(&data_dir.join(DB_FILE_NAME))
    }

    /// Open (or create) a database at the given path and migrate it.
    ///
    /// File databases run in WAL mode so history reads do not block a
    /// confirmation write.
    pub fn new(path: &Path) -> Result<Self, MedibookError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)
            .map_err(|e| MedibookError::Storage(format!("Failed to open database: {}", e)))?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA busy_timeout = 5000;",
        )
        .map_err(|e| MedibookError::Storage(format!("Failed to set pragmas: {}", e)))?;

        info!(path = %path.display(), "Booking database opened");
        Self::migrated(conn, Some(path.to_path_buf()))
    }

    /// Open a private in-memory database.
    pub fn in_memory() -> Result<Self, MedibookError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| MedibookError::Storage(format!("Failed to open in-memory db: {}", e)))?;
        Self::migrated(conn, None)
    }

    /// Appointments reference their user, so foreign keys are always on.
    fn migrated(conn: Connection, path: Option<PathBuf>) -> Result<Self, MedibookError> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .map_err(|e| MedibookError::Storage(format!("Failed to set pragmas: {}", e)))?;
        let db = Self {
            conn: Mutex::new(conn),
            path,
        };
        db.with_conn(migrations::run_migrations)?;
        Ok(db)
    }

    /// Backing file, `None` for in-memory databases.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Execute a closure with the connection held exclusively.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, MedibookError>
    where
        F: FnOnce(&Connection) -> Result<T, MedibookError>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|e| MedibookError::Storage(format!("Database lock poisoned: {}", e)))?;
        f(&conn)
    }

    /// Run `f` inside a transaction.
    ///
    /// Commits when `f` returns `Ok`. Any error, including a domain error
    /// such as `SlotTaken`, rolls every statement back.
    pub fn with_transaction<F, T>(&self, f: F) -> Result<T, MedibookError>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T, MedibookError>,
    {
        let mut conn = self
            .conn
            .lock()
            .map_err(|e| MedibookError::Storage(format!("Database lock poisoned: {}", e)))?;
        let tx = conn
            .transaction()
            .map_err(|e| MedibookError::Storage(format!("Failed to begin transaction: {}", e)))?;

        match f(&tx) {
            Ok(value) => {
                tx.commit()
                    .map_err(|e| MedibookError::Storage(format!("Failed to commit: {}", e)))?;
                Ok(value)
            }
            Err(e) => {
                debug!(error = %e, "Transaction rolled back");
                // Dropping the transaction rolls it back.
                drop(tx);
                Err(e)
            }
        }
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").field("path", &self.path).finish()
    }
}
