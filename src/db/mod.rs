pub mod builder;
pub mod maintenance;
pub mod repo;
pub mod schema;

use crate::utils::error::{Result, UniverseError};
use rusqlite::{Connection, Transaction};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub use schema::Table;

/// A single SQLite database file with foreign keys enforced.
pub struct Database {
    conn: Connection,
    path: Option<PathBuf>,
}

impl Database {
    /// Opens (creating if needed) the database at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path)?;
        Self::configure(&conn)?;
        debug!("Connected to database: {}", path.display());

        Ok(Self {
            conn,
            path: Some(path.to_path_buf()),
        })
    }

    /// Opens a database that must already exist.
    pub fn open_existing<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(UniverseError::MissingInput {
                path: path.display().to_string(),
            });
        }
        Self::open(path)
    }

    /// Creates a fresh database file. An existing file is an error unless `force`
    /// is set, in which case it is deleted first.
    pub fn create<P: AsRef<Path>>(path: P, force: bool) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            if !force {
                return Err(UniverseError::DatabaseExists {
                    path: path.display().to_string(),
                });
            }
            std::fs::remove_file(path)?;
            info!("✓ Removed existing database: {}", path.display());
        }
        Self::open(path)
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::configure(&conn)?;
        Ok(Self { conn, path: None })
    }

    fn configure(conn: &Connection) -> Result<()> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(())
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn foreign_keys_enabled(&self) -> Result<bool> {
        let enabled: i64 = self
            .conn
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))?;
        Ok(enabled == 1)
    }

    /// Runs `f` inside a transaction: committed when `f` succeeds, rolled back otherwise.
    pub fn with_transaction<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T>,
    {
        let tx = self.conn.unchecked_transaction()?;
        match f(&tx) {
            Ok(value) => {
                tx.commit()?;
                Ok(value)
            }
            Err(e) => {
                tx.rollback()?;
                Err(e)
            }
        }
    }
}
