use parking_lot::Mutex;
use rusqlite::{Connection, Result};
use std::sync::Arc;
use tracing::debug;

const SCHEMA_VERSION: i64 = 1;

/// The store handle shared between the edit context and the scan worker.
/// Holding the lock is what makes a caller the single writer.
pub type SharedStore = Arc<Mutex<Database>>;

pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)?;
        let db = Database { conn };
        db.configure_pragmas()?;
        db.migrate_schema()?;
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Database { conn };
        db.configure_pragmas()?;
        db.migrate_schema()?;
        Ok(db)
    }

    pub fn into_shared(self) -> SharedStore {
        Arc::new(Mutex::new(self))
    }

    fn configure_pragmas(&self) -> Result<()> {
        self.conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;",
        )?;
        debug!("SQLite pragmas configured (WAL mode, foreign keys on)");
        Ok(())
    }

    /// Creates missing tables, the root sentinel row and the Favorites
    /// singleton. Safe to run on every open.
    fn migrate_schema(&self) -> Result<()> {
        let version: i64 = self
            .conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))?;

        self.conn.execute_batch(include_str!("schema.sql"))?;

        if version < SCHEMA_VERSION {
            self.conn
                .execute_batch(&format!("PRAGMA user_version = {};", SCHEMA_VERSION))?;
            debug!("SQLite schema initialized (version {})", SCHEMA_VERSION);
        }
        Ok(())
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Forget every catalogued directory and file. The root sentinel and the
    /// Favorites folder survive.
    pub fn truncate_all(&self) -> Result<()> {
        self.conn.execute_batch(
            "DELETE FROM virtual_files;
             DELETE FROM virtual_dirs;
             DELETE FROM files;
             DELETE FROM extensions;
             DELETE FROM ext_groups;
             DELETE FROM scan_session;
             DELETE FROM dirs WHERE id != 0 AND kind != 1;",
        )?;
        debug!("All tables truncated");
        Ok(())
    }
}
