//! SQLite connection handling
//!
//! Both ribscope stores (path documents and the shared ASN name cache) are
//! SQLite files that several independent runs may open at the same time, e.g.
//! overlapping cron invocations. Connections are therefore opened in WAL mode
//! with a busy timeout so that a second writer waits instead of failing.

use anyhow::{anyhow, Result};
use rusqlite::Connection;
use std::path::Path;
use std::time::Duration;

/// How long a statement waits on a lock held by another connection
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite connection wrapper shared by the ribscope stores
pub struct DatabaseConn {
    pub conn: Connection,
}

impl DatabaseConn {
    /// Open a database file, or an in-memory database when `path` is `None`
    ///
    /// Missing parent directories of `path` are created.
    pub fn open(path: Option<&str>) -> Result<Self> {
        let conn = match path {
            Some(p) => {
                if let Some(parent) = Path::new(p).parent() {
                    if !parent.as_os_str().is_empty() {
                        std::fs::create_dir_all(parent).map_err(|e| {
                            anyhow!("Failed to create directory for '{}': {}", p, e)
                        })?;
                    }
                }
                Connection::open(p)
                    .map_err(|e| anyhow!("Failed to open database at '{}': {}", p, e))?
            }
            None => Connection::open_in_memory()
                .map_err(|e| anyhow!("Failed to create in-memory database: {}", e))?,
        };

        let db = DatabaseConn { conn };
        db.configure()?;
        Ok(db)
    }

    /// Open a database file
    pub fn open_path(path: &str) -> Result<Self> {
        Self::open(Some(path))
    }

    /// Open an in-memory database
    pub fn open_in_memory() -> Result<Self> {
        Self::open(None)
    }

    fn configure(&self) -> Result<()> {
        // WAL lets readers proceed while another run writes
        let _: String = self
            .conn
            .query_row("PRAGMA journal_mode=WAL", [], |row| row.get(0))
            .map_err(|e| anyhow!("Failed to set journal mode: {}", e))?;

        self.conn
            .execute("PRAGMA synchronous=NORMAL", [])
            .map_err(|e| anyhow!("Failed to set synchronous mode: {}", e))?;

        self.conn
            .busy_timeout(BUSY_TIMEOUT)
            .map_err(|e| anyhow!("Failed to set busy timeout: {}", e))?;

        Ok(())
    }

    /// Execute a SQL statement without parameters
    pub fn execute(&self, sql: &str) -> Result<usize> {
        self.conn
            .execute(sql, [])
            .map_err(|e| anyhow!("Failed to execute SQL: {}", e))
    }

    /// Check if a table exists in the database
    pub fn table_exists(&self, table_name: &str) -> Result<bool> {
        let count: i32 = self
            .conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
                [table_name],
                |row| row.get(0),
            )
            .map_err(|e| anyhow!("Failed to check table existence: {}", e))?;
        Ok(count > 0)
    }

    /// Get the row count for a table
    pub fn table_count(&self, table_name: &str) -> Result<u64> {
        let query = format!("SELECT COUNT(*) FROM {}", table_name);
        self.conn
            .query_row(&query, [], |row| row.get(0))
            .map_err(|e| anyhow!("Failed to count rows of {}: {}", table_name, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_in_memory() {
        assert!(DatabaseConn::open_in_memory().is_ok());
    }

    #[test]
    fn test_open_creates_parent_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("store.sqlite3");
        let db = DatabaseConn::open_path(path.to_str().unwrap()).unwrap();
        db.execute("CREATE TABLE t (id INTEGER PRIMARY KEY)").unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_table_exists_and_count() {
        let db = DatabaseConn::open_in_memory().unwrap();
        db.execute("CREATE TABLE path_documents (id TEXT PRIMARY KEY)")
            .unwrap();
        db.execute("INSERT INTO path_documents (id) VALUES ('a'), ('b')")
            .unwrap();

        assert!(db.table_exists("path_documents").unwrap());
        assert!(!db.table_exists("missing").unwrap());
        assert_eq!(db.table_count("path_documents").unwrap(), 2);
    }

    #[test]
    fn test_two_connections_share_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shared.sqlite3");
        let path = path.to_str().unwrap();

        let a = DatabaseConn::open_path(path).unwrap();
        a.execute("CREATE TABLE t (id INTEGER PRIMARY KEY)").unwrap();
        a.execute("INSERT INTO t (id) VALUES (1)").unwrap();

        let b = DatabaseConn::open_path(path).unwrap();
        assert_eq!(b.table_count("t").unwrap(), 1);
    }
}
