//! Ribscope persistent stores
//!
//! - the path document store, one SQLite file per target database
//! - the ASN name cache, one SQLite file shared by all runs

mod asn_cache;
mod documents;

pub use asn_cache::{AsnNameCache, NameCache, DEFAULT_ASN_CACHE_TTL};
pub use documents::{DocumentStore, PathDocument, PathDocumentRepository};

use crate::database::core::{DatabaseConn, SchemaManager, SchemaStatus};
use anyhow::Result;
use tracing::info;

/// Path document database
///
/// Opening the database checks the schema and resets it when it is missing,
/// outdated or corrupted; stored documents are rebuilt by the next load.
pub struct RibscopeDatabase {
    db: DatabaseConn,
}

impl RibscopeDatabase {
    /// Open the database at the specified path
    pub fn open(path: &str) -> Result<Self> {
        let db = DatabaseConn::open_path(path)?;
        let schema = SchemaManager::new(&db.conn);

        match schema.check_status()? {
            SchemaStatus::Current => {
                info!("Path document schema is current");
            }
            SchemaStatus::NotInitialized => {
                info!("Initializing path document schema");
                schema.initialize()?;
            }
            SchemaStatus::NeedsMigration { from, to } => {
                info!("Path document schema needs migration from v{} to v{}", from, to);
                schema.reset()?;
                schema.initialize()?;
            }
            SchemaStatus::Incompatible {
                database_version,
                required_version,
            } => {
                info!(
                    "Path document schema incompatible (db: v{}, required: v{}), resetting",
                    database_version, required_version
                );
                schema.reset()?;
                schema.initialize()?;
            }
            SchemaStatus::Corrupted => {
                info!("Path document schema corrupted, resetting");
                schema.reset()?;
                schema.initialize()?;
            }
        }

        Ok(Self { db })
    }

    /// Open the database named `database` inside `data_dir`
    ///
    /// The file is `{data_dir}/{database}.sqlite3`.
    pub fn open_in_dir(data_dir: &str, database: &str) -> Result<Self> {
        let path = format!("{}/{}.sqlite3", data_dir, database);
        Self::open(&path)
    }

    /// Create an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let db = DatabaseConn::open_in_memory()?;
        SchemaManager::new(&db.conn).initialize()?;
        Ok(Self { db })
    }

    /// Path document repository
    pub fn documents(&self) -> PathDocumentRepository<'_> {
        PathDocumentRepository::new(&self.db.conn)
    }

    /// Get the underlying database connection (for advanced queries)
    pub fn connection(&self) -> &rusqlite::Connection {
        &self.db.conn
    }

    pub fn get_meta(&self, key: &str) -> Result<Option<String>> {
        SchemaManager::new(&self.db.conn).get_meta(key)
    }

    pub fn set_meta(&self, key: &str, value: &str) -> Result<()> {
        SchemaManager::new(&self.db.conn).set_meta(key, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_in_memory() {
        let db = RibscopeDatabase::open_in_memory().unwrap();
        assert_eq!(db.documents().count().unwrap(), 0);
    }

    #[test]
    fn test_open_in_dir_reopens() {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = dir.path().to_str().unwrap();

        {
            let db = RibscopeDatabase::open_in_dir(data_dir, "lab").unwrap();
            db.set_meta("last_load", "1700000000").unwrap();
        }

        let db = RibscopeDatabase::open_in_dir(data_dir, "lab").unwrap();
        assert_eq!(
            db.get_meta("last_load").unwrap(),
            Some("1700000000".to_string())
        );
        assert!(dir.path().join("lab.sqlite3").exists());
    }
}
