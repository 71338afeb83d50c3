//! Shared ASN name cache
//!
//! A small key/value table with per-entry expiry, stored in its own SQLite
//! file so that every ribscope run on the host (and any other tool pointed at
//! the same file) shares one cache. Writes are last-write-wins.
//!
//! Values may have been written as text or as raw bytes by other writers;
//! both are read back as strings here so callers only ever see `String`.

use crate::database::core::{DatabaseConn, SchemaDefinitions};
use anyhow::{anyhow, Result};
use chrono::Utc;
use rusqlite::types::ValueRef;
use rusqlite::{params, OptionalExtension};
use std::time::Duration;

/// Default lifetime of a cached name (20 minutes)
pub const DEFAULT_ASN_CACHE_TTL: Duration = Duration::from_secs(1200);

/// Cache seam used by the ASN resolver
pub trait NameCache {
    /// Unexpired value for `key`, if any
    fn get(&self, key: &str) -> Result<Option<String>>;
    /// Store `value` under `key` for `ttl`, replacing any previous value
    fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()>;
}

/// SQLite-backed [`NameCache`]
pub struct AsnNameCache {
    db: DatabaseConn,
}

impl AsnNameCache {
    /// Open (or create) the cache file at `path`
    pub fn open(path: &str) -> Result<Self> {
        let db = DatabaseConn::open_path(path)?;
        Self::initialize(db)
    }

    /// Create an in-memory cache (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let db = DatabaseConn::open_in_memory()?;
        Self::initialize(db)
    }

    fn initialize(db: DatabaseConn) -> Result<Self> {
        db.conn
            .execute(SchemaDefinitions::ASN_NAMES_TABLE, [])
            .map_err(|e| anyhow!("Failed to create asn_names table: {}", e))?;
        Ok(Self { db })
    }

    /// Delete expired entries, returning how many were removed
    pub fn purge_expired(&self) -> Result<usize> {
        self.db
            .conn
            .execute(
                "DELETE FROM asn_names WHERE expires_at <= ?1",
                [Utc::now().timestamp()],
            )
            .map_err(|e| anyhow!("Failed to purge expired names: {}", e))
    }

    /// Number of stored entries, expired or not
    pub fn len(&self) -> Result<u64> {
        self.db.table_count("asn_names")
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

impl NameCache for AsnNameCache {
    fn get(&self, key: &str) -> Result<Option<String>> {
        self.db
            .conn
            .query_row(
                "SELECT value FROM asn_names WHERE key = ?1 AND expires_at > ?2",
                params![key, Utc::now().timestamp()],
                |row| {
                    let value = match row.get_ref(0)? {
                        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
                            String::from_utf8_lossy(bytes).into_owned()
                        }
                        ValueRef::Integer(i) => i.to_string(),
                        ValueRef::Real(f) => f.to_string(),
                        ValueRef::Null => String::new(),
                    };
                    Ok(value)
                },
            )
            .optional()
            .map_err(|e| anyhow!("Failed to read cached name for {}: {}", key, e))
    }

    fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let ttl_secs = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);
        let expires_at = Utc::now().timestamp().saturating_add(ttl_secs);
        self.db
            .conn
            .execute(
                "INSERT OR REPLACE INTO asn_names (key, value, expires_at) VALUES (?1, ?2, ?3)",
                params![key, value, expires_at],
            )
            .map_err(|e| anyhow!("Failed to cache name for {}: {}", key, e))?;
        Ok(())
    }
}
