//! Database module
//!
//! All persistent state of ribscope lives in SQLite files:
//!
//! ```text
//! database/
//! ├── core/            # Foundation
//! │   ├── connection   # DatabaseConn wrapper (WAL, busy timeout)
//! │   └── schema       # Table definitions and SchemaManager
//! │
//! └── store/           # Stores
//!     ├── documents    # Path documents, one file per target database
//!     └── asn_cache    # ASN names with expiry, one file shared by all runs
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use ribscope::database::{RibscopeDatabase, AsnNameCache, NameCache};
//!
//! let db = RibscopeDatabase::open_in_dir("~/.ribscope", "ribscope")?;
//! let docs = db.documents().find_within(&"203.0.113.0/24".parse()?)?;
//!
//! let cache = AsnNameCache::open("~/.ribscope/asn-cache.sqlite3")?;
//! let name = cache.get("asn:64500")?;
//! ```

pub mod core;
pub mod store;

pub use core::{DatabaseConn, SchemaDefinitions, SchemaManager, SchemaStatus, SCHEMA_VERSION};

pub use store::{
    AsnNameCache, DocumentStore, NameCache, PathDocument, PathDocumentRepository,
    RibscopeDatabase, DEFAULT_ASN_CACHE_TTL,
};

/// Ensure the data directory exists
pub fn ensure_data_dir(data_dir: &str) -> anyhow::Result<()> {
    std::fs::create_dir_all(data_dir)
        .map_err(|e| anyhow::anyhow!("Failed to create data directory '{}': {}", data_dir, e))
}
