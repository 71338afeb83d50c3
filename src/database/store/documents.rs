//! Path document store
//!
//! Each persisted routing path is one JSON document keyed by its
//! deterministic record id. The document body is kept verbatim; `prefix`,
//! `family` and `last_seen` are copied into columns for lookups.

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use ipnet::IpNet;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A stored path document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathDocument {
    pub id: String,
    pub fields: Map<String, Value>,
}

impl PathDocument {
    pub fn new(id: impl Into<String>, fields: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }

    /// Merge `incoming` over `self`
    ///
    /// Keys present in `incoming` replace existing values; keys only present
    /// in `self` are kept.
    pub fn merge(&mut self, incoming: Map<String, Value>) {
        for (key, value) in incoming {
            self.fields.insert(key, value);
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    fn str_field(&self, key: &str) -> &str {
        self.fields.get(key).and_then(Value::as_str).unwrap_or("")
    }

    pub fn prefix(&self) -> &str {
        self.str_field("prefix")
    }

    pub fn family(&self) -> &str {
        self.str_field("family")
    }

    /// `last_seen` parsed from its RFC 3339 form
    pub fn last_seen(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(self.str_field("last_seen"))
            .ok()
            .map(|t| t.with_timezone(&Utc))
    }
}

/// Storage seam used by the persister
///
/// Writes are whole-document: `update` replaces the stored body with the
/// already-merged document.
pub trait DocumentStore {
    /// Existence check for callers that do not need the body; the persister
    /// reads through `get` since it merges into the stored document
    fn exists(&self, id: &str) -> Result<bool>;
    fn get(&self, id: &str) -> Result<Option<PathDocument>>;
    fn create(&self, doc: &PathDocument) -> Result<()>;
    fn update(&self, doc: &PathDocument) -> Result<()>;
}

/// SQLite-backed path document repository
pub struct PathDocumentRepository<'a> {
    conn: &'a Connection,
}

impl<'a> PathDocumentRepository<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Number of stored documents
    pub fn count(&self) -> Result<u64> {
        self.conn
            .query_row("SELECT COUNT(*) FROM path_documents", [], |row| row.get(0))
            .map_err(|e| anyhow!("Failed to count path documents: {}", e))
    }

    /// Number of stored documents per family
    pub fn count_by_family(&self) -> Result<Vec<(String, u64)>> {
        let mut stmt = self
            .conn
            .prepare("SELECT family, COUNT(*) FROM path_documents GROUP BY family ORDER BY family")
            .map_err(|e| anyhow!("Failed to prepare family count query: {}", e))?;
        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
            .map_err(|e| anyhow!("Failed to count path documents by family: {}", e))?;
        let counts = rows
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| anyhow!("Failed to read family counts: {}", e))?;
        Ok(counts)
    }

    /// Documents whose prefix is contained in `network` (including equal)
    ///
    /// SQLite has no network type, so candidates of the right family are
    /// filtered here.
    pub fn find_within(&self, network: &IpNet) -> Result<Vec<PathDocument>> {
        let family = match network {
            IpNet::V4(_) => "ipv4",
            IpNet::V6(_) => "ipv6",
        };

        let mut stmt = self
            .conn
            .prepare("SELECT id, body FROM path_documents WHERE family = ?1 ORDER BY prefix, id")
            .map_err(|e| anyhow!("Failed to prepare path document query: {}", e))?;
        let rows = stmt
            .query_map([family], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })
            .map_err(|e| anyhow!("Failed to query path documents: {}", e))?;

        let mut docs = Vec::new();
        for row in rows {
            let (id, body) = row.map_err(|e| anyhow!("Failed to read path document: {}", e))?;
            let doc = decode_body(id, &body)?;
            let contained = doc
                .prefix()
                .parse::<IpNet>()
                .map(|prefix| network.contains(&prefix))
                .unwrap_or(false);
            if contained {
                docs.push(doc);
            }
        }
        Ok(docs)
    }

    fn write(&self, sql: &str, doc: &PathDocument) -> Result<usize> {
        let body = serde_json::to_string(&doc.fields)
            .map_err(|e| anyhow!("Failed to serialize document {}: {}", doc.id, e))?;
        let last_seen = doc.last_seen().map(|t| t.timestamp()).unwrap_or(0);
        self.conn
            .execute(
                sql,
                params![doc.id, doc.prefix(), doc.family(), body, last_seen],
            )
            .map_err(|e| anyhow!("Failed to write document {}: {}", doc.id, e))
    }
}

impl DocumentStore for PathDocumentRepository<'_> {
    fn exists(&self, id: &str) -> Result<bool> {
        let count: i64 = self
            .conn
            .query_row(
                "SELECT COUNT(*) FROM path_documents WHERE id = ?1",
                [id],
                |row| row.get(0),
            )
            .map_err(|e| anyhow!("Failed to check document {}: {}", id, e))?;
        Ok(count > 0)
    }

    fn get(&self, id: &str) -> Result<Option<PathDocument>> {
        let body: Option<String> = self
            .conn
            .query_row(
                "SELECT body FROM path_documents WHERE id = ?1",
                [id],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| anyhow!("Failed to read document {}: {}", id, e))?;

        body.map(|b| decode_body(id.to_string(), &b)).transpose()
    }

    fn create(&self, doc: &PathDocument) -> Result<()> {
        self.write(
            "INSERT INTO path_documents (id, prefix, family, body, last_seen) VALUES (?1, ?2, ?3, ?4, ?5)",
            doc,
        )?;
        Ok(())
    }

    fn update(&self, doc: &PathDocument) -> Result<()> {
        let changed = self.write(
            "UPDATE path_documents SET prefix = ?2, family = ?3, body = ?4, last_seen = ?5 WHERE id = ?1",
            doc,
        )?;
        if changed == 0 {
            return Err(anyhow!("Document {} does not exist", doc.id));
        }
        Ok(())
    }
}

fn decode_body(id: String, body: &str) -> Result<PathDocument> {
    let fields: Map<String, Value> = serde_json::from_str(body)
        .map_err(|e| anyhow!("Corrupt body for document {}: {}", id, e))?;
    Ok(PathDocument { id, fields })
}
