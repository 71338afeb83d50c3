//! Merge-upsert of canonical paths into the document store

use super::path::{CanonicalPath, IxpTable};
use super::resolve::AsnResolver;
use crate::database::{DocumentStore, PathDocument};
use anyhow::Result;
use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::{error, info, warn};

/// Log a progress line every this many records
const PROGRESS_INTERVAL: usize = 100;

/// A record that could not be written
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PersistFailure {
    pub id: String,
    pub prefix: String,
    pub error: String,
}

/// Outcome of persisting one batch
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PersistReport {
    pub created: usize,
    pub updated: usize,
    pub failed: Vec<PersistFailure>,
}

impl PersistReport {
    pub fn written(&self) -> usize {
        self.created + self.updated
    }
}

enum WriteOutcome {
    Created,
    Updated,
}

/// Writes canonical paths as documents keyed by their record id
///
/// Existing documents are merged: new values win per key and keys missing
/// from the new record are kept, so replaying an unchanged batch only moves
/// `last_seen`.
pub struct Persister<'a> {
    store: &'a dyn DocumentStore,
    ixps: &'a IxpTable,
    retries: u32,
}

impl<'a> Persister<'a> {
    pub fn new(store: &'a dyn DocumentStore, ixps: &'a IxpTable) -> Self {
        Self {
            store,
            ixps,
            retries: 1,
        }
    }

    /// Extra attempts for a record whose write failed
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn persist(&self, paths: &[CanonicalPath], resolver: &mut AsnResolver) -> PersistReport {
        self.persist_with_progress(paths, resolver, |_, _| {})
    }

    /// Persist `paths`, calling `progress(done, total)` after each record
    pub fn persist_with_progress<F>(
        &self,
        paths: &[CanonicalPath],
        resolver: &mut AsnResolver,
        mut progress: F,
    ) -> PersistReport
    where
        F: FnMut(usize, usize),
    {
        let total = paths.len();
        let mut report = PersistReport::default();

        for (idx, path) in paths.iter().enumerate() {
            let id = path.record_id();
            let mut fields = path.to_fields(self.ixps);
            fields.insert(
                "as_name".to_string(),
                json!(resolver.resolve_opt(path.source_asn())),
            );

            match self.write_with_retries(&id, fields) {
                Ok(WriteOutcome::Created) => report.created += 1,
                Ok(WriteOutcome::Updated) => report.updated += 1,
                Err(e) => {
                    error!("Failed to persist {} ({}): {}", path.prefix, id, e);
                    report.failed.push(PersistFailure {
                        id,
                        prefix: path.prefix.to_string(),
                        error: e.to_string(),
                    });
                }
            }

            let done = idx + 1;
            if done % PROGRESS_INTERVAL == 0 {
                info!("Persisted {}/{} paths", done, total);
            }
            progress(done, total);
        }

        info!(
            "Persisted {} paths: {} created, {} updated, {} failed",
            total,
            report.created,
            report.updated,
            report.failed.len()
        );
        report
    }

    fn write_with_retries(&self, id: &str, fields: Map<String, Value>) -> Result<WriteOutcome> {
        let mut attempt = 0;
        loop {
            match self.write(id, fields.clone()) {
                Ok(outcome) => return Ok(outcome),
                Err(e) if attempt < self.retries => {
                    attempt += 1;
                    warn!("Retrying write of {} ({}/{}): {}", id, attempt, self.retries, e);
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn write(&self, id: &str, mut fields: Map<String, Value>) -> Result<WriteOutcome> {
        let now = json!(Utc::now().to_rfc3339());
        fields.insert("last_seen".to_string(), now.clone());

        match self.store.get(id)? {
            Some(mut doc) => {
                doc.merge(fields);
                self.store.update(&doc)?;
                Ok(WriteOutcome::Updated)
            }
            None => {
                fields.insert("first_seen".to_string(), now);
                self.store.create(&PathDocument::new(id, fields))?;
                Ok(WriteOutcome::Created)
            }
        }
    }
}
