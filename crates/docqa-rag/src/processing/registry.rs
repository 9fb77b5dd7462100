//! Registry of indexed documents
//!
//! Answers "was this document ever indexed?" independently of search results, so a
//! query that matches nothing is never mistaken for an unknown document.

use dashmap::DashMap;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::types::DocumentRecord;

/// Concurrent document registry, optionally persisted as a JSON file
pub struct DocumentRegistry {
    records: Arc<DashMap<Uuid, DocumentRecord>>,
    path: Option<PathBuf>,
    /// Serializes snapshot writes
    write_lock: Arc<Mutex<()>>,
}

impl DocumentRegistry {
    /// Registry that lives only as long as the process
    pub fn in_memory() -> Self {
        Self {
            records: Arc::new(DashMap::new()),
            path: None,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Load the registry from `path`, starting empty if the file does not exist
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let records = DashMap::new();

        if path.exists() {
            let raw = std::fs::read_to_string(&path)?;
            let loaded: Vec<DocumentRecord> = serde_json::from_str(&raw)?;
            tracing::info!("Loaded {} documents from {}", loaded.len(), path.display());
            for record in loaded {
                records.insert(record.id, record);
            }
        } else if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        Ok(Self {
            records: Arc::new(records),
            path: Some(path),
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    /// Open the registry at `path`, or an in-memory one when unset
    pub fn from_path(path: Option<PathBuf>) -> Result<Self> {
        match path {
            Some(path) => Self::open(path),
            None => Ok(Self::in_memory()),
        }
    }

    pub fn contains(&self, document_id: Uuid) -> bool {
        self.records.contains_key(&document_id)
    }

    pub fn get(&self, document_id: Uuid) -> Option<DocumentRecord> {
        self.records.get(&document_id).map(|r| r.value().clone())
    }

    /// All records, most recently indexed first
    pub fn list(&self) -> Vec<DocumentRecord> {
        snapshot(&self.records)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Insert or replace a record and persist the snapshot.
    ///
    /// The record is visible immediately; the file write runs on the blocking pool.
    pub async fn record(&self, record: DocumentRecord) -> Result<()> {
        self.records.insert(record.id, record);

        let Some(path) = self.path.clone() else {
            return Ok(());
        };
        let records = self.records.clone();
        let write_lock = self.write_lock.clone();

        tokio::task::spawn_blocking(move || {
            // Snapshot under the lock so the last write always carries the newest state
            let _guard = write_lock.lock();
            persist(&snapshot(&records), &path)
        })
        .await
        .map_err(|e| Error::Internal(format!("Task join error: {}", e)))?
    }
}

fn snapshot(records: &DashMap<Uuid, DocumentRecord>) -> Vec<DocumentRecord> {
    let mut records: Vec<DocumentRecord> = records.iter().map(|r| r.value().clone()).collect();
    records.sort_by(|a, b| b.indexed_at.cmp(&a.indexed_at));
    records
}

/// Write all records to disk via a temporary file and rename
fn persist(records: &[DocumentRecord], path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(records)?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}
