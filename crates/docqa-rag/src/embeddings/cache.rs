//! Content-addressed embedding cache backends

use dashmap::DashMap;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use sha2::{Digest, Sha256};
use std::path::Path;

use crate::error::{Error, Result};

/// Deterministic cache key for a `(model, text)` pair: hex SHA-256 of `model || 0x00 || text`
pub fn fingerprint(model: &str, text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(model.as_bytes());
    hasher.update([0u8]);
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

/// Key-value store of embedding vectors by fingerprint.
///
/// Entries are immutable: a second `put` for an existing key keeps the first value.
pub trait EmbeddingCache: Send + Sync {
    /// Look up a vector by fingerprint
    fn get(&self, key: &str) -> Result<Option<Vec<f32>>>;

    /// Store a vector unless the key is already present
    fn put(&self, key: &str, vector: &[f32]) -> Result<()>;

    /// Store several vectors atomically
    fn put_many(&self, entries: &[(String, Vec<f32>)]) -> Result<()> {
        for (key, vector) in entries {
            self.put(key, vector)?;
        }
        Ok(())
    }

    /// Number of cached vectors
    fn len(&self) -> Result<usize>;

    fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

/// In-process cache
#[derive(Default)]
pub struct MemoryEmbeddingCache {
    entries: DashMap<String, Vec<f32>>,
}

impl MemoryEmbeddingCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EmbeddingCache for MemoryEmbeddingCache {
    fn get(&self, key: &str) -> Result<Option<Vec<f32>>> {
        Ok(self.entries.get(key).map(|v| v.value().clone()))
    }

    fn put(&self, key: &str, vector: &[f32]) -> Result<()> {
        self.entries
            .entry(key.to_string())
            .or_insert_with(|| vector.to_vec());
        Ok(())
    }

    fn len(&self) -> Result<usize> {
        Ok(self.entries.len())
    }
}

/// SQLite-backed cache that survives restarts
pub struct SqliteEmbeddingCache {
    conn: Mutex<Connection>,
}

impl SqliteEmbeddingCache {
    /// Create or open the cache database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)
            .map_err(|e| Error::Cache(format!("Failed to open {}: {}", path.display(), e)))?;
        Self::with_connection(conn)
    }

    /// Create an in-memory database
    pub fn in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            r#"
            PRAGMA journal_mode=WAL;
            PRAGMA synchronous=NORMAL;

            CREATE TABLE IF NOT EXISTS embeddings (
                fingerprint TEXT PRIMARY KEY,
                dimensions INTEGER NOT NULL,
                vector BLOB NOT NULL,
                created_at TEXT NOT NULL
            );
            "#,
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

fn encode_vector(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn decode_vector(blob: &[u8]) -> Result<Vec<f32>> {
    if blob.len() % 4 != 0 {
        return Err(Error::Cache(format!(
            "Corrupt cache entry: {} bytes is not a whole number of f32 values",
            blob.len()
        )));
    }
    Ok(blob
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}

impl EmbeddingCache for SqliteEmbeddingCache {
    fn get(&self, key: &str) -> Result<Option<Vec<f32>>> {
        let conn = self.conn.lock();
        let blob: Option<Vec<u8>> = conn
            .query_row(
                "SELECT vector FROM embeddings WHERE fingerprint = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;

        blob.map(|b| decode_vector(&b)).transpose()
    }

    fn put(&self, key: &str, vector: &[f32]) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT OR IGNORE INTO embeddings (fingerprint, dimensions, vector, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                key,
                vector.len() as i64,
                encode_vector(vector),
                chrono::Utc::now().to_rfc3339()
            ],
        )?;
        Ok(())
    }

    fn put_many(&self, entries: &[(String, Vec<f32>)]) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }

        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO embeddings (fingerprint, dimensions, vector, created_at) VALUES (?1, ?2, ?3, ?4)",
            )?;
            let now = chrono::Utc::now().to_rfc3339();
            for (key, vector) in entries {
                stmt.execute(params![key, vector.len() as i64, encode_vector(vector), &now])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn len(&self) -> Result<usize> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM embeddings", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}
