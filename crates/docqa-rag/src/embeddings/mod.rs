//! Embedding cache and cached encoder

mod cache;
mod encoder;

pub use cache::{fingerprint, EmbeddingCache, MemoryEmbeddingCache, SqliteEmbeddingCache};
pub use encoder::{CachedEncoder, EncoderStats};

use std::sync::Arc;

use crate::config::{CacheBackend, EmbeddingConfig};
use crate::error::Result;

/// Open the configured cache backend
pub fn open_cache(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingCache>> {
    Ok(match config.cache_backend {
        CacheBackend::Memory => Arc::new(MemoryEmbeddingCache::new()),
        CacheBackend::Sqlite => {
            let path = config.cache_path();
            tracing::info!("Embedding cache: {}", path.display());
            Arc::new(SqliteEmbeddingCache::open(path)?)
        }
    })
}
