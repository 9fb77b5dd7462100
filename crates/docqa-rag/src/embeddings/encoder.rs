//! Cached text encoder

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::providers::EmbeddingProvider;

use super::cache::{fingerprint, EmbeddingCache};

/// Cache hit/miss counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EncoderStats {
    pub hits: u64,
    pub misses: u64,
}

/// Encodes text to vectors, memoized by `(model, text)` fingerprint.
///
/// Cache misses within one call are deduplicated and sent to the backend in batches.
/// Fresh vectors are written to the cache only after every batch has succeeded.
pub struct CachedEncoder {
    provider: Arc<dyn EmbeddingProvider>,
    cache: Arc<dyn EmbeddingCache>,
    batch_size: usize,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl CachedEncoder {
    pub fn new(
        provider: Arc<dyn EmbeddingProvider>,
        cache: Arc<dyn EmbeddingCache>,
        batch_size: usize,
    ) -> Self {
        Self {
            provider,
            cache,
            batch_size: batch_size.max(1),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Model identifier used in fingerprints
    pub fn model(&self) -> &str {
        self.provider.model()
    }

    /// Vector dimension every encoding must have
    pub fn dimensions(&self) -> usize {
        self.provider.dimensions()
    }

    pub fn provider(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.provider
    }

    pub fn stats(&self) -> EncoderStats {
        EncoderStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    /// Encode one text
    pub async fn encode_one(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.encode(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| Error::embedding("Encoder returned no vector"))
    }

    /// Encode texts, one vector per input in input order
    pub async fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let model = self.model().to_string();
        let keys: Vec<String> = texts.iter().map(|t| fingerprint(&model, t)).collect();

        let lookups = self.lookup(keys.clone()).await;

        let mut vectors: Vec<Option<Vec<f32>>> = Vec::with_capacity(texts.len());
        // Distinct misses in first-seen order, and the input positions waiting on each
        let mut pending: Vec<(String, String)> = Vec::new();
        let mut waiting: HashMap<String, Vec<usize>> = HashMap::new();

        for (i, ((key, text), cached)) in keys.iter().zip(texts).zip(lookups).enumerate() {
            match cached {
                Some(vector) if vector.len() == self.dimensions() => {
                    vectors.push(Some(vector));
                }
                _ => {
                    vectors.push(None);
                    let positions = waiting.entry(key.clone()).or_default();
                    if positions.is_empty() {
                        pending.push((key.clone(), text.clone()));
                    }
                    positions.push(i);
                }
            }
        }

        let hits = (texts.len() - waiting.values().map(Vec::len).sum::<usize>()) as u64;
        self.hits.fetch_add(hits, Ordering::Relaxed);
        self.misses.fetch_add(pending.len() as u64, Ordering::Relaxed);
        tracing::debug!(
            "Encoding {} texts: {} cache hits, {} distinct misses",
            texts.len(),
            hits,
            pending.len()
        );

        let mut fresh: Vec<(String, Vec<f32>)> = Vec::with_capacity(pending.len());
        for batch in pending.chunks(self.batch_size) {
            let batch_texts: Vec<String> = batch.iter().map(|(_, text)| text.clone()).collect();
            let embedded = self
                .provider
                .embed_batch(&batch_texts)
                .await
                .map_err(|e| match e {
                    Error::Embedding(_) => e,
                    other => Error::embedding(other.to_string()),
                })?;

            if embedded.len() != batch.len() {
                return Err(Error::embedding(format!(
                    "Backend returned {} vectors for {} texts",
                    embedded.len(),
                    batch.len()
                )));
            }
            for vector in &embedded {
                if vector.len() != self.dimensions() {
                    return Err(Error::embedding(format!(
                        "Backend returned a {}-dimensional vector, expected {}",
                        vector.len(),
                        self.dimensions()
                    )));
                }
            }

            fresh.extend(batch.iter().map(|(key, _)| key.clone()).zip(embedded));
        }

        for (key, vector) in &fresh {
            if let Some(positions) = waiting.get(key) {
                for &i in positions {
                    vectors[i] = Some(vector.clone());
                }
            }
        }
        self.store(fresh).await;

        vectors
            .into_iter()
            .map(|v| v.ok_or_else(|| Error::internal("Missing embedding after encode")))
            .collect()
    }

    /// Cache reads on the blocking pool; a failed read counts as a miss
    async fn lookup(&self, keys: Vec<String>) -> Vec<Option<Vec<f32>>> {
        let cache = self.cache.clone();
        let count = keys.len();
        let read = tokio::task::spawn_blocking(move || {
            keys.iter()
                .map(|key| match cache.get(key) {
                    Ok(v) => v,
                    Err(e) => {
                        tracing::warn!("Embedding cache read failed, treating as miss: {}", e);
                        None
                    }
                })
                .collect::<Vec<_>>()
        })
        .await;

        read.unwrap_or_else(|e| {
            tracing::warn!("Embedding cache read task failed, treating as misses: {}", e);
            vec![None; count]
        })
    }

    /// Write fresh vectors on the blocking pool; failures are logged
    async fn store(&self, fresh: Vec<(String, Vec<f32>)>) {
        if fresh.is_empty() {
            return;
        }

        let cache = self.cache.clone();
        let written = tokio::task::spawn_blocking(move || cache.put_many(&fresh)).await;
        match written {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!("Embedding cache write failed: {}", e),
            Err(e) => tracing::warn!("Embedding cache write task failed: {}", e),
        }
    }
}
