//! Deterministic test doubles for the pipeline's backends

#![allow(dead_code)]

use async_trait::async_trait;
use std::ops::Range;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use docqa_rag::embeddings::MemoryEmbeddingCache;
use docqa_rag::error::{Error, Result};
use docqa_rag::ingestion::{DocumentExtractor, TextChunker, Tokenizer};
use docqa_rag::processing::{DocumentRegistry, PipelineComponents, RagPipeline};
use docqa_rag::providers::{EmbeddingProvider, LlmProvider, LocalVectorStore};
use docqa_rag::{RagConfig, TextSegment};

pub const DIMENSIONS: usize = 1024;

/// Bag-of-words embedding: lowercase alphanumeric words hashed into buckets
pub struct HashEmbedder {
    pub calls: AtomicUsize,
    pub delay: Option<Duration>,
}

impl HashEmbedder {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            delay: None,
        }
    }

    /// Embedder that sleeps before answering each batch
    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::new()
        }
    }

    pub fn vector(text: &str) -> Vec<f32> {
        let mut v = vec![0.0; DIMENSIONS];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            // FNV-1a
            let mut hash: u64 = 0xcbf29ce484222325;
            for byte in word.to_lowercase().bytes() {
                hash ^= u64::from(byte);
                hash = hash.wrapping_mul(0x100000001b3);
            }
            v[(hash % DIMENSIONS as u64) as usize] += 1.0;
        }
        v
    }
}

#[async_trait]
impl EmbeddingProvider for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(Self::vector(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(texts.iter().map(|t| Self::vector(t)).collect())
    }

    fn dimensions(&self) -> usize {
        DIMENSIONS
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn name(&self) -> &str {
        "hash"
    }

    fn model(&self) -> &str {
        "hash-bow-1024"
    }
}

/// One token per whitespace-separated word
pub struct WhitespaceTokenizer;

impl Tokenizer for WhitespaceTokenizer {
    fn tokenize(&self, text: &str) -> Vec<Range<usize>> {
        let mut tokens = Vec::new();
        let mut start = None;
        for (i, c) in text.char_indices() {
            match (c.is_whitespace(), start) {
                (true, Some(s)) => {
                    tokens.push(s..i);
                    start = None;
                }
                (false, None) => start = Some(i),
                _ => {}
            }
        }
        if let Some(s) = start {
            tokens.push(s..text.len());
        }
        tokens
    }

    fn name(&self) -> &str {
        "whitespace"
    }
}

/// Ignores the uploaded bytes and returns fixed segments
pub struct FixtureExtractor {
    pub segments: Vec<TextSegment>,
}

impl DocumentExtractor for FixtureExtractor {
    fn extract(&self, _data: &[u8]) -> Result<Vec<TextSegment>> {
        Ok(self.segments.clone())
    }
}

/// Generator with a fixed reply, an optional delay and a call counter
pub struct ScriptedLlm {
    pub reply: String,
    pub delay: Option<Duration>,
    pub fail: bool,
    pub calls: AtomicUsize,
}

impl ScriptedLlm {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            delay: None,
            fail: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LlmProvider for ScriptedLlm {
    async fn generate(&self, _prompt: &str, _temperature: f32) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(Error::llm("connection refused"));
        }
        Ok(self.reply.clone())
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(!self.fail)
    }

    fn name(&self) -> &str {
        "scripted"
    }

    fn model(&self) -> &str {
        "scripted-v1"
    }
}

fn words(prefix: &str, n: usize) -> Vec<String> {
    (0..n).map(|i| format!("{}{}", prefix, i)).collect()
}

/// Three pages of 26, 18 and 18 words.
///
/// With chunk size 10 and overlap 2 this yields 7 chunks: 0..=2 from page 1, 3..=4
/// from page 2, 5..=6 from page 3. The first 8 words of page 2 appear only in chunk 3.
pub fn three_page_document() -> Vec<TextSegment> {
    let page1 = words("intro", 26).join(" ");

    let mut page2: Vec<String> = [
        "photosynthesis", "converts", "sunlight", "into", "chemical", "energy", "inside",
        "chloroplasts",
    ]
    .iter()
    .map(|w| w.to_string())
    .collect();
    page2.extend(words("result", 10));
    let page2 = page2.join(" ");

    let page3 = words("discussion", 18).join(" ");

    vec![
        TextSegment::new(page1, 1, "Introduction"),
        TextSegment::new(page2, 2, "Results"),
        TextSegment::new(page3, 3, "Discussion"),
    ]
}

/// Question sharing vocabulary with chunk 3 only
pub const MATCHING_QUESTION: &str = "How does photosynthesis convert sunlight into chemical energy?";

/// Question sharing no vocabulary with the document
pub const UNRELATED_QUESTION: &str = "What is the capital of France?";

pub fn test_config() -> RagConfig {
    let mut config = RagConfig::default();
    config.chunking.chunk_size = 10;
    config.chunking.chunk_overlap = 2;
    config.embeddings.dimensions = DIMENSIONS;
    config.vector_db.hnsw_max_elements = 1_000;
    config.retrieval.similarity_threshold = 0.3;
    config.pipeline.data_dir = None;
    config
}

pub fn test_chunker(config: &RagConfig) -> TextChunker {
    TextChunker::new(
        config.chunking.chunk_size,
        config.chunking.chunk_overlap,
        Arc::new(WhitespaceTokenizer),
    )
    .unwrap()
}

/// Pipeline over in-memory backends
pub fn pipeline_with(
    config: RagConfig,
    segments: Vec<TextSegment>,
    embedder: Arc<HashEmbedder>,
    llm: Arc<ScriptedLlm>,
) -> RagPipeline {
    let store = Arc::new(LocalVectorStore::from_config(&config));
    pipeline_over_store(config, segments, embedder, llm, store)
}

/// Pipeline over a caller-provided store and a fresh, empty registry
pub fn pipeline_over_store(
    config: RagConfig,
    segments: Vec<TextSegment>,
    embedder: Arc<HashEmbedder>,
    llm: Arc<ScriptedLlm>,
    store: Arc<LocalVectorStore>,
) -> RagPipeline {
    let components = PipelineComponents {
        extractor: Arc::new(FixtureExtractor { segments }),
        chunker: test_chunker(&config),
        embedder,
        cache: Arc::new(MemoryEmbeddingCache::new()),
        vector_store: store,
        llm,
        registry: DocumentRegistry::in_memory(),
    };
    RagPipeline::new(config, components).unwrap()
}
