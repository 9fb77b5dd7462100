//! Token-window chunking with page and section tracking

use std::ops::Range;
use std::sync::Arc;
use uuid::Uuid;

use crate::config::ChunkingConfig;
use crate::error::{Error, Result};
use crate::types::{Chunk, TextSegment};

use super::tokenizer::{HfTokenizer, SubwordTokenizer, Tokenizer};

/// Text chunker with configurable size and overlap, both in tokens
pub struct TextChunker {
    chunk_size: usize,
    overlap: usize,
    span_segments: bool,
    tokenizer: Arc<dyn Tokenizer>,
}

impl TextChunker {
    /// Create a new chunker; requires `0 <= overlap < chunk_size`
    pub fn new(chunk_size: usize, overlap: usize, tokenizer: Arc<dyn Tokenizer>) -> Result<Self> {
        if chunk_size == 0 || overlap >= chunk_size {
            return Err(Error::Config(format!(
                "chunk overlap ({}) must be smaller than chunk size ({})",
                overlap, chunk_size
            )));
        }
        Ok(Self {
            chunk_size,
            overlap,
            span_segments: false,
            tokenizer,
        })
    }

    /// Build from configuration, loading a HuggingFace tokenizer when one is configured
    pub fn from_config(config: &ChunkingConfig) -> Result<Self> {
        let tokenizer: Arc<dyn Tokenizer> = match &config.tokenizer_path {
            Some(path) => Arc::new(HfTokenizer::from_file(path)?),
            None => Arc::new(SubwordTokenizer::new()),
        };
        tracing::debug!(
            "Chunker: size={} overlap={} tokenizer={} span_segments={}",
            config.chunk_size,
            config.chunk_overlap,
            tokenizer.name(),
            config.span_segments
        );
        Ok(Self::new(config.chunk_size, config.chunk_overlap, tokenizer)?
            .with_span_segments(config.span_segments))
    }

    /// Window over the whole document instead of each segment
    pub fn with_span_segments(mut self, span_segments: bool) -> Self {
        self.span_segments = span_segments;
        self
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Chunk a document's segments.
    ///
    /// Fails with `EmptyDocument` when no segment contains a token.
    pub fn chunk_segments(&self, document_id: Uuid, segments: &[TextSegment]) -> Result<Vec<Chunk>> {
        let chunks = if self.span_segments {
            self.chunk_spanning(document_id, segments)
        } else {
            self.chunk_per_segment(document_id, segments)
        };

        if chunks.is_empty() {
            return Err(Error::EmptyDocument);
        }
        Ok(chunks)
    }

    /// Token-index windows over a stream of `n` tokens.
    ///
    /// Every window holds at most `chunk_size` tokens, consecutive windows share exactly
    /// `overlap` tokens, and the last window ends at `n`.
    pub fn windows(&self, n: usize) -> Vec<Range<usize>> {
        let mut windows = Vec::new();
        if n == 0 {
            return windows;
        }

        let mut start = 0;
        loop {
            let end = (start + self.chunk_size).min(n);
            windows.push(start..end);
            if end == n {
                break;
            }
            start = end - self.overlap;
        }
        windows
    }

    fn chunk_per_segment(&self, document_id: Uuid, segments: &[TextSegment]) -> Vec<Chunk> {
        let mut chunks = Vec::new();

        for segment in segments {
            let tokens = self.tokenizer.tokenize(&segment.text);
            for window in self.windows(tokens.len()) {
                let span = tokens[window.start].start..tokens[window.end - 1].end;
                chunks.push(Chunk {
                    document_id,
                    chunk_index: chunks.len() as u32,
                    content: segment.text[span].to_string(),
                    page: segment.page,
                    section: segment.section.clone(),
                    token_count: window.len(),
                });
            }
        }

        chunks
    }

    fn chunk_spanning(&self, document_id: Uuid, segments: &[TextSegment]) -> Vec<Chunk> {
        // (segment index, byte span) for every token in document order
        let tokens: Vec<(usize, Range<usize>)> = segments
            .iter()
            .enumerate()
            .flat_map(|(i, segment)| {
                self.tokenizer
                    .tokenize(&segment.text)
                    .into_iter()
                    .map(move |span| (i, span))
            })
            .collect();

        self.windows(tokens.len())
            .into_iter()
            .enumerate()
            .map(|(chunk_index, window)| {
                let window_tokens = &tokens[window.clone()];

                // Contiguous per-segment runs within the window
                let mut runs: Vec<(usize, Range<usize>, usize)> = Vec::new();
                for (segment_idx, span) in window_tokens {
                    match runs.last_mut() {
                        Some((idx, run, count)) if *idx == *segment_idx => {
                            run.end = span.end;
                            *count += 1;
                        }
                        _ => runs.push((*segment_idx, span.clone(), 1)),
                    }
                }

                // Most tokens wins, earliest on ties
                let mut dominant = &runs[0];
                for run in &runs[1..] {
                    if run.2 > dominant.2 {
                        dominant = run;
                    }
                }
                let source = &segments[dominant.0];

                let content = runs
                    .iter()
                    .map(|(idx, span, _)| &segments[*idx].text[span.clone()])
                    .collect::<Vec<_>>()
                    .join("\n");

                Chunk {
                    document_id,
                    chunk_index: chunk_index as u32,
                    content,
                    page: source.page,
                    section: source.section.clone(),
                    token_count: window.len(),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn chunker(size: usize, overlap: usize) -> TextChunker {
        TextChunker::new(size, overlap, Arc::new(SubwordTokenizer::new())).unwrap()
    }

    fn words(n: usize, prefix: &str) -> String {
        (0..n).map(|i| format!("{}{}", prefix, i % 10)).collect::<Vec<_>>().join(" ")
    }

    #[test]
    fn test_rejects_invalid_overlap() {
        let tokenizer: Arc<dyn Tokenizer> = Arc::new(SubwordTokenizer::new());
        assert!(TextChunker::new(10, 10, tokenizer.clone()).is_err());
        assert!(TextChunker::new(0, 0, tokenizer.clone()).is_err());
        assert!(TextChunker::new(10, 0, tokenizer).is_ok());
    }

    #[test]
    fn test_windows() {
        assert_eq!(chunker(10, 2).windows(26), vec![0..10, 8..18, 16..26]);
        assert_eq!(chunker(10, 2).windows(5), vec![0..5]);
        assert_eq!(chunker(10, 2).windows(10), vec![0..10]);
        assert_eq!(chunker(10, 0).windows(20), vec![0..10, 10..20]);
        assert!(chunker(10, 2).windows(0).is_empty());
    }

    #[test]
    fn test_short_segment_yields_own_chunk() {
        let doc = Uuid::new_v4();
        let segments = vec![
            TextSegment::new(words(25, "w"), 1, "Abstract"),
            TextSegment::new("tiny", 2, "Introduction"),
        ];
        let chunks = chunker(10, 2).chunk_segments(doc, &segments).unwrap();

        assert_eq!(chunks.len(), 4);
        let last = chunks.last().unwrap();
        assert_eq!(last.content, "tiny");
        assert_eq!(last.page, 2);
        assert_eq!(last.section, "Introduction");
        assert_eq!(last.token_count, 1);

        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.chunk_index, i as u32);
            assert_eq!(chunk.document_id, doc);
            assert!(chunk.token_count <= 10);
            assert!(!chunk.content.is_empty());
        }
    }

    #[test]
    fn test_chunk_text_is_source_slice() {
        let text = "Alpha beta gamma delta epsilon zeta eta theta iota kappa lambda mu";
        let segments = vec![TextSegment::new(text, 1, "Results")];
        let chunks = chunker(5, 1).chunk_segments(Uuid::new_v4(), &segments).unwrap();

        for chunk in &chunks {
            assert!(text.contains(&chunk.content));
        }
        assert!(chunks[0].content.starts_with("Alpha"));
        assert!(chunks.last().unwrap().content.ends_with("mu"));
    }

    #[test]
    fn test_empty_document() {
        let segments = vec![TextSegment::new("   \n  ", 1, "Unknown")];
        let err = chunker(10, 2).chunk_segments(Uuid::new_v4(), &segments).unwrap_err();
        assert!(matches!(err, Error::EmptyDocument));
        assert!(matches!(
            chunker(10, 2).chunk_segments(Uuid::new_v4(), &[]),
            Err(Error::EmptyDocument)
        ));
    }

    #[test]
    fn test_span_segments_dominant_source() {
        let segments = vec![
            TextSegment::new(words(7, "a"), 1, "Abstract"),
            TextSegment::new(words(7, "b"), 2, "Introduction"),
        ];
        let chunks = chunker(10, 2)
            .with_span_segments(true)
            .chunk_segments(Uuid::new_v4(), &segments)
            .unwrap();

        // windows over 14 tokens: 0..10, 8..14
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].page, 1);
        assert_eq!(chunks[0].section, "Abstract");
        assert_eq!(chunks[0].content, format!("{}\nb0 b1 b2", words(7, "a")));
        assert_eq!(chunks[1].page, 2);
        assert_eq!(chunks[1].token_count, 6);
    }

    #[test]
    fn test_span_segments_tie_goes_to_earliest() {
        let segments = vec![
            TextSegment::new("one two", 3, "Results"),
            TextSegment::new("three four", 4, "Discussion"),
        ];
        let chunks = chunker(4, 1)
            .with_span_segments(true)
            .chunk_segments(Uuid::new_v4(), &segments)
            .unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].page, 3);
        assert_eq!(chunks[0].section, "Results");
    }

    proptest! {
        #[test]
        fn prop_windows_cover_stream_with_exact_overlap(
            n in 1usize..400,
            size in 1usize..64,
            overlap_seed in 0usize..64,
        ) {
            let overlap = overlap_seed % size;
            let windows = chunker(size, overlap).windows(n);

            prop_assert_eq!(windows[0].start, 0);
            prop_assert_eq!(windows.last().unwrap().end, n);
            for w in &windows {
                prop_assert!(!w.is_empty());
                prop_assert!(w.len() <= size);
            }
            for pair in windows.windows(2) {
                prop_assert_eq!(pair[0].end - pair[1].start, overlap);
            }
        }

        #[test]
        fn prop_chunks_reconstruct_token_stream(
            tokens in proptest::collection::vec("[a-z]{1,12}", 1..120),
            size in 2usize..40,
            overlap_seed in 0usize..40,
        ) {
            let overlap = overlap_seed % size;
            let text = tokens.join(" ");
            let tokenizer = SubwordTokenizer::new();
            let expected: Vec<&str> = tokenizer
                .tokenize(&text)
                .into_iter()
                .map(|span| &text[span])
                .collect();

            let segments = vec![TextSegment::new(text.clone(), 1, "Unknown")];
            let chunks = chunker(size, overlap)
                .chunk_segments(Uuid::new_v4(), &segments)
                .unwrap();

            let mut rebuilt: Vec<String> = Vec::new();
            for (i, chunk) in chunks.iter().enumerate() {
                let pieces: Vec<String> = tokenizer
                    .tokenize(&chunk.content)
                    .into_iter()
                    .map(|span| chunk.content[span].to_string())
                    .collect();
                prop_assert_eq!(pieces.len(), chunk.token_count);
                prop_assert!(chunk.token_count <= size);
                let skip = if i == 0 { 0 } else { overlap };
                rebuilt.extend(pieces.into_iter().skip(skip));
            }

            prop_assert_eq!(rebuilt, expected);
        }
    }
}
