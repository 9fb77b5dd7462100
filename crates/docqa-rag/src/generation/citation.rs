//! Citation extraction and linking

use regex::Regex;

use crate::error::{Error, Result};
use crate::providers::VectorSearchResult;
use crate::types::Citation;

/// Finds `[Source N]` markers in generated answers and links them to retrieved chunks
pub struct CitationExtractor {
    marker: Regex,
    number: Regex,
}

impl CitationExtractor {
    pub fn new() -> Result<Self> {
        // [Source 1], [source  2], [Source 1, Source 2], [Sources 1, 2]
        let marker = Regex::new(r"(?i)\[\s*sources?\s*(\d+(?:\s*,\s*(?:sources?\s*)?\d+)*)\s*\]")
            .map_err(|e| Error::internal(format!("Invalid citation pattern: {}", e)))?;
        let number = Regex::new(r"\d+")
            .map_err(|e| Error::internal(format!("Invalid citation pattern: {}", e)))?;
        Ok(Self { marker, number })
    }

    /// Distinct source numbers referenced in `answer`, in order of first appearance
    pub fn source_indices(&self, answer: &str) -> Vec<usize> {
        let mut seen = Vec::new();
        for cap in self.marker.captures_iter(answer) {
            let Some(list) = cap.get(1) else { continue };
            for number in self.number.find_iter(list.as_str()) {
                // Overflowing numbers can never be in range
                let Ok(index) = number.as_str().parse::<usize>() else {
                    continue;
                };
                if !seen.contains(&index) {
                    seen.push(index);
                }
            }
        }
        seen
    }

    /// One citation per distinct in-range marker; out-of-range markers are dropped
    pub fn extract(&self, answer: &str, sources: &[VectorSearchResult], snippet_chars: usize) -> Vec<Citation> {
        self.source_indices(answer)
            .into_iter()
            .filter_map(|index| {
                let source = index.checked_sub(1).and_then(|i| sources.get(i));
                if source.is_none() {
                    tracing::warn!(
                        "Dropping citation marker [Source {}]: only {} sources were provided",
                        index,
                        sources.len()
                    );
                }
                source.map(|s| Citation::from_chunk(index, &s.chunk, s.similarity, snippet_chars))
            })
            .collect()
    }
}
