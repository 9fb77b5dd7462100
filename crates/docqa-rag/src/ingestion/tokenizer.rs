//! Deterministic subword tokenization with byte spans

use std::ops::Range;
use std::path::Path;
use unicode_segmentation::UnicodeSegmentation;

use crate::error::{Error, Result};

/// Splits text into tokens, reported as byte ranges into the input.
///
/// The same text must always yield the same spans; chunk boundaries depend on it.
pub trait Tokenizer: Send + Sync {
    /// Byte spans of each token, in order, non-empty and on char boundaries
    fn tokenize(&self, text: &str) -> Vec<Range<usize>>;

    /// Number of tokens in `text`
    fn count(&self, text: &str) -> usize {
        self.tokenize(text).len()
    }

    /// Tokenizer name for logging
    fn name(&self) -> &str;
}

/// Model-free subword tokenizer.
///
/// Words come from Unicode word boundaries (UAX #29) with whitespace dropped. Words
/// longer than `piece_width` grapheme clusters are cut into consecutive pieces.
#[derive(Debug, Clone)]
pub struct SubwordTokenizer {
    piece_width: usize,
}

impl SubwordTokenizer {
    /// Grapheme clusters per piece
    pub const DEFAULT_PIECE_WIDTH: usize = 4;

    pub fn new() -> Self {
        Self {
            piece_width: Self::DEFAULT_PIECE_WIDTH,
        }
    }

    pub fn with_piece_width(piece_width: usize) -> Self {
        Self {
            piece_width: piece_width.max(1),
        }
    }
}

impl Default for SubwordTokenizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Tokenizer for SubwordTokenizer {
    fn tokenize(&self, text: &str) -> Vec<Range<usize>> {
        let mut spans = Vec::new();

        for (offset, word) in text.split_word_bound_indices() {
            if word.chars().all(char::is_whitespace) {
                continue;
            }

            let mut piece_start = offset;
            let mut graphemes = 0usize;
            for (g_offset, _) in word.grapheme_indices(true) {
                if graphemes == self.piece_width {
                    spans.push(piece_start..offset + g_offset);
                    piece_start = offset + g_offset;
                    graphemes = 0;
                }
                graphemes += 1;
            }
            spans.push(piece_start..offset + word.len());
        }

        spans
    }

    fn name(&self) -> &str {
        "subword"
    }
}

/// HuggingFace `tokenizer.json` tokenizer
pub struct HfTokenizer {
    inner: tokenizers::Tokenizer,
}

impl HfTokenizer {
    /// Load a tokenizer definition from disk
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let inner = tokenizers::Tokenizer::from_file(path).map_err(|e| {
            Error::Config(format!("Failed to load tokenizer {}: {}", path.display(), e))
        })?;
        Ok(Self { inner })
    }
}

impl Tokenizer for HfTokenizer {
    fn tokenize(&self, text: &str) -> Vec<Range<usize>> {
        let encoding = match self.inner.encode(text, false) {
            Ok(encoding) => encoding,
            Err(e) => {
                tracing::warn!("Tokenizer failed, falling back to subword tokenizer: {}", e);
                return SubwordTokenizer::new().tokenize(text);
            }
        };

        encoding
            .get_offsets()
            .iter()
            .filter(|(start, end)| start < end && *end <= text.len())
            .map(|&(start, end)| floor_char_boundary(text, start)..ceil_char_boundary(text, end))
            .collect()
    }

    fn name(&self) -> &str {
        "huggingface"
    }
}

fn floor_char_boundary(text: &str, mut index: usize) -> usize {
    while index > 0 && !text.is_char_boundary(index) {
        index -= 1;
    }
    index
}

fn ceil_char_boundary(text: &str, mut index: usize) -> usize {
    while index < text.len() && !text.is_char_boundary(index) {
        index += 1;
    }
    index
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens<'a>(text: &'a str, tokenizer: &dyn Tokenizer) -> Vec<&'a str> {
        tokenizer
            .tokenize(text)
            .into_iter()
            .map(|span| &text[span])
            .collect()
    }

    #[test]
    fn test_words_and_punctuation() {
        let tokenizer = SubwordTokenizer::new();
        assert_eq!(
            tokens("The cat sat.", &tokenizer),
            vec!["The", "cat", "sat", "."]
        );
    }

    #[test]
    fn test_long_words_split_into_pieces() {
        let tokenizer = SubwordTokenizer::new();
        assert_eq!(
            tokens("photosynthesis", &tokenizer),
            vec!["phot", "osyn", "thes", "is"]
        );
    }

    #[test]
    fn test_whitespace_only_has_no_tokens() {
        let tokenizer = SubwordTokenizer::new();
        assert!(tokenizer.tokenize("  \n\t ").is_empty());
        assert_eq!(tokenizer.count(""), 0);
    }

    #[test]
    fn test_multibyte_spans_are_char_aligned() {
        let tokenizer = SubwordTokenizer::new();
        let text = "naïveté über straße";
        for span in tokenizer.tokenize(text) {
            assert!(text.is_char_boundary(span.start));
            assert!(text.is_char_boundary(span.end));
        }
        assert_eq!(tokens(text, &tokenizer), vec!["naïv", "eté", "über", "stra", "ße"]);
    }

    #[test]
    fn test_deterministic() {
        let tokenizer = SubwordTokenizer::new();
        let text = "Retrieval-augmented generation grounds answers in evidence.";
        assert_eq!(tokenizer.tokenize(text), tokenizer.tokenize(text));
    }
}
