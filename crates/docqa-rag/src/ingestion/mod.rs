//! Document ingestion: extraction, section detection, tokenization and chunking

mod chunker;
mod extractor;
mod section;
mod tokenizer;

pub use chunker::TextChunker;
pub use extractor::{
    cleanup_text, validate_upload, DocumentExtractor, FileParser, PdfExtractor,
    PlainTextExtractor,
};
pub use section::{segment_page, RegexSectionClassifier, SectionClassifier};
pub use tokenizer::{HfTokenizer, SubwordTokenizer, Tokenizer};
