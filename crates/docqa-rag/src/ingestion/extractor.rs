//! Text extraction from uploaded files

use std::panic::{catch_unwind, AssertUnwindSafe};

use crate::error::{Error, Result};
use crate::types::TextSegment;

use super::section::{initial_section, segment_page, RegexSectionClassifier, SectionClassifier};

/// Turns uploaded bytes into ordered, page- and section-tagged text segments
pub trait DocumentExtractor: Send + Sync {
    /// Extract text segments; an empty result means the file had no text
    fn extract(&self, data: &[u8]) -> Result<Vec<TextSegment>>;
}

/// Reject uploads above the size limit
pub fn validate_upload(data: &[u8], limit: u64) -> Result<()> {
    let size = data.len() as u64;
    if size > limit {
        return Err(Error::DocumentTooLarge { size, limit });
    }
    Ok(())
}

/// Normalize extracted text: NULs, ligatures, typographic quotes, blank lines
pub fn cleanup_text(text: &str) -> String {
    let text = text
        .replace('\0', "")
        .replace('\u{00A0}', " ")
        .replace(['\u{2018}', '\u{2019}'], "'")
        .replace(['\u{201C}', '\u{201D}'], "\"")
        .replace(['\u{2010}', '\u{2011}', '\u{2013}'], "-")
        .replace('\u{2026}', "...")
        .replace('\u{FB00}', "ff")
        .replace('\u{FB01}', "fi")
        .replace('\u{FB02}', "fl")
        .replace('\u{FB03}', "ffi")
        .replace('\u{FB04}', "ffl");

    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn segment_pages(
    pages: impl IntoIterator<Item = (u32, String)>,
    classifier: &dyn SectionClassifier,
) -> Vec<TextSegment> {
    let mut current_section = initial_section();
    let mut segments = Vec::new();
    for (page, text) in pages {
        let text = cleanup_text(&text);
        segments.extend(segment_page(&text, page, classifier, &mut current_section));
    }
    segments
}

/// PDF extraction, page by page
pub struct PdfExtractor {
    classifier: Box<dyn SectionClassifier>,
}

impl PdfExtractor {
    pub fn new(classifier: Box<dyn SectionClassifier>) -> Self {
        Self { classifier }
    }

    fn extract_pages(data: &[u8]) -> Result<Vec<(u32, String)>> {
        let doc = lopdf::Document::load_mem(data)
            .map_err(|e| Error::invalid_document(format!("Failed to load PDF: {}", e)))?;

        let mut pages = Vec::new();
        for page_num in doc.get_pages().keys() {
            match doc.extract_text(&[*page_num]) {
                Ok(text) => pages.push((*page_num, text)),
                Err(e) => tracing::debug!("Could not extract text from page {}: {}", page_num, e),
            }
        }
        Ok(pages)
    }

    /// Whole-document extraction, reported as page 1
    fn extract_fallback(data: &[u8]) -> Option<String> {
        match catch_unwind(AssertUnwindSafe(|| pdf_extract::extract_text_from_mem(data))) {
            Ok(Ok(text)) => Some(text),
            Ok(Err(e)) => {
                tracing::warn!("pdf-extract fallback failed: {}", e);
                None
            }
            Err(_) => {
                tracing::warn!("pdf-extract fallback panicked");
                None
            }
        }
    }
}

impl DocumentExtractor for PdfExtractor {
    fn extract(&self, data: &[u8]) -> Result<Vec<TextSegment>> {
        let pages = Self::extract_pages(data)?;
        let segments = segment_pages(pages, self.classifier.as_ref());
        if !segments.is_empty() {
            return Ok(segments);
        }

        tracing::warn!("No per-page text found in PDF, trying whole-document extraction");
        Ok(Self::extract_fallback(data)
            .map(|text| segment_pages([(1, text)], self.classifier.as_ref()))
            .unwrap_or_default())
    }
}

/// UTF-8 text extraction; form feeds separate pages
pub struct PlainTextExtractor {
    classifier: Box<dyn SectionClassifier>,
}

impl PlainTextExtractor {
    pub fn new(classifier: Box<dyn SectionClassifier>) -> Self {
        Self { classifier }
    }
}

impl DocumentExtractor for PlainTextExtractor {
    fn extract(&self, data: &[u8]) -> Result<Vec<TextSegment>> {
        let text = std::str::from_utf8(data)
            .map_err(|e| Error::invalid_document(format!("Text is not valid UTF-8: {}", e)))?;

        let pages = text
            .split('\x0c')
            .enumerate()
            .map(|(i, page)| (i as u32 + 1, page.to_string()));
        Ok(segment_pages(pages, self.classifier.as_ref()))
    }
}

/// Validates an upload and dispatches on its content
pub struct FileParser {
    max_bytes: u64,
    pdf: PdfExtractor,
    text: PlainTextExtractor,
}

impl FileParser {
    const PDF_MAGIC: &'static [u8] = b"%PDF-";

    pub fn new(max_bytes: u64) -> Result<Self> {
        Ok(Self {
            max_bytes,
            pdf: PdfExtractor::new(Box::new(RegexSectionClassifier::new()?)),
            text: PlainTextExtractor::new(Box::new(RegexSectionClassifier::new()?)),
        })
    }
}

impl DocumentExtractor for FileParser {
    fn extract(&self, data: &[u8]) -> Result<Vec<TextSegment>> {
        validate_upload(data, self.max_bytes)?;

        if data.starts_with(Self::PDF_MAGIC) {
            tracing::debug!("Parsing upload as PDF ({} bytes)", data.len());
            self.pdf.extract(data)
        } else if std::str::from_utf8(data).is_ok() {
            tracing::debug!("Parsing upload as plain text ({} bytes)", data.len());
            self.text.extract(data)
        } else {
            Err(Error::invalid_document(
                "Unsupported or corrupt file: expected a PDF or UTF-8 text",
            ))
        }
    }
}
