//! Best-effort section heading detection

use regex::{Regex, RegexBuilder};

use crate::error::{Error, Result};
use crate::types::{TextSegment, UNKNOWN_SECTION};

/// Classifies a line of text as a section heading.
///
/// `None` means "not a heading"; callers keep the current section.
pub trait SectionClassifier: Send + Sync {
    fn classify(&self, line: &str) -> Option<String>;
}

/// Heading detection for research-paper style documents
pub struct RegexSectionClassifier {
    patterns: Vec<Regex>,
}

impl RegexSectionClassifier {
    const MIN_LEN: usize = 3;
    const MAX_LEN: usize = 100;

    pub fn new() -> Result<Self> {
        let build = |pattern: &str, case_insensitive: bool| {
            RegexBuilder::new(pattern)
                .case_insensitive(case_insensitive)
                .build()
                .map_err(|e| Error::internal(format!("Invalid section pattern: {}", e)))
        };

        Ok(Self {
            patterns: vec![
                // "2. Related Work", "3 Results"
                build(r"^\d+\.?\s+[A-Z][A-Za-z\s]+$", false)?,
                // "INTRODUCTION"
                build(r"^[A-Z][A-Z\s]+$", false)?,
                build(
                    r"^(Abstract|Introduction|Conclusion|References|Methodology|Results|Discussion)",
                    true,
                )?,
            ],
        })
    }
}

impl SectionClassifier for RegexSectionClassifier {
    fn classify(&self, line: &str) -> Option<String> {
        let line = line.trim();
        let len = line.chars().count();
        if !(Self::MIN_LEN..=Self::MAX_LEN).contains(&len) {
            return None;
        }

        if self.patterns.iter().any(|p| p.is_match(line)) {
            Some(if is_all_upper(line) {
                title_case(line)
            } else {
                line.to_string()
            })
        } else {
            None
        }
    }
}

fn is_all_upper(text: &str) -> bool {
    text.chars().any(char::is_alphabetic)
        && text.chars().filter(|c| c.is_alphabetic()).all(char::is_uppercase)
}

/// Uppercase the first letter of each word, lowercase the rest
fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut prev_alpha = false;
    for c in text.chars() {
        if prev_alpha {
            out.extend(c.to_lowercase());
        } else {
            out.extend(c.to_uppercase());
        }
        prev_alpha = c.is_alphabetic();
    }
    out
}

/// Split one page of text into segments at each detected heading.
///
/// `current_section` carries the running section across pages and is updated in place.
pub fn segment_page(
    text: &str,
    page: u32,
    classifier: &dyn SectionClassifier,
    current_section: &mut String,
) -> Vec<TextSegment> {
    let mut segments = Vec::new();
    let mut buffer: Vec<&str> = Vec::new();

    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        if let Some(section) = classifier.classify(trimmed) {
            if !buffer.is_empty() {
                segments.push(TextSegment::new(buffer.join("\n"), page, current_section.clone()));
                buffer.clear();
            }
            *current_section = section;
        }
        buffer.push(trimmed);
    }

    if !buffer.is_empty() {
        segments.push(TextSegment::new(buffer.join("\n"), page, current_section.clone()));
    }

    segments
}

/// Running section for a fresh document
pub fn initial_section() -> String {
    UNKNOWN_SECTION.to_string()
}
