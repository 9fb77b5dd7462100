//! Answer generation with LLM and citation handling

pub mod citation;
pub mod ollama;
pub mod prompt;
mod synthesizer;

pub use citation::CitationExtractor;
pub use ollama::OllamaClient;
pub use prompt::{PromptBuilder, INSUFFICIENT_INFORMATION};
pub use synthesizer::{AnswerSynthesizer, SynthesizedAnswer};
