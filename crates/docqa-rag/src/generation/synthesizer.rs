//! Grounded answer synthesis

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::providers::{LlmProvider, VectorSearchResult};
use crate::types::Citation;

use super::citation::CitationExtractor;
use super::prompt::{PromptBuilder, INSUFFICIENT_INFORMATION};

/// A generated answer and the citations its markers resolve to
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesizedAnswer {
    pub answer: String,
    pub citations: Vec<Citation>,
}

impl SynthesizedAnswer {
    /// The fixed answer for an empty evidence set
    pub fn insufficient() -> Self {
        Self {
            answer: INSUFFICIENT_INFORMATION.to_string(),
            citations: Vec::new(),
        }
    }
}

/// Builds the grounding prompt, calls the generator once, and links citations.
///
/// Generation always runs at temperature 0 and is never retried.
pub struct AnswerSynthesizer {
    llm: Arc<dyn LlmProvider>,
    citations: CitationExtractor,
    snippet_chars: usize,
}

impl AnswerSynthesizer {
    /// Deterministic decoding
    pub const TEMPERATURE: f32 = 0.0;

    pub fn new(llm: Arc<dyn LlmProvider>, snippet_chars: usize) -> Result<Self> {
        Ok(Self {
            llm,
            citations: CitationExtractor::new()?,
            snippet_chars,
        })
    }

    pub fn llm(&self) -> &Arc<dyn LlmProvider> {
        &self.llm
    }

    /// Answer `question` from `ranked` chunks, best first
    pub async fn synthesize(&self, question: &str, ranked: &[VectorSearchResult]) -> Result<SynthesizedAnswer> {
        if ranked.is_empty() {
            tracing::debug!("No chunks retrieved, returning insufficient-information answer");
            return Ok(SynthesizedAnswer::insufficient());
        }

        let context = PromptBuilder::build_context(ranked);
        let prompt = PromptBuilder::build_prompt(question, &context, ranked.len());

        let answer = self
            .llm
            .generate(&prompt, Self::TEMPERATURE)
            .await
            .map_err(|e| match e {
                Error::Llm(_) => e,
                other => Error::llm(other.to_string()),
            })?;
        let answer = answer.trim().to_string();

        let citations = self.citations.extract(&answer, ranked, self.snippet_chars);
        tracing::debug!(
            "{} generated {} chars citing {} of {} sources",
            self.llm.model(),
            answer.len(),
            citations.len(),
            ranked.len()
        );

        Ok(SynthesizedAnswer { answer, citations })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Chunk;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use uuid::Uuid;

    /// Generator returning a fixed reply and recording prompts and temperatures
    struct ScriptedLlm {
        reply: Result<String>,
        calls: Mutex<Vec<(String, f32)>>,
    }

    impl ScriptedLlm {
        fn replying(reply: &str) -> Self {
            Self {
                reply: Ok(reply.to_string()),
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedLlm {
        async fn generate(&self, prompt: &str, temperature: f32) -> Result<String> {
            self.calls.lock().push((prompt.to_string(), temperature));
            match &self.reply {
                Ok(reply) => Ok(reply.clone()),
                Err(e) => Err(Error::internal(e.to_string())),
            }
        }

        async fn health_check(&self) -> Result<bool> {
            Ok(true)
        }

        fn name(&self) -> &str {
            "scripted"
        }

        fn model(&self) -> &str {
            "scripted-v1"
        }
    }

    fn ranked() -> Vec<VectorSearchResult> {
        vec![
            VectorSearchResult {
                chunk: Chunk {
                    document_id: Uuid::nil(),
                    chunk_index: 3,
                    content: "The model reaches 91% accuracy.".to_string(),
                    page: 2,
                    section: "Results".to_string(),
                    token_count: 6,
                },
                similarity: 0.82,
            },
            VectorSearchResult {
                chunk: Chunk {
                    document_id: Uuid::nil(),
                    chunk_index: 0,
                    content: "We study image classification.".to_string(),
                    page: 1,
                    section: "Introduction".to_string(),
                    token_count: 4,
                },
                similarity: 0.41,
            },
        ]
    }

    #[tokio::test]
    async fn test_empty_evidence_makes_no_call() {
        let llm = Arc::new(ScriptedLlm::replying("unused"));
        let synthesizer = AnswerSynthesizer::new(llm.clone(), 200).unwrap();

        let result = synthesizer.synthesize("Anything?", &[]).await.unwrap();
        assert_eq!(result, SynthesizedAnswer::insufficient());
        assert!(llm.calls.lock().is_empty());
    }

    #[tokio::test]
    async fn test_answer_citations_map_to_ranked_chunks() {
        let llm = Arc::new(ScriptedLlm::replying(" It reaches 91% accuracy [Source 1]. [Source 7]\n"));
        let synthesizer = AnswerSynthesizer::new(llm.clone(), 200).unwrap();

        let result = synthesizer.synthesize("What accuracy?", &ranked()).await.unwrap();
        assert_eq!(result.answer, "It reaches 91% accuracy [Source 1]. [Source 7]");
        assert_eq!(result.citations.len(), 1);
        assert_eq!(result.citations[0].chunk_index, 3);
        assert_eq!(result.citations[0].section, "Results");
        assert_eq!(result.citations[0].page, 2);

        let calls = llm.calls.lock();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].1, 0.0);
        assert!(calls[0].0.contains("[Source 2] (Section: Introduction, Page: 1)"));
    }

    #[tokio::test]
    async fn test_generator_failure_is_generation_error() {
        let llm = Arc::new(ScriptedLlm {
            reply: Err(Error::internal("connection refused")),
            calls: Mutex::new(Vec::new()),
        });
        let synthesizer = AnswerSynthesizer::new(llm.clone(), 200).unwrap();

        let err = synthesizer.synthesize("What accuracy?", &ranked()).await.unwrap_err();
        assert!(matches!(err, Error::Llm(_)));
        assert_eq!(llm.calls.lock().len(), 1);
    }
}
