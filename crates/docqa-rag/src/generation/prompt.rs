//! Prompt templates for grounded answer generation

use crate::providers::VectorSearchResult;

/// Answer returned when the sources cannot support an answer
pub const INSUFFICIENT_INFORMATION: &str = "Insufficient information in the document.";

/// Prompt builder for document queries
pub struct PromptBuilder;

impl PromptBuilder {
    /// Label each retrieved chunk `Source 1..N`, in rank order
    pub fn build_context(results: &[VectorSearchResult]) -> String {
        results
            .iter()
            .enumerate()
            .map(|(i, result)| {
                format!(
                    "[Source {}] (Section: {}, Page: {})\n{}\n",
                    i + 1,
                    result.chunk.section,
                    result.chunk.page,
                    result.chunk.content
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Build the full prompt with strict grounding rules
    pub fn build_prompt(question: &str, context: &str, source_count: usize) -> String {
        format!(
            r#"You are a document question-answering assistant. Answer STRICTLY from the numbered sources below.

CRITICAL RULES:
1. ONLY use information that is stated in the sources
2. Mark every factual claim with the matching source marker, e.g. [Source 1]
3. Only sources 1 to {source_count} exist; never cite any other number
4. If multiple sources support a point, cite all of them, e.g. [Source 1][Source 2]
5. Do not add information from your training data or make assumptions
6. If the sources do not contain enough information to answer, reply with exactly: "{insufficient}"

SOURCES:
{context}

QUESTION: {question}

Answer using ONLY the sources above, with [Source N] markers:"#,
            source_count = source_count,
            insufficient = INSUFFICIENT_INFORMATION,
            context = context,
            question = question
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Chunk;
    use uuid::Uuid;

    fn result(chunk_index: u32, section: &str, page: u32, content: &str) -> VectorSearchResult {
        VectorSearchResult {
            chunk: Chunk {
                document_id: Uuid::nil(),
                chunk_index,
                content: content.to_string(),
                page,
                section: section.to_string(),
                token_count: 4,
            },
            similarity: 0.8,
        }
    }

    #[test]
    fn test_context_labels_sources_in_rank_order() {
        let context = PromptBuilder::build_context(&[
            result(6, "Results", 3, "Accuracy rose to 91%."),
            result(2, "Methods", 1, "We trained for ten epochs."),
        ]);

        assert_eq!(
            context,
            "[Source 1] (Section: Results, Page: 3)\nAccuracy rose to 91%.\n\n\
             [Source 2] (Section: Methods, Page: 1)\nWe trained for ten epochs.\n"
        );
    }

    #[test]
    fn test_prompt_contains_rules_and_question() {
        let prompt = PromptBuilder::build_prompt("What accuracy was reached?", "[Source 1] ...", 1);
        assert!(prompt.contains("What accuracy was reached?"));
        assert!(prompt.contains(INSUFFICIENT_INFORMATION));
        assert!(prompt.contains("Only sources 1 to 1 exist"));
        assert!(prompt.contains("[Source 1] ..."));
    }
}
