//! Query request types

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Question about one indexed document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRequest {
    /// Document to answer from
    pub document_id: Uuid,

    /// The question to answer
    pub question: String,

    /// Number of chunks to retrieve; the configured default when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_k: Option<usize>,
}

impl QueryRequest {
    /// Create a new query
    pub fn new(document_id: Uuid, question: impl Into<String>) -> Self {
        Self {
            document_id,
            question: question.into(),
            top_k: None,
        }
    }

    /// Set the number of results to retrieve
    pub fn with_top_k(mut self, k: usize) -> Self {
        self.top_k = Some(k);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_top_k_optional_on_the_wire() {
        let id = Uuid::new_v4();
        let json = format!(r#"{{"document_id":"{}","question":"What is RAG?"}}"#, id);
        let request: QueryRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(request.document_id, id);
        assert!(request.top_k.is_none());
    }
}
