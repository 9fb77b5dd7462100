//! LLM provider trait for text generation

use async_trait::async_trait;
use crate::error::Result;

/// Trait for prompt-to-text generation
///
/// Implementations:
/// - `OllamaLlm`: Local Ollama server (llama3, phi3, etc.)
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Generate a completion for `prompt` at the given sampling temperature
    async fn generate(&self, prompt: &str, temperature: f32) -> Result<String>;

    /// Check if the provider is healthy and available
    async fn health_check(&self) -> Result<bool>;

    /// Get provider name for logging
    fn name(&self) -> &str;

    /// Get the model being used
    fn model(&self) -> &str;
}
