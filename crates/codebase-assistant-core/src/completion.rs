//! Completion (LLM) provider trait.
//!
//! The retrieval orchestrator builds a prompt and hands it to a
//! [`CompletionProvider`]; the concrete OpenAI-compatible client lives in the
//! app crate.

use anyhow::Result;
use async_trait::async_trait;

/// Sampling parameters for a single completion call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompletionParams {
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for CompletionParams {
    fn default() -> Self {
        Self {
            temperature: 0.3,
            max_tokens: 600,
        }
    }
}

/// Generates a natural-language answer from a prompt.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Returns the model identifier (e.g. `"llama-3.1-8b-instant"`).
    fn model_name(&self) -> &str;

    /// Produce the answer text for `prompt`.
    async fn complete(&self, prompt: &str, params: CompletionParams) -> Result<String>;
}
