//! Completion providers.
//!
//! [`OpenAICompatProvider`] speaks the OpenAI chat-completions protocol,
//! which Groq, OpenAI, and most hosted and local LLM servers accept. The
//! API key is read from the environment variable named by
//! `llm.api_key_env` at construction time.

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use codebase_assistant_core::completion::{CompletionParams, CompletionProvider};

use crate::config::LlmConfig;
use crate::retry;

pub struct DisabledCompletion;

#[async_trait]
impl CompletionProvider for DisabledCompletion {
    fn model_name(&self) -> &str {
        "disabled"
    }
    async fn complete(&self, _prompt: &str, _params: CompletionParams) -> Result<String> {
        bail!("Completion provider is disabled; set [llm].provider in the config")
    }
}

pub struct OpenAICompatProvider {
    endpoint: String,
    model: String,
    api_key: String,
    max_retries: u32,
    client: reqwest::Client,
}

impl OpenAICompatProvider {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env).map_err(|_| {
            anyhow::anyhow!("{} environment variable not set", config.api_key_env)
        })?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            model: config.model.clone(),
            api_key,
            max_retries: config.max_retries,
            client,
        })
    }
}

#[async_trait]
impl CompletionProvider for OpenAICompatProvider {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str, params: CompletionParams) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [{"role": "user", "content": prompt}],
            "temperature": params.temperature,
            "max_tokens": params.max_tokens,
        });
        let json = retry::post_json(
            &self.client,
            &self.endpoint,
            Some(&self.api_key),
            &body,
            self.max_retries,
            "Completion",
        )
        .await?;
        parse_chat_response(&json)
    }
}

/// Extract `choices[0].message.content`.
fn parse_chat_response(json: &serde_json::Value) -> Result<String> {
    json.get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .map(|s| s.trim().to_string())
        .ok_or_else(|| anyhow::anyhow!("Invalid completion response: missing choices[0].message.content"))
}

pub fn create_completion(config: &LlmConfig) -> Result<Arc<dyn CompletionProvider>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledCompletion)),
        "openai" => Ok(Arc::new(OpenAICompatProvider::new(config)?)),
        other => bail!("Unknown llm provider: {}", other),
    }
}
