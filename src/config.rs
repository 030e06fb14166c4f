//! TOML configuration.
//!
//! Every section is optional and falls back to the defaults below, so an
//! empty file is a valid configuration (embeddings and completions disabled).

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub registry: RegistryConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub git: GitConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    /// SQLite file holding the vector collection.
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
    #[serde(default = "default_collection")]
    pub collection: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
            collection: default_collection(),
        }
    }
}

fn default_store_path() -> PathBuf {
    PathBuf::from("data/vectors.sqlite")
}
fn default_collection() -> String {
    "projects_codebase".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct RegistryConfig {
    #[serde(default = "default_registry_path")]
    pub path: PathBuf,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            path: default_registry_path(),
        }
    }
}

fn default_registry_path() -> PathBuf {
    PathBuf::from("data/projects.json")
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    /// Maximum chunk length in characters.
    #[serde(default = "default_max_length")]
    pub max_length: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_length: default_max_length(),
        }
    }
}

fn default_max_length() -> usize {
    codebase_assistant_core::chunk::DEFAULT_MAX_LENGTH
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_search_limit")]
    pub search_limit: usize,
    #[serde(default = "default_preview_chars")]
    pub preview_chars: usize,
    /// Column width the answer text is wrapped to. `0` disables wrapping.
    #[serde(default = "default_wrap_width")]
    pub wrap_width: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            search_limit: default_search_limit(),
            preview_chars: default_preview_chars(),
            wrap_width: default_wrap_width(),
        }
    }
}

fn default_top_k() -> usize {
    5
}
fn default_search_limit() -> usize {
    10
}
fn default_preview_chars() -> usize {
    300
}
fn default_wrap_width() -> usize {
    90
}

#[derive(Debug, Deserialize, Clone)]
pub struct IngestConfig {
    /// Directory names pruned from every walk.
    #[serde(default = "default_ignore_dirs")]
    pub ignore_dirs: Vec<String>,
    /// Where uploaded files are saved before being upserted.
    #[serde(default = "default_uploads_dir")]
    pub uploads_dir: PathBuf,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            ignore_dirs: default_ignore_dirs(),
            uploads_dir: default_uploads_dir(),
        }
    }
}

fn default_ignore_dirs() -> Vec<String> {
    [
        ".git",
        "node_modules",
        "dist",
        "build",
        "__pycache__",
        ".venv",
        "bin",
        "obj",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}
fn default_uploads_dir() -> PathBuf {
    PathBuf::from("data/uploads")
}

#[derive(Debug, Deserialize, Clone)]
pub struct GitConfig {
    /// Per-subprocess timeout for clone, checkout, and pull.
    #[serde(default = "default_git_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_git_timeout_secs(),
        }
    }
}

fn default_git_timeout_secs() -> u64 {
    300
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    /// Base URL for the Ollama provider.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            dims: None,
            url: None,
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    /// OpenAI-compatible API root; `/chat/completions` is appended.
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    /// Environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_llm_max_retries")]
    pub max_retries: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            base_url: default_llm_base_url(),
            model: default_llm_model(),
            api_key_env: default_api_key_env(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_llm_timeout_secs(),
            max_retries: default_llm_max_retries(),
        }
    }
}

fn default_llm_base_url() -> String {
    "https://api.groq.com/openai/v1".to_string()
}
fn default_llm_model() -> String {
    "llama-3.1-8b-instant".to_string()
}
fn default_api_key_env() -> String {
    "LLM_API_KEY".to_string()
}
fn default_temperature() -> f32 {
    0.3
}
fn default_max_tokens() -> u32 {
    600
}
fn default_llm_timeout_secs() -> u64 {
    60
}
fn default_llm_max_retries() -> u32 {
    3
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8000".to_string()
}

impl Config {
    /// All defaults. Embeddings and completions disabled.
    pub fn minimal() -> Self {
        Self::default()
    }

    /// Resolve relative data paths against `root`.
    pub fn rooted_at(mut self, root: &Path) -> Self {
        if self.store.path.is_relative() {
            self.store.path = root.join(&self.store.path);
        }
        if self.registry.path.is_relative() {
            self.registry.path = root.join(&self.registry.path);
        }
        if self.ingest.uploads_dir.is_relative() {
            self.ingest.uploads_dir = root.join(&self.ingest.uploads_dir);
        }
        self
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

/// Check cross-field constraints that serde cannot express.
pub fn validate(config: &Config) -> Result<()> {
    if config.chunking.max_length == 0 {
        anyhow::bail!("chunking.max_length must be >= 1");
    }

    if config.retrieval.top_k == 0 {
        anyhow::bail!("retrieval.top_k must be >= 1");
    }
    if config.retrieval.search_limit == 0 {
        anyhow::bail!("retrieval.search_limit must be >= 1");
    }

    if config.store.collection.trim().is_empty() {
        anyhow::bail!("store.collection must not be empty");
    }

    match config.embedding.provider.as_str() {
        "disabled" | "openai" | "ollama" | "local" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be disabled, openai, ollama, or local.",
            other
        ),
    }

    if config.embedding.is_enabled() && config.embedding.provider != "local" {
        if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
            anyhow::bail!(
                "embedding.dims must be > 0 when provider is '{}'",
                config.embedding.provider
            );
        }
        if config.embedding.model.is_none() {
            anyhow::bail!(
                "embedding.model must be specified when provider is '{}'",
                config.embedding.provider
            );
        }
    }

    match config.llm.provider.as_str() {
        "disabled" | "openai" => {}
        other => anyhow::bail!(
            "Unknown llm provider: '{}'. Must be disabled or openai.",
            other
        ),
    }

    if !(0.0..=2.0).contains(&config.llm.temperature) {
        anyhow::bail!("llm.temperature must be in [0.0, 2.0]");
    }

    Ok(())
}
