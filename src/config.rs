//! TOML configuration.
//!
//! Every section and field has a default, so an empty file (or no file at
//! all) yields a working configuration. [`load_config`] parses and then runs
//! [`Config::validate`]; callers never see an unvalidated `Config`.
//!
//! ```toml
//! [chunking]
//! chunk_size = 1000
//! overlap = 200
//!
//! [retrieval]
//! top_k = 5
//!
//! [embedding]
//! provider = "local"          # or "hashing"
//! model = "all-minilm-l6-v2"
//!
//! [llm]
//! base_url = "https://router.huggingface.co/v1"
//! model = "meta-llama/Llama-3.1-8B-Instruct"
//! temperature = 0.1
//! api_key_env = "HUGGINGFACEHUB_API_TOKEN"
//!
//! [server]
//! bind = "127.0.0.1:8501"
//! session_idle_secs = 3600    # 0 keeps sessions until deleted
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

use crate::error::AdvisorError;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    /// Maximum chunk length in characters.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Characters shared between consecutive chunks of the same page.
    #[serde(default = "default_overlap")]
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            overlap: default_overlap(),
        }
    }
}

fn default_chunk_size() -> usize {
    1000
}
fn default_overlap() -> usize {
    200
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

fn default_top_k() -> usize {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_embedding_model")]
    pub model: String,
    /// Only used by the hashing provider; the local provider's dimension is
    /// fixed by the model.
    #[serde(default = "default_hashing_dims")]
    pub dims: usize,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_embedding_model(),
            dims: default_hashing_dims(),
            batch_size: default_batch_size(),
        }
    }
}

fn default_provider() -> String {
    "local".to_string()
}
fn default_embedding_model() -> String {
    "all-minilm-l6-v2".to_string()
}
fn default_hashing_dims() -> usize {
    384
}
fn default_batch_size() -> usize {
    64
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    /// Base URL of an OpenAI-compatible API; `/chat/completions` is appended.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Environment variable holding the bearer token.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_llm_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_timeout_secs(),
            api_key_env: default_api_key_env(),
        }
    }
}

fn default_base_url() -> String {
    "https://router.huggingface.co/v1".to_string()
}
fn default_llm_model() -> String {
    "meta-llama/Llama-3.1-8B-Instruct".to_string()
}
fn default_temperature() -> f32 {
    0.1
}
fn default_max_tokens() -> u32 {
    512
}
fn default_timeout_secs() -> u64 {
    120
}
fn default_api_key_env() -> String {
    "HUGGINGFACEHUB_API_TOKEN".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
    /// Sessions untouched for this long are dropped. `0` disables the sweep.
    #[serde(default = "default_session_idle_secs")]
    pub session_idle_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            max_upload_bytes: default_max_upload_bytes(),
            session_idle_secs: default_session_idle_secs(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8501".to_string()
}
fn default_max_upload_bytes() -> usize {
    20 * 1024 * 1024
}
fn default_session_idle_secs() -> u64 {
    3600
}

impl EmbeddingConfig {
    pub const PROVIDERS: [&'static str; 2] = ["local", "hashing"];
}

impl LlmConfig {
    /// Token from the configured environment variable, if set and non-blank.
    pub fn api_token_from_env(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), AdvisorError> {
        let invalid = |msg: String| -> Result<(), AdvisorError> { Err(AdvisorError::Config(msg)) };

        if self.chunking.chunk_size == 0 {
            return invalid("chunking.chunk_size must be > 0".into());
        }
        if self.chunking.overlap >= self.chunking.chunk_size {
            return invalid(format!(
                "chunking.overlap ({}) must be smaller than chunking.chunk_size ({})",
                self.chunking.overlap, self.chunking.chunk_size
            ));
        }
        if self.retrieval.top_k == 0 {
            return invalid("retrieval.top_k must be >= 1".into());
        }
        if !EmbeddingConfig::PROVIDERS.contains(&self.embedding.provider.as_str()) {
            return invalid(format!(
                "unknown embedding provider: '{}'. Must be one of: {}",
                self.embedding.provider,
                EmbeddingConfig::PROVIDERS.join(", ")
            ));
        }
        if self.embedding.model.trim().is_empty() {
            return invalid("embedding.model must not be empty".into());
        }
        if self.embedding.dims == 0 {
            return invalid("embedding.dims must be > 0".into());
        }
        if self.embedding.batch_size == 0 {
            return invalid("embedding.batch_size must be > 0".into());
        }
        if self.llm.model.trim().is_empty() {
            return invalid("llm.model must not be empty".into());
        }
        if self.llm.base_url.trim().is_empty() {
            return invalid("llm.base_url must not be empty".into());
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return invalid("llm.temperature must be in [0.0, 2.0]".into());
        }
        if self.llm.max_tokens == 0 {
            return invalid("llm.max_tokens must be > 0".into());
        }
        if self.llm.timeout_secs == 0 {
            return invalid("llm.timeout_secs must be > 0".into());
        }
        Ok(())
    }
}

/// Parse a TOML string into a validated [`Config`].
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).context("Failed to parse config file")?;
    config.validate()?;
    Ok(config)
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}
