//! Configuration loader, typed settings and path helpers.
//!
//! Uses Figment to merge `config.toml` + `config.<env>.toml` + `APP_*` env vars
//! (`__` separates nested keys, e.g. `APP_RETRIEVAL__TOP_K=8`). Every section
//! has defaults, so an empty configuration is valid.

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

use crate::error::{Error, Result};
use crate::tokenize::TokenizerKind;

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::new().merge(Toml::file("config.toml"));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        let config = Self { figment };
        config.settings()?;
        Ok(config)
    }

    /// Wrap an already assembled figment (tests, embedding applications).
    pub fn from_figment(figment: Figment) -> Self { Self { figment } }

    /// Extract and validate all typed sections.
    pub fn settings(&self) -> Result<Settings> {
        let settings: Settings = self.figment.extract().map_err(|e| Error::InvalidConfig(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub retrieval: RetrievalConfig,
    pub ingest: IngestConfig,
    pub models: ModelsConfig,
    pub generator: GeneratorConfig,
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        self.retrieval.validate()?;
        self.ingest.validate()
    }
}

/// Fusion weights and candidate sizing for hybrid retrieval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub semantic_weight: f32,
    pub lexical_weight: f32,
    /// Dense over-fetch: the dense stage returns `candidate_multiplier * top_k` passages.
    pub candidate_multiplier: usize,
    /// Rerank shortlist: `rerank_multiplier * top_k` fused candidates are rescored.
    pub rerank_multiplier: usize,
    pub top_k: usize,
    pub use_reranker: bool,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self { semantic_weight: 0.7, lexical_weight: 0.3, candidate_multiplier: 2, rerank_multiplier: 2, top_k: 5, use_reranker: true }
    }
}

impl RetrievalConfig {
    pub fn validate(&self) -> Result<()> {
        for (name, w) in [("semantic_weight", self.semantic_weight), ("lexical_weight", self.lexical_weight)] {
            if !w.is_finite() || w < 0.0 {
                return Err(Error::InvalidConfig(format!("retrieval.{name} must be a finite non-negative number, got {w}")));
            }
        }
        if self.semantic_weight + self.lexical_weight == 0.0 {
            return Err(Error::InvalidConfig("retrieval weights cannot both be zero".into()));
        }
        if self.candidate_multiplier == 0 || self.rerank_multiplier == 0 {
            return Err(Error::InvalidConfig("retrieval multipliers must be at least 1".into()));
        }
        if self.top_k == 0 {
            return Err(Error::InvalidConfig("retrieval.top_k must be at least 1".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Maximum passage length in characters.
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub encode_batch_size: usize,
    pub tokenizer: TokenizerKind,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self { chunk_size: 512, chunk_overlap: 100, encode_batch_size: 32, tokenizer: TokenizerKind::Whitespace }
    }
}

impl IngestConfig {
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 || self.chunk_overlap >= self.chunk_size {
            return Err(Error::InvalidConfig(format!(
                "ingest.chunk_overlap ({}) must be smaller than a non-zero ingest.chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        if self.encode_batch_size == 0 {
            return Err(Error::InvalidConfig("ingest.encode_batch_size must be at least 1".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelsConfig {
    pub encoder_dir: Option<String>,
    pub reranker_dir: Option<String>,
    pub max_len: usize,
    pub use_fake: bool,
    pub fake_dim: usize,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self { encoder_dir: None, reranker_dir: None, max_len: 256, use_fake: false, fake_dim: 384 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Chat-completions endpoint; without one answers are extractive.
    pub api_url: Option<String>,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Name of the environment variable holding the API key.
    pub api_key_env: String,
    pub timeout_secs: u64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            api_url: None,
            model: "typhoon-v2.1-12b-instruct".to_string(),
            temperature: 0.2,
            max_tokens: 1024,
            api_key_env: "LLM_API_KEY".to_string(),
            timeout_secs: 60,
        }
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    // Expand env vars first
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    // Expand ~ at start
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}
