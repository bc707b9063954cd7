//! TOML configuration.
//!
//! Every section except `[vault]` is optional and falls back to the defaults
//! below. [`load_config`] parses and validates in one step; nothing
//! downstream re-checks these values.
//!
//! ```toml
//! [vault]
//! root = "/home/me/notes"
//!
//! [embedding]
//! provider = "ollama"
//! model = "nomic-embed-text-v1.5"
//! remote_model = "nomic-embed-text"
//!
//! [llm]
//! provider = "ollama"
//! model = "llama3"
//! ```

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use vaultsearch_core::chunk::{ChunkingParams, DEFAULT_CHUNK_OVERLAP, DEFAULT_MAX_CHUNK_SIZE};
use vaultsearch_core::embedding::EmbeddingModel;
use vaultsearch_core::search::{
    ScoringWeights, DEFAULT_LENGTH_WEIGHT, DEFAULT_LEXICAL_BOOST, DEFAULT_PROXIMITY_WEIGHT,
};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub vault: VaultConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct VaultConfig {
    pub root: PathBuf,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    #[serde(default)]
    pub follow_symlinks: bool,
}

fn default_include_globs() -> Vec<String> {
    vec!["**/*.md".to_string(), "**/*.txt".to_string()]
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_max_chunk_size")]
    pub max_chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chunk_size: DEFAULT_MAX_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

fn default_max_chunk_size() -> usize {
    DEFAULT_MAX_CHUNK_SIZE
}
fn default_chunk_overlap() -> usize {
    DEFAULT_CHUNK_OVERLAP
}

impl ChunkingConfig {
    pub fn params(&self) -> ChunkingParams {
        ChunkingParams {
            max_chunk_size: self.max_chunk_size,
            chunk_overlap: self.chunk_overlap,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    /// `disabled`, `ollama`, `openai` or `local`.
    #[serde(default = "default_disabled")]
    pub provider: String,
    /// One of the [`EmbeddingModel`] identifiers; fixes the vector dimension.
    #[serde(default = "default_embedding_model")]
    pub model: String,
    /// Model id sent to the provider when it differs from `model`
    /// (e.g. `nomic-embed-text` on Ollama, `text-embedding-3-small` on OpenAI).
    #[serde(default)]
    pub remote_model: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_disabled(),
            model: default_embedding_model(),
            remote_model: None,
            url: None,
            timeout_secs: default_embedding_timeout(),
            max_retries: default_max_retries(),
            concurrency: default_concurrency(),
        }
    }
}

fn default_disabled() -> String {
    "disabled".to_string()
}
fn default_embedding_model() -> String {
    EmbeddingModel::AllMiniLmL6V2.as_str().to_string()
}
fn default_embedding_timeout() -> u64 {
    30
}
fn default_max_retries() -> u32 {
    3
}
fn default_concurrency() -> usize {
    4
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }

    /// The configured model, already validated by [`load_config`].
    pub fn model(&self) -> Result<EmbeddingModel> {
        self.model.parse()
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    /// Number of chunks handed to the completion model as context.
    #[serde(default = "default_context_length")]
    pub context_length: usize,
    #[serde(default = "default_true")]
    pub use_reranking: bool,
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default = "default_lexical_boost")]
    pub lexical_boost: f64,
    #[serde(default = "default_length_weight")]
    pub length_weight: f64,
    #[serde(default = "default_proximity_weight")]
    pub proximity_weight: f64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            context_length: default_context_length(),
            use_reranking: true,
            limit: default_limit(),
            lexical_boost: DEFAULT_LEXICAL_BOOST,
            length_weight: DEFAULT_LENGTH_WEIGHT,
            proximity_weight: DEFAULT_PROXIMITY_WEIGHT,
        }
    }
}

fn default_context_length() -> usize {
    3
}
fn default_true() -> bool {
    true
}
fn default_limit() -> usize {
    10
}
fn default_lexical_boost() -> f64 {
    DEFAULT_LEXICAL_BOOST
}
fn default_length_weight() -> f64 {
    DEFAULT_LENGTH_WEIGHT
}
fn default_proximity_weight() -> f64 {
    DEFAULT_PROXIMITY_WEIGHT
}

impl RetrievalConfig {
    pub fn weights(&self) -> ScoringWeights {
        ScoringWeights {
            lexical_boost: self.lexical_boost,
            length_weight: self.length_weight,
            proximity_weight: self.proximity_weight,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    /// `disabled`, `ollama` or `openai`.
    #[serde(default = "default_disabled")]
    pub provider: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_disabled(),
            model: default_llm_model(),
            url: None,
            timeout_secs: default_llm_timeout(),
        }
    }
}

fn default_llm_model() -> String {
    "llama3".to_string()
}
fn default_llm_timeout() -> u64 {
    120
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    #[serde(default = "default_true")]
    pub use_persistent_storage: bool,
    #[serde(default = "default_snapshot_path")]
    pub snapshot_path: PathBuf,
    /// Seconds between periodic saves while serving; `0` disables the timer.
    #[serde(default = "default_autosave_secs")]
    pub autosave_secs: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            use_persistent_storage: true,
            snapshot_path: default_snapshot_path(),
            autosave_secs: default_autosave_secs(),
        }
    }
}

fn default_snapshot_path() -> PathBuf {
    PathBuf::from("./data/snapshot.json")
}
fn default_autosave_secs() -> u64 {
    300
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
    "127.0.0.1:7341".to_string()
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}

pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).context("Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    // Chunking
    if config.chunking.max_chunk_size == 0 {
        bail!("chunking.max_chunk_size must be > 0");
    }
    if config.chunking.chunk_overlap >= config.chunking.max_chunk_size {
        bail!("chunking.chunk_overlap must be smaller than chunking.max_chunk_size");
    }

    // Embedding
    match config.embedding.provider.as_str() {
        "disabled" | "ollama" | "openai" | "local" => {}
        other => bail!(
            "Unknown embedding provider: '{}'. Must be disabled, ollama, openai, or local.",
            other
        ),
    }
    config
        .embedding
        .model()
        .context("Invalid embedding.model")?;
    if config.embedding.concurrency == 0 {
        bail!("embedding.concurrency must be >= 1");
    }

    // Retrieval
    if !(1..=10).contains(&config.retrieval.context_length) {
        bail!("retrieval.context_length must be between 1 and 10");
    }
    if config.retrieval.limit == 0 {
        bail!("retrieval.limit must be >= 1");
    }
    let w = config.retrieval.weights();
    if [w.lexical_boost, w.length_weight, w.proximity_weight]
        .iter()
        .any(|x| !x.is_finite() || *x < 0.0)
    {
        bail!("retrieval weights must be finite and >= 0");
    }

    // LLM
    match config.llm.provider.as_str() {
        "disabled" | "ollama" | "openai" => {}
        other => bail!(
            "Unknown llm provider: '{}'. Must be disabled, ollama, or openai.",
            other
        ),
    }
    if config.llm.provider != "disabled" && config.llm.model.trim().is_empty() {
        bail!("llm.model must be set when provider is '{}'", config.llm.provider);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = "[vault]\nroot = \"/tmp/notes\"\n";

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = parse_config(MINIMAL).unwrap();
        assert_eq!(config.vault.include_globs, vec!["**/*.md", "**/*.txt"]);
        assert_eq!(config.chunking.params(), ChunkingParams::default());
        assert_eq!(config.embedding.provider, "disabled");
        assert_eq!(
            config.embedding.model().unwrap(),
            EmbeddingModel::AllMiniLmL6V2
        );
        assert_eq!(config.retrieval.context_length, 3);
        assert!(config.retrieval.use_reranking);
        assert_eq!(config.retrieval.weights(), ScoringWeights::default());
        assert_eq!(config.llm.model, "llama3");
        assert!(config.storage.use_persistent_storage);
        assert_eq!(config.storage.autosave_secs, 300);
        assert_eq!(config.server.bind, "127.0.0.1:7341");
    }

    #[test]
    fn test_missing_vault_is_error() {
        assert!(parse_config("[chunking]\nmax_chunk_size = 10\n").is_err());
    }

    #[test]
    fn test_overlap_must_be_smaller_than_size() {
        let toml = format!("{}[chunking]\nmax_chunk_size = 100\nchunk_overlap = 100\n", MINIMAL);
        let err = parse_config(&toml).unwrap_err();
        assert!(err.to_string().contains("chunk_overlap"));
    }

    #[test]
    fn test_unknown_embedding_model_is_error() {
        let toml = format!("{}[embedding]\nmodel = \"word2vec\"\n", MINIMAL);
        let err = parse_config(&toml).unwrap_err();
        assert!(format!("{:#}", err).contains("word2vec"));
    }

    #[test]
    fn test_context_length_bounds() {
        for bad in [0, 11] {
            let toml = format!("{}[retrieval]\ncontext_length = {}\n", MINIMAL, bad);
            assert!(parse_config(&toml).is_err(), "context_length {} accepted", bad);
        }
        let toml = format!("{}[retrieval]\ncontext_length = 10\n", MINIMAL);
        assert!(parse_config(&toml).is_ok());
    }

    #[test]
    fn test_unknown_providers_rejected() {
        let toml = format!("{}[embedding]\nprovider = \"cohere\"\n", MINIMAL);
        assert!(parse_config(&toml).is_err());
        let toml = format!("{}[llm]\nprovider = \"anthropic\"\n", MINIMAL);
        assert!(parse_config(&toml).is_err());
    }

    #[test]
    fn test_negative_weight_rejected() {
        let toml = format!("{}[retrieval]\nlexical_boost = -0.1\n", MINIMAL);
        assert!(parse_config(&toml).is_err());
    }
}
