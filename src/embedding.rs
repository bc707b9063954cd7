//! Concrete embedding providers.
//!
//! - **[`DisabledProvider`]**: always fails, so the gateway's deterministic
//!   fallback produces every vector.
//! - **[`OllamaProvider`]**: `POST {url}/api/embed` on a local Ollama.
//! - **[`OpenAIProvider`]**: `POST /v1/embeddings`, requesting the configured
//!   model's dimension through the `dimensions` parameter.
//! - **`LocalProvider`**: fastembed, behind the `local-embeddings` feature.
//!
//! Every provider reports the dimension of the configured
//! [`EmbeddingModel`], never one inferred from a response.
//!
//! # Retry Strategy
//!
//! HTTP providers retry transient errors with exponential backoff:
//! - HTTP 429 and 5xx → retry
//! - other 4xx → fail immediately
//! - network errors → retry
//! - backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use vaultsearch_core::embedding::{EmbeddingModel, EmbeddingProvider};

use crate::config::EmbeddingConfig;

const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
const DEFAULT_OPENAI_URL: &str = "https://api.openai.com";
const DEFAULT_OPENAI_MODEL: &str = "text-embedding-3-small";

// ============ Disabled Provider ============

pub struct DisabledProvider {
    dims: usize,
}

impl DisabledProvider {
    pub fn new(model: EmbeddingModel) -> Self {
        Self { dims: model.dims() }
    }
}

#[async_trait]
impl EmbeddingProvider for DisabledProvider {
    fn model_name(&self) -> &str {
        "disabled"
    }
    fn dims(&self) -> usize {
        self.dims
    }
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        bail!("Embedding provider is disabled")
    }
}

// ============ Ollama Provider ============

/// Requires Ollama running with the model pulled
/// (e.g. `ollama pull nomic-embed-text`).
pub struct OllamaProvider {
    model: EmbeddingModel,
    remote_model: String,
    url: String,
    max_retries: u32,
    client: reqwest::Client,
}

impl OllamaProvider {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model = config.model()?;
        Ok(Self {
            model,
            remote_model: config
                .remote_model
                .clone()
                .unwrap_or_else(|| model.as_str().to_string()),
            url: config
                .url
                .clone()
                .unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string()),
            max_retries: config.max_retries,
            client: http_client(config.timeout_secs)?,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaProvider {
    fn model_name(&self) -> &str {
        self.model.as_str()
    }
    fn dims(&self) -> usize {
        self.model.dims()
    }
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let body = serde_json::json!({
            "model": self.remote_model,
            "input": text,
        });
        let url = format!("{}/api/embed", self.url.trim_end_matches('/'));
        let json = send_with_retry("Ollama", self.max_retries, || {
            self.client.post(&url).json(&body)
        })
        .await
        .with_context(|| format!("Ollama embedding failed (is Ollama running at {}?)", self.url))?;
        parse_ollama_response(&json)
    }
}

fn parse_ollama_response(json: &serde_json::Value) -> Result<Vec<f32>> {
    let first = json
        .get("embeddings")
        .and_then(|e| e.as_array())
        .and_then(|a| a.first())
        .ok_or_else(|| anyhow!("Invalid Ollama response: missing embeddings array"))?;
    parse_vector(first).ok_or_else(|| anyhow!("Invalid Ollama response: embedding is not an array"))
}

// ============ OpenAI Provider ============

/// Requires `OPENAI_API_KEY` in the environment.
pub struct OpenAIProvider {
    model: EmbeddingModel,
    remote_model: String,
    url: String,
    api_key: String,
    max_retries: u32,
    client: reqwest::Client,
}

impl OpenAIProvider {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow!("OPENAI_API_KEY environment variable not set"))?;
        Ok(Self {
            model: config.model()?,
            remote_model: config
                .remote_model
                .clone()
                .unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string()),
            url: config
                .url
                .clone()
                .unwrap_or_else(|| DEFAULT_OPENAI_URL.to_string()),
            api_key,
            max_retries: config.max_retries,
            client: http_client(config.timeout_secs)?,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAIProvider {
    fn model_name(&self) -> &str {
        self.model.as_str()
    }
    fn dims(&self) -> usize {
        self.model.dims()
    }
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let body = serde_json::json!({
            "model": self.remote_model,
            "input": [text],
            "dimensions": self.model.dims(),
        });
        let url = format!("{}/v1/embeddings", self.url.trim_end_matches('/'));
        let json = send_with_retry("OpenAI", self.max_retries, || {
            self.client
                .post(&url)
                .bearer_auth(&self.api_key)
                .json(&body)
        })
        .await?;
        parse_openai_response(&json)
    }
}

fn parse_openai_response(json: &serde_json::Value) -> Result<Vec<f32>> {
    let first = json
        .get("data")
        .and_then(|d| d.as_array())
        .and_then(|a| a.first())
        .ok_or_else(|| anyhow!("Invalid OpenAI response: missing data array"))?;
    first
        .get("embedding")
        .and_then(parse_vector)
        .ok_or_else(|| anyhow!("Invalid OpenAI response: missing embedding"))
}

// ============ Local Provider (fastembed) ============

/// Runs the model in-process. Weights are downloaded from Hugging Face on
/// first use and cached; after that no network calls are made.
#[cfg(feature = "local-embeddings")]
pub struct LocalProvider {
    model: EmbeddingModel,
    engine: Arc<std::sync::Mutex<Option<fastembed::TextEmbedding>>>,
}

#[cfg(feature = "local-embeddings")]
impl LocalProvider {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        Ok(Self {
            model: config.model()?,
            engine: Arc::new(std::sync::Mutex::new(None)),
        })
    }
}

#[cfg(feature = "local-embeddings")]
fn to_fastembed_model(model: EmbeddingModel) -> fastembed::EmbeddingModel {
    match model {
        EmbeddingModel::AllMiniLmL6V2 => fastembed::EmbeddingModel::AllMiniLML6V2,
        EmbeddingModel::BgeSmallEnV15 => fastembed::EmbeddingModel::BGESmallENV15,
        EmbeddingModel::BgeBaseEnV15 => fastembed::EmbeddingModel::BGEBaseENV15,
        EmbeddingModel::BgeLargeEnV15 => fastembed::EmbeddingModel::BGELargeENV15,
        EmbeddingModel::NomicEmbedTextV15 => fastembed::EmbeddingModel::NomicEmbedTextV15,
        EmbeddingModel::MxbaiEmbedLarge => fastembed::EmbeddingModel::MxbaiEmbedLargeV1,
        EmbeddingModel::MultilingualE5Small => fastembed::EmbeddingModel::MultilingualE5Small,
        EmbeddingModel::MultilingualE5Base => fastembed::EmbeddingModel::MultilingualE5Base,
        EmbeddingModel::MultilingualE5Large => fastembed::EmbeddingModel::MultilingualE5Large,
    }
}

#[cfg(feature = "local-embeddings")]
#[async_trait]
impl EmbeddingProvider for LocalProvider {
    fn model_name(&self) -> &str {
        self.model.as_str()
    }
    fn dims(&self) -> usize {
        self.model.dims()
    }
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let engine = self.engine.clone();
        let model = self.model;
        let text = text.to_string();

        tokio::task::spawn_blocking(move || {
            let mut guard = engine
                .lock()
                .map_err(|_| anyhow!("local embedding model lock poisoned"))?;
            if guard.is_none() {
                let loaded = fastembed::TextEmbedding::try_new(
                    fastembed::InitOptions::new(to_fastembed_model(model))
                        .with_show_download_progress(true),
                )
                .map_err(|e| anyhow!("Failed to initialize local embedding model: {}", e))?;
                *guard = Some(loaded);
            }
            let embedder = guard
                .as_mut()
                .ok_or_else(|| anyhow!("local embedding model not loaded"))?;
            let mut vectors = embedder
                .embed(vec![text], None)
                .map_err(|e| anyhow!("Local embedding failed: {}", e))?;
            vectors
                .pop()
                .ok_or_else(|| anyhow!("Local embedding returned no vector"))
        })
        .await?
    }
}

// ============ Shared HTTP plumbing ============

pub(crate) fn http_client(timeout_secs: u64) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .context("Failed to build HTTP client")
}

/// Send the request built by `build` until it succeeds, retrying 429, 5xx
/// and network errors up to `max_retries` times.
async fn send_with_retry<F>(label: &str, max_retries: u32, build: F) -> Result<serde_json::Value>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    let mut last_err = None;

    for attempt in 0..=max_retries {
        if attempt > 0 {
            let delay = Duration::from_secs(1 << (attempt - 1).min(5));
            debug!(attempt, ?delay, "{} request retry", label);
            tokio::time::sleep(delay).await;
        }

        match build().send().await {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    return response
                        .json()
                        .await
                        .with_context(|| format!("Invalid {} response body", label));
                }

                let body_text = response.text().await.unwrap_or_default();
                if status.as_u16() == 429 || status.is_server_error() {
                    last_err = Some(anyhow!("{} API error {}: {}", label, status, body_text));
                    continue;
                }
                bail!("{} API error {}: {}", label, status, body_text);
            }
            Err(e) => {
                last_err = Some(anyhow!("{} connection error: {}", label, e));
            }
        }
    }

    Err(last_err.unwrap_or_else(|| anyhow!("{} request failed after retries", label)))
}

fn parse_vector(value: &serde_json::Value) -> Option<Vec<f32>> {
    value
        .as_array()?
        .iter()
        .map(|v| v.as_f64().map(|x| x as f32))
        .collect()
}

/// Create the [`EmbeddingProvider`] named by `config.provider`.
///
/// | Config Value | Provider |
/// |-------------|----------|
/// | `"disabled"` | [`DisabledProvider`] |
/// | `"ollama"` | [`OllamaProvider`] |
/// | `"openai"` | [`OpenAIProvider`] |
/// | `"local"` | `LocalProvider` (requires the `local-embeddings` feature) |
pub fn create_embedding_provider(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledProvider::new(config.model()?))),
        "ollama" => Ok(Arc::new(OllamaProvider::new(config)?)),
        "openai" => Ok(Arc::new(OpenAIProvider::new(config)?)),
        #[cfg(feature = "local-embeddings")]
        "local" => Ok(Arc::new(LocalProvider::new(config)?)),
        #[cfg(not(feature = "local-embeddings"))]
        "local" => bail!("Local embedding provider requires --features local-embeddings"),
        other => bail!("Unknown embedding provider: {}", other),
    }
}
