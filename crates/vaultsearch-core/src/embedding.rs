//! Provider capability traits and vector utilities.
//!
//! Defines the two narrow interfaces the engine consumes:
//! - [`EmbeddingProvider`] — text in, fixed-dimension vector out.
//! - [`CompletionProvider`] — prompt in, generated text out.
//!
//! Concrete providers (Ollama, OpenAI, fastembed) live in the `vaultsearch`
//! app crate. Tests swap in deterministic implementations.
//!
//! The model → dimension mapping is a static table ([`EmbeddingModel`]);
//! dimensions are never inferred from provider output.

use std::fmt;
use std::str::FromStr;

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Trait for embedding providers.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Returns the model identifier (e.g. `"bge-small-en-v1.5"`).
    fn model_name(&self) -> &str;
    /// Returns the embedding vector dimensionality (e.g. `384`).
    fn dims(&self) -> usize;
    /// Embed a single text. May fail; callers go through
    /// [`EmbeddingGateway`](crate::gateway::EmbeddingGateway), which never does.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Trait for text-generation providers used by question answering.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Generate a completion for `prompt` with the model `model_id`.
    async fn complete(&self, prompt: &str, model_id: &str) -> Result<String>;
}

/// Supported embedding models and their fixed output dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EmbeddingModel {
    #[serde(rename = "all-minilm-l6-v2")]
    AllMiniLmL6V2,
    #[serde(rename = "bge-small-en-v1.5")]
    BgeSmallEnV15,
    #[serde(rename = "bge-base-en-v1.5")]
    BgeBaseEnV15,
    #[serde(rename = "bge-large-en-v1.5")]
    BgeLargeEnV15,
    #[serde(rename = "nomic-embed-text-v1.5")]
    NomicEmbedTextV15,
    #[serde(rename = "mxbai-embed-large")]
    MxbaiEmbedLarge,
    #[serde(rename = "multilingual-e5-small")]
    MultilingualE5Small,
    #[serde(rename = "multilingual-e5-base")]
    MultilingualE5Base,
    #[serde(rename = "multilingual-e5-large")]
    MultilingualE5Large,
}

impl EmbeddingModel {
    pub const ALL: [EmbeddingModel; 9] = [
        EmbeddingModel::AllMiniLmL6V2,
        EmbeddingModel::BgeSmallEnV15,
        EmbeddingModel::BgeBaseEnV15,
        EmbeddingModel::BgeLargeEnV15,
        EmbeddingModel::NomicEmbedTextV15,
        EmbeddingModel::MxbaiEmbedLarge,
        EmbeddingModel::MultilingualE5Small,
        EmbeddingModel::MultilingualE5Base,
        EmbeddingModel::MultilingualE5Large,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EmbeddingModel::AllMiniLmL6V2 => "all-minilm-l6-v2",
            EmbeddingModel::BgeSmallEnV15 => "bge-small-en-v1.5",
            EmbeddingModel::BgeBaseEnV15 => "bge-base-en-v1.5",
            EmbeddingModel::BgeLargeEnV15 => "bge-large-en-v1.5",
            EmbeddingModel::NomicEmbedTextV15 => "nomic-embed-text-v1.5",
            EmbeddingModel::MxbaiEmbedLarge => "mxbai-embed-large",
            EmbeddingModel::MultilingualE5Small => "multilingual-e5-small",
            EmbeddingModel::MultilingualE5Base => "multilingual-e5-base",
            EmbeddingModel::MultilingualE5Large => "multilingual-e5-large",
        }
    }

    pub fn dims(&self) -> usize {
        match self {
            EmbeddingModel::AllMiniLmL6V2
            | EmbeddingModel::BgeSmallEnV15
            | EmbeddingModel::MultilingualE5Small => 384,
            EmbeddingModel::BgeBaseEnV15
            | EmbeddingModel::NomicEmbedTextV15
            | EmbeddingModel::MultilingualE5Base => 768,
            EmbeddingModel::BgeLargeEnV15
            | EmbeddingModel::MxbaiEmbedLarge
            | EmbeddingModel::MultilingualE5Large => 1024,
        }
    }
}

impl fmt::Display for EmbeddingModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EmbeddingModel {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match EmbeddingModel::ALL.iter().find(|m| m.as_str() == s) {
            Some(m) => Ok(*m),
            None => {
                let names: Vec<&str> = EmbeddingModel::ALL.iter().map(|m| m.as_str()).collect();
                bail!(
                    "Unknown embedding model: '{}'. Supported models: {}",
                    s,
                    names.join(", ")
                )
            }
        }
    }
}

/// Compute cosine similarity between two embedding vectors.
///
/// Returns `None` when the vectors differ in length or are empty; that is a
/// caller-visible error, not a zero score. A zero-magnitude operand yields
/// `Some(0.0)`. The result is clamped to `[-1.0, 1.0]`.
///
/// ```text
///            a · b
/// cos(θ) = ─────────
///          ‖a‖ × ‖b‖
/// ```
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f32> {
    if a.len() != b.len() || a.is_empty() {
        return None;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return Some(0.0);
    }

    Some((dot / denom).clamp(-1.0, 1.0))
}

/// Scale `vec` to unit length in place.
///
/// A zero-magnitude (or non-finite) vector becomes the canonical unit
/// vector `[1, 0, 0, …]`.
pub fn normalize(vec: &mut [f32]) {
    let magnitude = vec.iter().map(|x| x * x).sum::<f32>().sqrt();
    if magnitude.is_finite() && magnitude > f32::EPSILON {
        for v in vec.iter_mut() {
            *v /= magnitude;
        }
        return;
    }
    for v in vec.iter_mut() {
        *v = 0.0;
    }
    if let Some(first) = vec.first_mut() {
        *first = 1.0;
    }
}

/// Deterministic unit vector of length `dims` derived from `text`.
///
/// SHA-256 in counter mode: block `i` hashes the text followed by `i` as
/// little-endian `u32`, and each 4-byte word maps to `[-1, 1]`. Identical
/// inputs give bit-identical vectors on every platform.
pub fn fallback_vector(text: &str, dims: usize) -> Vec<f32> {
    let mut out = Vec::with_capacity(dims);
    let mut block: u32 = 0;

    while out.len() < dims {
        let mut hasher = Sha256::new();
        hasher.update(text.as_bytes());
        hasher.update(block.to_le_bytes());
        let digest = hasher.finalize();

        for word in digest.chunks_exact(4) {
            if out.len() == dims {
                break;
            }
            let n = u32::from_le_bytes([word[0], word[1], word[2], word[3]]);
            out.push((n as f64 / u32::MAX as f64 * 2.0 - 1.0) as f32);
        }
        block = block.wrapping_add(1);
    }

    normalize(&mut out);
    out
}
