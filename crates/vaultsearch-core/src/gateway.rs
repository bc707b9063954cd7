//! Embedding gateway: preprocessing, provider call, deterministic fallback.
//!
//! [`EmbeddingGateway::embed`] never fails. Whatever happens at the
//! provider, the caller receives a unit vector of exactly
//! [`dims`](EmbeddingGateway::dims) components:
//!
//! | Condition | Vector |
//! |-----------|--------|
//! | provider returns a vector of the right length | provider output, normalized |
//! | preprocessing leaves nothing to embed | fallback |
//! | provider call fails | fallback |
//! | provider returns the wrong length or non-finite values | fallback |
//!
//! The fallback is [`fallback_vector`] of the **original** text, so a failing
//! input always reproduces the same vector.

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::embedding::{fallback_vector, normalize, EmbeddingProvider};
use crate::preprocess::prepare_for_embedding;

/// Why the gateway substituted a fallback vector.
#[derive(Debug, Clone, PartialEq)]
pub enum FallbackReason {
    EmptyText,
    ProviderError(String),
    WrongDimension { expected: usize, actual: usize },
    NonFinite,
}

impl fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FallbackReason::EmptyText => write!(f, "nothing left to embed after preprocessing"),
            FallbackReason::ProviderError(e) => write!(f, "provider error: {}", e),
            FallbackReason::WrongDimension { expected, actual } => {
                write!(f, "provider returned {} dims, expected {}", actual, expected)
            }
            FallbackReason::NonFinite => write!(f, "provider returned non-finite values"),
        }
    }
}

/// A gateway result, with the reason when the vector is a fallback.
#[derive(Debug, Clone)]
pub struct Embedded {
    pub vector: Vec<f32>,
    pub fallback: Option<FallbackReason>,
}

/// Wraps an [`EmbeddingProvider`] with preprocessing and fallback.
#[derive(Clone)]
pub struct EmbeddingGateway {
    provider: Arc<dyn EmbeddingProvider>,
    dims: usize,
}

impl EmbeddingGateway {
    pub fn new(provider: Arc<dyn EmbeddingProvider>) -> Self {
        let dims = provider.dims();
        Self { provider, dims }
    }

    pub fn model_name(&self) -> &str {
        self.provider.model_name()
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    /// Embed `text`, returning a unit vector of length [`dims`](Self::dims).
    pub async fn embed(&self, text: &str) -> Vec<f32> {
        self.embed_detailed(text).await.vector
    }

    /// Like [`embed`](Self::embed), also reporting whether a fallback was used.
    pub async fn embed_detailed(&self, text: &str) -> Embedded {
        let prepared = prepare_for_embedding(text);
        if prepared.is_empty() {
            return self.fallback(text, FallbackReason::EmptyText);
        }

        let mut vector = match self.provider.embed(&prepared).await {
            Ok(v) => v,
            Err(e) => return self.fallback(text, FallbackReason::ProviderError(format!("{:#}", e))),
        };

        if vector.len() != self.dims {
            let reason = FallbackReason::WrongDimension {
                expected: self.dims,
                actual: vector.len(),
            };
            return self.fallback(text, reason);
        }
        if vector.iter().any(|x| !x.is_finite()) {
            return self.fallback(text, FallbackReason::NonFinite);
        }

        normalize(&mut vector);
        Embedded {
            vector,
            fallback: None,
        }
    }

    fn fallback(&self, original: &str, reason: FallbackReason) -> Embedded {
        debug!(
            model = self.provider.model_name(),
            "embedding fell back to hash vector: {}", reason
        );
        Embedded {
            vector: fallback_vector(original, self.dims),
            fallback: Some(reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{bail, Result};
    use async_trait::async_trait;

    struct FixedProvider {
        output: Vec<f32>,
    }

    #[async_trait]
    impl EmbeddingProvider for FixedProvider {
        fn model_name(&self) -> &str {
            "fixed"
        }
        fn dims(&self) -> usize {
            3
        }
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Ok(self.output.clone())
        }
    }

    struct FailingProvider;

    #[async_trait]
    impl EmbeddingProvider for FailingProvider {
        fn model_name(&self) -> &str {
            "failing"
        }
        fn dims(&self) -> usize {
            8
        }
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            bail!("connection refused")
        }
    }

    fn gateway(provider: impl EmbeddingProvider + 'static) -> EmbeddingGateway {
        EmbeddingGateway::new(Arc::new(provider))
    }

    #[tokio::test]
    async fn test_provider_output_is_normalized() {
        let gw = gateway(FixedProvider {
            output: vec![0.0, 3.0, 4.0],
        });
        let e = gw.embed_detailed("hello").await;
        assert!(e.fallback.is_none());
        assert!((e.vector[1] - 0.6).abs() < 1e-6);
        assert!((e.vector[2] - 0.8).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_zero_vector_becomes_canonical() {
        let gw = gateway(FixedProvider {
            output: vec![0.0, 0.0, 0.0],
        });
        assert_eq!(gw.embed("hello").await, vec![1.0, 0.0, 0.0]);
    }

    #[tokio::test]
    async fn test_provider_failure_falls_back_deterministically() {
        let gw = gateway(FailingProvider);
        let a = gw.embed_detailed("# Title\n\nsome text").await;
        let b = gw.embed_detailed("# Title\n\nsome text").await;
        assert!(matches!(a.fallback, Some(FallbackReason::ProviderError(_))));
        assert_eq!(a.vector, b.vector);
        assert_eq!(a.vector, fallback_vector("# Title\n\nsome text", 8));
    }

    #[tokio::test]
    async fn test_empty_after_preprocessing_uses_original_text() {
        let gw = gateway(FixedProvider {
            output: vec![1.0, 0.0, 0.0],
        });
        let original = "```\nonly code\n```";
        let e = gw.embed_detailed(original).await;
        assert_eq!(e.fallback, Some(FallbackReason::EmptyText));
        assert_eq!(e.vector, fallback_vector(original, 3));
    }

    #[tokio::test]
    async fn test_wrong_dimension_falls_back() {
        let gw = gateway(FixedProvider {
            output: vec![1.0, 2.0],
        });
        let e = gw.embed_detailed("text").await;
        assert_eq!(
            e.fallback,
            Some(FallbackReason::WrongDimension {
                expected: 3,
                actual: 2
            })
        );
        assert_eq!(e.vector.len(), 3);
    }

    #[tokio::test]
    async fn test_non_finite_falls_back() {
        let gw = gateway(FixedProvider {
            output: vec![f32::NAN, 1.0, 0.0],
        });
        let e = gw.embed_detailed("text").await;
        assert_eq!(e.fallback, Some(FallbackReason::NonFinite));
        assert!(e.vector.iter().all(|x| x.is_finite()));
    }
}
