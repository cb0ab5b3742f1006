// Copyright 2025 Contextor Contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Embedding providers
//!
//! The embedding capability is external to the store: text in, fixed-length
//! vector out, possibly unavailable. Providers here:
//!
//! - `HashedEmbeddingProvider`: deterministic local hashed bag-of-tokens,
//!   no model required; rebuilding an index reproduces identical vectors.
//! - `HttpEmbeddingProvider`: remote embedding service over HTTP/JSON.
//! - `UnavailableEmbeddingProvider`: always fails; exercises degradation
//!   paths in tests.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Embedding failures. Always treated as soft by callers on the ingestion
/// path: the event is stored either way.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("Embedding backend unavailable: {0}")]
    Unavailable(String),

    #[error("Invalid embedding response: {0}")]
    InvalidResponse(String),

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// Text -> fixed-length vector.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a text. The returned vector must have `dimension()` entries.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// Fixed output dimension of this provider.
    fn dimension(&self) -> usize;

    /// Provider name for logs and health output.
    fn name(&self) -> &str;
}

/// Deterministic local provider: hashed bag of lowercase alphanumeric
/// tokens, L2-normalized. Not a learned embedding, but stable across
/// restarts and rebuilds, and cheap enough for the ingest path.
pub struct HashedEmbeddingProvider {
    dimension: usize,
}

impl HashedEmbeddingProvider {
    pub const DEFAULT_DIMENSION: usize = 256;

    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    fn embed_sync(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];
        for token in tokenize(text) {
            let digest = blake3::hash(token.as_bytes());
            let bytes = digest.as_bytes();
            let bucket = u64::from_le_bytes(bytes[..8].try_into().expect("8 bytes"))
                as usize
                % self.dimension;
            // High bit of the next byte decides the sign so antonymous
            // buckets do not all accumulate positively
            let sign = if bytes[8] & 0x80 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }
        l2_normalize(&mut vector);
        vector
    }
}

impl Default for HashedEmbeddingProvider {
    fn default() -> Self {
        Self::new(Self::DEFAULT_DIMENSION)
    }
}

#[async_trait]
impl EmbeddingProvider for HashedEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        Ok(self.embed_sync(text))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        "hashed-local"
    }
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embedding: Vec<f32>,
}

/// Remote embedding service: `POST {base_url}/embed {"text": ...}` returning
/// `{"embedding": [...]}`. The client carries a request timeout so an
/// unreachable backend degrades instead of hanging the ingest path.
pub struct HttpEmbeddingProvider {
    client: reqwest::Client,
    endpoint: String,
    dimension: usize,
}

impl HttpEmbeddingProvider {
    pub fn new(
        base_url: &str,
        dimension: usize,
        timeout: std::time::Duration,
    ) -> Result<Self, EmbeddingError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| EmbeddingError::Unavailable(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: format!("{}/embed", base_url.trim_end_matches('/')),
            dimension,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for HttpEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&EmbedRequest { text })
            .send()
            .await
            .map_err(|e| EmbeddingError::Unavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(EmbeddingError::InvalidResponse(format!(
                "status {}",
                response.status()
            )));
        }

        let body: EmbedResponse = response
            .json()
            .await
            .map_err(|e| EmbeddingError::InvalidResponse(e.to_string()))?;

        if body.embedding.len() != self.dimension {
            return Err(EmbeddingError::DimensionMismatch {
                expected: self.dimension,
                actual: body.embedding.len(),
            });
        }
        Ok(body.embedding)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        "http"
    }
}

/// Provider that always fails; used to exercise soft-failure paths.
pub struct UnavailableEmbeddingProvider;

#[async_trait]
impl EmbeddingProvider for UnavailableEmbeddingProvider {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
        Err(EmbeddingError::Unavailable(
            "embedding backend disabled".to_string(),
        ))
    }

    fn dimension(&self) -> usize {
        HashedEmbeddingProvider::DEFAULT_DIMENSION
    }

    fn name(&self) -> &str {
        "unavailable"
    }
}

/// Lowercase alphanumeric tokenization shared by the keyword index and the
/// hashed provider.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}

/// Scale a vector to unit length in place; zero vectors are left unchanged.
pub fn l2_normalize(vector: &mut [f32]) {
    let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in vector.iter_mut() {
            *v /= norm;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_hashed_provider_deterministic() {
        let provider = HashedEmbeddingProvider::default();
        let a = provider.embed("login test failed timeout").await.unwrap();
        let b = provider.embed("login test failed timeout").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), HashedEmbeddingProvider::DEFAULT_DIMENSION);
    }

    #[tokio::test]
    async fn test_hashed_provider_normalized() {
        let provider = HashedEmbeddingProvider::new(64);
        let v = provider.embed("some event text here").await.unwrap();
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_similar_texts_closer_than_unrelated() {
        let provider = HashedEmbeddingProvider::default();
        let base = provider.embed("auth login failure timeout").await.unwrap();
        let close = provider.embed("auth login failure retry").await.unwrap();
        let far = provider.embed("billing invoice render pixel").await.unwrap();

        let dot = |a: &[f32], b: &[f32]| -> f32 { a.iter().zip(b).map(|(x, y)| x * y).sum() };
        assert!(dot(&base, &close) > dot(&base, &far));
    }

    #[tokio::test]
    async fn test_unavailable_provider_fails_softly_typed() {
        let provider = UnavailableEmbeddingProvider;
        let err = provider.embed("anything").await.unwrap_err();
        assert!(matches!(err, EmbeddingError::Unavailable(_)));
    }

    #[test]
    fn test_tokenize() {
        assert_eq!(
            tokenize("Test_Failure: auth/login (2x)!"),
            vec!["test", "failure", "auth", "login", "2x"]
        );
        assert!(tokenize("...").is_empty());
    }

    #[test]
    fn test_l2_normalize_zero_vector() {
        let mut v = vec![0.0f32; 8];
        l2_normalize(&mut v);
        assert!(v.iter().all(|x| *x == 0.0));
    }

    proptest::proptest! {
        #[test]
        fn prop_hashed_vectors_unit_or_zero(text in ".{0,200}") {
            let provider = HashedEmbeddingProvider::new(32);
            let v = provider.embed_sync(&text);
            let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
            proptest::prop_assert!(norm == 0.0 || (norm - 1.0).abs() < 1e-4);
        }
    }
}
