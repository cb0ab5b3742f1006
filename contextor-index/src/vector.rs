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

//! Vector Index
//!
//! Exactly one fixed-dimension vector per event, keyed by project and event
//! id together - event ids are only unique within a project. Vectors
//! are L2-normalized at insert, so inner product at query time is cosine
//! similarity - the same metric on both sides of the contract.
//!
//! Append-only: no update or delete of individual vectors. The dimension is
//! locked by the first successful insert; later vectors of a different
//! dimension are refused. Search is an exact scan over the project's
//! entries, which is rebuild-friendly and has no recall cliff; the index is
//! a derived cache, not a datastore.

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::embedding::{l2_normalize, EmbeddingError, EmbeddingProvider};

/// A scored search hit.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorMatch {
    pub event_id: String,
    /// Cosine similarity in [-1, 1]
    pub similarity: f32,
}

/// Append-only similarity index over event embeddings.
pub struct VectorIndex {
    provider: Arc<dyn EmbeddingProvider>,
    /// (project, event id) -> normalized vector
    entries: DashMap<(String, String), Vec<f32>>,
    /// Locked by the first successful insert
    dimension: RwLock<Option<usize>>,
}

impl VectorIndex {
    pub fn new(provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            provider,
            entries: DashMap::new(),
            dimension: RwLock::new(None),
        }
    }

    /// Embed `text` and store the vector for `event_id`.
    ///
    /// Soft-fails: embedding errors are logged and reported as `false`, never
    /// propagated - ingestion of the event itself must not fail because the
    /// index could not be updated.
    pub async fn add(&self, project: &str, event_id: &str, text: &str) -> bool {
        let mut vector = match self.provider.embed(text).await {
            Ok(v) => v,
            Err(e) => {
                warn!(
                    event_id = %event_id,
                    provider = self.provider.name(),
                    error = %e,
                    "embedding failed, event not vector-indexed"
                );
                return false;
            }
        };

        {
            let mut dimension = self.dimension.write();
            match *dimension {
                None => *dimension = Some(vector.len()),
                Some(expected) if expected != vector.len() => {
                    warn!(
                        event_id = %event_id,
                        expected,
                        actual = vector.len(),
                        "dimension mismatch, event not vector-indexed"
                    );
                    return false;
                }
                Some(_) => {}
            }
        }

        l2_normalize(&mut vector);
        self.entries
            .insert((project.to_string(), event_id.to_string()), vector);
        debug!(event_id = %event_id, project = %project, "vector indexed");
        true
    }

    /// Top-k most similar events within a project, descending similarity.
    ///
    /// Embedding failure for the query is surfaced: the caller decides how
    /// to degrade (typically to keyword-only retrieval).
    pub async fn search(
        &self,
        project: &str,
        query_text: &str,
        top_k: usize,
    ) -> Result<Vec<VectorMatch>, EmbeddingError> {
        let mut query = self.provider.embed(query_text).await?;
        l2_normalize(&mut query);

        let mut matches: Vec<VectorMatch> = self
            .entries
            .iter()
            .filter(|entry| entry.key().0 == project)
            .filter(|entry| entry.value().len() == query.len())
            .map(|entry| VectorMatch {
                event_id: entry.key().1.clone(),
                similarity: dot(entry.value(), &query),
            })
            .collect();

        matches.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        matches.truncate(top_k);
        Ok(matches)
    }

    /// Number of indexed vectors.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop all entries and unlock the dimension; used before a rebuild
    /// replay.
    pub fn clear(&self) {
        self.entries.clear();
        *self.dimension.write() = None;
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::{HashedEmbeddingProvider, UnavailableEmbeddingProvider};

    fn index() -> VectorIndex {
        VectorIndex::new(Arc::new(HashedEmbeddingProvider::new(64)))
    }

    #[tokio::test]
    async fn test_add_and_search() {
        let index = index();
        assert!(index.add("WeSign", "e1", "auth login failure timeout").await);
        assert!(index.add("WeSign", "e2", "billing invoice render").await);

        let matches = index
            .search("WeSign", "auth login failure", 10)
            .await
            .unwrap();
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].event_id, "e1");
        assert!(matches[0].similarity > matches[1].similarity);
    }

    #[tokio::test]
    async fn test_search_scoped_to_project() {
        let index = index();
        index.add("WeSign", "e1", "auth failure").await;
        index.add("Billing", "e2", "auth failure").await;

        let matches = index.search("WeSign", "auth failure", 10).await.unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].event_id, "e1");
    }

    #[tokio::test]
    async fn test_same_event_id_across_projects_keeps_both_vectors() {
        let index = index();
        index.add("WeSign", "run-1", "signature widget timeout").await;
        index.add("Billing", "run-1", "invoice total rounding").await;
        assert_eq!(index.len(), 2);

        let we_sign = index.search("WeSign", "signature timeout", 10).await.unwrap();
        assert_eq!(we_sign.len(), 1);
        assert_eq!(we_sign[0].event_id, "run-1");

        let billing = index.search("Billing", "invoice rounding", 10).await.unwrap();
        assert_eq!(billing.len(), 1);
        assert_eq!(billing[0].event_id, "run-1");
    }

    #[tokio::test]
    async fn test_top_k_limit() {
        let index = index();
        for i in 0..20 {
            index
                .add("WeSign", &format!("e{}", i), &format!("event number {}", i))
                .await;
        }
        let matches = index.search("WeSign", "event number", 5).await.unwrap();
        assert_eq!(matches.len(), 5);
    }

    #[tokio::test]
    async fn test_add_soft_fails_when_provider_unavailable() {
        let index = VectorIndex::new(Arc::new(UnavailableEmbeddingProvider));
        assert!(!index.add("WeSign", "e1", "text").await);
        assert!(index.is_empty());
    }

    #[tokio::test]
    async fn test_search_propagates_embedding_failure() {
        let index = VectorIndex::new(Arc::new(UnavailableEmbeddingProvider));
        let err = index.search("WeSign", "query", 10).await.unwrap_err();
        assert!(matches!(err, EmbeddingError::Unavailable(_)));
    }

    #[tokio::test]
    async fn test_clear_unlocks_dimension() {
        let index = index();
        index.add("WeSign", "e1", "text").await;
        assert_eq!(index.len(), 1);

        index.clear();
        assert!(index.is_empty());
        assert!(index.add("WeSign", "e1", "text").await);
    }
}
