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

//! Retrieval Engine
//!
//! Runs the signals a policy enables, merges candidates with provenance,
//! ranks by weighted similarity and importance, and greedily fills a token
//! budget. Selection stops at the first event that would exceed the budget;
//! later, smaller events are not pulled forward past it.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, warn};

use contextor_core::{ContextorError, Result};
use contextor_index::{tokenize, KeywordIndex, VectorIndex};
use contextor_storage::EventStore;

use crate::pack::{ContextPack, SelectedEvent, Signal};
use crate::policy::PolicyRegistry;

struct Candidate {
    signals: Vec<Signal>,
    similarity: f32,
}

/// Policy-driven retrieval over the event store and its derived indexes.
pub struct RetrievalEngine {
    store: Arc<EventStore>,
    vector: Arc<VectorIndex>,
    keyword: Arc<KeywordIndex>,
    policies: Arc<PolicyRegistry>,
}

impl RetrievalEngine {
    pub fn new(
        store: Arc<EventStore>,
        vector: Arc<VectorIndex>,
        keyword: Arc<KeywordIndex>,
        policies: Arc<PolicyRegistry>,
    ) -> Self {
        Self {
            store,
            vector,
            keyword,
            policies,
        }
    }

    /// Retrieve a context pack for `task` in `project`.
    ///
    /// When the embedding provider fails and the policy also enables the
    /// keyword signal, retrieval degrades to keyword-only instead of
    /// failing; with no fallback signal the error is surfaced.
    pub async fn retrieve(
        &self,
        project: &str,
        task: &str,
        inputs: &Map<String, Value>,
        token_budget: usize,
    ) -> Result<ContextPack> {
        let policy = self.policies.resolve(task);
        let query = synthesize_query(inputs);

        let mut terms: Vec<String> = tokenize(&query);
        terms.extend(policy.extra_terms.iter().cloned());

        let mut candidates: HashMap<String, Candidate> = HashMap::new();

        if policy.use_vector {
            match self
                .vector
                .search(project, &query, policy.candidate_limit)
                .await
            {
                Ok(matches) => {
                    for m in matches {
                        candidates.insert(
                            m.event_id,
                            Candidate {
                                signals: vec![Signal::Vector],
                                similarity: m.similarity.clamp(0.0, 1.0),
                            },
                        );
                    }
                }
                Err(e) if policy.use_keyword => {
                    warn!(
                        task = %task,
                        error = %e,
                        "vector signal unavailable, degrading to keyword-only"
                    );
                }
                Err(e) => {
                    return Err(ContextorError::Retrieval(format!(
                        "vector signal unavailable and no fallback: {}",
                        e
                    )));
                }
            }
        }

        if policy.use_keyword {
            for event_id in self.keyword.search(project, &terms) {
                candidates
                    .entry(event_id)
                    .and_modify(|c| c.signals.push(Signal::Keyword))
                    .or_insert(Candidate {
                        signals: vec![Signal::Keyword],
                        similarity: 0.0,
                    });
            }
        }

        if candidates.is_empty() {
            debug!(task = %task, project = %project, "no retrieval candidates");
            return Ok(ContextPack::empty(token_budget));
        }

        let mut scored: Vec<SelectedEvent> = Vec::with_capacity(candidates.len());
        for (event_id, candidate) in candidates {
            // Index entries can outlive a segment that was truncated by hand;
            // a dangling id is dropped, not an error.
            let event = match self.store.get(project, &event_id) {
                Ok(event) => event,
                Err(ContextorError::NotFound(_)) => {
                    debug!(event_id = %event_id, "index hit without stored event, skipping");
                    continue;
                }
                Err(e) => return Err(e),
            };

            let score = policy.similarity_weight * candidate.similarity
                + policy.importance_weight * (event.importance / 5.0);
            scored.push(SelectedEvent {
                event,
                signals: candidate.signals,
                score,
                similarity: candidate.similarity,
            });
        }

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.event.timestamp.cmp(&a.event.timestamp))
        });

        let mut pack = ContextPack::empty(token_budget);
        for selected in scored {
            let cost = selected.estimated_tokens();
            if pack.tokens_used + cost > token_budget {
                break;
            }
            pack.tokens_used += cost;
            pack.events.push(selected);
        }

        debug!(
            task = %task,
            project = %project,
            selected = pack.events.len(),
            tokens_used = pack.tokens_used,
            token_budget,
            "assembled context pack"
        );
        Ok(pack)
    }
}

/// Deterministic query text from task inputs: key/value pairs in key order.
fn synthesize_query(inputs: &Map<String, Value>) -> String {
    let mut entries: Vec<(&String, &Value)> = inputs.iter().collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));

    entries
        .iter()
        .map(|(key, value)| {
            let rendered = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            format!("{} {}", key, rendered)
        })
        .collect::<Vec<_>>()
        .join(" ")
}
