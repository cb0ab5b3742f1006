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

//! Service façade
//!
//! `ContextService` is the single entry point the HTTP layer talks to. It
//! owns the stores, indexes, retrieval engine, and journal by explicit
//! injection; nothing in here reaches for globals.
//!
//! Ingest is durable-first: the event store append either succeeds or the
//! whole call fails; index updates afterwards are best-effort and bounded by
//! a timeout, reported in the outcome but never fatal.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};
use tracing::{info, warn};

use contextor_core::{ContextEvent, EventDraft, Result};
use contextor_index::{KeywordIndex, VectorIndex};
use contextor_retrieval::{ContextPack, PolicyRegistry, RetrievalEngine};
use contextor_storage::{
    EventStore, JournalCommit, JournalStats, MemoryJournal, Session, StoreStats,
};

/// Outcome of a single ingest: the stored event plus which derived indexes
/// accepted it.
#[derive(Debug, Clone)]
pub struct IngestOutcome {
    pub event: ContextEvent,
    pub vector_indexed: bool,
    pub keyword_indexed: bool,
}

/// Snapshot of service health.
#[derive(Debug, Clone)]
pub struct HealthReport {
    pub healthy: bool,
    pub total_events: usize,
    pub vector_index_size: usize,
    pub policies_loaded: usize,
    pub store: StoreStats,
    pub journal: JournalStats,
}

/// Outcome of an index rebuild replay.
#[derive(Debug, Clone)]
pub struct RebuildReport {
    pub events_replayed: usize,
    pub vector_indexed: usize,
}

pub struct ContextService {
    store: Arc<EventStore>,
    vector: Arc<VectorIndex>,
    keyword: Arc<KeywordIndex>,
    journal: Arc<MemoryJournal>,
    engine: RetrievalEngine,
    policies: Arc<PolicyRegistry>,
    embed_timeout: Duration,
    /// Tracks the last observed embedding outcome; drives healthy/degraded
    embedding_ok: AtomicBool,
}

impl ContextService {
    pub fn new(
        store: Arc<EventStore>,
        vector: Arc<VectorIndex>,
        keyword: Arc<KeywordIndex>,
        journal: Arc<MemoryJournal>,
        policies: Arc<PolicyRegistry>,
        embed_timeout: Duration,
    ) -> Self {
        let engine = RetrievalEngine::new(
            store.clone(),
            vector.clone(),
            keyword.clone(),
            policies.clone(),
        );
        Self {
            store,
            vector,
            keyword,
            journal,
            engine,
            policies,
            embed_timeout,
            embedding_ok: AtomicBool::new(true),
        }
    }

    /// Idempotent health snapshot; "degraded" reflects the most recent
    /// embedding outcome, everything else is read straight off the stores.
    pub fn health(&self) -> HealthReport {
        HealthReport {
            healthy: self.embedding_ok.load(Ordering::Relaxed),
            total_events: self.store.total_events(),
            vector_index_size: self.vector.len(),
            policies_loaded: self.policies.len(),
            store: self.store.stats(),
            journal: self.journal.stats(),
        }
    }

    /// Durably append an event, then best-effort update both indexes.
    ///
    /// The append is the only fallible part; a slow or failing embedding
    /// provider costs at most `embed_timeout` and the event stays retrievable
    /// via `recent_events`.
    pub async fn ingest(&self, draft: EventDraft) -> Result<IngestOutcome> {
        let event = self.store.append(draft)?;
        let text = event.index_text();

        let vector_indexed = match tokio::time::timeout(
            self.embed_timeout,
            self.vector.add(&event.project, &event.id, &text),
        )
        .await
        {
            Ok(indexed) => indexed,
            Err(_) => {
                warn!(
                    event_id = %event.id,
                    timeout_ms = self.embed_timeout.as_millis() as u64,
                    "embedding timed out, event not vector-indexed"
                );
                false
            }
        };
        self.embedding_ok.store(vector_indexed, Ordering::Relaxed);

        self.keyword.add(&event.project, &event.id, &event.tags, &text);

        Ok(IngestOutcome {
            event,
            vector_indexed,
            keyword_indexed: true,
        })
    }

    /// Policy-driven retrieval; errors are the caller's signal to fall back
    /// to `recent_events` plus tag filtering.
    pub async fn retrieve(
        &self,
        project: &str,
        task: &str,
        inputs: &Map<String, Value>,
        token_budget: usize,
    ) -> Result<ContextPack> {
        self.engine.retrieve(project, task, inputs, token_budget).await
    }

    /// Newest-first events with an optional exact tag filter; returns the
    /// page plus the total matching count.
    pub fn recent_events(
        &self,
        project: &str,
        limit: usize,
        offset: usize,
        tag: Option<&str>,
    ) -> (Vec<ContextEvent>, usize) {
        let all = self.store.list_recent(project, usize::MAX, 0);
        let filtered: Vec<ContextEvent> = match tag {
            Some(tag) => all.into_iter().filter(|e| e.has_tag(tag)).collect(),
            None => all,
        };
        let total = filtered.len();
        (filtered.into_iter().skip(offset).take(limit).collect(), total)
    }

    /// Clear both derived indexes and replay every stored event through
    /// `add`. Keyword indexing always succeeds; vector coverage depends on
    /// the embedding provider.
    pub async fn rebuild_indexes(&self) -> RebuildReport {
        self.vector.clear();
        self.keyword.clear();

        let mut events = Vec::new();
        for project in self.store.projects() {
            self.store.for_each(&project, |event| events.push(event.clone()));
        }

        let mut vector_indexed = 0;
        for event in &events {
            let text = event.index_text();
            if self.vector.add(&event.project, &event.id, &text).await {
                vector_indexed += 1;
            }
            self.keyword.add(&event.project, &event.id, &event.tags, &text);
        }

        info!(
            events = events.len(),
            vector_indexed,
            "rebuilt derived indexes by replay"
        );
        RebuildReport {
            events_replayed: events.len(),
            vector_indexed,
        }
    }

    // Journal operations are thin delegation; the journal owns its locking
    // and persistence.

    pub fn create_session(&self, name: &str) -> Result<Session> {
        self.journal.create_session(name)
    }

    pub fn commit(&self, session: &str, message: &str, payload: &Value) -> Result<JournalCommit> {
        self.journal.commit(session, message, payload)
    }

    pub fn journal_log(&self, session: &str, limit: usize) -> Result<Vec<JournalCommit>> {
        self.journal.log(session, limit)
    }

    pub fn branch(&self, from_session: &str, new_name: &str) -> Result<Session> {
        self.journal.branch(from_session, new_name)
    }
}
