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

//! Context pack: the ranked, budget-constrained result of a retrieval.

use serde::{Deserialize, Serialize};

use contextor_core::ContextEvent;

/// Which index surfaced a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    Vector,
    Keyword,
}

/// A selected event with its retrieval provenance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectedEvent {
    #[serde(flatten)]
    pub event: ContextEvent,

    /// Every signal that surfaced this event, not just the strongest.
    pub signals: Vec<Signal>,

    /// Combined rank score (weighted similarity + importance).
    pub score: f32,

    /// Cosine similarity clamped to [0, 1]; 0.0 for keyword-only hits.
    pub similarity: f32,
}

impl SelectedEvent {
    pub fn estimated_tokens(&self) -> usize {
        self.event.estimated_tokens()
    }
}

/// Retrieval result: events in rank order plus budget accounting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextPack {
    pub events: Vec<SelectedEvent>,
    pub token_budget: usize,
    pub tokens_used: usize,
}

impl ContextPack {
    pub fn empty(token_budget: usize) -> Self {
        Self {
            events: Vec::new(),
            token_budget,
            tokens_used: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
