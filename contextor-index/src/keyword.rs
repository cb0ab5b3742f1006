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

//! Keyword Index
//!
//! Inverted index over event tags and text tokens, scoped per project.
//! Cheap boolean-OR lookup with no embedding round-trip; queryable
//! independently of the vector index. Tags are indexed verbatim (lowercased)
//! in addition to their tokens, so exact tag terms like "agent-X" match.

use std::collections::{HashMap, HashSet};

use parking_lot::RwLock;
use tracing::debug;

use crate::embedding::tokenize;

type Postings = HashMap<String, HashSet<String>>;

/// Per-project inverted index: term -> event ids.
pub struct KeywordIndex {
    projects: RwLock<HashMap<String, Postings>>,
}

impl KeywordIndex {
    pub fn new() -> Self {
        Self {
            projects: RwLock::new(HashMap::new()),
        }
    }

    /// Index an event under its tags and text tokens.
    pub fn add(&self, project: &str, event_id: &str, tags: &[String], text: &str) {
        let mut terms: HashSet<String> = tokenize(text).into_iter().collect();
        for tag in tags {
            terms.insert(tag.to_lowercase());
            terms.extend(tokenize(tag));
        }

        let mut projects = self.projects.write();
        let postings = projects.entry(project.to_string()).or_default();
        for term in terms {
            postings
                .entry(term)
                .or_default()
                .insert(event_id.to_string());
        }
        debug!(event_id = %event_id, project = %project, "keyword indexed");
    }

    /// Boolean OR across terms: any term matches.
    pub fn search(&self, project: &str, terms: &[String]) -> HashSet<String> {
        let projects = self.projects.read();
        let Some(postings) = projects.get(project) else {
            return HashSet::new();
        };

        let mut hits = HashSet::new();
        for term in terms {
            let normalized = term.to_lowercase();
            if let Some(ids) = postings.get(&normalized) {
                hits.extend(ids.iter().cloned());
            }
            // A multi-word term matches via its tokens too
            for token in tokenize(&normalized) {
                if token != normalized {
                    if let Some(ids) = postings.get(&token) {
                        hits.extend(ids.iter().cloned());
                    }
                }
            }
        }
        hits
    }

    /// Distinct terms indexed for a project.
    pub fn term_count(&self, project: &str) -> usize {
        self.projects
            .read()
            .get(project)
            .map(|p| p.len())
            .unwrap_or(0)
    }

    /// Drop all postings; used before a rebuild replay.
    pub fn clear(&self) {
        self.projects.write().clear();
    }
}

impl Default for KeywordIndex {
    fn default() -> Self {
        Self::new()
    }
}
