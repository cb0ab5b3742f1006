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

//! Retrieval policies
//!
//! A policy names which signals to use and how to weight similarity against
//! stored importance. Policies are externally authored, loaded once at
//! startup, and read-only at request time. Builtins cover the platform's
//! standing tasks; a TOML directory can add or override entries.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use contextor_core::{ContextorError, Result};

/// Named retrieval configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskPolicy {
    /// Use the vector similarity signal
    #[serde(default = "default_true")]
    pub use_vector: bool,

    /// Use the keyword signal
    #[serde(default = "default_true")]
    pub use_keyword: bool,

    /// Weight of the (normalized) vector similarity in the final rank
    #[serde(default = "default_weight")]
    pub similarity_weight: f32,

    /// Weight of the stored importance (normalized to [0,1]) in the final rank
    #[serde(default = "default_weight")]
    pub importance_weight: f32,

    /// Candidates fetched per signal before ranking
    #[serde(default = "default_candidate_limit")]
    pub candidate_limit: usize,

    /// Terms the policy always adds to the query-derived term list
    #[serde(default)]
    pub extra_terms: Vec<String>,
}

fn default_true() -> bool {
    true
}

fn default_weight() -> f32 {
    0.5
}

fn default_candidate_limit() -> usize {
    50
}

impl Default for TaskPolicy {
    fn default() -> Self {
        Self {
            use_vector: true,
            use_keyword: true,
            similarity_weight: default_weight(),
            importance_weight: default_weight(),
            candidate_limit: default_candidate_limit(),
            extra_terms: Vec::new(),
        }
    }
}

/// Policy registry: builtins plus optional TOML overrides, keyed by task
/// name.
pub struct PolicyRegistry {
    policies: HashMap<String, TaskPolicy>,
}

pub const DEFAULT_POLICY: &str = "default";

impl PolicyRegistry {
    /// Builtin policies for the platform's standing tasks.
    pub fn builtin() -> Self {
        let mut policies = HashMap::new();
        policies.insert(DEFAULT_POLICY.to_string(), TaskPolicy::default());

        // Failure analysis leans on stored importance (failures score high)
        // and seeds failure vocabulary into the term list.
        policies.insert(
            "failure_analysis".to_string(),
            TaskPolicy {
                similarity_weight: 0.4,
                importance_weight: 0.6,
                extra_terms: vec![
                    "test_failure".to_string(),
                    "error".to_string(),
                    "failed".to_string(),
                ],
                ..TaskPolicy::default()
            },
        );

        // Test intelligence prefers semantic closeness to the query.
        policies.insert(
            "test_intelligence".to_string(),
            TaskPolicy {
                similarity_weight: 0.7,
                importance_weight: 0.3,
                ..TaskPolicy::default()
            },
        );

        // Agent routing is pure tag lookup; no embedding round-trip.
        policies.insert(
            "agent_routing".to_string(),
            TaskPolicy {
                use_vector: false,
                similarity_weight: 0.0,
                importance_weight: 1.0,
                ..TaskPolicy::default()
            },
        );

        Self { policies }
    }

    /// Builtins plus every `*.toml` in `dir` (file stem = policy name).
    /// A file entry replaces a builtin of the same name.
    pub fn load_dir(dir: &Path) -> Result<Self> {
        let mut registry = Self::builtin();
        if !dir.exists() {
            debug!(dir = %dir.display(), "no policy directory, using builtins");
            return Ok(registry);
        }

        for entry in fs::read_dir(dir).map_err(ContextorError::Io)? {
            let entry = entry.map_err(ContextorError::Io)?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("toml") {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };

            let raw = fs::read_to_string(&path).map_err(ContextorError::Io)?;
            match toml::from_str::<TaskPolicy>(&raw) {
                Ok(policy) => {
                    info!(policy = %name, path = %path.display(), "loaded retrieval policy");
                    registry.policies.insert(name.to_string(), policy);
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping malformed policy file");
                }
            }
        }
        Ok(registry)
    }

    /// Look up a policy; unknown task names fall back to the default policy
    /// so a misnamed task degrades instead of failing retrieval outright.
    pub fn resolve(&self, task: &str) -> &TaskPolicy {
        if let Some(policy) = self.policies.get(task) {
            return policy;
        }
        debug!(task = %task, "unknown task policy, using default");
        self.policies
            .get(DEFAULT_POLICY)
            .expect("builtin default policy always present")
    }

    pub fn len(&self) -> usize {
        self.policies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.policies.keys().cloned().collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_policies_present() {
        let registry = PolicyRegistry::builtin();
        assert!(registry.len() >= 4);
        assert!(registry.names().contains(&"failure_analysis".to_string()));
    }

    #[test]
    fn test_resolve_falls_back_to_default() {
        let registry = PolicyRegistry::builtin();
        let policy = registry.resolve("no_such_task");
        assert_eq!(policy.similarity_weight, 0.5);
        assert_eq!(policy.importance_weight, 0.5);
    }

    #[test]
    fn test_agent_routing_is_keyword_only() {
        let registry = PolicyRegistry::builtin();
        let policy = registry.resolve("agent_routing");
        assert!(!policy.use_vector);
        assert!(policy.use_keyword);
    }

    #[test]
    fn test_load_dir_overrides_builtin() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("failure_analysis.toml"),
            "similarity_weight = 0.1\nimportance_weight = 0.9\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("custom_task.toml"),
            "use_vector = false\nextra_terms = [\"flaky\"]\n",
        )
        .unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let registry = PolicyRegistry::load_dir(dir.path()).unwrap();
        assert_eq!(registry.resolve("failure_analysis").importance_weight, 0.9);

        let custom = registry.resolve("custom_task");
        assert!(!custom.use_vector);
        assert_eq!(custom.extra_terms, vec!["flaky".to_string()]);
    }

    #[test]
    fn test_load_dir_missing_is_builtins() {
        let registry =
            PolicyRegistry::load_dir(Path::new("/nonexistent/policies")).unwrap();
        assert_eq!(registry.len(), PolicyRegistry::builtin().len());
    }

    #[test]
    fn test_malformed_policy_file_skipped() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("broken.toml"), "use_vector = \"maybe\"").unwrap();

        let registry = PolicyRegistry::load_dir(dir.path()).unwrap();
        // Falls back to default on resolve
        assert_eq!(registry.resolve("broken").similarity_weight, 0.5);
    }
}
