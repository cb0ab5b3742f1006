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

//! Context events
//!
//! An event is an immutable fact about something that happened in the
//! monitored system (a test run, a failure, an agent action). Events carry a
//! SHA-256 checksum over their canonical body, computed once at ingestion and
//! verifiable at any later point.
//!
//! All timestamps are `DateTime<Utc>`: timezone-aware from creation through
//! comparison. Wire inputs without an explicit offset are rejected at
//! deserialization, so naive/aware mixing cannot reach the ranking path.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::error::{ContextorError, Result};
use crate::importance;

/// An immutable, checksummed event record.
///
/// Once stored, an event is never mutated. `importance` is computed once at
/// ingestion and never recomputed, even if scoring rules change later.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContextEvent {
    /// Unique within a project; caller-supplied or generated (UUID v4)
    pub id: String,

    /// Classifying tag, e.g. "test_execution", "test_failure", "agent_action"
    #[serde(rename = "type")]
    pub event_type: String,

    /// Project namespace; all queries are scoped to a project
    pub project: String,

    /// Producer of the event (agent name or subsystem)
    pub source: String,

    /// Timezone-aware instant, set at ingestion if not supplied
    pub timestamp: DateTime<Utc>,

    /// Relevance weight in [0.0, 5.0], fixed at ingestion
    pub importance: f32,

    /// Filter/routing tags; insertion order irrelevant
    #[serde(default)]
    pub tags: Vec<String>,

    /// Opaque payload
    #[serde(default)]
    pub data: Map<String, Value>,

    /// Secondary opaque mapping (execution environment, browser, ...)
    #[serde(default)]
    pub metadata: Map<String, Value>,

    /// SHA-256 hex of the canonical event body (excludes the checksum itself)
    pub checksum: String,
}

/// Caller-supplied shape of an event before ingestion.
///
/// `event_type` and `project` are required; everything else is defaulted at
/// ingestion time.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventDraft {
    #[serde(default)]
    pub id: Option<String>,

    #[serde(rename = "type")]
    pub event_type: String,

    pub project: String,

    #[serde(default)]
    pub source: Option<String>,

    /// RFC 3339 with explicit offset; naive datetimes are rejected by serde
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,

    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(default)]
    pub data: Map<String, Value>,

    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl EventDraft {
    /// Minimal draft for a given type and project.
    pub fn new(event_type: impl Into<String>, project: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            project: project.into(),
            ..Default::default()
        }
    }

    /// Builder-style payload assignment.
    pub fn with_data(mut self, data: Map<String, Value>) -> Self {
        self.data = data;
        self
    }

    /// Builder-style tag assignment.
    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    /// Validate required fields and materialize an immutable event.
    ///
    /// Assigns id (UUID v4) and timestamp (now, UTC) when absent, computes
    /// the importance score and the content checksum.
    pub fn into_event(self) -> Result<ContextEvent> {
        if self.event_type.trim().is_empty() {
            return Err(ContextorError::Validation(
                "event field 'type' is required".to_string(),
            ));
        }
        if self.project.trim().is_empty() {
            return Err(ContextorError::Validation(
                "event field 'project' is required".to_string(),
            ));
        }

        let id = match self.id {
            Some(id) if !id.trim().is_empty() => id,
            _ => uuid::Uuid::new_v4().to_string(),
        };
        let source = self.source.unwrap_or_else(|| "unknown".to_string());
        let timestamp = self.timestamp.unwrap_or_else(Utc::now);

        let mut tags = self.tags;
        tags.sort();
        tags.dedup();

        let importance = importance::score(&self.event_type, &self.data, &tags);
        let checksum = compute_checksum(
            &self.event_type,
            &self.project,
            &source,
            &self.data,
            &self.metadata,
            &tags,
        );

        Ok(ContextEvent {
            id,
            event_type: self.event_type,
            project: self.project,
            source,
            timestamp,
            importance,
            tags,
            data: self.data,
            metadata: self.metadata,
            checksum,
        })
    }
}

impl ContextEvent {
    /// Recompute the checksum from the current body and compare.
    pub fn verify_checksum(&self) -> bool {
        let expected = compute_checksum(
            &self.event_type,
            &self.project,
            &self.source,
            &self.data,
            &self.metadata,
            &self.tags,
        );
        expected == self.checksum
    }

    /// True if any tag matches `tag` exactly.
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    /// Deterministic text used to embed this event into the vector index:
    /// type, stringified data summary, then tags.
    pub fn index_text(&self) -> String {
        let mut parts = Vec::with_capacity(2 + self.tags.len());
        parts.push(self.event_type.clone());
        // serde_json maps are sorted by key, so this summary is stable
        parts.push(Value::Object(self.data.clone()).to_string());
        parts.extend(self.tags.iter().cloned());
        parts.join(" ")
    }

    /// Estimated token cost of carrying this event in a context pack,
    /// proportional to the serialized size of data + metadata.
    pub fn estimated_tokens(&self) -> usize {
        let data_len = Value::Object(self.data.clone()).to_string().len();
        let meta_len = Value::Object(self.metadata.clone()).to_string().len();
        // ~4 bytes of JSON per token, floor of 1 so no event is free
        ((data_len + meta_len) / 4).max(1)
    }
}

/// SHA-256 hex over the canonical serialization of
/// `{type, project, source, data, metadata, tags}`.
///
/// serde_json objects serialize with sorted keys, and tags are sorted before
/// hashing, so the canonical form is stable across re-serialization.
fn compute_checksum(
    event_type: &str,
    project: &str,
    source: &str,
    data: &Map<String, Value>,
    metadata: &Map<String, Value>,
    tags: &[String],
) -> String {
    let mut sorted_tags: Vec<&String> = tags.iter().collect();
    sorted_tags.sort();

    let body = serde_json::json!({
        "type": event_type,
        "project": project,
        "source": source,
        "data": data,
        "metadata": metadata,
        "tags": sorted_tags,
    });

    let mut hasher = Sha256::new();
    hasher.update(body.to_string().as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn data_map(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_draft_requires_type_and_project() {
        let missing_type = EventDraft::new("", "WeSign").into_event();
        assert!(matches!(missing_type, Err(ContextorError::Validation(_))));

        let missing_project = EventDraft::new("test_execution", "  ").into_event();
        assert!(matches!(
            missing_project,
            Err(ContextorError::Validation(_))
        ));
    }

    #[test]
    fn test_ingestion_defaults() {
        let before = Utc::now();
        let event = EventDraft::new("test_execution", "WeSign")
            .into_event()
            .unwrap();

        assert!(!event.id.is_empty());
        assert_eq!(event.source, "unknown");
        assert!(event.timestamp >= before);
        assert!(event.timestamp <= Utc::now());
    }

    #[test]
    fn test_checksum_verifies_and_detects_tampering() {
        let mut event = EventDraft::new("test_failure", "WeSign")
            .with_data(data_map(json!({"status": "error", "suite": "auth"})))
            .into_event()
            .unwrap();
        assert!(event.verify_checksum());

        event.data.insert("suite".to_string(), json!("payments"));
        assert!(!event.verify_checksum());
    }

    #[test]
    fn test_checksum_independent_of_tag_order() {
        let a = EventDraft::new("agent_action", "WeSign")
            .with_tags(vec!["beta".into(), "alpha".into()])
            .into_event()
            .unwrap();
        let b = EventDraft::new("agent_action", "WeSign")
            .with_tags(vec!["alpha".into(), "beta".into()])
            .into_event()
            .unwrap();
        assert_eq!(a.checksum, b.checksum);
    }

    #[test]
    fn test_tags_deduplicated() {
        let event = EventDraft::new("agent_action", "WeSign")
            .with_tags(vec!["auth".into(), "auth".into(), "smoke".into()])
            .into_event()
            .unwrap();
        assert_eq!(event.tags, vec!["auth".to_string(), "smoke".to_string()]);
    }

    #[test]
    fn test_index_text_is_deterministic_and_complete() {
        let event = EventDraft::new("test_failure", "WeSign")
            .with_data(data_map(json!({"status": "error"})))
            .with_tags(vec!["auth".into()])
            .into_event()
            .unwrap();

        let text = event.index_text();
        assert!(text.contains("test_failure"));
        assert!(text.contains("error"));
        assert!(text.contains("auth"));
        assert_eq!(text, event.index_text());
    }

    #[test]
    fn test_estimated_tokens_scales_with_payload() {
        let small = EventDraft::new("test_execution", "WeSign")
            .into_event()
            .unwrap();
        let large = EventDraft::new("test_execution", "WeSign")
            .with_data(data_map(json!({"log": "x".repeat(4000)})))
            .into_event()
            .unwrap();

        assert!(small.estimated_tokens() >= 1);
        assert!(large.estimated_tokens() > small.estimated_tokens() * 100);
    }

    #[test]
    fn test_draft_rejects_naive_timestamp_on_wire() {
        // No offset: chrono's DateTime<Utc> deserializer must refuse it
        let naive = serde_json::from_str::<EventDraft>(
            r#"{"type":"test_execution","project":"WeSign","timestamp":"2026-01-15T10:00:00"}"#,
        );
        assert!(naive.is_err());

        let aware = serde_json::from_str::<EventDraft>(
            r#"{"type":"test_execution","project":"WeSign","timestamp":"2026-01-15T10:00:00Z"}"#,
        );
        assert!(aware.is_ok());
    }

    #[test]
    fn test_event_wire_roundtrip() {
        let event = EventDraft::new("test_failure", "WeSign")
            .with_data(data_map(json!({"status": "error"})))
            .into_event()
            .unwrap();

        let encoded = serde_json::to_string(&event).unwrap();
        assert!(encoded.contains("\"type\":\"test_failure\""));
        let decoded: ContextEvent = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, event);
        assert!(decoded.verify_checksum());
    }
}
