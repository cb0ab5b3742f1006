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

//! Journal Object Types
//!
//! Content-addressable, immutable commit objects. A commit records a single
//! agent decision: a message, an opaque JSON payload, a parent pointer, and
//! a per-branch sequence number.

use blake3::Hasher;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use contextor_core::{ContextorError, Result};

/// Object ID - BLAKE3 hash (32 bytes) of the serialized commit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectId(pub [u8; 32]);

impl ObjectId {
    /// Create from content (content-addressable)
    pub fn from_content(content: &[u8]) -> Self {
        let mut hasher = Hasher::new();
        hasher.update(content);
        Self(hasher.finalize().into())
    }

    /// Display as short hex string (7 bytes, like a git short hash)
    pub fn short(&self) -> String {
        hex::encode(&self.0[..7])
    }

    /// Full hex representation
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from hex string
    pub fn from_hex(hex_str: &str) -> Result<Self> {
        let bytes = hex::decode(hex_str)
            .map_err(|_| ContextorError::Validation(format!("invalid object id: {}", hex_str)))?;
        let arr: [u8; 32] = bytes.try_into().map_err(|_| {
            ContextorError::Validation(format!("object id must be 32 bytes: {}", hex_str))
        })?;
        Ok(Self(arr))
    }
}

impl std::fmt::Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.short())
    }
}

/// Immutable journal commit.
///
/// Commits form a singly-linked history per branch; there is no merge. The
/// payload is stored as serialized JSON so the commit itself has a stable
/// binary form for content addressing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JournalCommit {
    /// Parent commit, None for a branch root
    pub parent: Option<ObjectId>,
    /// Monotonically increasing within a branch lineage, starting at 1
    pub seq: u64,
    /// Human-readable message
    pub message: String,
    /// Opaque JSON payload, serialized
    payload_json: String,
    /// Commit instant, timezone-aware UTC
    pub timestamp: DateTime<Utc>,
}

impl JournalCommit {
    /// Create a commit node; `parent` is None for a branch root.
    pub fn new(parent: Option<ObjectId>, seq: u64, message: String, payload: &Value) -> Self {
        Self {
            parent,
            seq,
            message,
            payload_json: payload.to_string(),
            timestamp: Utc::now(),
        }
    }

    /// Serialize to the stable binary form used for content addressing.
    pub fn serialize_bytes(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).map_err(|e| ContextorError::Serialization(e.to_string()))
    }

    /// Deserialize from storage.
    pub fn deserialize_bytes(data: &[u8]) -> Result<Self> {
        bincode::deserialize(data).map_err(|e| ContextorError::Serialization(e.to_string()))
    }

    /// Decode the opaque payload.
    pub fn payload(&self) -> Result<Value> {
        Ok(serde_json::from_str(&self.payload_json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_object_id_from_content() {
        let a = ObjectId::from_content(b"hello");
        let b = ObjectId::from_content(b"hello");
        let c = ObjectId::from_content(b"world");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_object_id_hex_roundtrip() {
        let oid = ObjectId::from_content(b"test");
        let parsed = ObjectId::from_hex(&oid.to_hex()).unwrap();
        assert_eq!(oid, parsed);
        assert!(oid.to_hex().starts_with(&oid.short()));
    }

    #[test]
    fn test_object_id_rejects_bad_hex() {
        assert!(ObjectId::from_hex("zz").is_err());
        assert!(ObjectId::from_hex("abcd").is_err());
    }

    #[test]
    fn test_commit_roundtrip() {
        let payload = json!({"decision": "retry", "event_ids": ["a", "b"]});
        let commit = JournalCommit::new(None, 1, "record decision".to_string(), &payload);

        let bytes = commit.serialize_bytes().unwrap();
        let decoded = JournalCommit::deserialize_bytes(&bytes).unwrap();
        assert_eq!(decoded, commit);
        assert_eq!(decoded.payload().unwrap(), payload);
        assert!(decoded.parent.is_none());
    }

    #[test]
    fn test_content_addressing_distinguishes_commits() {
        let p = json!({});
        let a = JournalCommit::new(None, 1, "one".to_string(), &p);
        let b = JournalCommit::new(None, 1, "two".to_string(), &p);

        let oid_a = ObjectId::from_content(&a.serialize_bytes().unwrap());
        let oid_b = ObjectId::from_content(&b.serialize_bytes().unwrap());
        assert_ne!(oid_a, oid_b);
    }
}
