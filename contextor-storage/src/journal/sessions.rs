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

//! Journal Sessions (branch refs)
//!
//! Mutable named pointers to immutable commits. A session is the journal's
//! equivalent of a Git branch head.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::path::Path;

use contextor_core::{ContextorError, Result};

use super::objects::ObjectId;

/// A named branch pointer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Session {
    /// Branch name
    pub name: String,
    /// Current head commit, None until the first commit
    pub head: Option<ObjectId>,
    /// Sequence number of the head commit (0 for an empty session)
    pub head_seq: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            name: name.into(),
            head: None,
            head_seq: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Branch off an existing session: copies the head at branch time, after
    /// which the two histories are fully independent.
    pub fn branched_from(name: impl Into<String>, from: &Session) -> Self {
        let now = Utc::now();
        Self {
            name: name.into(),
            head: from.head,
            head_seq: from.head_seq,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Concurrent map of session name -> branch head, with snapshot persistence.
pub struct SessionStore {
    sessions: DashMap<String, Session>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
        }
    }

    /// Insert the session if absent; returns the stored (possibly existing)
    /// session. Idempotent by design.
    pub fn create(&self, name: &str) -> Result<Session> {
        validate_session_name(name)?;
        Ok(self
            .sessions
            .entry(name.to_string())
            .or_insert_with(|| Session::new(name))
            .clone())
    }

    /// Insert a new session; errors if the name is taken.
    pub fn insert_new(&self, session: Session) -> Result<()> {
        validate_session_name(&session.name)?;
        match self.sessions.entry(session.name.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(ContextorError::Validation(
                format!("session '{}' already exists", session.name),
            )),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(session);
                Ok(())
            }
        }
    }

    pub fn get(&self, name: &str) -> Result<Session> {
        self.sessions
            .get(name)
            .map(|s| s.clone())
            .ok_or_else(|| ContextorError::NotFound(format!("session '{}'", name)))
    }

    /// Advance a session's head to a new commit.
    pub fn advance(&self, name: &str, head: ObjectId, head_seq: u64) -> Result<()> {
        let mut session = self
            .sessions
            .get_mut(name)
            .ok_or_else(|| ContextorError::NotFound(format!("session '{}'", name)))?;
        session.head = Some(head);
        session.head_seq = head_seq;
        session.updated_at = Utc::now();
        Ok(())
    }

    pub fn exists(&self, name: &str) -> bool {
        self.sessions.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn list(&self) -> Vec<Session> {
        let mut sessions: Vec<Session> = self.sessions.iter().map(|s| s.clone()).collect();
        sessions.sort_by(|a, b| a.name.cmp(&b.name));
        sessions
    }

    /// Snapshot all sessions to disk.
    ///
    /// Written to a temp file and renamed into place, so a crash mid-write
    /// leaves the previous snapshot intact rather than a truncated file.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let sessions = self.list();
        let data = bincode::serialize(&sessions)
            .map_err(|e| ContextorError::Serialization(e.to_string()))?;
        let tmp = path.with_extension("bin.tmp");
        std::fs::write(&tmp, data)
            .map_err(|e| ContextorError::Storage(format!("write {:?}: {}", tmp, e)))?;
        std::fs::rename(&tmp, path)
            .map_err(|e| ContextorError::Storage(format!("rename {:?}: {}", path, e)))?;
        Ok(())
    }

    /// Load a snapshot written by `save_to_file`.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let data = std::fs::read(path)
            .map_err(|e| ContextorError::Storage(format!("read {:?}: {}", path, e)))?;
        let sessions: Vec<Session> = bincode::deserialize(&data)
            .map_err(|e| ContextorError::Serialization(e.to_string()))?;

        let store = Self::new();
        for session in sessions {
            store.sessions.insert(session.name.clone(), session);
        }
        Ok(store)
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Validate a session name (similar to Git's ref-name rules).
pub fn validate_session_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(ContextorError::Validation(
            "session name cannot be empty".to_string(),
        ));
    }
    if name.starts_with('.') || name.ends_with('.') {
        return Err(ContextorError::Validation(
            "session name cannot start or end with '.'".to_string(),
        ));
    }
    if name.contains("..") || name.contains("//") {
        return Err(ContextorError::Validation(
            "session name cannot contain '..' or '//'".to_string(),
        ));
    }
    let invalid_chars = ['~', '^', ':', '\\', '?', '*', '[', ' ', '\t', '\n'];
    for c in invalid_chars {
        if name.contains(c) {
            return Err(ContextorError::Validation(format!(
                "session name cannot contain '{}'",
                c.escape_default()
            )));
        }
    }
    Ok(())
}
