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

//! Memory Journal
//!
//! Git-style append-only history of agent decisions: content-addressed
//! immutable commits plus named session refs (branches). Sessions are for
//! parallel exploration, not integration - there is no merge.
//!
//! Commits are serialized once, hashed with BLAKE3 for their id, and
//! appended to a commit log on disk; session heads are snapshotted
//! separately. Commit appends are serialized per session so sequence
//! numbers stay monotonic per branch lineage.

pub mod objects;
pub mod sessions;

pub use objects::{JournalCommit, ObjectId};
pub use sessions::{Session, SessionStore};

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, info, warn};

use contextor_core::{ContextorError, Result};

/// Default session name; created on open.
pub const DEFAULT_SESSION: &str = "main";

/// Journal statistics for health reporting.
#[derive(Debug, Clone)]
pub struct JournalStats {
    pub sessions: usize,
    pub commits: usize,
    pub commits_path: PathBuf,
    pub commits_bytes: u64,
}

/// Append-only journal of agent reasoning trails.
pub struct MemoryJournal {
    /// ObjectId -> serialized commit
    objects: DashMap<ObjectId, Vec<u8>>,
    sessions: SessionStore,
    /// Per-session commit lock; appending is serialized per branch, not
    /// across unrelated branches
    commit_locks: DashMap<String, Arc<Mutex<()>>>,
    /// Commit log file, one `oid_hex payload_hex` line per commit
    commits_path: PathBuf,
    commits_file: Mutex<File>,
    sessions_path: PathBuf,
    /// Serializes session snapshots; commits on different sessions hold
    /// disjoint per-session locks, so without this two concurrent snapshots
    /// could race and the later writer persist the earlier state
    snapshot_lock: Mutex<()>,
}

impl MemoryJournal {
    /// Open the journal under `data_dir`, replaying any persisted state.
    /// The default session "main" always exists afterwards.
    pub fn open(data_dir: &Path) -> Result<Self> {
        let journal_dir = data_dir.join("journal");
        fs::create_dir_all(&journal_dir)
            .map_err(|e| ContextorError::Storage(format!("create {:?}: {}", journal_dir, e)))?;

        let commits_path = journal_dir.join("commits.log");
        let sessions_path = journal_dir.join("sessions.bin");

        let objects = DashMap::new();
        if commits_path.exists() {
            let file = File::open(&commits_path)
                .map_err(|e| ContextorError::Storage(format!("open {:?}: {}", commits_path, e)))?;
            for (line_no, line) in BufReader::new(file).lines().enumerate() {
                let line = line.map_err(|e| ContextorError::Storage(e.to_string()))?;
                match parse_commit_line(&line) {
                    Some((oid, bytes)) => {
                        objects.insert(oid, bytes);
                    }
                    None => warn!(
                        path = %commits_path.display(),
                        line = line_no + 1,
                        "skipping corrupt commit log line"
                    ),
                }
            }
        }

        let sessions = if sessions_path.exists() {
            SessionStore::load_from_file(&sessions_path)?
        } else {
            SessionStore::new()
        };
        sessions.create(DEFAULT_SESSION)?;

        let commits_file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&commits_path)
            .map_err(|e| ContextorError::Storage(format!("open {:?}: {}", commits_path, e)))?;

        info!(
            commits = objects.len(),
            sessions = sessions.len(),
            "opened memory journal"
        );

        let journal = Self {
            objects,
            sessions,
            commit_locks: DashMap::new(),
            commits_path,
            commits_file: Mutex::new(commits_file),
            sessions_path,
            snapshot_lock: Mutex::new(()),
        };
        journal.persist_sessions()?;
        Ok(journal)
    }

    /// Create a branch pointer if absent; idempotent when it already exists.
    pub fn create_session(&self, name: &str) -> Result<Session> {
        let session = self.sessions.create(name)?;
        self.persist_sessions()?;
        debug!(session = %name, "session ready");
        Ok(session)
    }

    /// Append a commit whose parent is the session's current head and
    /// advance the head. Fails with a not-found error for sessions that
    /// were never created.
    pub fn commit(&self, session: &str, message: &str, payload: &Value) -> Result<JournalCommit> {
        let lock = self
            .commit_locks
            .entry(session.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = lock.lock();

        let head = self.sessions.get(session)?;
        let commit = JournalCommit::new(
            head.head,
            head.head_seq + 1,
            message.to_string(),
            payload,
        );
        let bytes = commit.serialize_bytes()?;
        let oid = ObjectId::from_content(&bytes);

        {
            let mut file = self.commits_file.lock();
            writeln!(file, "{} {}", oid.to_hex(), hex::encode(&bytes))
                .and_then(|_| file.flush())
                .map_err(|e| {
                    ContextorError::Storage(format!("append {:?}: {}", self.commits_path, e))
                })?;
        }
        self.objects.insert(oid, bytes);
        self.sessions.advance(session, oid, commit.seq)?;
        self.persist_sessions()?;

        debug!(session = %session, seq = commit.seq, oid = %oid, "journal commit");
        Ok(commit)
    }

    /// Commits newest-first, walking the parent chain from the session head.
    pub fn log(&self, session: &str, limit: usize) -> Result<Vec<JournalCommit>> {
        let head = self.sessions.get(session)?;
        let mut commits = Vec::new();
        let mut cursor = head.head;

        while let Some(oid) = cursor {
            if commits.len() >= limit {
                break;
            }
            let bytes = self
                .objects
                .get(&oid)
                .ok_or_else(|| ContextorError::Journal(format!("missing commit object {}", oid)))?;
            let commit = JournalCommit::deserialize_bytes(bytes.as_slice())?;
            cursor = commit.parent;
            commits.push(commit);
        }
        Ok(commits)
    }

    /// Create a new session whose head equals `from_session`'s head at
    /// branch time. Subsequent commits to either session are independent.
    pub fn branch(&self, from_session: &str, new_name: &str) -> Result<Session> {
        let from = self.sessions.get(from_session)?;
        let branched = Session::branched_from(new_name, &from);
        self.sessions.insert_new(branched.clone())?;
        self.persist_sessions()?;
        info!(from = %from_session, new = %new_name, "branched session");
        Ok(branched)
    }

    /// All sessions, sorted by name.
    pub fn sessions(&self) -> Vec<Session> {
        self.sessions.list()
    }

    pub fn stats(&self) -> JournalStats {
        JournalStats {
            sessions: self.sessions.len(),
            commits: self.objects.len(),
            commits_path: self.commits_path.clone(),
            commits_bytes: fs::metadata(&self.commits_path)
                .map(|m| m.len())
                .unwrap_or(0),
        }
    }

    fn persist_sessions(&self) -> Result<()> {
        // Snapshot under one lock so the listed state and the bytes on disk
        // always correspond to the same moment
        let _guard = self.snapshot_lock.lock();
        self.sessions.save_to_file(&self.sessions_path)
    }
}

fn parse_commit_line(line: &str) -> Option<(ObjectId, Vec<u8>)> {
    let (oid_hex, payload_hex) = line.trim().split_once(' ')?;
    let oid = ObjectId::from_hex(oid_hex).ok()?;
    let bytes = hex::decode(payload_hex).ok()?;
    // Reject entries whose content no longer matches their id
    if ObjectId::from_content(&bytes) != oid {
        return None;
    }
    Some((oid, bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn journal() -> (tempfile::TempDir, MemoryJournal) {
        let dir = tempfile::tempdir().unwrap();
        let journal = MemoryJournal::open(dir.path()).unwrap();
        (dir, journal)
    }

    #[test]
    fn test_default_session_exists() {
        let (_dir, journal) = journal();
        journal.commit("main", "first", &json!({"n": 1})).unwrap();
    }

    #[test]
    fn test_create_session_idempotent() {
        let (_dir, journal) = journal();
        journal.create_session("explore").unwrap();
        journal.commit("explore", "c1", &json!({})).unwrap();

        let again = journal.create_session("explore").unwrap();
        assert_eq!(again.head_seq, 1);
    }

    #[test]
    fn test_commit_to_unknown_session() {
        let (_dir, journal) = journal();
        let err = journal.commit("ghost", "c", &json!({})).unwrap_err();
        assert!(matches!(err, ContextorError::NotFound(_)));
    }

    #[test]
    fn test_log_unknown_session() {
        let (_dir, journal) = journal();
        let err = journal.log("ghost", 10).unwrap_err();
        assert!(matches!(err, ContextorError::NotFound(_)));
    }

    #[test]
    fn test_journal_linearity() {
        let (_dir, journal) = journal();

        for i in 1..=5 {
            let commit = journal
                .commit("main", &format!("step {}", i), &json!({"step": i}))
                .unwrap();
            assert_eq!(commit.seq, i);
        }

        let log = journal.log("main", 5).unwrap();
        assert_eq!(log.len(), 5);

        // Strictly decreasing sequence numbers, each parent resolving to the
        // next entry in the log
        for pair in log.windows(2) {
            assert_eq!(pair[0].seq, pair[1].seq + 1);
            let parent_oid = pair[0].parent.unwrap();
            let parent_bytes = pair[1].serialize_bytes().unwrap();
            assert_eq!(parent_oid, ObjectId::from_content(&parent_bytes));
        }
        assert!(log.last().unwrap().parent.is_none());
    }

    #[test]
    fn test_log_respects_limit() {
        let (_dir, journal) = journal();
        for i in 0..10 {
            journal.commit("main", &format!("c{}", i), &json!({})).unwrap();
        }
        let log = journal.log("main", 3).unwrap();
        assert_eq!(log.len(), 3);
        assert_eq!(log[0].seq, 10);
    }

    #[test]
    fn test_branch_isolation() {
        let (_dir, journal) = journal();

        journal.commit("main", "base 1", &json!({})).unwrap();
        journal.commit("main", "base 2", &json!({})).unwrap();

        journal.branch("main", "experiment").unwrap();
        journal
            .commit("experiment", "exploratory", &json!({}))
            .unwrap();

        // Branch sees shared history plus its own commit
        let branch_log = journal.log("experiment", 10).unwrap();
        assert_eq!(branch_log.len(), 3);
        assert_eq!(branch_log[0].message, "exploratory");

        // Committing to the branch never changed the source session
        let main_log = journal.log("main", 10).unwrap();
        assert_eq!(main_log.len(), 2);
        assert_eq!(main_log[0].message, "base 2");

        // And committing to main does not leak into the branch
        journal.commit("main", "base 3", &json!({})).unwrap();
        assert_eq!(journal.log("experiment", 10).unwrap().len(), 3);
    }

    #[test]
    fn test_branch_from_unknown_session() {
        let (_dir, journal) = journal();
        let err = journal.branch("ghost", "new").unwrap_err();
        assert!(matches!(err, ContextorError::NotFound(_)));
    }

    #[test]
    fn test_branch_to_existing_name_rejected() {
        let (_dir, journal) = journal();
        journal.create_session("taken").unwrap();
        let err = journal.branch("main", "taken").unwrap_err();
        assert!(matches!(err, ContextorError::Validation(_)));
    }

    #[test]
    fn test_reopen_preserves_history() {
        let dir = tempfile::tempdir().unwrap();
        {
            let journal = MemoryJournal::open(dir.path()).unwrap();
            journal.commit("main", "persisted", &json!({"k": "v"})).unwrap();
            journal.branch("main", "side").unwrap();
        }

        let reopened = MemoryJournal::open(dir.path()).unwrap();
        let log = reopened.log("main", 10).unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].message, "persisted");
        assert_eq!(log[0].payload().unwrap(), json!({"k": "v"}));

        // Branch head survived and continues independently
        let commit = reopened.commit("side", "after reopen", &json!({})).unwrap();
        assert_eq!(commit.seq, 2);
        assert_eq!(reopened.log("main", 10).unwrap().len(), 1);
    }

    #[test]
    fn test_concurrent_commits_on_distinct_sessions_persist_both_heads() {
        let dir = tempfile::tempdir().unwrap();
        {
            let journal = Arc::new(MemoryJournal::open(dir.path()).unwrap());
            journal.create_session("a").unwrap();
            journal.create_session("b").unwrap();

            let handles: Vec<_> = ["a", "b"]
                .into_iter()
                .map(|session| {
                    let journal = Arc::clone(&journal);
                    std::thread::spawn(move || {
                        for i in 0..50 {
                            journal
                                .commit(session, &format!("c{}", i), &json!({"i": i}))
                                .unwrap();
                        }
                    })
                })
                .collect();
            for handle in handles {
                handle.join().unwrap();
            }
        }

        // Both heads must survive the snapshot races and a reopen
        let reopened = MemoryJournal::open(dir.path()).unwrap();
        assert_eq!(reopened.log("a", 100).unwrap().len(), 50);
        assert_eq!(reopened.log("b", 100).unwrap().len(), 50);
    }

    #[test]
    fn test_stats() {
        let (_dir, journal) = journal();
        journal.commit("main", "c", &json!({})).unwrap();

        let stats = journal.stats();
        assert_eq!(stats.commits, 1);
        assert_eq!(stats.sessions, 1);
        assert!(stats.commits_bytes > 0);
    }
}
