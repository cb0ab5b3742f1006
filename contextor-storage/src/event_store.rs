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

//! Event Store
//!
//! Durable, append-only log of context events; the source of truth for the
//! whole service. One JSON-lines segment per project, replayed into memory
//! on open.
//!
//! Appends are serialized per project (not globally), so unrelated projects
//! never contend. Reads only take a short read lock on the in-memory view
//! and never block on index building, which happens outside this store.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};

use contextor_core::{ContextEvent, ContextorError, EventDraft, Result};

/// Store-level statistics for health reporting.
#[derive(Debug, Clone, Default)]
pub struct StoreStats {
    pub total_events: usize,
    pub projects: usize,
    /// (project, segment path, size in bytes)
    pub segments: Vec<(String, PathBuf, u64)>,
}

/// Per-project log: the segment file guarded by an append mutex plus the
/// replayed in-memory view.
struct ProjectLog {
    path: PathBuf,
    /// Append lock; held across duplicate check, write, and view update so
    /// the on-disk order matches the in-memory order.
    file: Mutex<File>,
    view: RwLock<ProjectView>,
}

#[derive(Default)]
struct ProjectView {
    /// Events in append order
    events: Vec<ContextEvent>,
    /// id -> position in `events`
    by_id: HashMap<String, usize>,
}

/// Durable append-only event store.
pub struct EventStore {
    events_dir: PathBuf,
    projects: DashMap<String, Arc<ProjectLog>>,
}

impl EventStore {
    /// Open the store under `data_dir`, replaying existing segments.
    pub fn open(data_dir: &Path) -> Result<Self> {
        let events_dir = data_dir.join("events");
        fs::create_dir_all(&events_dir)
            .map_err(|e| ContextorError::Storage(format!("create {:?}: {}", events_dir, e)))?;

        let store = Self {
            events_dir,
            projects: DashMap::new(),
        };
        store.replay_segments()?;
        Ok(store)
    }

    fn replay_segments(&self) -> Result<()> {
        let entries = fs::read_dir(&self.events_dir)
            .map_err(|e| ContextorError::Storage(format!("read {:?}: {}", self.events_dir, e)))?;

        for entry in entries {
            let entry = entry.map_err(|e| ContextorError::Storage(e.to_string()))?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("jsonl") {
                continue;
            }

            let file = File::open(&path)
                .map_err(|e| ContextorError::Storage(format!("open {:?}: {}", path, e)))?;
            let mut view = ProjectView::default();
            let mut project = None;

            for (line_no, line) in BufReader::new(file).lines().enumerate() {
                let line = line.map_err(|e| ContextorError::Storage(e.to_string()))?;
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<ContextEvent>(&line) {
                    Ok(event) => {
                        if !event.verify_checksum() {
                            warn!(
                                path = %path.display(),
                                line = line_no + 1,
                                event_id = %event.id,
                                "checksum mismatch during replay, keeping event"
                            );
                        }
                        project.get_or_insert_with(|| event.project.clone());
                        view.by_id.insert(event.id.clone(), view.events.len());
                        view.events.push(event);
                    }
                    Err(e) => {
                        warn!(
                            path = %path.display(),
                            line = line_no + 1,
                            error = %e,
                            "skipping corrupt segment line"
                        );
                    }
                }
            }

            let Some(project) = project else {
                continue;
            };

            let file = OpenOptions::new()
                .append(true)
                .open(&path)
                .map_err(|e| ContextorError::Storage(format!("open {:?}: {}", path, e)))?;

            info!(
                project = %project,
                events = view.events.len(),
                path = %path.display(),
                "replayed event segment"
            );
            self.projects.insert(
                project,
                Arc::new(ProjectLog {
                    path,
                    file: Mutex::new(file),
                    view: RwLock::new(view),
                }),
            );
        }
        Ok(())
    }

    fn project_log(&self, project: &str) -> Result<Arc<ProjectLog>> {
        if let Some(log) = self.projects.get(project) {
            return Ok(log.clone());
        }

        let path = self.events_dir.join(format!("{}.jsonl", segment_name(project)));
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| ContextorError::Storage(format!("create {:?}: {}", path, e)))?;

        let log = Arc::new(ProjectLog {
            path,
            file: Mutex::new(file),
            view: RwLock::new(ProjectView::default()),
        });
        Ok(self
            .projects
            .entry(project.to_string())
            .or_insert(log)
            .clone())
    }

    /// Validate, materialize, and durably append an event.
    ///
    /// Assigns id/timestamp when absent and computes importance and checksum
    /// (see `EventDraft::into_event`). A duplicate id within the project is
    /// rejected with a validation error; events are never overwritten.
    pub fn append(&self, draft: EventDraft) -> Result<ContextEvent> {
        let event = draft.into_event()?;
        let log = self.project_log(&event.project)?;

        let mut file = log.file.lock();

        if log.view.read().by_id.contains_key(&event.id) {
            return Err(ContextorError::Validation(format!(
                "duplicate event id '{}' in project '{}'",
                event.id, event.project
            )));
        }

        let line = serde_json::to_string(&event)?;
        writeln!(file, "{}", line)
            .and_then(|_| file.flush())
            .map_err(|e| ContextorError::Storage(format!("append {:?}: {}", log.path, e)))?;

        let mut view = log.view.write();
        let idx = view.events.len();
        view.by_id.insert(event.id.clone(), idx);
        view.events.push(event.clone());
        drop(view);
        drop(file);

        debug!(event_id = %event.id, project = %event.project, "appended event");
        Ok(event)
    }

    /// Fetch a single event by id.
    pub fn get(&self, project: &str, id: &str) -> Result<ContextEvent> {
        let log = self
            .projects
            .get(project)
            .ok_or_else(|| ContextorError::NotFound(format!("project '{}'", project)))?;
        let view = log.view.read();
        view.by_id
            .get(id)
            .map(|&pos| view.events[pos].clone())
            .ok_or_else(|| {
                ContextorError::NotFound(format!("event '{}' in project '{}'", id, project))
            })
    }

    /// Events for a project, newest-first by timestamp. Read-only; never
    /// blocks behind appends to other projects or index building.
    pub fn list_recent(&self, project: &str, limit: usize, offset: usize) -> Vec<ContextEvent> {
        let Some(log) = self.projects.get(project) else {
            return Vec::new();
        };
        let view = log.view.read();
        let mut events: Vec<ContextEvent> = view.events.clone();
        drop(view);

        // Callers may supply their own timestamps, so append order is not
        // necessarily time order.
        events.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        events.into_iter().skip(offset).take(limit).collect()
    }

    /// Number of events stored for a project.
    pub fn count(&self, project: &str) -> usize {
        self.projects
            .get(project)
            .map(|log| log.view.read().events.len())
            .unwrap_or(0)
    }

    /// Events across all projects.
    pub fn total_events(&self) -> usize {
        self.projects
            .iter()
            .map(|log| log.view.read().events.len())
            .sum()
    }

    /// All known project names.
    pub fn projects(&self) -> Vec<String> {
        self.projects.iter().map(|e| e.key().clone()).collect()
    }

    /// Visit every event of a project in append order. Used to rebuild
    /// derived indexes by replay.
    pub fn for_each(&self, project: &str, mut f: impl FnMut(&ContextEvent)) {
        if let Some(log) = self.projects.get(project) {
            for event in log.view.read().events.iter() {
                f(event);
            }
        }
    }

    /// Segment paths and sizes for health reporting.
    pub fn stats(&self) -> StoreStats {
        let mut segments = Vec::new();
        let mut total = 0;
        for entry in self.projects.iter() {
            let log = entry.value();
            total += log.view.read().events.len();
            let size = fs::metadata(&log.path).map(|m| m.len()).unwrap_or(0);
            segments.push((entry.key().clone(), log.path.clone(), size));
        }
        segments.sort_by(|a, b| a.0.cmp(&b.0));
        StoreStats {
            total_events: total,
            projects: segments.len(),
            segments,
        }
    }
}

/// Filesystem-safe segment name for a project.
///
/// Sanitized names carry a short content hash of the original name so
/// distinct projects ("We Sign", "We/Sign") can never share a segment file.
/// Names that are already filesystem-safe map to themselves.
fn segment_name(project: &str) -> String {
    let sanitized: String = project
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '-'
            }
        })
        .collect();
    if sanitized == project {
        sanitized
    } else {
        let hex = blake3::hash(project.as_bytes()).to_hex();
        format!("{}-{}", sanitized, &hex.as_str()[..8])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn data_map(value: serde_json::Value) -> serde_json::Map<String, serde_json::Value> {
        match value {
            serde_json::Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    fn store() -> (tempfile::TempDir, EventStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = EventStore::open(dir.path()).unwrap();
        (dir, store)
    }

    #[test]
    fn test_append_then_get() {
        let (_dir, store) = store();

        let stored = store
            .append(
                EventDraft::new("test_failure", "WeSign")
                    .with_data(data_map(json!({"status": "error"})))
                    .with_tags(vec!["auth".into()]),
            )
            .unwrap();

        let fetched = store.get("WeSign", &stored.id).unwrap();
        assert_eq!(fetched, stored);
        assert!(fetched.verify_checksum());
        assert_eq!(fetched.importance, 3.5);
    }

    #[test]
    fn test_append_validates_required_fields() {
        let (_dir, store) = store();
        let err = store.append(EventDraft::new("", "WeSign")).unwrap_err();
        assert!(matches!(err, ContextorError::Validation(_)));
        assert_eq!(store.count("WeSign"), 0);
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let (_dir, store) = store();

        let mut draft = EventDraft::new("test_execution", "WeSign");
        draft.id = Some("run-1".to_string());
        store.append(draft.clone()).unwrap();

        let err = store.append(draft).unwrap_err();
        assert!(matches!(err, ContextorError::Validation(_)));
        assert_eq!(store.count("WeSign"), 1);
    }

    #[test]
    fn test_same_id_allowed_across_projects() {
        let (_dir, store) = store();

        let mut a = EventDraft::new("test_execution", "WeSign");
        a.id = Some("run-1".to_string());
        let mut b = EventDraft::new("test_execution", "Billing");
        b.id = Some("run-1".to_string());

        store.append(a).unwrap();
        store.append(b).unwrap();
        assert_eq!(store.count("WeSign"), 1);
        assert_eq!(store.count("Billing"), 1);
    }

    #[test]
    fn test_list_recent_newest_first() {
        let (_dir, store) = store();

        for i in 0..5 {
            let mut draft = EventDraft::new("test_execution", "WeSign");
            draft.id = Some(format!("run-{}", i));
            draft.timestamp = Some(
                chrono::DateTime::parse_from_rfc3339(&format!("2026-01-0{}T00:00:00Z", i + 1))
                    .unwrap()
                    .with_timezone(&chrono::Utc),
            );
            store.append(draft).unwrap();
        }

        let recent = store.list_recent("WeSign", 3, 0);
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].id, "run-4");
        assert_eq!(recent[1].id, "run-3");
        assert_eq!(recent[2].id, "run-2");

        let offset = store.list_recent("WeSign", 3, 3);
        assert_eq!(offset.len(), 2);
        assert_eq!(offset[0].id, "run-1");
    }

    #[test]
    fn test_list_recent_unknown_project_is_empty() {
        let (_dir, store) = store();
        assert!(store.list_recent("Nothing", 10, 0).is_empty());
    }

    #[test]
    fn test_replay_after_reopen() {
        let dir = tempfile::tempdir().unwrap();

        {
            let store = EventStore::open(dir.path()).unwrap();
            store
                .append(
                    EventDraft::new("test_failure", "WeSign")
                        .with_data(data_map(json!({"status": "error"}))),
                )
                .unwrap();
            store.append(EventDraft::new("agent_action", "WeSign")).unwrap();
        }

        let reopened = EventStore::open(dir.path()).unwrap();
        assert_eq!(reopened.count("WeSign"), 2);
        assert_eq!(reopened.total_events(), 2);

        // Appends keep working against the replayed segment
        reopened.append(EventDraft::new("code_change", "WeSign")).unwrap();
        assert_eq!(reopened.count("WeSign"), 3);
    }

    #[test]
    fn test_replay_skips_corrupt_lines() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = EventStore::open(dir.path()).unwrap();
            store.append(EventDraft::new("test_execution", "WeSign")).unwrap();
        }

        let segment = dir.path().join("events").join("WeSign.jsonl");
        let mut file = OpenOptions::new().append(true).open(&segment).unwrap();
        writeln!(file, "{{not json").unwrap();

        let reopened = EventStore::open(dir.path()).unwrap();
        assert_eq!(reopened.count("WeSign"), 1);
    }

    #[test]
    fn test_stats_reports_segments() {
        let (_dir, store) = store();
        store.append(EventDraft::new("test_execution", "WeSign")).unwrap();

        let stats = store.stats();
        assert_eq!(stats.total_events, 1);
        assert_eq!(stats.projects, 1);
        assert_eq!(stats.segments[0].0, "WeSign");
        assert!(stats.segments[0].2 > 0);
    }

    #[test]
    fn test_segment_name_sanitized() {
        assert_eq!(segment_name("plain-name_1.0"), "plain-name_1.0");

        // Sanitized names are disambiguated by a hash of the original
        let spaced = segment_name("We Sign");
        let slashed = segment_name("We/Sign");
        assert!(spaced.starts_with("We-Sign-"));
        assert!(slashed.starts_with("We-Sign-"));
        assert_ne!(spaced, slashed);
    }

    #[test]
    fn test_colliding_project_names_get_separate_segments() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = EventStore::open(dir.path()).unwrap();
            store.append(EventDraft::new("test_execution", "We Sign")).unwrap();
            store.append(EventDraft::new("test_execution", "We/Sign")).unwrap();
        }

        let reopened = EventStore::open(dir.path()).unwrap();
        assert_eq!(reopened.count("We Sign"), 1);
        assert_eq!(reopened.count("We/Sign"), 1);
        assert_eq!(reopened.total_events(), 2);
    }
}
