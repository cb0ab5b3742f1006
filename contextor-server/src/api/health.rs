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

use axum::{extract::State, response::IntoResponse, Json};
use serde::Serialize;
use tracing::debug;

use crate::api::AppState;

/// Health check response structure
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub total_events: usize,
    pub vector_index_size: usize,
    pub policies_loaded: usize,
    pub storage: StorageHealth,
}

#[derive(Debug, Serialize)]
pub struct StorageHealth {
    pub event_segments: Vec<SegmentHealth>,
    pub journal_path: String,
    pub journal_bytes: u64,
    pub journal_commits: usize,
    pub journal_sessions: usize,
}

#[derive(Debug, Serialize)]
pub struct SegmentHealth {
    pub project: String,
    pub path: String,
    pub bytes: u64,
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    debug!("health check requested");
    let report = state.service.health();

    Json(HealthResponse {
        status: if report.healthy {
            "healthy".to_string()
        } else {
            "degraded".to_string()
        },
        version: env!("CARGO_PKG_VERSION").to_string(),
        total_events: report.total_events,
        vector_index_size: report.vector_index_size,
        policies_loaded: report.policies_loaded,
        storage: StorageHealth {
            event_segments: report
                .store
                .segments
                .into_iter()
                .map(|(project, path, bytes)| SegmentHealth {
                    project,
                    path: path.display().to_string(),
                    bytes,
                })
                .collect(),
            journal_path: report.journal.commits_path.display().to_string(),
            journal_bytes: report.journal.commits_bytes,
            journal_commits: report.journal.commits,
            journal_sessions: report.journal.sessions,
        },
    })
}
