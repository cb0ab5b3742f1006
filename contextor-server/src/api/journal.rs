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

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use contextor_storage::{JournalCommit, ObjectId};

use crate::api::{ApiError, AppState};

/// Wire form of a journal commit; `id` is the blake3 content address.
#[derive(Debug, Serialize)]
pub struct CommitView {
    pub id: String,
    pub parent: Option<String>,
    pub seq: u64,
    pub message: String,
    pub payload: Value,
    pub timestamp: DateTime<Utc>,
}

impl CommitView {
    fn from_commit(commit: &JournalCommit) -> Result<Self, ApiError> {
        let bytes = commit
            .serialize_bytes()
            .map_err(|e| ApiError::Internal(e.to_string()))?;
        Ok(Self {
            id: ObjectId::from_content(&bytes).to_hex(),
            parent: commit.parent.map(|p| p.to_hex()),
            seq: commit.seq,
            message: commit.message.clone(),
            payload: commit
                .payload()
                .map_err(|e| ApiError::Internal(e.to_string()))?,
            timestamp: commit.timestamp,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub name: String,
    pub head: Option<String>,
    pub head_seq: u64,
}

/// POST /journal/session - create a session (idempotent)
pub async fn create_session(
    State(state): State<AppState>,
    Json(request): Json<CreateSessionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let session = state.service.create_session(&request.name)?;
    Ok((
        StatusCode::CREATED,
        Json(SessionResponse {
            name: session.name,
            head: session.head.map(|h| h.to_hex()),
            head_seq: session.head_seq,
        }),
    ))
}

#[derive(Debug, Deserialize)]
pub struct CommitRequest {
    pub session: String,
    pub message: String,
    #[serde(default)]
    pub payload: Value,
}

/// POST /journal/commit - append to a session
pub async fn journal_commit(
    State(state): State<AppState>,
    Json(request): Json<CommitRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let commit = state
        .service
        .commit(&request.session, &request.message, &request.payload)?;
    Ok((StatusCode::CREATED, Json(CommitView::from_commit(&commit)?)))
}

#[derive(Debug, Deserialize)]
pub struct LogParams {
    pub session: String,
    #[serde(default = "default_log_limit")]
    pub limit: usize,
}

fn default_log_limit() -> usize {
    20
}

#[derive(Debug, Serialize)]
pub struct LogResponse {
    pub session: String,
    pub commits: Vec<CommitView>,
}

/// GET /journal/log?session=&limit= - newest-first commit history
pub async fn journal_log(
    State(state): State<AppState>,
    Query(params): Query<LogParams>,
) -> Result<impl IntoResponse, ApiError> {
    let commits = state.service.journal_log(&params.session, params.limit)?;
    let commits = commits
        .iter()
        .map(CommitView::from_commit)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Json(LogResponse {
        session: params.session,
        commits,
    }))
}

#[derive(Debug, Deserialize)]
pub struct BranchRequest {
    pub from_session: String,
    pub new_name: String,
}

/// POST /journal/branch - fork a session at its current head
pub async fn branch_session(
    State(state): State<AppState>,
    Json(request): Json<BranchRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let session = state
        .service
        .branch(&request.from_session, &request.new_name)?;
    Ok((
        StatusCode::CREATED,
        Json(SessionResponse {
            name: session.name,
            head: session.head.map(|h| h.to_hex()),
            head_seq: session.head_seq,
        }),
    ))
}
