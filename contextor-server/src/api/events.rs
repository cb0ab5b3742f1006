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
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};

use contextor_core::ContextEvent;

use crate::api::{ApiError, AppState};

#[derive(Debug, Deserialize)]
pub struct RecentEventsParams {
    pub project: String,

    #[serde(default = "default_limit")]
    pub limit: usize,

    #[serde(default)]
    pub offset: usize,

    /// Optional exact tag filter; this is the agent-routing fallback path
    pub tag: Option<String>,
}

fn default_limit() -> usize {
    50
}

#[derive(Debug, Serialize)]
pub struct RecentEventsResponse {
    pub events: Vec<ContextEvent>,
    pub total: usize,
}

/// GET /events/recent?project=&limit=&offset=&tag= - newest-first
pub async fn recent_events(
    State(state): State<AppState>,
    Query(params): Query<RecentEventsParams>,
) -> Result<impl IntoResponse, ApiError> {
    if params.project.trim().is_empty() {
        return Err(ApiError::BadRequest("query parameter 'project' is required".to_string()));
    }

    let (events, total) = state.service.recent_events(
        &params.project,
        params.limit,
        params.offset,
        params.tag.as_deref(),
    );
    Ok(Json(RecentEventsResponse { events, total }))
}
