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

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use tracing::info;

use contextor_core::EventDraft;

use crate::api::{ApiError, AppState};

#[derive(Debug, Serialize)]
pub struct IngestResponse {
    pub success: bool,
    pub event_id: String,
    pub message: String,
    pub indexed: IndexedDetail,
}

/// Which of the three ingest steps succeeded; `stored` is always true in a
/// 201 response since a failed append is an error status instead.
#[derive(Debug, Serialize)]
pub struct IndexedDetail {
    pub stored: bool,
    pub vector: bool,
    pub keyword: bool,
}

/// POST /ingest - durably store an event, best-effort index it
pub async fn ingest_event(
    State(state): State<AppState>,
    Json(draft): Json<EventDraft>,
) -> Result<impl IntoResponse, ApiError> {
    let outcome = state.service.ingest(draft).await?;

    info!(
        event_id = %outcome.event.id,
        project = %outcome.event.project,
        vector = outcome.vector_indexed,
        "ingested event"
    );

    let message = if outcome.vector_indexed {
        "event stored and indexed".to_string()
    } else {
        "event stored; vector indexing unavailable".to_string()
    };

    Ok((
        StatusCode::CREATED,
        Json(IngestResponse {
            success: true,
            event_id: outcome.event.id,
            message,
            indexed: IndexedDetail {
                stored: true,
                vector: outcome.vector_indexed,
                keyword: outcome.keyword_indexed,
            },
        }),
    ))
}

#[derive(Debug, Serialize)]
pub struct RebuildResponse {
    pub success: bool,
    pub events_replayed: usize,
    pub vector_indexed: usize,
}

/// POST /admin/rebuild-indexes - replay the event log into fresh indexes
pub async fn rebuild_indexes(State(state): State<AppState>) -> impl IntoResponse {
    let report = state.service.rebuild_indexes().await;
    Json(RebuildResponse {
        success: true,
        events_replayed: report.events_replayed,
        vector_indexed: report.vector_indexed,
    })
}
