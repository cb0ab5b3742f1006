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

//! HTTP API surface: handlers, shared state, and the error-to-status
//! mapping. Validation and not-found map to 4xx; storage and journal
//! failures to 500; indexing and retrieval failures never surface as HTTP
//! errors (they are absorbed into the ingest/retrieve response bodies).

pub mod events;
pub mod health;
pub mod ingest;
pub mod journal;
pub mod retrieve;

use std::sync::Arc;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use contextor_core::ContextorError;

use crate::service::ContextService;

pub use events::recent_events;
pub use health::health_check;
pub use ingest::{ingest_event, rebuild_indexes};
pub use journal::{branch_session, create_session, journal_commit, journal_log};
pub use retrieve::retrieve_context;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<ContextService>,
    pub default_token_budget: usize,
}

/// API error type
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

impl From<ContextorError> for ApiError {
    fn from(err: ContextorError) -> Self {
        match err {
            ContextorError::NotFound(msg) => ApiError::NotFound(msg),
            ContextorError::Validation(msg) => ApiError::BadRequest(msg),
            other => ApiError::Internal(other.to_string()),
        }
    }
}
