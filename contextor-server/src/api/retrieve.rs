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
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

use contextor_retrieval::SelectedEvent;

use crate::api::AppState;

#[derive(Debug, Deserialize)]
pub struct RetrieveRequest {
    pub project: String,
    /// Policy name; unknown names fall back to the default policy
    pub task: String,
    #[serde(default)]
    pub inputs: Map<String, Value>,
    /// Defaults to the configured budget when omitted
    pub token_budget: Option<usize>,
}

/// Either `{success: true, events, tokens_used}` or `{success: false,
/// error}`. Retrieval failure is a 200 with `success: false`: the caller's
/// contract is to fall back to recent events, not to treat this as fatal.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum RetrieveResponse {
    Ok {
        success: bool,
        events: Vec<SelectedEvent>,
        tokens_used: usize,
        token_budget: usize,
    },
    Failed {
        success: bool,
        error: String,
    },
}

/// POST /retrieve - assemble a token-budgeted context pack
pub async fn retrieve_context(
    State(state): State<AppState>,
    Json(request): Json<RetrieveRequest>,
) -> impl IntoResponse {
    let budget = request
        .token_budget
        .unwrap_or(state.default_token_budget);

    match state
        .service
        .retrieve(&request.project, &request.task, &request.inputs, budget)
        .await
    {
        Ok(pack) => Json(RetrieveResponse::Ok {
            success: true,
            events: pack.events,
            tokens_used: pack.tokens_used,
            token_budget: pack.token_budget,
        }),
        Err(e) => {
            warn!(
                project = %request.project,
                task = %request.task,
                error = %e,
                "retrieval failed, caller should fall back to recent events"
            );
            Json(RetrieveResponse::Failed {
                success: false,
                error: e.to_string(),
            })
        }
    }
}
