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

//! Contextor Server
//!
//! Wires the event store, derived indexes, retrieval engine, and memory
//! journal behind an axum HTTP surface.

pub mod api;
pub mod config;
pub mod service;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use contextor_index::{
    EmbeddingProvider, HashedEmbeddingProvider, HttpEmbeddingProvider, KeywordIndex, VectorIndex,
};
use contextor_retrieval::PolicyRegistry;
use contextor_storage::{EventStore, MemoryJournal};

use api::AppState;
use config::ServerConfig;
use service::ContextService;

/// Build the service from configuration: open the durable stores, pick the
/// embedding provider, load policies.
pub fn build_service(config: &ServerConfig) -> Result<ContextService> {
    let data_dir = &config.storage.data_dir;
    let store = Arc::new(EventStore::open(data_dir)?);
    let journal = Arc::new(MemoryJournal::open(data_dir)?);

    let embed_timeout = Duration::from_millis(config.embedding.timeout_ms);
    let provider: Arc<dyn EmbeddingProvider> = match &config.embedding.endpoint {
        Some(endpoint) => {
            tracing::info!(endpoint = %endpoint, "using HTTP embedding provider");
            Arc::new(HttpEmbeddingProvider::new(
                endpoint,
                config.embedding.dimension,
                embed_timeout,
            )?)
        }
        None => {
            tracing::info!(
                dimension = config.embedding.dimension,
                "using local deterministic embedding provider"
            );
            Arc::new(HashedEmbeddingProvider::new(config.embedding.dimension))
        }
    };

    let vector = Arc::new(VectorIndex::new(provider));
    let keyword = Arc::new(KeywordIndex::new());

    let policies = match &config.retrieval.policy_dir {
        Some(dir) => Arc::new(PolicyRegistry::load_dir(dir)?),
        None => Arc::new(PolicyRegistry::builtin()),
    };
    tracing::info!(policies = policies.len(), "retrieval policies loaded");

    Ok(ContextService::new(
        store,
        vector,
        keyword,
        journal,
        policies,
        embed_timeout,
    ))
}

/// Assemble the HTTP router over a built service.
pub fn build_router(service: Arc<ContextService>, config: &ServerConfig) -> Router {
    let state = AppState {
        service,
        default_token_budget: config.retrieval.default_token_budget,
    };

    let mut router = Router::new()
        .route("/health", get(api::health_check))
        .route("/ingest", post(api::ingest_event))
        .route("/retrieve", post(api::retrieve_context))
        .route("/events/recent", get(api::recent_events))
        .route("/journal/session", post(api::create_session))
        .route("/journal/commit", post(api::journal_commit))
        .route("/journal/log", get(api::journal_log))
        .route("/journal/branch", post(api::branch_session))
        .route("/admin/rebuild-indexes", post(api::rebuild_indexes))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    if config.server.enable_cors {
        router = router.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );
    }
    router
}

pub async fn run_server(config: ServerConfig) -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "contextor_server=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Contextor Server");
    config.validate()?;

    tracing::info!(data_dir = %config.storage.data_dir.display(), "opening stores");
    let service = Arc::new(build_service(&config)?);
    let router = build_router(service, &config);

    let listener = tokio::net::TcpListener::bind(&config.server.listen_addr).await?;
    tracing::info!(addr = %config.server.listen_addr, "listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to install ctrl-c handler");
        return;
    }
    tracing::info!("shutdown signal received");
}
