use axum::{extract::State, Json};
use serde::Serialize;
use std::sync::Arc;

use crate::{routes::AppState, services::EmbeddingService};

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub embedding_model: String,
    pub embedding_ready: bool,
    pub database: &'static str,
    pub version: &'static str,
}

/// Reports liveness and dependency state. Kicks off embedding model
/// construction in the background if nothing has needed it yet.
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let embedding_ready = state.embedder.is_ready();
    if !embedding_ready {
        let embedder = state.embedder.clone();
        tokio::spawn(async move {
            if let Err(e) = embedder.get().await {
                tracing::warn!(error = %e, "Background embedding model load failed");
            }
        });
    }

    let database = match state.store.ping().await {
        Ok(()) => "connected",
        Err(e) => {
            tracing::error!(error = %e, "Database health check failed");
            "error"
        }
    };

    Json(HealthResponse {
        status: "online",
        embedding_model: state.embedder.model(),
        embedding_ready,
        database,
        version: env!("CARGO_PKG_VERSION"),
    })
}
