use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::{
    error::AppResult,
    models::{ItemKind, Neighbor},
    routes::{AppState, MAX_LIMIT},
    services::search::{DEFAULT_SEARCH_LIMIT, DEFAULT_SEARCH_THRESHOLD},
};

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    q: String,
    #[serde(rename = "type")]
    item_type: Option<String>,
    limit: Option<usize>,
    threshold: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub results: Vec<Neighbor>,
}

/// Handler for semantic search endpoint
pub async fn semantic(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchQuery>,
) -> AppResult<Json<SearchResponse>> {
    let kind = match params.item_type.as_deref() {
        Some(t) => t.parse()?,
        None => ItemKind::Movie,
    };

    let results = state
        .search
        .search(
            &params.q,
            kind,
            params.limit.unwrap_or(DEFAULT_SEARCH_LIMIT).min(MAX_LIMIT),
            params.threshold.unwrap_or(DEFAULT_SEARCH_THRESHOLD),
        )
        .await?;

    Ok(Json(SearchResponse {
        query: params.q,
        results,
    }))
}
