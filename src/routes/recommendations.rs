use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    error::AppResult,
    middleware::{MaybeUser, RequestId},
    models::{ItemKind, Neighbor, PopularResult, RecommendationMethod, RecommendationResult},
    routes::{AppState, MAX_LIMIT},
};

#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<usize>,
}

impl LimitQuery {
    fn or(&self, default: usize) -> usize {
        self.limit.unwrap_or(default).min(MAX_LIMIT)
    }
}

#[derive(Debug, Serialize)]
pub struct SimilarItemsResponse {
    pub item_id: Uuid,
    pub similar_items: Vec<Neighbor>,
    pub method: RecommendationMethod,
}

/// Personalized recommendations for the caller (anonymous callers get diverse recent items)
pub async fn personalized(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<RequestId>,
    MaybeUser(user_id): MaybeUser,
    Query(params): Query<LimitQuery>,
) -> Json<RecommendationResult> {
    let limit = params.or(20);
    tracing::info!(request_id = %request_id, user_id = ?user_id, limit, "Processing recommendation request");

    Json(state.engine.recommend(user_id, limit).await)
}

/// Items similar to a given movie or book
pub async fn similar(
    State(state): State<Arc<AppState>>,
    Path((item_type, item_id)): Path<(String, Uuid)>,
    Query(params): Query<LimitQuery>,
) -> AppResult<Json<SimilarItemsResponse>> {
    let kind: ItemKind = item_type.parse()?;
    let similar_items = state.engine.similar_to(item_id, kind, params.or(12)).await?;

    Ok(Json(SimilarItemsResponse {
        item_id,
        similar_items,
        method: RecommendationMethod::ContentBased,
    }))
}

pub async fn popular(
    State(state): State<Arc<AppState>>,
    Query(params): Query<LimitQuery>,
) -> Json<PopularResult> {
    Json(state.engine.popular(params.or(20)).await)
}
