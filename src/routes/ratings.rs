use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    middleware::CurrentUser,
    models::{ItemKind, RateItemRequest, Rating},
    routes::AppState,
};

#[derive(Debug, Deserialize)]
pub struct RatingsFilter {
    pub item_type: Option<String>,
}

/// Creates or overwrites the caller's rating of an item
pub async fn rate(
    State(state): State<Arc<AppState>>,
    CurrentUser(user_id): CurrentUser,
    Json(request): Json<RateItemRequest>,
) -> AppResult<Json<Rating>> {
    request.validate()?;
    // Ratings may only reference catalog items
    state.store.get_item(request.item_type, request.item_id).await?;

    let rating = state.ratings.rate(user_id, &request).await?;
    tracing::info!(
        user_id,
        item_id = %rating.item_id,
        item_type = %rating.item_type,
        value = rating.value,
        "Rating saved"
    );
    Ok(Json(rating))
}

/// The caller's ratings, newest first, optionally of one kind
pub async fn my_ratings(
    State(state): State<Arc<AppState>>,
    CurrentUser(user_id): CurrentUser,
    Query(filter): Query<RatingsFilter>,
) -> AppResult<Json<Vec<Rating>>> {
    let kind = filter
        .item_type
        .as_deref()
        .map(str::parse::<ItemKind>)
        .transpose()?;

    let ratings = state
        .ratings
        .all_for_user(user_id)
        .await?
        .into_iter()
        .filter(|r| kind.map_or(true, |k| r.item_type == k))
        .collect();

    Ok(Json(ratings))
}

pub async fn remove(
    State(state): State<Arc<AppState>>,
    CurrentUser(user_id): CurrentUser,
    Path((item_type, item_id)): Path<(String, Uuid)>,
) -> AppResult<(StatusCode, Json<Value>)> {
    let kind: ItemKind = item_type.parse()?;

    if !state.ratings.delete(user_id, kind, item_id).await? {
        return Err(AppError::NotFound(format!("No rating for {} {}", kind, item_id)));
    }

    Ok((StatusCode::OK, Json(json!({ "message": "Rating deleted" }))))
}
