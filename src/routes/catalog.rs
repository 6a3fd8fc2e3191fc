use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{Item, ItemKind},
    routes::{AppState, MAX_LIMIT},
};

#[derive(Debug, Deserialize)]
pub struct Pagination {
    #[serde(default)]
    pub skip: usize,
    #[serde(default = "default_page_size")]
    pub limit: usize,
}

fn default_page_size() -> usize {
    20
}

#[derive(Debug, Serialize)]
pub struct MovieList {
    pub movies: Vec<Item>,
    pub skip: usize,
    pub limit: usize,
}

pub async fn list_movies(
    State(state): State<Arc<AppState>>,
    Query(page): Query<Pagination>,
) -> AppResult<Json<MovieList>> {
    if i64::try_from(page.skip).is_err() {
        return Err(AppError::InvalidInput(format!("skip is too large: {}", page.skip)));
    }
    let limit = page.limit.min(MAX_LIMIT);
    let movies = state.store.list(ItemKind::Movie, page.skip, limit).await?;

    Ok(Json(MovieList {
        movies,
        skip: page.skip,
        limit,
    }))
}

pub async fn get_movie(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Item>> {
    Ok(Json(state.store.get_item(ItemKind::Movie, id).await?))
}

pub async fn get_book(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Item>> {
    Ok(Json(state.store.get_item(ItemKind::Book, id).await?))
}
