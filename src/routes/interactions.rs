use axum::{extract::State, Json};
use std::sync::Arc;

use crate::{
    error::AppResult,
    middleware::CurrentUser,
    models::{Interaction, TrackInteractionRequest},
    routes::AppState,
};

/// Logs a view, click or search against a catalog item
pub async fn track(
    State(state): State<Arc<AppState>>,
    CurrentUser(user_id): CurrentUser,
    Json(request): Json<TrackInteractionRequest>,
) -> AppResult<Json<Interaction>> {
    state.store.get_item(request.item_type, request.item_id).await?;

    let interaction = state.interactions.record(user_id, &request).await?;
    tracing::debug!(
        user_id,
        item_id = %interaction.item_id,
        interaction_type = %interaction.interaction_type,
        "Interaction tracked"
    );
    Ok(Json(interaction))
}
