use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    db::{InteractionLog, RatingsRepository, SimilarityStore},
    middleware::{make_span_with_request_id, request_id_middleware},
    services::{RecommendationEngine, SemanticSearch, SharedEmbedder},
};

pub mod catalog;
pub mod health;
pub mod interactions;
pub mod ratings;
pub mod recommendations;
pub mod search;

/// Upper bound on any `limit` query parameter
pub const MAX_LIMIT: usize = 100;

/// Shared state handed to every handler
pub struct AppState {
    pub engine: RecommendationEngine,
    pub search: SemanticSearch,
    pub store: Arc<dyn SimilarityStore>,
    pub ratings: Arc<dyn RatingsRepository>,
    pub interactions: Arc<dyn InteractionLog>,
    pub embedder: SharedEmbedder,
}

/// Creates the application router with all routes and the tracing,
/// request-id and CORS layers
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .nest("/api/v1", api_routes())
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(middleware::from_fn(request_id_middleware))
                .layer(TraceLayer::new_for_http().make_span_with(make_span_with_request_id))
                .layer(CorsLayer::permissive()),
        )
}

/// API routes under /api/v1
fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/recommendations/personalized",
            get(recommendations::personalized),
        )
        .route(
            "/recommendations/similar/:item_type/:item_id",
            get(recommendations::similar),
        )
        .route("/recommendations/popular", get(recommendations::popular))
        .route("/search/semantic", get(search::semantic))
        .route("/ratings", post(ratings::rate))
        .route("/ratings/my", get(ratings::my_ratings))
        .route("/ratings/:item_type/:item_id", delete(ratings::remove))
        .route("/interactions", post(interactions::track))
        .route("/movies", get(catalog::list_movies))
        .route("/movies/:id", get(catalog::get_movie))
        .route("/books/:id", get(catalog::get_book))
}
