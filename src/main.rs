use std::sync::Arc;

use anyhow::Context;
use cinelibre_api::{
    config::Config,
    db::{
        create_pool, create_redis_client, run_migrations, Cache, PgInteractionLog,
        PgRatingsRepository, PgSignalAggregator, PgSimilarityStore,
    },
    error::AppError,
    routes::{create_router, AppState},
    services::{
        CachedEmbedder, EmbeddingService, HttpEmbedder,
        RecommendationEngine, SemanticSearch, SharedEmbedder,
    },
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=info,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    let pool = create_pool(&config.database_url, 10)
        .await
        .context("Failed to connect to database")?;
    run_migrations(&pool).await?;

    let redis_client = create_redis_client(&config.redis_url)?;
    let (cache, cache_writer) = Cache::new(redis_client);

    let embedder = shared_embedder(&config, cache);

    let store = Arc::new(PgSimilarityStore::new(pool.clone()));
    let ratings = Arc::new(PgRatingsRepository::new(pool.clone()));
    let signals = Arc::new(PgSignalAggregator::new(pool.clone()));
    let interactions = Arc::new(PgInteractionLog::new(pool));

    let state = Arc::new(AppState {
        engine: RecommendationEngine::new(store.clone(), ratings.clone(), signals),
        search: SemanticSearch::new(Arc::new(embedder.clone()), store.clone()),
        store,
        ratings,
        interactions,
        embedder,
    });

    let app = create_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    cache_writer.shutdown().await;
    tracing::info!("Server stopped");
    Ok(())
}

/// Embedder built on first use: HTTP client, warmed up once, wrapped in the Redis cache
fn shared_embedder(config: &Config, cache: Cache) -> SharedEmbedder {
    let api_url = config.embedding_api_url.clone();
    let api_key = config.embedding_api_key.clone();
    let model = config.embedding_model.clone();
    let dimension = config.embedding_dimension;
    let ttl = config.embedding_cache_ttl_secs;

    SharedEmbedder::new(config.embedding_model.clone(), dimension, move || {
        let http = HttpEmbedder::new(api_url.clone(), api_key.clone(), model.clone(), dimension);
        let cache = cache.clone();
        async move {
            http.warm_up().await?;
            let embedder: Arc<dyn EmbeddingService> =
                Arc::new(CachedEmbedder::new(Arc::new(http), cache, ttl));
            Ok::<_, AppError>(embedder)
        }
    })
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutdown signal received");
}
