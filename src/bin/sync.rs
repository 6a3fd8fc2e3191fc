//! Batch catalog sync. Run on a schedule; each run is idempotent.
use std::sync::Arc;

use anyhow::Context;
use cinelibre_api::{
    config::Config,
    db::{create_pool, create_redis_client, run_migrations, Cache, PgSimilarityStore},
    services::{
        catalog::{CatalogSource, GoogleBooksSource, TmdbSource},
        CachedEmbedder, EmbeddingService, HttpEmbedder, IngestionPipeline,
    },
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    let pool = create_pool(&config.database_url, 4)
        .await
        .context("Failed to connect to database")?;
    run_migrations(&pool).await?;

    let redis_client = create_redis_client(&config.redis_url)?;
    let (cache, cache_writer) = Cache::new(redis_client);

    let http = HttpEmbedder::new(
        config.embedding_api_url.clone(),
        config.embedding_api_key.clone(),
        config.embedding_model.clone(),
        config.embedding_dimension,
    );
    http.warm_up()
        .await
        .context("Embedding model unavailable, aborting sync")?;
    let embedder: Arc<dyn EmbeddingService> = Arc::new(CachedEmbedder::new(
        Arc::new(http),
        cache,
        config.embedding_cache_ttl_secs,
    ));

    let pipeline = IngestionPipeline::new(
        sources(&config),
        embedder,
        Arc::new(PgSimilarityStore::new(pool)),
        config.sync_settings(),
    );

    for (kind, report) in pipeline.run_all().await {
        if report.is_exhausted() {
            tracing::warn!(kind = %kind, "No candidates fetched");
        }
        tracing::info!(
            kind = %kind,
            fetched = report.fetched,
            skipped = report.skipped,
            succeeded = report.succeeded,
            failed = report.failed,
            "Sync finished"
        );
    }

    cache_writer.shutdown().await;
    Ok(())
}

fn sources(config: &Config) -> Vec<Arc<dyn CatalogSource>> {
    let mut sources: Vec<Arc<dyn CatalogSource>> = Vec::new();

    match &config.tmdb_api_key {
        Some(key) => sources.push(Arc::new(TmdbSource::new(
            key.clone(),
            config.tmdb_api_url.clone(),
            config.tmdb_image_base_url.clone(),
            config.tmdb_region.clone(),
            config.movie_languages.clone(),
        ))),
        None => tracing::warn!("TMDB_API_KEY not set, skipping movie sync"),
    }

    sources.push(Arc::new(GoogleBooksSource::new(
        config.google_books_api_key.clone(),
        config.google_books_api_url.clone(),
        config.book_categories.clone(),
    )));

    sources
}
