use std::sync::Arc;

use crate::{
    db::SimilarityStore,
    error::{AppError, AppResult},
    models::{ItemKind, Neighbor},
    services::embedding::EmbeddingService,
};

pub const MIN_QUERY_CHARS: usize = 3;
pub const DEFAULT_SEARCH_LIMIT: usize = 12;
pub const DEFAULT_SEARCH_THRESHOLD: f64 = 0.4;

/// Free-text search over item embeddings
#[derive(Clone)]
pub struct SemanticSearch {
    embedder: Arc<dyn EmbeddingService>,
    store: Arc<dyn SimilarityStore>,
}

impl SemanticSearch {
    pub fn new(embedder: Arc<dyn EmbeddingService>, store: Arc<dyn SimilarityStore>) -> Self {
        Self { embedder, store }
    }

    /// Items of `kind` whose embedding is within `threshold` of the query's
    pub async fn search(
        &self,
        query: &str,
        kind: ItemKind,
        limit: usize,
        threshold: f64,
    ) -> AppResult<Vec<Neighbor>> {
        let query = query.trim();
        if query.chars().count() < MIN_QUERY_CHARS {
            return Err(AppError::InvalidInput(format!(
                "Search query must be at least {} characters",
                MIN_QUERY_CHARS
            )));
        }
        if !(0.0..=1.0).contains(&threshold) {
            return Err(AppError::InvalidInput(
                "Threshold must be between 0 and 1".to_string(),
            ));
        }

        let vector = self.embedder.embed(query).await?;
        let results = self.store.nearest(kind, &vector, threshold, limit).await?;

        tracing::info!(query = %query, kind = %kind, results = results.len(), "Semantic search");
        Ok(results)
    }
}
