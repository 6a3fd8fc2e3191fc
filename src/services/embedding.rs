//! Text → vector embedding.
//!
//! [`EmbeddingService`] is the seam used by ingestion and semantic search.
//! [`HttpEmbedder`] talks to an OpenAI-compatible `/embeddings` endpoint,
//! [`CachedEmbedder`] memoises results in Redis, and [`SharedEmbedder`] is the
//! process-wide handle that builds the real embedder on first use.

use futures::{future::BoxFuture, Future, FutureExt};
use reqwest::{Client as HttpClient, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::OnceCell;

use crate::{
    cached,
    db::{Cache, CacheKey},
    error::{AppError, AppResult},
};

#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait EmbeddingService: Send + Sync {
    /// Embeds `text`. Identical input yields an identical vector.
    async fn embed(&self, text: &str) -> AppResult<Vec<f32>>;

    /// Length of every vector this service returns
    fn dimension(&self) -> usize;

    /// Model name, used for cache keys and logging
    fn model(&self) -> String;
}

/// Builds embedding input as `"{title}. {description}"`, cut to `max_chars` characters
pub fn embedding_input(title: &str, description: &str, max_chars: usize) -> String {
    let text = format!("{}. {}", title.trim(), description.trim());
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => text[..byte_index].to_string(),
        None => text,
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: [&'a str; 1],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

/// Client for an OpenAI-compatible embeddings API
#[derive(Clone)]
pub struct HttpEmbedder {
    http_client: HttpClient,
    api_url: String,
    api_key: Option<String>,
    model: String,
    dimension: usize,
}

impl HttpEmbedder {
    pub fn new(api_url: String, api_key: Option<String>, model: String, dimension: usize) -> Self {
        Self {
            http_client: HttpClient::new(),
            api_url: api_url.trim_end_matches('/').to_string(),
            api_key,
            model,
            dimension,
        }
    }

    /// Embeds a short test string to confirm the model is reachable and has the expected dimension
    pub async fn warm_up(&self) -> AppResult<()> {
        self.embed("warm up").await?;
        tracing::info!(model = %self.model, dimension = self.dimension, "Embedding model ready");
        Ok(())
    }

    fn check_dimension(&self, vector: Vec<f32>) -> AppResult<Vec<f32>> {
        if vector.len() != self.dimension {
            return Err(AppError::EmbeddingUnavailable(format!(
                "Model {} returned {} dimensions, expected {}",
                self.model,
                vector.len(),
                self.dimension
            )));
        }
        Ok(vector)
    }
}

#[async_trait::async_trait]
impl EmbeddingService for HttpEmbedder {
    async fn embed(&self, text: &str) -> AppResult<Vec<f32>> {
        let url = format!("{}/embeddings", self.api_url);

        let mut request = self.http_client.post(&url).json(&EmbeddingRequest {
            model: &self.model,
            input: [text],
        });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| AppError::EmbeddingUnavailable(e.to_string()))?;

        if response.status() == StatusCode::TOO_MANY_REQUESTS {
            return Err(AppError::RateLimited("embedding API".to_string()));
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::EmbeddingUnavailable(format!(
                "Embedding API returned status {}: {}",
                status, body
            )));
        }

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| AppError::EmbeddingUnavailable(format!("Bad embedding response: {}", e)))?;

        let vector = parsed
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| AppError::EmbeddingUnavailable("Empty embedding response".to_string()))?;

        self.check_dimension(vector)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model(&self) -> String {
        self.model.clone()
    }
}

/// Redis-memoising wrapper; safe because embeddings are deterministic per input
pub struct CachedEmbedder {
    inner: Arc<dyn EmbeddingService>,
    cache: Cache,
    ttl: u64,
}

impl CachedEmbedder {
    pub fn new(inner: Arc<dyn EmbeddingService>, cache: Cache, ttl: u64) -> Self {
        Self { inner, cache, ttl }
    }
}

#[async_trait::async_trait]
impl EmbeddingService for CachedEmbedder {
    async fn embed(&self, text: &str) -> AppResult<Vec<f32>> {
        let model = self.inner.model();
        cached!(
            self.cache,
            CacheKey::embedding(&model, text),
            self.ttl,
            self.inner.embed(text)
        )
    }

    fn dimension(&self) -> usize {
        self.inner.dimension()
    }

    fn model(&self) -> String {
        self.inner.model()
    }
}

type EmbedderFactory =
    Arc<dyn Fn() -> BoxFuture<'static, AppResult<Arc<dyn EmbeddingService>>> + Send + Sync>;

/// Process-wide embedder, constructed on first use and shared read-only afterwards.
///
/// Concurrent first calls wait on a single construction. A failed construction
/// is reported as `SystemUnavailable` to the caller that triggered it and is
/// retried by the next caller.
#[derive(Clone)]
pub struct SharedEmbedder {
    cell: Arc<OnceCell<Arc<dyn EmbeddingService>>>,
    factory: EmbedderFactory,
    dimension: usize,
    model: String,
}

impl SharedEmbedder {
    /// `factory` is awaited on first use, and again after a failed attempt
    pub fn new<F, Fut>(model: String, dimension: usize, factory: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = AppResult<Arc<dyn EmbeddingService>>> + Send + 'static,
    {
        Self {
            cell: Arc::new(OnceCell::new()),
            factory: Arc::new(move || factory().boxed()),
            dimension,
            model,
        }
    }

    /// Wraps an already-built embedder
    pub fn ready(embedder: Arc<dyn EmbeddingService>) -> Self {
        let model = embedder.model();
        let dimension = embedder.dimension();
        let built = embedder.clone();
        let shared = Self::new(model, dimension, move || {
            let built = built.clone();
            async move { Ok::<_, AppError>(built) }
        });
        // A fresh cell is always empty, so this cannot fail
        let _ = shared.cell.set(embedder);
        shared
    }

    pub fn is_ready(&self) -> bool {
        self.cell.initialized()
    }

    /// Returns the embedder, constructing it if this is the first use
    pub async fn get(&self) -> AppResult<Arc<dyn EmbeddingService>> {
        self.cell
            .get_or_try_init(|| async {
                tracing::info!(model = %self.model, "Loading embedding model");
                (self.factory)().await.map_err(|e| {
                    tracing::error!(error = %e, model = %self.model, "Embedding model load failed");
                    AppError::SystemUnavailable(format!("Embedding model not available: {}", e))
                })
            })
            .await
            .cloned()
    }
}

#[async_trait::async_trait]
impl EmbeddingService for SharedEmbedder {
    async fn embed(&self, text: &str) -> AppResult<Vec<f32>> {
        self.get().await?.embed(text).await
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model(&self) -> String {
        self.model.clone()
    }
}
