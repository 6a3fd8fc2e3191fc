//! Storage seams used by the recommendation engine and the ingestion pipeline.
//!
//! Postgres implementations live in [`super::items`] and [`super::ratings`];
//! interactions are appended by [`super::interactions`].
//! [`super::memory::InMemoryCatalog`] implements every trait in memory.

use uuid::Uuid;

use crate::{
    error::AppResult,
    models::{
        CollaborativeHit, Interaction, Item, ItemKind, NewItem, Neighbor, PopularItem,
        RateItemRequest, Rating, TrackInteractionRequest,
    },
};

/// Persisted collection of `(id, embedding, metadata)` per item kind
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait SimilarityStore: Send + Sync {
    /// Insert or update keyed on `(kind, natural_key)`. Returns the stable item id.
    async fn upsert(&self, item: NewItem) -> AppResult<Uuid>;

    /// Items with similarity >= `threshold`, most similar first, at most `count`
    async fn nearest(
        &self,
        kind: ItemKind,
        vector: &[f32],
        threshold: f64,
        count: usize,
    ) -> AppResult<Vec<Neighbor>>;

    /// Stored embedding of an item, `NotFound` when the item (or its embedding) is absent
    async fn get_embedding(&self, kind: ItemKind, id: Uuid) -> AppResult<Vec<f32>>;

    /// Most recently added items, newest first
    async fn recent(&self, kind: ItemKind, count: usize) -> AppResult<Vec<Item>>;

    async fn get_item(&self, kind: ItemKind, id: Uuid) -> AppResult<Item>;

    async fn list(&self, kind: ItemKind, skip: usize, limit: usize) -> AppResult<Vec<Item>>;

    /// Cheap connectivity check for health reporting
    async fn ping(&self) -> AppResult<()>;
}

/// User ratings. Written by the rating endpoints, read by the cascade.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait RatingsRepository: Send + Sync {
    /// Ratings with `value >= min_value`, highest first, at most `limit`
    async fn top_rated(&self, user_id: i64, min_value: f32, limit: usize) -> AppResult<Vec<Rating>>;

    /// Every rating of the user, most recently created first. Re-rating keeps the original position.
    async fn all_for_user(&self, user_id: i64) -> AppResult<Vec<Rating>>;

    /// Re-rating the same item overwrites the previous value
    async fn rate(&self, user_id: i64, request: &RateItemRequest) -> AppResult<Rating>;

    /// Returns whether a rating was removed
    async fn delete(&self, user_id: i64, kind: ItemKind, item_id: Uuid) -> AppResult<bool>;
}

/// Aggregations computed over all ratings
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait SignalAggregator: Send + Sync {
    /// Items liked by users whose ratings co-occur with this user's, best first
    async fn collaborative(&self, user_id: i64, limit: usize) -> AppResult<Vec<CollaborativeHit>>;

    /// Most rated items system-wide. Empty when there are not enough ratings.
    async fn popular(&self, limit: usize) -> AppResult<Vec<PopularItem>>;
}

/// Append-only log of views, clicks and searches
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait InteractionLog: Send + Sync {
    async fn record(&self, user_id: i64, request: &TrackInteractionRequest) -> AppResult<Interaction>;
}
