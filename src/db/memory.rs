use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{
        CollaborativeHit, Interaction, Item, ItemKind, NewItem, Neighbor, PopularItem,
        RateItemRequest, Rating, TrackInteractionRequest,
    },
};

use super::store::{InteractionLog, RatingsRepository, SignalAggregator, SimilarityStore};

const LIKED_THRESHOLD: f32 = 3.5;
const POPULAR_MIN_RATINGS: i64 = 2;

struct StoredItem {
    item: Item,
    embedding: Vec<f32>,
    /// Insertion order, breaks `created_at` ties
    seq: u64,
}

#[derive(Default)]
struct Inner {
    items: HashMap<ItemKind, Vec<StoredItem>>,
    ratings: Vec<Rating>,
    interactions: Vec<Interaction>,
    next_seq: u64,
}

/// In-memory catalog implementing every storage seam.
///
/// Behaves like the Postgres implementation: natural-key upserts, cosine
/// similarity neighbours, and the same collaborative/popularity aggregations.
#[derive(Default)]
pub struct InMemoryCatalog {
    inner: RwLock<Inner>,
}

/// Cosine similarity, 0.0 when either vector has zero length or norm
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let (mut dot, mut norm_a, mut norm_b) = (0.0f64, 0.0f64, 0.0f64);
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (*x as f64, *y as f64);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored items of a kind
    pub async fn count(&self, kind: ItemKind) -> usize {
        let inner = self.inner.read().await;
        inner.items.get(&kind).map(Vec::len).unwrap_or(0)
    }

    /// Interactions recorded for a user, oldest first
    pub async fn interactions_for(&self, user_id: i64) -> Vec<Interaction> {
        let inner = self.inner.read().await;
        inner
            .interactions
            .iter()
            .filter(|i| i.user_id == user_id)
            .cloned()
            .collect()
    }

    pub async fn find_by_natural_key(&self, kind: ItemKind, natural_key: &str) -> Option<Item> {
        let inner = self.inner.read().await;
        inner
            .items
            .get(&kind)?
            .iter()
            .find(|stored| stored.item.natural_key == natural_key)
            .map(|stored| stored.item.clone())
    }

    fn find_item(inner: &Inner, kind: ItemKind, id: Uuid) -> Option<&StoredItem> {
        inner.items.get(&kind)?.iter().find(|stored| stored.item.id == id)
    }

    fn newest_first(inner: &Inner, kind: ItemKind) -> Vec<&StoredItem> {
        let mut stored: Vec<&StoredItem> = inner
            .items
            .get(&kind)
            .map(|items| items.iter().collect())
            .unwrap_or_default();
        stored.sort_by(|a, b| {
            b.item
                .created_at
                .cmp(&a.item.created_at)
                .then(b.seq.cmp(&a.seq))
        });
        stored
    }
}

#[async_trait::async_trait]
impl SimilarityStore for InMemoryCatalog {
    async fn upsert(&self, new_item: NewItem) -> AppResult<Uuid> {
        let mut inner = self.inner.write().await;
        let seq = inner.next_seq;
        inner.next_seq += 1;

        let items = inner.items.entry(new_item.kind).or_default();
        if let Some(existing) = items
            .iter_mut()
            .find(|stored| stored.item.natural_key == new_item.natural_key)
        {
            existing.item.title = new_item.title;
            existing.item.description = new_item.description;
            existing.item.metadata = new_item.metadata;
            existing.embedding = new_item.embedding;
            return Ok(existing.item.id);
        }

        let id = Uuid::new_v4();
        items.push(StoredItem {
            item: Item {
                id,
                kind: new_item.kind,
                natural_key: new_item.natural_key,
                title: new_item.title,
                description: new_item.description,
                metadata: new_item.metadata,
                created_at: Utc::now(),
            },
            embedding: new_item.embedding,
            seq,
        });
        Ok(id)
    }

    async fn nearest(
        &self,
        kind: ItemKind,
        vector: &[f32],
        threshold: f64,
        count: usize,
    ) -> AppResult<Vec<Neighbor>> {
        let inner = self.inner.read().await;
        let mut neighbors: Vec<Neighbor> = inner
            .items
            .get(&kind)
            .map(|items| {
                items
                    .iter()
                    .map(|stored| (stored, cosine_similarity(vector, &stored.embedding)))
                    .filter(|(_, similarity)| *similarity >= threshold)
                    .map(|(stored, similarity)| Neighbor {
                        id: stored.item.id,
                        kind,
                        title: stored.item.title.clone(),
                        image_url: stored.item.metadata.image_url.clone(),
                        similarity,
                    })
                    .collect()
            })
            .unwrap_or_default();

        neighbors.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
        neighbors.truncate(count);
        Ok(neighbors)
    }

    async fn get_embedding(&self, kind: ItemKind, id: Uuid) -> AppResult<Vec<f32>> {
        let inner = self.inner.read().await;
        Self::find_item(&inner, kind, id)
            .map(|stored| stored.embedding.clone())
            .ok_or_else(|| AppError::NotFound(format!("{} {}", kind, id)))
    }

    async fn recent(&self, kind: ItemKind, count: usize) -> AppResult<Vec<Item>> {
        let inner = self.inner.read().await;
        Ok(Self::newest_first(&inner, kind)
            .into_iter()
            .take(count)
            .map(|stored| stored.item.clone())
            .collect())
    }

    async fn get_item(&self, kind: ItemKind, id: Uuid) -> AppResult<Item> {
        let inner = self.inner.read().await;
        Self::find_item(&inner, kind, id)
            .map(|stored| stored.item.clone())
            .ok_or_else(|| AppError::NotFound(format!("{} {}", kind, id)))
    }

    async fn list(&self, kind: ItemKind, skip: usize, limit: usize) -> AppResult<Vec<Item>> {
        let inner = self.inner.read().await;
        Ok(Self::newest_first(&inner, kind)
            .into_iter()
            .skip(skip)
            .take(limit)
            .map(|stored| stored.item.clone())
            .collect())
    }

    async fn ping(&self) -> AppResult<()> {
        Ok(())
    }
}

#[async_trait::async_trait]
impl RatingsRepository for InMemoryCatalog {
    async fn top_rated(&self, user_id: i64, min_value: f32, limit: usize) -> AppResult<Vec<Rating>> {
        let inner = self.inner.read().await;
        let mut ratings: Vec<Rating> = inner
            .ratings
            .iter()
            .filter(|r| r.user_id == user_id && r.value >= min_value)
            .cloned()
            .collect();
        ratings.sort_by(|a, b| b.value.total_cmp(&a.value));
        ratings.truncate(limit);
        Ok(ratings)
    }

    async fn all_for_user(&self, user_id: i64) -> AppResult<Vec<Rating>> {
        let inner = self.inner.read().await;
        // Appended on creation; a re-rate updates in place and keeps its slot
        Ok(inner
            .ratings
            .iter()
            .rev()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn rate(&self, user_id: i64, request: &RateItemRequest) -> AppResult<Rating> {
        request.validate()?;

        let mut inner = self.inner.write().await;
        if let Some(existing) = inner.ratings.iter_mut().find(|r| {
            r.user_id == user_id && r.item_id == request.item_id && r.item_type == request.item_type
        }) {
            existing.value = request.value;
            return Ok(existing.clone());
        }

        let rating = Rating {
            user_id,
            item_id: request.item_id,
            item_type: request.item_type,
            value: request.value,
            created_at: Utc::now(),
        };
        inner.ratings.push(rating.clone());
        Ok(rating)
    }

    async fn delete(&self, user_id: i64, kind: ItemKind, item_id: Uuid) -> AppResult<bool> {
        let mut inner = self.inner.write().await;
        let before = inner.ratings.len();
        inner
            .ratings
            .retain(|r| !(r.user_id == user_id && r.item_type == kind && r.item_id == item_id));
        Ok(inner.ratings.len() < before)
    }
}

#[async_trait::async_trait]
impl SignalAggregator for InMemoryCatalog {
    async fn collaborative(&self, user_id: i64, limit: usize) -> AppResult<Vec<CollaborativeHit>> {
        let inner = self.inner.read().await;

        let key = |r: &Rating| (r.item_type, r.item_id);
        let rated_by_target: Vec<(ItemKind, Uuid)> = inner
            .ratings
            .iter()
            .filter(|r| r.user_id == user_id)
            .map(key)
            .collect();
        let liked_by_target: Vec<(ItemKind, Uuid)> = inner
            .ratings
            .iter()
            .filter(|r| r.user_id == user_id && r.value >= LIKED_THRESHOLD)
            .map(key)
            .collect();

        let mut overlap: HashMap<i64, f64> = HashMap::new();
        for rating in inner.ratings.iter().filter(|r| {
            r.user_id != user_id && r.value >= LIKED_THRESHOLD && liked_by_target.contains(&key(r))
        }) {
            *overlap.entry(rating.user_id).or_default() += 1.0;
        }

        let mut scores: HashMap<(ItemKind, Uuid), f64> = HashMap::new();
        for rating in inner.ratings.iter().filter(|r| {
            r.value >= LIKED_THRESHOLD && !rated_by_target.contains(&key(r))
        }) {
            if let Some(weight) = overlap.get(&rating.user_id) {
                *scores.entry(key(rating)).or_default() += weight * rating.value as f64;
            }
        }

        let mut hits: Vec<CollaborativeHit> = scores
            .into_iter()
            .filter_map(|((kind, id), score)| {
                Self::find_item(&inner, kind, id).map(|stored| CollaborativeHit {
                    item_id: id,
                    item_type: kind,
                    title: stored.item.title.clone(),
                    poster_url: stored.item.metadata.image_url.clone(),
                    score,
                })
            })
            .collect();
        hits.sort_by(|a, b| b.score.total_cmp(&a.score).then(a.title.cmp(&b.title)));
        hits.truncate(limit);
        Ok(hits)
    }

    async fn popular(&self, limit: usize) -> AppResult<Vec<PopularItem>> {
        let inner = self.inner.read().await;

        let mut totals: HashMap<(ItemKind, Uuid), (f64, i64)> = HashMap::new();
        for rating in &inner.ratings {
            let entry = totals.entry((rating.item_type, rating.item_id)).or_default();
            entry.0 += rating.value as f64;
            entry.1 += 1;
        }

        let mut popular: Vec<PopularItem> = totals
            .into_iter()
            .filter(|(_, (_, count))| *count >= POPULAR_MIN_RATINGS)
            .filter_map(|((kind, id), (sum, count))| {
                Self::find_item(&inner, kind, id).map(|stored| PopularItem {
                    item_id: id,
                    item_type: kind,
                    title: stored.item.title.clone(),
                    poster_url: stored.item.metadata.image_url.clone(),
                    avg_rating: Some(sum / count as f64),
                    rating_count: count,
                })
            })
            .collect();
        popular.sort_by(|a, b| {
            b.rating_count
                .cmp(&a.rating_count)
                .then(b.avg_rating.unwrap_or(0.0).total_cmp(&a.avg_rating.unwrap_or(0.0)))
        });
        popular.truncate(limit);
        Ok(popular)
    }
}

#[async_trait::async_trait]
impl InteractionLog for InMemoryCatalog {
    async fn record(&self, user_id: i64, request: &TrackInteractionRequest) -> AppResult<Interaction> {
        let interaction = Interaction {
            user_id,
            item_id: request.item_id,
            item_type: request.item_type,
            interaction_type: request.interaction_type,
            created_at: Utc::now(),
        };
        self.inner.write().await.interactions.push(interaction.clone());
        Ok(interaction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DisplayMetadata, InteractionKind};

    fn new_item(kind: ItemKind, key: &str, title: &str, embedding: Vec<f32>) -> NewItem {
        NewItem {
            kind,
            natural_key: key.to_string(),
            title: title.to_string(),
            description: format!("{} description", title),
            metadata: DisplayMetadata {
                image_url: Some(format!("https://img.test/{}.jpg", key)),
                ..Default::default()
            },
            embedding,
        }
    }

    fn rate(item_id: Uuid, kind: ItemKind, value: f32) -> RateItemRequest {
        RateItemRequest {
            item_id,
            item_type: kind,
            value,
        }
    }

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-9);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-9);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
    }

    #[tokio::test]
    async fn test_upsert_same_natural_key_updates_in_place() {
        let store = InMemoryCatalog::new();
        let first = store
            .upsert(new_item(ItemKind::Movie, "579974", "RRR", vec![1.0, 0.0]))
            .await
            .unwrap();
        let second = store
            .upsert(new_item(ItemKind::Movie, "579974", "RRR (2022)", vec![0.0, 1.0]))
            .await
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(store.count(ItemKind::Movie).await, 1);
        let item = store.get_item(ItemKind::Movie, first).await.unwrap();
        assert_eq!(item.title, "RRR (2022)");
        assert_eq!(
            store.get_embedding(ItemKind::Movie, first).await.unwrap(),
            vec![0.0, 1.0]
        );
    }

    #[tokio::test]
    async fn test_same_natural_key_in_different_kinds_is_distinct() {
        let store = InMemoryCatalog::new();
        store
            .upsert(new_item(ItemKind::Movie, "1", "A", vec![1.0]))
            .await
            .unwrap();
        store
            .upsert(new_item(ItemKind::Book, "1", "B", vec![1.0]))
            .await
            .unwrap();
        assert_eq!(store.count(ItemKind::Movie).await, 1);
        assert_eq!(store.count(ItemKind::Book).await, 1);
    }

    #[tokio::test]
    async fn test_nearest_orders_and_applies_threshold() {
        let store = InMemoryCatalog::new();
        store
            .upsert(new_item(ItemKind::Movie, "a", "Exact", vec![1.0, 0.0]))
            .await
            .unwrap();
        store
            .upsert(new_item(ItemKind::Movie, "b", "Close", vec![0.9, 0.1]))
            .await
            .unwrap();
        store
            .upsert(new_item(ItemKind::Movie, "c", "Orthogonal", vec![0.0, 1.0]))
            .await
            .unwrap();

        let neighbors = store
            .nearest(ItemKind::Movie, &[1.0, 0.0], 0.5, 10)
            .await
            .unwrap();
        let titles: Vec<&str> = neighbors.iter().map(|n| n.title.as_str()).collect();
        assert_eq!(titles, vec!["Exact", "Close"]);

        let limited = store
            .nearest(ItemKind::Movie, &[1.0, 0.0], 0.0, 1)
            .await
            .unwrap();
        assert_eq!(limited.len(), 1);
    }

    #[tokio::test]
    async fn test_recent_is_newest_first() {
        let store = InMemoryCatalog::new();
        for key in ["1", "2", "3"] {
            store
                .upsert(new_item(ItemKind::Book, key, key, vec![1.0]))
                .await
                .unwrap();
        }
        let recent = store.recent(ItemKind::Book, 2).await.unwrap();
        let keys: Vec<&str> = recent.iter().map(|i| i.natural_key.as_str()).collect();
        assert_eq!(keys, vec!["3", "2"]);
    }

    #[tokio::test]
    async fn test_get_embedding_missing_is_not_found() {
        let store = InMemoryCatalog::new();
        let err = store
            .get_embedding(ItemKind::Movie, Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_rating_upsert_overwrites() {
        let store = InMemoryCatalog::new();
        let item = Uuid::new_v4();
        store.rate(7, &rate(item, ItemKind::Movie, 2.0)).await.unwrap();
        store.rate(7, &rate(item, ItemKind::Movie, 4.5)).await.unwrap();

        let all = store.all_for_user(7).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].value, 4.5);
    }

    #[tokio::test]
    async fn test_rerating_keeps_creation_order() {
        let store = InMemoryCatalog::new();
        let (first, second) = (Uuid::new_v4(), Uuid::new_v4());
        store.rate(7, &rate(first, ItemKind::Movie, 3.0)).await.unwrap();
        store.rate(7, &rate(second, ItemKind::Movie, 3.0)).await.unwrap();
        let original = store.all_for_user(7).await.unwrap();

        store.rate(7, &rate(first, ItemKind::Movie, 5.0)).await.unwrap();

        let all = store.all_for_user(7).await.unwrap();
        let ids: Vec<Uuid> = all.iter().map(|r| r.item_id).collect();
        assert_eq!(ids, vec![second, first]);
        assert_eq!(all[1].value, 5.0);
        assert_eq!(all[1].created_at, original[1].created_at);
    }

    #[tokio::test]
    async fn test_rating_upsert_rejects_invalid_value() {
        let store = InMemoryCatalog::new();
        let result = store.rate(7, &rate(Uuid::new_v4(), ItemKind::Movie, 9.0)).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_top_rated_filters_orders_and_caps() {
        let store = InMemoryCatalog::new();
        for value in [3.0, 5.0, 4.0, 3.5] {
            store.rate(1, &rate(Uuid::new_v4(), ItemKind::Movie, value))
                .await
                .unwrap();
        }
        let top = store.top_rated(1, 3.5, 2).await.unwrap();
        let values: Vec<f32> = top.iter().map(|r| r.value).collect();
        assert_eq!(values, vec![5.0, 4.0]);
    }

    #[tokio::test]
    async fn test_delete_rating() {
        let store = InMemoryCatalog::new();
        let item = Uuid::new_v4();
        store.rate(1, &rate(item, ItemKind::Book, 4.0))
            .await
            .unwrap();
        assert!(store.delete(1, ItemKind::Book, item).await.unwrap());
        assert!(!store.delete(1, ItemKind::Book, item).await.unwrap());
    }

    #[tokio::test]
    async fn test_collaborative_recommends_neighbour_favourites() {
        let store = InMemoryCatalog::new();
        let shared = store
            .upsert(new_item(ItemKind::Movie, "s", "Shared", vec![1.0]))
            .await
            .unwrap();
        let other = store
            .upsert(new_item(ItemKind::Movie, "o", "Other", vec![1.0]))
            .await
            .unwrap();

        store.rate(1, &rate(shared, ItemKind::Movie, 5.0))
            .await
            .unwrap();
        store.rate(2, &rate(shared, ItemKind::Movie, 4.5))
            .await
            .unwrap();
        store.rate(2, &rate(other, ItemKind::Movie, 4.0))
            .await
            .unwrap();

        let hits = store.collaborative(1, 10).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].item_id, other);
        assert_eq!(hits[0].title, "Other");
        assert_eq!(hits[0].poster_url.as_deref(), Some("https://img.test/o.jpg"));

        // User 3 has no overlap with anyone
        assert!(store.collaborative(3, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_popular_requires_two_ratings() {
        let store = InMemoryCatalog::new();
        let item = store
            .upsert(new_item(ItemKind::Book, "g", "Gitanjali", vec![1.0]))
            .await
            .unwrap();

        store.rate(1, &rate(item, ItemKind::Book, 5.0))
            .await
            .unwrap();
        assert!(store.popular(10).await.unwrap().is_empty());

        store.rate(2, &rate(item, ItemKind::Book, 4.0))
            .await
            .unwrap();
        let popular = store.popular(10).await.unwrap();
        assert_eq!(popular.len(), 1);
        assert_eq!(popular[0].rating_count, 2);
        assert_eq!(popular[0].avg_rating, Some(4.5));
    }

    #[tokio::test]
    async fn test_interactions_are_appended_per_user() {
        let store = InMemoryCatalog::new();
        let item = Uuid::new_v4();
        for kind in [InteractionKind::View, InteractionKind::View, InteractionKind::Click] {
            store
                .record(
                    4,
                    &TrackInteractionRequest {
                        item_id: item,
                        item_type: ItemKind::Movie,
                        interaction_type: kind,
                    },
                )
                .await
                .unwrap();
        }

        let logged = store.interactions_for(4).await;
        let kinds: Vec<InteractionKind> = logged.iter().map(|i| i.interaction_type).collect();
        assert_eq!(
            kinds,
            vec![InteractionKind::View, InteractionKind::View, InteractionKind::Click]
        );
        assert!(store.interactions_for(5).await.is_empty());
    }
}
