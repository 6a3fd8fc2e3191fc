use std::{collections::HashSet, sync::Arc};
use uuid::Uuid;

use crate::{
    db::{RatingsRepository, SignalAggregator, SimilarityStore},
    error::{AppError, AppResult},
    models::{
        ItemKind, Neighbor, PopularItem, PopularResult, Rating, RecommendationMethod,
        RecommendationResult, RecommendedItem,
    },
};

/// Minimum similarity for a content-based match
pub const CONTENT_MATCH_THRESHOLD: f64 = 0.3;
/// Neighbours requested per seed item
pub const CONTENT_MATCH_COUNT: usize = 15;
/// Ratings at or above this value make an item a seed
pub const SEED_MIN_RATING: f32 = 3.5;
pub const MAX_SEEDS: usize = 5;
/// Minimum similarity for `similar_to`
pub const SIMILAR_THRESHOLD: f64 = 0.5;

/// A step of the recommendation cascade
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Collaborative(i64),
    ContentBased(Option<i64>),
    DiverseRecent,
    DiverseFallback,
}

/// What a stage decided
enum StageOutcome {
    /// Usable results, the cascade stops here
    Done(RecommendationResult),
    /// Nothing usable, continue with the given stage
    FallThrough(Stage),
    /// The stage raised, switch to the error fallback
    Failed(AppError),
}

/// Generates recommendations from ratings, collaborative signals and vector similarity.
///
/// Every operation is read-only. `recommend` and `popular` never fail: errors
/// degrade into weaker strategies and, at worst, an empty result tagged `error`.
#[derive(Clone)]
pub struct RecommendationEngine {
    store: Arc<dyn SimilarityStore>,
    ratings: Arc<dyn RatingsRepository>,
    signals: Arc<dyn SignalAggregator>,
}

impl RecommendationEngine {
    pub fn new(
        store: Arc<dyn SimilarityStore>,
        ratings: Arc<dyn RatingsRepository>,
        signals: Arc<dyn SignalAggregator>,
    ) -> Self {
        Self {
            store,
            ratings,
            signals,
        }
    }

    /// Personalized recommendations; `user_id = None` is the anonymous path
    pub async fn recommend(&self, user_id: Option<i64>, limit: usize) -> RecommendationResult {
        let mut stage = match user_id {
            Some(id) => Stage::Collaborative(id),
            None => Stage::ContentBased(None),
        };

        loop {
            let outcome = match stage {
                Stage::Collaborative(id) => self.collaborative(id, limit).await,
                Stage::ContentBased(id) => self.content_based(id, limit).await,
                Stage::DiverseRecent => self.diverse_recent(limit).await,
                Stage::DiverseFallback => self.diverse_fallback(limit).await,
            };

            match outcome {
                StageOutcome::Done(result) => {
                    tracing::info!(
                        user_id = ?user_id,
                        method = %result.method,
                        count = result.recommendations.len(),
                        "Recommendations generated"
                    );
                    return result;
                }
                StageOutcome::FallThrough(next) => {
                    tracing::debug!(from = ?stage, to = ?next, "Recommendation stage fell through");
                    stage = next;
                }
                StageOutcome::Failed(e) => {
                    tracing::error!(stage = ?stage, error = %e, "Recommendation stage failed");
                    return self.error_fallback(limit).await;
                }
            }
        }
    }

    async fn collaborative(&self, user_id: i64, limit: usize) -> StageOutcome {
        let next = Stage::ContentBased(Some(user_id));
        match self.signals.collaborative(user_id, limit).await {
            Ok(hits) if !hits.is_empty() => StageOutcome::Done(RecommendationResult::new(
                RecommendationMethod::CollaborativeFiltering,
                hits.into_iter().map(RecommendedItem::from).collect(),
                limit,
            )),
            Ok(_) => StageOutcome::FallThrough(next),
            Err(e) => {
                tracing::warn!(user_id, error = %e, "Collaborative filtering failed, trying content-based");
                StageOutcome::FallThrough(next)
            }
        }
    }

    async fn content_based(&self, user_id: Option<i64>, limit: usize) -> StageOutcome {
        let seeds = match user_id {
            Some(id) => match self.ratings.top_rated(id, SEED_MIN_RATING, MAX_SEEDS).await {
                Ok(seeds) => seeds,
                Err(e) => return StageOutcome::Failed(e),
            },
            None => Vec::new(),
        };

        if seeds.is_empty() {
            return StageOutcome::FallThrough(Stage::DiverseRecent);
        }

        match self.similar_to_seeds(&seeds, limit).await {
            Ok(matches) if matches.is_empty() => StageOutcome::FallThrough(Stage::DiverseFallback),
            Ok(matches) => StageOutcome::Done(RecommendationResult::new(
                RecommendationMethod::ContentBased,
                matches,
                limit,
            )),
            Err(e) => StageOutcome::Failed(e),
        }
    }

    /// Neighbours of each seed, in seed order, excluding seeds and earlier matches
    async fn similar_to_seeds(&self, seeds: &[Rating], limit: usize) -> AppResult<Vec<RecommendedItem>> {
        let mut seen: HashSet<Uuid> = seeds.iter().map(|s| s.item_id).collect();
        let mut results = Vec::new();

        for seed in seeds {
            if results.len() >= limit {
                break;
            }

            let embedding = match self.store.get_embedding(seed.item_type, seed.item_id).await {
                Ok(embedding) => embedding,
                Err(e) if e.is_not_found() => {
                    tracing::debug!(item_id = %seed.item_id, "Seed item has no embedding, skipping");
                    continue;
                }
                Err(e) => return Err(e),
            };

            let neighbors = self
                .store
                .nearest(
                    seed.item_type,
                    &embedding,
                    CONTENT_MATCH_THRESHOLD,
                    CONTENT_MATCH_COUNT,
                )
                .await?;

            for neighbor in neighbors {
                if results.len() >= limit {
                    break;
                }
                if seen.insert(neighbor.id) {
                    results.push(RecommendedItem::from_neighbor(neighbor, seed.item_id));
                }
            }
        }

        Ok(results)
    }

    /// Newest movies and books, split evenly (movies take the odd slot)
    async fn diverse_recent(&self, limit: usize) -> StageOutcome {
        let books = limit / 2;
        let movies = limit - books;

        let result = async {
            let mut items = self.recent_items(ItemKind::Movie, movies).await?;
            items.extend(self.recent_items(ItemKind::Book, books).await?);
            Ok::<_, AppError>(items)
        }
        .await;

        match result {
            Ok(items) => StageOutcome::Done(RecommendationResult::new(
                RecommendationMethod::DiverseRecent,
                items,
                limit,
            )),
            Err(e) => StageOutcome::Failed(e),
        }
    }

    async fn diverse_fallback(&self, limit: usize) -> StageOutcome {
        match self.recent_items(ItemKind::Movie, limit).await {
            Ok(items) => StageOutcome::Done(RecommendationResult::new(
                RecommendationMethod::DiverseFallback,
                items,
                limit,
            )),
            Err(e) => StageOutcome::Failed(e),
        }
    }

    /// Retries the most-recent-movies query once; empty `error` result if that fails too
    async fn error_fallback(&self, limit: usize) -> RecommendationResult {
        match self.recent_items(ItemKind::Movie, limit).await {
            Ok(items) => RecommendationResult::new(RecommendationMethod::ErrorFallback, items, limit),
            Err(e) => {
                tracing::error!(error = %e, "Error fallback failed");
                RecommendationResult::failed("Unable to generate personalized recommendations")
            }
        }
    }

    async fn recent_items(&self, kind: ItemKind, count: usize) -> AppResult<Vec<RecommendedItem>> {
        let items = self.store.recent(kind, count).await?;
        Ok(items.iter().map(RecommendedItem::from).collect())
    }

    /// Items most similar to `item_id`, never including the item itself.
    ///
    /// Unlike `recommend`, failures propagate: `NotFound` when the item is absent.
    pub async fn similar_to(&self, item_id: Uuid, kind: ItemKind, limit: usize) -> AppResult<Vec<Neighbor>> {
        let embedding = self.store.get_embedding(kind, item_id).await?;

        let neighbors = self
            .store
            .nearest(kind, &embedding, SIMILAR_THRESHOLD, limit + 1)
            .await
            .map_err(|e| {
                tracing::error!(item_id = %item_id, kind = %kind, error = %e, "Similar items lookup failed");
                e
            })?;

        Ok(neighbors
            .into_iter()
            .filter(|n| n.id != item_id)
            .take(limit)
            .collect())
    }

    /// Most-rated items, falling back to the newest movies
    pub async fn popular(&self, limit: usize) -> PopularResult {
        match self.signals.popular(limit).await {
            Ok(mut items) if !items.is_empty() => {
                items.truncate(limit);
                PopularResult {
                    popular_items: items,
                    method: RecommendationMethod::PopularityBased,
                }
            }
            Ok(_) => {
                tracing::info!("Not enough ratings for popularity, returning recent movies");
                self.recent_as_popular(limit, RecommendationMethod::RecentItems).await
            }
            Err(e) => {
                tracing::warn!(error = %e, "Popularity aggregation failed, returning recent movies");
                self.recent_as_popular(limit, RecommendationMethod::Fallback).await
            }
        }
    }

    async fn recent_as_popular(&self, limit: usize, method: RecommendationMethod) -> PopularResult {
        match self.store.recent(ItemKind::Movie, limit).await {
            Ok(items) => PopularResult {
                popular_items: items.iter().map(PopularItem::from).collect(),
                method,
            },
            Err(e) => {
                tracing::error!(error = %e, "Recent movies fallback failed");
                PopularResult {
                    popular_items: Vec::new(),
                    method: RecommendationMethod::Error,
                }
            }
        }
    }
}
