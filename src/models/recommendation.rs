use serde::{Deserialize, Serialize};
use std::fmt::Display;
use uuid::Uuid;

use super::{Item, ItemKind, Neighbor};

/// Which strategy produced a result list
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationMethod {
    CollaborativeFiltering,
    ContentBased,
    DiverseRecent,
    DiverseFallback,
    ErrorFallback,
    PopularityBased,
    RecentItems,
    Fallback,
    Error,
}

impl RecommendationMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecommendationMethod::CollaborativeFiltering => "collaborative_filtering",
            RecommendationMethod::ContentBased => "content_based",
            RecommendationMethod::DiverseRecent => "diverse_recent",
            RecommendationMethod::DiverseFallback => "diverse_fallback",
            RecommendationMethod::ErrorFallback => "error_fallback",
            RecommendationMethod::PopularityBased => "popularity_based",
            RecommendationMethod::RecentItems => "recent_items",
            RecommendationMethod::Fallback => "fallback",
            RecommendationMethod::Error => "error",
        }
    }
}

impl Display for RecommendationMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One recommended item as returned to the caller
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecommendedItem {
    pub item_id: Uuid,
    pub item_type: ItemKind,
    pub title: String,
    pub poster_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub similarity: Option<f64>,
    /// Seed item this match was derived from (content-based only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub based_on: Option<Uuid>,
    /// Collaborative-filtering score
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

impl From<&Item> for RecommendedItem {
    fn from(item: &Item) -> Self {
        Self {
            item_id: item.id,
            item_type: item.kind,
            title: item.title.clone(),
            poster_url: item.metadata.image_url.clone(),
            similarity: None,
            based_on: None,
            score: None,
        }
    }
}

impl RecommendedItem {
    pub fn from_neighbor(neighbor: Neighbor, based_on: Uuid) -> Self {
        Self {
            item_id: neighbor.id,
            item_type: neighbor.kind,
            title: neighbor.title,
            poster_url: neighbor.image_url,
            similarity: Some(neighbor.similarity),
            based_on: Some(based_on),
            score: None,
        }
    }
}

impl From<CollaborativeHit> for RecommendedItem {
    fn from(hit: CollaborativeHit) -> Self {
        Self {
            item_id: hit.item_id,
            item_type: hit.item_type,
            title: hit.title,
            poster_url: hit.poster_url,
            similarity: None,
            based_on: None,
            score: Some(hit.score),
        }
    }
}

/// Ranked recommendations plus the cascade stage that produced them
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecommendationResult {
    pub recommendations: Vec<RecommendedItem>,
    pub method: RecommendationMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl RecommendationResult {
    pub fn new(method: RecommendationMethod, mut recommendations: Vec<RecommendedItem>, limit: usize) -> Self {
        recommendations.truncate(limit);
        Self {
            recommendations,
            method,
            message: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            recommendations: Vec::new(),
            method: RecommendationMethod::Error,
            message: Some(message.into()),
        }
    }
}

/// Row from the collaborative-filtering aggregation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CollaborativeHit {
    pub item_id: Uuid,
    pub item_type: ItemKind,
    pub title: String,
    pub poster_url: Option<String>,
    pub score: f64,
}

/// Row from the popularity aggregation (or a recent item standing in for one)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PopularItem {
    pub item_id: Uuid,
    pub item_type: ItemKind,
    pub title: String,
    pub poster_url: Option<String>,
    pub avg_rating: Option<f64>,
    pub rating_count: i64,
}

impl From<&Item> for PopularItem {
    fn from(item: &Item) -> Self {
        Self {
            item_id: item.id,
            item_type: item.kind,
            title: item.title.clone(),
            poster_url: item.metadata.image_url.clone(),
            avg_rating: None,
            rating_count: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PopularResult {
    pub popular_items: Vec<PopularItem>,
    pub method: RecommendationMethod,
}
