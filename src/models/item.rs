use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt::Display, str::FromStr};
use uuid::Uuid;

use crate::error::AppError;

/// Kind of catalog item. Each kind lives in its own table with its own natural key.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Movie,
    Book,
}

impl ItemKind {
    pub const ALL: [ItemKind; 2] = [ItemKind::Movie, ItemKind::Book];

    pub fn as_str(&self) -> &'static str {
        match self {
            ItemKind::Movie => "movie",
            ItemKind::Book => "book",
        }
    }

    /// Backing table for this kind
    pub fn table(&self) -> &'static str {
        match self {
            ItemKind::Movie => "movies",
            ItemKind::Book => "books",
        }
    }

    /// Column holding the external catalog id (the upsert conflict key)
    pub fn natural_key_column(&self) -> &'static str {
        match self {
            ItemKind::Movie => "tmdb_id",
            ItemKind::Book => "google_id",
        }
    }
}

impl Display for ItemKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ItemKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "movie" | "movies" => Ok(ItemKind::Movie),
            "book" | "books" => Ok(ItemKind::Book),
            other => Err(AppError::InvalidInput(format!(
                "Unknown item type '{}', expected 'movie' or 'book'",
                other
            ))),
        }
    }
}

/// Presentation fields carried alongside an item. Opaque to the recommendation engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DisplayMetadata {
    /// Poster (movies) or thumbnail (books) URL
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub release_date: Option<String>,
    /// Genres, origin countries or book categories
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub authors: Vec<String>,
}

/// A stored movie or book.
///
/// The embedding is not loaded with the item; fetch it with
/// `SimilarityStore::get_embedding` when needed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Item {
    pub id: Uuid,
    pub kind: ItemKind,
    pub natural_key: String,
    pub title: String,
    pub description: String,
    pub metadata: DisplayMetadata,
    pub created_at: DateTime<Utc>,
}

/// Write model for an upsert keyed on `(kind, natural_key)`.
#[derive(Debug, Clone, PartialEq)]
pub struct NewItem {
    pub kind: ItemKind,
    pub natural_key: String,
    pub title: String,
    pub description: String,
    pub metadata: DisplayMetadata,
    pub embedding: Vec<f32>,
}

/// A nearest-neighbour match returned by a similarity query
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Neighbor {
    pub id: Uuid,
    pub kind: ItemKind,
    pub title: String,
    pub image_url: Option<String>,
    pub similarity: f64,
}
