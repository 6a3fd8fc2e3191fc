use serde::{de::DeserializeOwned, Deserialize, Deserializer, Serialize};

pub mod interaction;
pub mod item;
pub mod rating;
pub mod recommendation;

pub use interaction::{Interaction, InteractionKind, TrackInteractionRequest};
pub use item::{DisplayMetadata, Item, ItemKind, NewItem, Neighbor};
pub use rating::{RateItemRequest, Rating};
pub use recommendation::{
    CollaborativeHit, PopularItem, PopularResult, RecommendationMethod, RecommendationResult,
    RecommendedItem,
};

/// An item as fetched from an external catalog, before validation and embedding
#[derive(Debug, Clone, PartialEq)]
pub struct RawCandidate {
    pub kind: ItemKind,
    pub natural_key: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub metadata: DisplayMetadata,
}

impl RawCandidate {
    /// Title and description, trimmed, if both are present and non-empty
    pub fn embeddable_text(&self) -> Option<(&str, &str)> {
        let title = self.title.as_deref().map(str::trim).filter(|t| !t.is_empty())?;
        let description = self
            .description
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())?;
        Some((title, description))
    }
}

// ============================================================================
// Lenient catalog parsing
// ============================================================================

/// Accepts a list of strings, a single string, or null
fn string_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de;
    let value = serde_json::Value::deserialize(deserializer)?;
    match value {
        serde_json::Value::Array(_) => serde_json::from_value(value).map_err(de::Error::custom),
        serde_json::Value::String(s) => Ok(vec![s]),
        serde_json::Value::Null => Ok(Vec::new()),
        _ => Err(de::Error::custom("expected a string or a list of strings")),
    }
}

/// Raw records of a page; null counts as no records
fn record_list<'de, D>(deserializer: D) -> Result<Vec<serde_json::Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<serde_json::Value>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Parses each record on its own so one malformed entry never costs the page
fn parse_records<T: DeserializeOwned>(source: &str, records: Vec<serde_json::Value>) -> Vec<T> {
    records
        .into_iter()
        .filter_map(|record| match serde_json::from_value(record) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                tracing::warn!(source, error = %e, "Skipping malformed catalog record");
                None
            }
        })
        .collect()
}

// ============================================================================
// TMDB API Types
// ============================================================================

/// Page returned by `GET /discover/movie`
#[derive(Debug, Clone, Deserialize)]
pub struct TmdbDiscoverPage {
    pub page: u32,
    #[serde(default)]
    pub total_pages: u32,
    #[serde(default, deserialize_with = "record_list")]
    pub results: Vec<serde_json::Value>,
}

impl TmdbDiscoverPage {
    /// Movies that parsed; malformed records are logged and dropped
    pub fn movies(self) -> Vec<TmdbMovie> {
        parse_records("tmdb", self.results)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TmdbMovie {
    pub id: u64,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub overview: Option<String>,
    #[serde(default)]
    pub release_date: Option<String>,
    #[serde(default)]
    pub poster_path: Option<String>,
    #[serde(default)]
    pub original_language: Option<String>,
    #[serde(default, deserialize_with = "string_list")]
    pub origin_country: Vec<String>,
}

// ============================================================================
// Google Books API Types
// ============================================================================

/// Response from `GET /volumes`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleVolumesPage {
    #[serde(default)]
    pub total_items: u32,
    #[serde(default, deserialize_with = "record_list")]
    pub items: Vec<serde_json::Value>,
}

impl GoogleVolumesPage {
    /// Volumes that parsed; malformed records are logged and dropped
    pub fn volumes(self) -> Vec<GoogleVolume> {
        parse_records("google_books", self.items)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleVolume {
    pub id: String,
    #[serde(default)]
    pub volume_info: GoogleVolumeInfo,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleVolumeInfo {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "string_list")]
    pub authors: Vec<String>,
    #[serde(default, deserialize_with = "string_list")]
    pub categories: Vec<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub published_date: Option<String>,
    #[serde(default)]
    pub image_links: Option<GoogleImageLinks>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GoogleImageLinks {
    #[serde(default)]
    pub thumbnail: Option<String>,
}

impl From<GoogleVolume> for RawCandidate {
    fn from(volume: GoogleVolume) -> Self {
        let info = volume.volume_info;
        RawCandidate {
            kind: ItemKind::Book,
            natural_key: volume.id,
            title: info.title,
            description: info.description,
            metadata: DisplayMetadata {
                image_url: info.image_links.and_then(|links| links.thumbnail),
                language: info.language,
                release_date: info.published_date,
                tags: info.categories,
                authors: info.authors,
            },
        }
    }
}

/// Counts reported for one kind at the end of a sync run
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct SyncReport {
    /// Unique candidates fetched from the catalog
    pub fetched: usize,
    /// Candidates dropped for missing title or description
    pub skipped: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl SyncReport {
    /// True when every source was exhausted without yielding a single candidate
    pub fn is_exhausted(&self) -> bool {
        self.fetched == 0
    }
}
