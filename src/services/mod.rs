pub mod catalog;
pub mod embedding;
pub mod ingestion;
pub mod recommendations;
pub mod search;

pub use embedding::{CachedEmbedder, EmbeddingService, HttpEmbedder, SharedEmbedder};
pub use ingestion::{IngestionPipeline, SyncSettings};
pub use recommendations::RecommendationEngine;
pub use search::SemanticSearch;
