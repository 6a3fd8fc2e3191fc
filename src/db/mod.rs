pub mod interactions;
pub mod items;
pub mod memory;
pub mod postgres;
pub mod ratings;
pub mod redis;
pub mod store;

pub use interactions::PgInteractionLog;
pub use items::PgSimilarityStore;
pub use memory::InMemoryCatalog;
pub use postgres::{create_pool, run_migrations};
pub use ratings::{PgRatingsRepository, PgSignalAggregator};
pub use redis::{create_redis_client, Cache, CacheKey, CacheWriterHandle};
pub use store::{InteractionLog, RatingsRepository, SignalAggregator, SimilarityStore};

#[cfg(test)]
pub use store::{
    MockInteractionLog, MockRatingsRepository, MockSignalAggregator, MockSimilarityStore,
};
