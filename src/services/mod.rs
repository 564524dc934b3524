// Service exports
pub mod cache;
pub mod postgres;
pub mod repository;

pub use cache::{
    CacheError, CacheKey, CacheStats, DurableScoreTier, FastScoreTier, InMemoryScoreStore,
    MokaScoreTier, NoopTier, RedisScoreTier, ScoreCache,
};
pub use postgres::{PostgresClient, PostgresError};
pub use repository::{InMemoryRepository, ProfileRepository, RepositoryError};
