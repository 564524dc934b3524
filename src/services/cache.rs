use async_trait::async_trait;
use chrono::Utc;
use redis::aio::ConnectionManager;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use thiserror::Error;

use crate::core::scoring::{CompatibilityScorer, ScoringError};
use crate::models::{CompatibilityScore, UserProfile};

/// Errors that can occur with cache operations
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Redis error: {0}")]
    RedisError(#[from] redis::RedisError),

    #[error("Backend error: {0}")]
    BackendError(String),

    #[error("Corrupt cached value for {key}: {value}")]
    CorruptValue { key: String, value: String },
}

/// Volatile, TTL-bound tier keyed by `CacheKey::compatibility`
#[async_trait]
pub trait FastScoreTier: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<u8>, CacheError>;
    async fn set(&self, key: &str, score: u8) -> Result<(), CacheError>;
}

/// Durable tier; any stored row is trusted and never expires
#[async_trait]
pub trait DurableScoreTier: Send + Sync {
    async fn load_score(
        &self,
        requester_id: &str,
        target_id: &str,
    ) -> Result<Option<CompatibilityScore>, CacheError>;

    /// Idempotent upsert keyed by (requester_id, target_id); last write wins
    async fn upsert_score(&self, score: &CompatibilityScore) -> Result<(), CacheError>;
}

/// Cache key builder
pub struct CacheKey;

impl CacheKey {
    /// Directional key: `compatibility(a, b) != compatibility(b, a)`
    pub fn compatibility(requester_id: &str, target_id: &str) -> String {
        format!("compat:{}:{}", requester_id, target_id)
    }
}

/// In-process fast tier backed by moka
pub struct MokaScoreTier {
    cache: moka::future::Cache<String, u8>,
}

impl MokaScoreTier {
    pub fn new(capacity: u64, ttl: Duration) -> Self {
        let cache = moka::future::CacheBuilder::new(capacity)
            .time_to_live(ttl)
            .build();
        Self { cache }
    }

    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }
}

#[async_trait]
impl FastScoreTier for MokaScoreTier {
    async fn get(&self, key: &str) -> Result<Option<u8>, CacheError> {
        Ok(self.cache.get(key).await)
    }

    async fn set(&self, key: &str, score: u8) -> Result<(), CacheError> {
        self.cache.insert(key.to_string(), score).await;
        Ok(())
    }
}

/// Shared fast tier in Redis; entries expire via SETEX
pub struct RedisScoreTier {
    redis: Arc<tokio::sync::Mutex<ConnectionManager>>,
    ttl_secs: u64,
}

impl RedisScoreTier {
    pub async fn new(redis_url: &str, ttl: Duration) -> Result<Self, CacheError> {
        let client = redis::Client::open(redis_url)?;
        let redis = ConnectionManager::new(client).await?;

        Ok(Self {
            redis: Arc::new(tokio::sync::Mutex::new(redis)),
            ttl_secs: ttl.as_secs().max(1),
        })
    }
}

#[async_trait]
impl FastScoreTier for RedisScoreTier {
    async fn get(&self, key: &str) -> Result<Option<u8>, CacheError> {
        let mut conn = self.redis.lock().await;
        let value: Option<String> = redis::cmd("GET").arg(key).query_async(&mut *conn).await?;
        drop(conn);

        match value {
            Some(raw) => raw
                .parse::<u8>()
                .map(Some)
                .map_err(|_| CacheError::CorruptValue { key: key.to_string(), value: raw }),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, score: u8) -> Result<(), CacheError> {
        let mut conn = self.redis.lock().await;
        let _: () = redis::cmd("SETEX")
            .arg(key)
            .arg(self.ttl_secs)
            .arg(u32::from(score))
            .query_async(&mut *conn)
            .await?;
        Ok(())
    }
}

/// Stand-in for a tier that is not provisioned: every read misses, writes are dropped
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTier;

#[async_trait]
impl FastScoreTier for NoopTier {
    async fn get(&self, _key: &str) -> Result<Option<u8>, CacheError> {
        Ok(None)
    }

    async fn set(&self, _key: &str, _score: u8) -> Result<(), CacheError> {
        Ok(())
    }
}

#[async_trait]
impl DurableScoreTier for NoopTier {
    async fn load_score(&self, _: &str, _: &str) -> Result<Option<CompatibilityScore>, CacheError> {
        Ok(None)
    }

    async fn upsert_score(&self, _score: &CompatibilityScore) -> Result<(), CacheError> {
        Ok(())
    }
}

/// In-process durable tier
#[derive(Debug, Default)]
pub struct InMemoryScoreStore {
    rows: RwLock<HashMap<(String, String), CompatibilityScore>>,
}

impl InMemoryScoreStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, requester_id: &str, target_id: &str) -> Option<CompatibilityScore> {
        self.rows
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(requester_id.to_string(), target_id.to_string()))
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.rows.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl DurableScoreTier for InMemoryScoreStore {
    async fn load_score(
        &self,
        requester_id: &str,
        target_id: &str,
    ) -> Result<Option<CompatibilityScore>, CacheError> {
        Ok(self.get(requester_id, target_id))
    }

    async fn upsert_score(&self, score: &CompatibilityScore) -> Result<(), CacheError> {
        self.rows
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                (score.requester_id.clone(), score.target_id.clone()),
                score.clone(),
            );
        Ok(())
    }
}

/// Cache statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub fast_hits: u64,
    pub durable_hits: u64,
    pub computations: u64,
    pub tier_errors: u64,
}

#[derive(Debug, Default)]
struct Counters {
    fast_hits: AtomicU64,
    durable_hits: AtomicU64,
    computations: AtomicU64,
    tier_errors: AtomicU64,
}

/// Read-through two-tier score cache
///
/// Lookup order is fast tier, durable tier, then the scorer. A durable hit
/// back-fills the fast tier; a computed score is written through to both.
/// Tier failures and timeouts are logged and treated as misses, so a lookup
/// only fails when the profiles themselves cannot be scored.
pub struct ScoreCache {
    fast: Arc<dyn FastScoreTier>,
    durable: Arc<dyn DurableScoreTier>,
    scorer: CompatibilityScorer,
    timeout: Duration,
    counters: Counters,
}

impl ScoreCache {
    pub fn new(
        fast: Arc<dyn FastScoreTier>,
        durable: Arc<dyn DurableScoreTier>,
        scorer: CompatibilityScorer,
        timeout: Duration,
    ) -> Self {
        Self {
            fast,
            durable,
            scorer,
            timeout,
            counters: Counters::default(),
        }
    }

    /// Run one tier call under the cache timeout; failures become `None`
    async fn guarded<T>(
        &self,
        tier: &'static str,
        key: &str,
        op: impl Future<Output = Result<T, CacheError>>,
    ) -> Option<T> {
        match tokio::time::timeout(self.timeout, op).await {
            Ok(Ok(value)) => Some(value),
            Ok(Err(e)) => {
                self.counters.tier_errors.fetch_add(1, Ordering::Relaxed);
                tracing::warn!("{} tier failed for {}, treating as miss: {}", tier, key, e);
                None
            }
            Err(_) => {
                self.counters.tier_errors.fetch_add(1, Ordering::Relaxed);
                tracing::warn!("{} tier timed out after {:?} for {}", tier, self.timeout, key);
                None
            }
        }
    }

    pub async fn get_or_compute(
        &self,
        requester: &UserProfile,
        target: &UserProfile,
    ) -> Result<u8, ScoringError> {
        let key = CacheKey::compatibility(&requester.user_id, &target.user_id);

        if let Some(Some(score)) = self.guarded("fast", &key, self.fast.get(&key)).await {
            self.counters.fast_hits.fetch_add(1, Ordering::Relaxed);
            tracing::trace!("Fast tier hit: {}", key);
            return Ok(score);
        }

        if let Some(Some(row)) = self
            .guarded(
                "durable",
                &key,
                self.durable.load_score(&requester.user_id, &target.user_id),
            )
            .await
        {
            self.counters.durable_hits.fetch_add(1, Ordering::Relaxed);
            tracing::trace!("Durable tier hit: {}", key);
            self.guarded("fast", &key, self.fast.set(&key, row.score)).await;
            return Ok(row.score);
        }

        let score = self.scorer.score(requester, target)?;
        self.counters.computations.fetch_add(1, Ordering::Relaxed);
        tracing::trace!("Computed {} = {}", key, score);

        let row = CompatibilityScore {
            requester_id: requester.user_id.clone(),
            target_id: target.user_id.clone(),
            score,
            computed_at: Utc::now(),
        };
        self.guarded("durable", &key, self.durable.upsert_score(&row)).await;
        self.guarded("fast", &key, self.fast.set(&key, score)).await;

        Ok(score)
    }

    pub fn scorer(&self) -> &CompatibilityScorer {
        &self.scorer
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            fast_hits: self.counters.fast_hits.load(Ordering::Relaxed),
            durable_hits: self.counters.durable_hits.load(Ordering::Relaxed),
            computations: self.counters.computations.load(Ordering::Relaxed),
            tier_errors: self.counters.tier_errors.load(Ordering::Relaxed),
        }
    }
}
