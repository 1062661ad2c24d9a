use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use redis::aio::ConnectionManager;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::core::watcher::MarkerStore;

/// Errors that can occur with cache operations
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Redis error: {0}")]
    RedisError(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Cache miss: {0}")]
    CacheMiss(String),
}

/// Multi-tier cache manager
///
/// Implements L1 (in-memory) and L2 (Redis) caching strategy.
/// L1 is fastest but limited in size, L2 is shared across instances.
///
/// Negotiation touched markers bypass L1: another instance may have written
/// a newer marker, so they are always read from Redis.
pub struct CacheManager {
    redis: Arc<tokio::sync::Mutex<ConnectionManager>>,
    l1_cache: moka::future::Cache<String, Vec<u8>>,
    ttl_secs: u64,
    marker_ttl_secs: u64,
}

impl CacheManager {
    /// Create a new cache manager
    pub async fn new(
        redis_url: &str,
        l1_size: u64,
        ttl_secs: u64,
        marker_ttl_secs: u64,
    ) -> Result<Self, CacheError> {
        let client = redis::Client::open(redis_url)?;
        let redis = redis::aio::ConnectionManager::new(client).await?;

        let l1_cache = moka::future::CacheBuilder::new(l1_size)
            .time_to_live(Duration::from_secs(ttl_secs))
            .build();

        Ok(Self {
            redis: Arc::new(tokio::sync::Mutex::new(redis)),
            l1_cache,
            ttl_secs,
            marker_ttl_secs,
        })
    }

    /// Get a value from cache (L1 first, then L2)
    pub async fn get<T>(&self, key: &str) -> Result<T, CacheError>
    where
        T: for<'de> Deserialize<'de>,
    {
        if let Some(bytes) = self.l1_cache.get(key).await {
            tracing::trace!("L1 cache hit: {}", key);
            return Ok(serde_json::from_slice(&bytes)?);
        }

        let mut conn = self.redis.lock().await;
        let value: Option<String> = redis::cmd("GET")
            .arg(key)
            .query_async(&mut *conn)
            .await?;
        drop(conn);

        if let Some(json) = value {
            tracing::trace!("L2 cache hit: {}", key);

            let bytes = json.as_bytes().to_vec();
            self.l1_cache.insert(key.to_string(), bytes).await;

            return Ok(serde_json::from_str(&json)?);
        }

        tracing::trace!("Cache miss: {}", key);
        Err(CacheError::CacheMiss(key.to_string()))
    }

    /// Set a value in cache (both L1 and L2)
    pub async fn set<T>(&self, key: &str, value: &T) -> Result<(), CacheError>
    where
        T: Serialize,
    {
        let json = serde_json::to_string(value)?;

        let bytes = json.as_bytes().to_vec();
        self.l1_cache.insert(key.to_string(), bytes).await;

        let mut conn = self.redis.lock().await;
        let _: () = redis::cmd("SETEX")
            .arg(key)
            .arg(self.ttl_secs)
            .arg(json)
            .query_async(&mut *conn)
            .await?;
        drop(conn);

        tracing::trace!("Cache set: {}", key);
        Ok(())
    }

    /// Connectivity probe for the health endpoint
    pub async fn ping(&self) -> Result<(), CacheError> {
        let mut conn = self.redis.lock().await;
        let _: String = redis::cmd("PING").query_async(&mut *conn).await?;
        Ok(())
    }
}

#[async_trait]
impl MarkerStore for CacheManager {
    async fn touched_at(&self, negotiation_id: i64) -> Result<Option<DateTime<Utc>>, CacheError> {
        let key = CacheKey::negotiation_updated(negotiation_id);
        let mut conn = self.redis.lock().await;
        let millis: Option<i64> = redis::cmd("GET")
            .arg(&key)
            .query_async(&mut *conn)
            .await?;
        drop(conn);

        Ok(millis.and_then(|ms| Utc.timestamp_millis_opt(ms).single()))
    }

    async fn mark_touched(&self, negotiation_id: i64, at: DateTime<Utc>) -> Result<(), CacheError> {
        let key = CacheKey::negotiation_updated(negotiation_id);
        let mut conn = self.redis.lock().await;
        let _: () = redis::cmd("SETEX")
            .arg(&key)
            .arg(self.marker_ttl_secs)
            .arg(at.timestamp_millis())
            .query_async(&mut *conn)
            .await?;
        drop(conn);

        tracing::trace!("Marker set: {}", key);
        Ok(())
    }
}

/// Cache key builder
pub struct CacheKey;

impl CacheKey {
    /// Touched marker for a negotiation thread
    pub fn negotiation_updated(negotiation_id: i64) -> String {
        format!("negotiation_updated:{}", negotiation_id)
    }

    /// Categories a user has rented or favorited
    pub fn preferred_categories(user_id: i64) -> String {
        format!("preferred_categories:{}", user_id)
    }
}
