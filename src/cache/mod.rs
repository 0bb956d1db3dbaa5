//! Key-value cache contract used by the request handlers.
//!
//! Handlers open a [`CacheConnection`] per request and close it on every exit
//! path. [`MemoryStore`] keeps entries in-process with moka and honours a
//! per-entry TTL, so an expired key reads as absent. [`RedisStore`] shares the
//! entry between processes; [`store_from_config`] picks one.

mod redis_store;

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use moka::future::Cache;
use moka::Expiry;

use crate::config::AppConfig;
use crate::models::ResultEnvelope;

pub use redis_store::RedisStore;

const MEMORY_CAPACITY: u64 = 256;

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("cache connection failed: {0}")]
    Connection(String),
    #[error("cache command failed: {0}")]
    Command(String),
    #[error("cache payload invalid: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn CacheConnection>, CacheError>;
}

#[async_trait]
pub trait CacheConnection: Send {
    async fn get(&mut self, key: &str) -> Result<Option<String>, CacheError>;
    /// Overwrites any previous value and resets its expiry.
    async fn set_ex(&mut self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError>;
    async fn close(self: Box<Self>) -> Result<(), CacheError>;
}

pub async fn put_envelope(
    conn: &mut dyn CacheConnection,
    key: &str,
    envelope: &ResultEnvelope,
    ttl: Duration,
) -> Result<(), CacheError> {
    let payload = serde_json::to_string(envelope)?;
    conn.set_ex(key, payload, ttl).await?;
    tracing::info!(key = %key, total = envelope.total, ttl_secs = ttl.as_secs(), "stored envelope");
    Ok(())
}

pub async fn get_envelope(
    conn: &mut dyn CacheConnection,
    key: &str,
) -> Result<Option<ResultEnvelope>, CacheError> {
    match conn.get(key).await? {
        Some(payload) => Ok(Some(serde_json::from_str(&payload)?)),
        None => {
            tracing::debug!(key = %key, "cache miss");
            Ok(None)
        }
    }
}

/// Closes the connection, logging instead of failing.
pub async fn release(conn: Box<dyn CacheConnection>) {
    if let Err(err) = conn.close().await {
        tracing::warn!(error = %err, "failed to close cache connection");
    }
}

/// Redis when `cache_url` is set, the in-process store otherwise.
pub fn store_from_config(config: &AppConfig) -> Result<Arc<dyn CacheStore>, CacheError> {
    match config.cache_url.as_deref() {
        Some(url) => {
            tracing::info!("using redis cache");
            Ok(Arc::new(RedisStore::open(url)?))
        }
        None => {
            tracing::info!("using in-process cache");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

#[derive(Clone, Debug)]
struct StoredValue {
    payload: String,
    ttl: Duration,
}

struct PerEntryTtl;

impl Expiry<String, StoredValue> for PerEntryTtl {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &StoredValue,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &StoredValue,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

#[derive(Clone)]
pub struct MemoryStore {
    cache: Cache<String, StoredValue>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            cache: Cache::builder()
                .max_capacity(MEMORY_CAPACITY)
                .expire_after(PerEntryTtl)
                .build(),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn connect(&self) -> Result<Box<dyn CacheConnection>, CacheError> {
        Ok(Box::new(MemoryConnection {
            cache: self.cache.clone(),
        }))
    }
}

struct MemoryConnection {
    cache: Cache<String, StoredValue>,
}

#[async_trait]
impl CacheConnection for MemoryConnection {
    async fn get(&mut self, key: &str) -> Result<Option<String>, CacheError> {
        Ok(self.cache.get(key).await.map(|value| value.payload))
    }

    async fn set_ex(&mut self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
        if ttl.is_zero() {
            return Err(CacheError::Command("ttl must be positive".to_string()));
        }
        self.cache
            .insert(key.to_string(), StoredValue { payload: value, ttl })
            .await;
        Ok(())
    }

    async fn close(self: Box<Self>) -> Result<(), CacheError> {
        Ok(())
    }
}
