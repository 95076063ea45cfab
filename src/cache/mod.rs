//! Time-based page cache for the dashboard route
//!
//! Keys are route paths only. A cached dashboard is therefore served for
//! the whole TTL even when the date window has moved on in the meantime.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::config::{CacheBackendKind, CacheConfig};

/// A fully rendered response body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "body", rename_all = "lowercase")]
pub enum CachedPage {
    Html(String),
    Text(String),
}

pub struct MemoryCache {
    ttl: Duration,
    entries: RwLock<HashMap<String, (Instant, CachedPage)>>,
}

impl MemoryCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    async fn get(&self, key: &str) -> Option<CachedPage> {
        let entries = self.entries.read().await;
        entries
            .get(key)
            .filter(|(stored_at, _)| stored_at.elapsed() < self.ttl)
            .map(|(_, page)| page.clone())
    }

    async fn put(&self, key: &str, page: &CachedPage) {
        let mut entries = self.entries.write().await;
        entries.retain(|_, (stored_at, _)| stored_at.elapsed() < self.ttl);
        entries.insert(key.to_string(), (Instant::now(), page.clone()));
    }
}

pub struct RedisCache {
    ttl: Duration,
    manager: ConnectionManager,
    prefix: String,
}

impl RedisCache {
    pub async fn connect(url: &str, ttl: Duration) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(url)?;
        let manager = ConnectionManager::new(client).await?;
        Ok(Self {
            ttl,
            manager,
            prefix: "earnings-radar:page:".to_string(),
        })
    }

    async fn get(&self, key: &str) -> Result<Option<CachedPage>, redis::RedisError> {
        let mut conn = self.manager.clone();
        let raw: Option<String> = conn.get(format!("{}{}", self.prefix, key)).await?;
        Ok(raw.and_then(|json| match serde_json::from_str(&json) {
            Ok(page) => Some(page),
            Err(e) => {
                warn!(key = %key, error = %e, "Discarding undecodable cached page");
                None
            }
        }))
    }

    async fn put(&self, key: &str, page: &CachedPage) -> Result<(), redis::RedisError> {
        let json = serde_json::to_string(page).map_err(|e| {
            redis::RedisError::from((
                redis::ErrorKind::TypeError,
                "page serialization failed",
                e.to_string(),
            ))
        })?;
        let mut conn = self.manager.clone();
        let _: () = conn
            .set_ex(format!("{}{}", self.prefix, key), json, self.ttl.as_secs().max(1))
            .await?;
        Ok(())
    }
}

pub enum PageCache {
    Memory(MemoryCache),
    Redis(RedisCache),
    Disabled,
}

impl PageCache {
    pub fn memory(ttl: Duration) -> Self {
        if ttl.is_zero() {
            PageCache::Disabled
        } else {
            PageCache::Memory(MemoryCache::new(ttl))
        }
    }

    /// Build the configured backend. An unreachable Redis falls back to the
    /// in-process cache.
    pub async fn from_config(config: &CacheConfig) -> Self {
        if config.ttl.is_zero() {
            return PageCache::Disabled;
        }
        match config.backend {
            CacheBackendKind::Disabled => PageCache::Disabled,
            CacheBackendKind::Memory => PageCache::memory(config.ttl),
            CacheBackendKind::Redis => match RedisCache::connect(&config.redis_url, config.ttl).await {
                Ok(cache) => {
                    info!("Redis page cache connected");
                    PageCache::Redis(cache)
                }
                Err(e) => {
                    warn!(error = %e, "Redis unavailable, using in-process page cache");
                    PageCache::memory(config.ttl)
                }
            },
        }
    }

    pub fn is_enabled(&self) -> bool {
        !matches!(self, PageCache::Disabled)
    }

    pub async fn get(&self, key: &str) -> Option<CachedPage> {
        match self {
            PageCache::Memory(cache) => cache.get(key).await,
            PageCache::Redis(cache) => cache.get(key).await.unwrap_or_else(|e| {
                warn!(key = %key, error = %e, "Page cache read failed");
                None
            }),
            PageCache::Disabled => None,
        }
    }

    pub async fn put(&self, key: &str, page: &CachedPage) {
        match self {
            PageCache::Memory(cache) => cache.put(key, page).await,
            PageCache::Redis(cache) => {
                if let Err(e) = cache.put(key, page).await {
                    warn!(key = %key, error = %e, "Page cache write failed");
                }
            }
            PageCache::Disabled => {}
        }
    }
}
