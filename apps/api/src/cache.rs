//! Short-lived response cache for LLM-backed endpoints.
//!
//! Best effort only: a miss (or a backend error) repeats the computation.
//! `MemoryCache` is per-process; `RedisCache` is shared across instances.

use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{de::DeserializeOwned, Serialize};
use sha2::{Digest, Sha256};
use tokio::time::Instant;
use tracing::warn;

const REDIS_KEY_PREFIX: &str = "tailor:cache:";
/// Expired entries are swept once the map grows past this size.
const SWEEP_THRESHOLD: usize = 1024;

#[async_trait]
pub trait ResponseCache: Send + Sync {
    async fn get(&self, key: &str) -> Option<String>;
    async fn put(&self, key: &str, value: String);
}

/// Hex SHA-256 over the endpoint name and its inputs, NUL-separated.
pub fn cache_key(endpoint: &str, parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(endpoint.as_bytes());
    for part in parts {
        hasher.update([0u8]);
        hasher.update(part.as_bytes());
    }
    hex::encode(hasher.finalize())
}

pub async fn get_json<T: DeserializeOwned>(cache: &dyn ResponseCache, key: &str) -> Option<T> {
    let raw = cache.get(key).await?;
    serde_json::from_str(&raw).ok()
}

pub async fn put_json<T: Serialize>(cache: &dyn ResponseCache, key: &str, value: &T) {
    match serde_json::to_string(value) {
        Ok(raw) => cache.put(key, raw).await,
        Err(e) => warn!("Skipping cache write for {key}: {e}"),
    }
}

// ────────────────────────────────────────────────────────────────────────────
// In-memory TTL cache
// ────────────────────────────────────────────────────────────────────────────

pub struct MemoryCache {
    entries: DashMap<String, (Instant, String)>,
    ttl: Duration,
}

impl MemoryCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    fn sweep(&self, now: Instant) {
        self.entries.retain(|_, (expires_at, _)| *expires_at > now);
    }
}

#[async_trait]
impl ResponseCache for MemoryCache {
    async fn get(&self, key: &str) -> Option<String> {
        let now = Instant::now();
        let hit = {
            let entry = self.entries.get(key)?;
            let (expires_at, value) = entry.value();
            (*expires_at > now).then(|| value.clone())
        };
        if hit.is_none() {
            self.entries.remove_if(key, |_, (expires_at, _)| *expires_at <= now);
        }
        hit
    }

    async fn put(&self, key: &str, value: String) {
        let now = Instant::now();
        if self.entries.len() >= SWEEP_THRESHOLD {
            self.sweep(now);
        }
        self.entries.insert(key.to_string(), (now + self.ttl, value));
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Redis-backed cache
// ────────────────────────────────────────────────────────────────────────────

pub struct RedisCache {
    client: redis::Client,
    ttl: Duration,
}

impl RedisCache {
    pub fn new(client: redis::Client, ttl: Duration) -> Self {
        Self { client, ttl }
    }
}

#[async_trait]
impl ResponseCache for RedisCache {
    async fn get(&self, key: &str) -> Option<String> {
        let mut conn = match self.client.get_multiplexed_async_connection().await {
            Ok(conn) => conn,
            Err(e) => {
                warn!("Redis cache unavailable: {e}");
                return None;
            }
        };
        redis::cmd("GET")
            .arg(format!("{REDIS_KEY_PREFIX}{key}"))
            .query_async::<_, Option<String>>(&mut conn)
            .await
            .unwrap_or_else(|e| {
                warn!("Redis cache GET failed: {e}");
                None
            })
    }

    async fn put(&self, key: &str, value: String) {
        let mut conn = match self.client.get_multiplexed_async_connection().await {
            Ok(conn) => conn,
            Err(e) => {
                warn!("Redis cache unavailable: {e}");
                return;
            }
        };
        let result = redis::cmd("SET")
            .arg(format!("{REDIS_KEY_PREFIX}{key}"))
            .arg(value)
            .arg("EX")
            .arg(self.ttl.as_secs().max(1))
            .query_async::<_, ()>(&mut conn)
            .await;
        if let Err(e) = result {
            warn!("Redis cache SET failed: {e}");
        }
    }
}
