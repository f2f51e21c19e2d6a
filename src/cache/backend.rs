//! Cache backend trait and the in-process fallback implementation.

use crate::Result;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Server-side metrics reported by the remote backend.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ServerStats {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub used_memory_human: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connected_clients: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_commands_processed: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keyspace_hits: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keyspace_misses: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uptime_in_seconds: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redis_version: Option<String>,
}

/// Backend diagnostics surfaced through [`crate::cache::CacheStore::stats`].
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    /// Backend type currently serving requests.
    pub backend: String,
    /// True once the store has latched onto the in-memory fallback.
    pub degraded: bool,
    /// Number of live keys.
    pub keys: u64,
    /// Remote server metrics, when the remote backend is active.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server: Option<ServerStats>,
}

/// A key/value store with per-entry expiry.
///
/// Implemented by the remote shared backend and by the in-process fallback;
/// the store treats both uniformly so tests can substitute either side.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Lightweight connectivity probe. Precedes each operation against the
    /// remote backend so a dead connection is detected before the operation
    /// itself times out.
    async fn ping(&self) -> Result<()>;

    async fn get(&self, key: &str) -> Result<Option<Value>>;

    async fn set(&self, key: &str, value: &Value, ttl: Duration) -> Result<()>;

    /// Returns true when the key existed and was removed.
    async fn delete(&self, key: &str) -> Result<bool>;

    /// Remove all keys matching a trailing-wildcard glob; returns the count.
    async fn clear_pattern(&self, pattern: &str) -> Result<u64>;

    async fn stats(&self) -> Result<CacheStats>;

    fn name(&self) -> &'static str;
}

#[derive(Clone)]
struct Entry {
    value: Value,
    expires_at: Instant,
}

/// Process-local fallback cache.
///
/// A plain table behind a mutex; entries expire lazily on read. Used when the
/// remote backend is unreachable, so every operation here is infallible —
/// a degraded period serves cold entries, it never serves errors.
pub struct MemoryCache {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Entry>> {
        // A poisoned lock only means a panic elsewhere mid-operation; the
        // table itself is still a valid cache.
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn get_value(&self, key: &str) -> Option<Value> {
        let mut entries = self.lock();
        match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => Some(entry.value.clone()),
            Some(_) => {
                // Lazy expiry on read.
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    pub fn set_value(&self, key: &str, value: Value, ttl: Duration) {
        let entry = Entry {
            value,
            expires_at: Instant::now() + ttl,
        };
        self.lock().insert(key.to_string(), entry);
    }

    pub fn remove(&self, key: &str) -> bool {
        self.lock().remove(key).is_some()
    }

    /// Substring match on the de-wildcarded pattern. An approximation of glob
    /// semantics, acceptable because every key comes from the key scheme.
    pub fn clear_matching(&self, pattern: &str) -> u64 {
        let needle = pattern.replace('*', "");
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|key, _| !key.contains(&needle));
        (before - entries.len()) as u64
    }

    pub fn live_len(&self) -> u64 {
        let now = Instant::now();
        self.lock()
            .values()
            .filter(|e| e.expires_at > now)
            .count() as u64
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheBackend for MemoryCache {
    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.get_value(key))
    }

    async fn set(&self, key: &str, value: &Value, ttl: Duration) -> Result<()> {
        self.set_value(key, value.clone(), ttl);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        Ok(self.remove(key))
    }

    async fn clear_pattern(&self, pattern: &str) -> Result<u64> {
        Ok(self.clear_matching(pattern))
    }

    async fn stats(&self) -> Result<CacheStats> {
        Ok(CacheStats {
            backend: self.name().to_string(),
            degraded: false,
            keys: self.live_len(),
            server: None,
        })
    }

    fn name(&self) -> &'static str {
        "in_memory_fallback"
    }
}
