//! Dual-tier cache store with latching failover.
//!
//! Every operation goes to the remote shared backend first. The first remote
//! failure (probe or operation) latches the store onto the in-process
//! fallback for the life of the process — flapping between backends
//! mid-incident would re-pay the remote timeout on every request, and a
//! half-warm remote is worth less than a consistent fallback. The latch is
//! cleared only by [`CacheStore::reset_failover`] or a restart.
//!
//! The caller never sees a remote error, only a possibly-cold cache: the
//! contract is available-and-eventually-consistent, not fail-stop.

use super::backend::{CacheBackend, CacheStats, MemoryCache};
use super::redis::{ConnectionInfo, RedisBackend};
use crate::config::RedisConfig;
use crate::{Error, Result};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

pub struct CacheStore {
    remote: Option<Box<dyn CacheBackend>>,
    fallback: MemoryCache,
    using_fallback: AtomicBool,
    connection_info: Option<ConnectionInfo>,
}

impl CacheStore {
    /// Connect to the remote shared cache; start degraded if it is down.
    pub async fn connect(cfg: &RedisConfig) -> Self {
        match RedisBackend::connect(cfg).await {
            Ok(backend) => {
                let info = backend.connection_info().clone();
                Self {
                    remote: Some(Box::new(backend)),
                    fallback: MemoryCache::new(),
                    using_fallback: AtomicBool::new(false),
                    connection_info: Some(info),
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to connect to remote cache, starting on in-memory fallback");
                Self::in_memory()
            }
        }
    }

    /// A store with no remote backend at all; serves everything from the
    /// in-process cache.
    pub fn in_memory() -> Self {
        Self {
            remote: None,
            fallback: MemoryCache::new(),
            using_fallback: AtomicBool::new(true),
            connection_info: None,
        }
    }

    /// A store with an explicit remote backend. Used by tests to substitute
    /// a scripted remote.
    pub fn with_remote(remote: Box<dyn CacheBackend>) -> Self {
        Self {
            remote: Some(remote),
            fallback: MemoryCache::new(),
            using_fallback: AtomicBool::new(false),
            connection_info: None,
        }
    }

    pub fn using_fallback(&self) -> bool {
        self.using_fallback.load(Ordering::Relaxed)
    }

    /// Clear the failover latch so the next operation probes the remote
    /// backend again. Never called automatically.
    pub fn reset_failover(&self) {
        if self.remote.is_some() {
            self.using_fallback.store(false, Ordering::Relaxed);
            tracing::info!("failover latch reset, remote cache re-enabled");
        }
    }

    fn active_remote(&self) -> Option<&dyn CacheBackend> {
        if self.using_fallback() {
            None
        } else {
            self.remote.as_deref()
        }
    }

    fn latch_fallback(&self, op: &str, error: &Error) {
        if !self.using_fallback.swap(true, Ordering::Relaxed) {
            tracing::warn!(op, error = %error, "remote cache failure, failing over to in-memory cache");
        }
    }

    pub async fn get(&self, key: &str) -> Option<Value> {
        if let Some(remote) = self.active_remote() {
            match probe_then(remote.ping().await, remote.get(key)).await {
                Ok(found) => {
                    if found.is_some() {
                        tracing::debug!(key = %key, "cache hit (remote)");
                    }
                    return found;
                }
                Err(e) => self.latch_fallback("get", &e),
            }
        }
        self.fallback.get_value(key)
    }

    /// TTL is mandatory; no entry is ever stored without an expiry.
    pub async fn set(&self, key: &str, value: &Value, ttl: Duration) -> bool {
        if let Some(remote) = self.active_remote() {
            match probe_then(remote.ping().await, remote.set(key, value, ttl)).await {
                Ok(()) => {
                    tracing::debug!(key = %key, ttl_secs = ttl.as_secs(), "cache set (remote)");
                    return true;
                }
                Err(e) => self.latch_fallback("set", &e),
            }
        }
        self.fallback.set_value(key, value.clone(), ttl);
        true
    }

    pub async fn delete(&self, key: &str) -> bool {
        if let Some(remote) = self.active_remote() {
            match probe_then(remote.ping().await, remote.delete(key)).await {
                Ok(existed) => return existed,
                Err(e) => self.latch_fallback("delete", &e),
            }
        }
        self.fallback.remove(key)
    }

    /// Remove all keys under a trailing-wildcard glob, e.g.
    /// `evo2:gene_search:*`. Returns the number of keys removed from
    /// whichever backend is active.
    pub async fn clear_pattern(&self, pattern: &str) -> u64 {
        if let Some(remote) = self.active_remote() {
            match probe_then(remote.ping().await, remote.clear_pattern(pattern)).await {
                Ok(removed) => {
                    tracing::info!(pattern = %pattern, removed, "cleared cache pattern (remote)");
                    return removed;
                }
                Err(e) => self.latch_fallback("clear_pattern", &e),
            }
        }
        self.fallback.clear_matching(pattern)
    }

    pub async fn stats(&self) -> CacheStats {
        if let Some(remote) = self.active_remote() {
            match probe_then(remote.ping().await, remote.stats()).await {
                Ok(stats) => return stats,
                Err(e) => self.latch_fallback("stats", &e),
            }
        }
        let mut stats = self
            .fallback
            .stats()
            .await
            .unwrap_or_else(|_| CacheStats {
                backend: "in_memory_fallback".to_string(),
                degraded: true,
                keys: 0,
                server: None,
            });
        stats.degraded = self.using_fallback();
        stats
    }

    /// Redacted remote connection diagnostics, when a remote is configured.
    pub fn connection_info(&self) -> Option<&ConnectionInfo> {
        self.connection_info.as_ref()
    }
}

/// Run an operation only after a successful connectivity probe.
async fn probe_then<T>(
    probe: Result<()>,
    op: impl std::future::Future<Output = Result<T>>,
) -> Result<T> {
    probe?;
    op.await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::backend::CacheBackend;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::AtomicU64;

    /// Remote stand-in that can be switched into a failing state and counts
    /// the operations it receives.
    struct FlakyRemote {
        inner: MemoryCache,
        failing: AtomicBool,
        calls: AtomicU64,
    }

    impl FlakyRemote {
        fn new() -> Self {
            Self {
                inner: MemoryCache::new(),
                failing: AtomicBool::new(false),
                calls: AtomicU64::new(0),
            }
        }

        fn check(&self) -> Result<()> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            if self.failing.load(Ordering::Relaxed) {
                Err(Error::configuration("remote cache unreachable"))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl CacheBackend for FlakyRemote {
        async fn ping(&self) -> Result<()> {
            self.check()
        }
        async fn get(&self, key: &str) -> Result<Option<Value>> {
            self.check()?;
            self.inner.get(key).await
        }
        async fn set(&self, key: &str, value: &Value, ttl: Duration) -> Result<()> {
            self.check()?;
            self.inner.set(key, value, ttl).await
        }
        async fn delete(&self, key: &str) -> Result<bool> {
            self.check()?;
            self.inner.delete(key).await
        }
        async fn clear_pattern(&self, pattern: &str) -> Result<u64> {
            self.check()?;
            self.inner.clear_pattern(pattern).await
        }
        async fn stats(&self) -> Result<CacheStats> {
            self.check()?;
            self.inner.stats().await
        }
        fn name(&self) -> &'static str {
            "flaky_remote"
        }
    }

    #[tokio::test]
    async fn healthy_remote_serves_operations() {
        let store = CacheStore::with_remote(Box::new(MemoryCache::new()));
        assert!(store.set("evo2:genomes", &json!({"genomes": {}}), Duration::from_secs(60)).await);
        assert_eq!(
            store.get("evo2:genomes").await,
            Some(json!({"genomes": {}}))
        );
        assert!(!store.using_fallback());
    }

    /// Handle sharing state with the test's own reference to the remote.
    struct SharedRemote(std::sync::Arc<FlakyRemote>);

    #[async_trait]
    impl CacheBackend for SharedRemote {
        async fn ping(&self) -> Result<()> {
            self.0.ping().await
        }
        async fn get(&self, key: &str) -> Result<Option<Value>> {
            self.0.get(key).await
        }
        async fn set(&self, key: &str, value: &Value, ttl: Duration) -> Result<()> {
            self.0.set(key, value, ttl).await
        }
        async fn delete(&self, key: &str) -> Result<bool> {
            self.0.delete(key).await
        }
        async fn clear_pattern(&self, pattern: &str) -> Result<u64> {
            self.0.clear_pattern(pattern).await
        }
        async fn stats(&self) -> Result<CacheStats> {
            self.0.stats().await
        }
        fn name(&self) -> &'static str {
            "flaky_remote"
        }
    }

    #[tokio::test]
    async fn remote_failure_latches_fallback_and_absorbs_the_error() {
        let remote = std::sync::Arc::new(FlakyRemote::new());
        let store = CacheStore::with_remote(Box::new(SharedRemote(remote.clone())));

        assert!(store.set("evo2:genomes", &json!(1), Duration::from_secs(60)).await);
        assert!(!store.using_fallback());

        remote.failing.store(true, Ordering::Relaxed);

        // The failing remote never surfaces an error; the store falls back,
        // which is cold for this key.
        assert_eq!(store.get("evo2:genomes").await, None);
        assert!(store.using_fallback());

        // Subsequent operations succeed on the fallback without touching the
        // remote at all.
        let calls_after_latch = remote.calls.load(Ordering::Relaxed);
        assert!(store.set("evo2:chromosomes:hg38", &json!(2), Duration::from_secs(60)).await);
        assert_eq!(store.get("evo2:chromosomes:hg38").await, Some(json!(2)));
        assert_eq!(remote.calls.load(Ordering::Relaxed), calls_after_latch);

        // Recovery of the remote alone does not clear the latch.
        remote.failing.store(false, Ordering::Relaxed);
        assert_eq!(store.get("evo2:genomes").await, None);
        assert!(store.using_fallback());
        assert_eq!(remote.calls.load(Ordering::Relaxed), calls_after_latch);

        // Explicit reset re-enables the remote, which still has the entry.
        store.reset_failover();
        assert!(!store.using_fallback());
        assert_eq!(store.get("evo2:genomes").await, Some(json!(1)));
    }

    #[tokio::test]
    async fn stats_reports_degraded_mode() {
        let store = CacheStore::in_memory();
        store.set("evo2:genomes", &json!(1), Duration::from_secs(60)).await;
        let stats = store.stats().await;
        assert!(stats.degraded);
        assert_eq!(stats.backend, "in_memory_fallback");
        assert_eq!(stats.keys, 1);

        let healthy = CacheStore::with_remote(Box::new(MemoryCache::new()));
        let stats = healthy.stats().await;
        assert!(!stats.degraded);
    }

    #[tokio::test]
    async fn clear_pattern_spares_unrelated_categories() {
        let store = CacheStore::with_remote(Box::new(MemoryCache::new()));
        store.set("evo2:gene_search:BRCA1:hg38", &json!(1), Duration::from_secs(60)).await;
        store.set("evo2:gene_search:TP53:hg38", &json!(2), Duration::from_secs(60)).await;
        store.set("evo2:clinvar:chr17:1-2:hg38", &json!(3), Duration::from_secs(60)).await;

        assert_eq!(store.clear_pattern("evo2:gene_search:*").await, 2);
        assert_eq!(store.get("evo2:gene_search:BRCA1:hg38").await, None);
        assert!(store.get("evo2:clinvar:chr17:1-2:hg38").await.is_some());
    }

    #[tokio::test]
    async fn reset_failover_is_a_no_op_without_a_remote() {
        let store = CacheStore::in_memory();
        store.reset_failover();
        assert!(store.using_fallback());
    }
}
