//! Gateway facade: the surface the HTTP routing layer calls.
//!
//! Owns the cache store, the rate limiter, and the proxy forwarder as one
//! context object, so request handlers share state through an explicit
//! handle instead of process-wide globals and tests get a fresh gateway
//! each.

use crate::cache::{CacheStats, CacheStore, ConnectionInfo};
use crate::config::GatewayConfig;
use crate::proxy::{ProxyConfig, ProxyForwarder, ProxyOutcome, VariantRequest};
use crate::resilience::RateLimiter;
use crate::Result;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

pub struct Gateway {
    store: Arc<CacheStore>,
    limiter: RateLimiter,
    forwarder: ProxyForwarder,
}

impl Gateway {
    /// Connect to the remote cache and build the full gateway. Starts
    /// degraded (in-memory cache) when the remote is unreachable.
    pub async fn connect(cfg: GatewayConfig) -> Result<Self> {
        let store = Arc::new(CacheStore::connect(&cfg.redis).await);
        Self::with_store(cfg, store)
    }

    /// Build a gateway around an existing store. Tests use this with an
    /// in-memory store.
    pub fn with_store(cfg: GatewayConfig, store: Arc<CacheStore>) -> Result<Self> {
        let limiter = RateLimiter::new(cfg.rate_limiter.clone());
        let forwarder = ProxyForwarder::new(store.clone(), ProxyConfig::from_gateway(&cfg))?;
        Ok(Self {
            store,
            limiter,
            forwarder,
        })
    }

    pub fn store(&self) -> &CacheStore {
        &self.store
    }

    // Cache surface.

    pub async fn cache_get(&self, key: &str) -> Option<Value> {
        self.store.get(key).await
    }

    pub async fn cache_set(&self, key: &str, value: &Value, ttl: Duration) -> bool {
        self.store.set(key, value, ttl).await
    }

    pub async fn cache_delete(&self, key: &str) -> bool {
        self.store.delete(key).await
    }

    pub async fn cache_clear_pattern(&self, pattern: &str) -> u64 {
        self.store.clear_pattern(pattern).await
    }

    pub async fn cache_stats(&self) -> CacheStats {
        self.store.stats().await
    }

    pub fn cache_connection_info(&self) -> Option<&ConnectionInfo> {
        self.store.connection_info()
    }

    // Forwarding surface.

    pub async fn forward_ncbi(&self, endpoint: &str) -> Result<ProxyOutcome> {
        self.forwarder.forward_ncbi(endpoint).await
    }

    pub async fn forward_ucsc(&self, endpoint: &str) -> Result<ProxyOutcome> {
        self.forwarder.forward_ucsc(endpoint).await
    }

    /// Variant analysis hits a scarce GPU upstream; the per-client rate
    /// limiter gates it before validation, so a rejection makes no network
    /// call and touches no cache state.
    pub async fn forward_variant_analysis(
        &self,
        client_id: &str,
        request: &VariantRequest,
    ) -> Result<ProxyOutcome> {
        if !self.limiter.allow(client_id) {
            return Ok(ProxyOutcome::RateLimited {
                retry_after: self.limiter.retry_after(client_id),
            });
        }
        self.forwarder.forward_variant_analysis(request).await
    }

    /// Direct admission check for callers that gate elsewhere. Counts
    /// against the same per-client budget as [`Self::forward_variant_analysis`].
    pub fn rate_limiter_allow(&self, client_id: &str) -> bool {
        self.limiter.allow(client_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RateLimiterConfig;

    fn gateway(cfg: GatewayConfig) -> Gateway {
        Gateway::with_store(cfg, Arc::new(CacheStore::in_memory())).expect("gateway builds")
    }

    #[tokio::test]
    async fn cache_surface_round_trips() {
        let gw = gateway(GatewayConfig::default());
        assert!(
            gw.cache_set("evo2:genomes", &serde_json::json!({"genomes": {}}), Duration::from_secs(60))
                .await
        );
        assert!(gw.cache_get("evo2:genomes").await.is_some());
        assert!(gw.cache_delete("evo2:genomes").await);
        assert!(gw.cache_get("evo2:genomes").await.is_none());
    }

    #[tokio::test]
    async fn rate_limited_variant_analysis_short_circuits() {
        // Inference URL left unset: a short-circuited request never needs it.
        let cfg = GatewayConfig::default()
            .with_rate_limiter(RateLimiterConfig::default().with_max_requests(0))
            .with_http_timeout(Duration::from_secs(1));
        let gw = gateway(cfg);

        let request = VariantRequest {
            variant_pos: 43_119_628,
            alternative: "G".to_string(),
            genome: "hg38".to_string(),
            chromosome: "chr17".to_string(),
            strand: None,
        };
        let outcome = gw
            .forward_variant_analysis("10.0.0.1", &request)
            .await
            .expect("no boundary error");
        assert!(matches!(outcome, ProxyOutcome::RateLimited { .. }));
        assert_eq!(outcome.status(), 429);
    }

    #[tokio::test]
    async fn variant_analysis_without_inference_url_is_a_configuration_error() {
        let gw = gateway(GatewayConfig::default());
        let request = VariantRequest {
            variant_pos: 1,
            alternative: "A".to_string(),
            genome: "hg38".to_string(),
            chromosome: "chr1".to_string(),
            strand: None,
        };
        let err = gw
            .forward_variant_analysis("10.0.0.1", &request)
            .await
            .unwrap_err();
        assert!(matches!(err, crate::Error::Configuration(_)));
    }
}
