//! Static gateway configuration.
//!
//! All connection parameters are supplied once at startup. Defaults are
//! production-friendly and env-overridable, so an embedding server can call
//! [`GatewayConfig::from_env`] and run with zero explicit configuration
//! against a local Redis.

use std::env;
use std::time::Duration;

fn env_u64(name: &str, default: u64) -> u64 {
    env::var(name)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(default)
}

fn env_u32(name: &str, default: u32) -> u32 {
    env::var(name)
        .ok()
        .and_then(|s| s.parse::<u32>().ok())
        .unwrap_or(default)
}

/// Connection parameters for the remote shared cache.
#[derive(Debug, Clone)]
pub struct RedisConfig {
    /// `redis://` or `rediss://` (TLS) URL.
    pub url: String,
    /// Timeout for establishing the connection.
    pub connect_timeout: Duration,
    /// Timeout for individual commands.
    pub command_timeout: Duration,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://localhost:6379".to_string(),
            connect_timeout: Duration::from_secs(5),
            command_timeout: Duration::from_secs(5),
        }
    }
}

impl RedisConfig {
    pub fn from_env() -> Self {
        Self {
            url: env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string()),
            connect_timeout: Duration::from_secs(env_u64("REDIS_SOCKET_TIMEOUT", 5)),
            command_timeout: Duration::from_secs(env_u64("REDIS_SOCKET_TIMEOUT", 5)),
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Whether the URL requests TLS (`rediss://`).
    pub fn tls_enabled(&self) -> bool {
        self.url.starts_with("rediss://")
    }
}

/// Per-client admission policy for the scarce inference upstream.
#[derive(Debug, Clone)]
pub struct RateLimiterConfig {
    /// Trailing window length.
    pub window: Duration,
    /// Maximum admitted requests per window per client.
    pub max_requests: usize,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(60),
            max_requests: 10,
        }
    }
}

impl RateLimiterConfig {
    pub fn with_window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    pub fn with_max_requests(mut self, max_requests: usize) -> Self {
        self.max_requests = max_requests;
        self
    }
}

/// Top-level gateway configuration.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub redis: RedisConfig,
    pub rate_limiter: RateLimiterConfig,
    /// Default timeout for upstream HTTP calls.
    pub http_timeout: Duration,
    /// Shorter timeout for the sequence/assembly upstream, which answers fast
    /// or not at all.
    pub ucsc_timeout: Duration,
    /// Attempt budget for retryable upstream failures.
    pub max_attempts: u32,
    /// Base URL of the variant-analysis inference endpoint, if deployed.
    pub inference_base_url: Option<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            redis: RedisConfig::default(),
            rate_limiter: RateLimiterConfig::default(),
            http_timeout: Duration::from_secs(30),
            ucsc_timeout: Duration::from_secs(15),
            max_attempts: 3,
            inference_base_url: None,
        }
    }
}

impl GatewayConfig {
    /// Build a configuration from environment variables, falling back to
    /// defaults for anything unset.
    pub fn from_env() -> Self {
        Self {
            redis: RedisConfig::from_env(),
            rate_limiter: RateLimiterConfig::default(),
            http_timeout: Duration::from_secs(env_u64("GATEWAY_HTTP_TIMEOUT_SECS", 30)),
            ucsc_timeout: Duration::from_secs(env_u64("GATEWAY_UCSC_TIMEOUT_SECS", 15)),
            // At least one attempt; zero would answer every request with a
            // synthetic error without ever reaching the upstream.
            max_attempts: env_u32("GATEWAY_MAX_ATTEMPTS", 3).max(1),
            inference_base_url: env::var("MODAL_ANALYZE_VARIANT_BASE_URL").ok(),
        }
    }

    pub fn with_redis(mut self, redis: RedisConfig) -> Self {
        self.redis = redis;
        self
    }

    pub fn with_rate_limiter(mut self, rate_limiter: RateLimiterConfig) -> Self {
        self.rate_limiter = rate_limiter;
        self
    }

    pub fn with_http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = timeout;
        self
    }

    pub fn with_inference_base_url(mut self, url: impl Into<String>) -> Self {
        self.inference_base_url = Some(url.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_production_friendly() {
        let cfg = GatewayConfig::default();
        assert_eq!(cfg.max_attempts, 3);
        assert_eq!(cfg.http_timeout, Duration::from_secs(30));
        assert_eq!(cfg.rate_limiter.max_requests, 10);
        assert!(cfg.inference_base_url.is_none());
    }

    #[test]
    fn max_attempts_from_env_is_clamped_to_at_least_one() {
        env::set_var("GATEWAY_MAX_ATTEMPTS", "0");
        assert_eq!(GatewayConfig::from_env().max_attempts, 1);

        // Unparseable (including out-of-range) values fall back to the
        // default instead of truncating.
        env::set_var("GATEWAY_MAX_ATTEMPTS", "99999999999999999999");
        assert_eq!(GatewayConfig::from_env().max_attempts, 3);

        env::set_var("GATEWAY_MAX_ATTEMPTS", "5");
        assert_eq!(GatewayConfig::from_env().max_attempts, 5);
        env::remove_var("GATEWAY_MAX_ATTEMPTS");
    }

    #[test]
    fn redis_tls_detection() {
        let plain = RedisConfig::default();
        assert!(!plain.tls_enabled());
        let tls = RedisConfig::default().with_url("rediss://cache.example.com:6380");
        assert!(tls.tls_enabled());
    }
}
