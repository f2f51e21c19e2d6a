use thiserror::Error;

/// Unified error type for the gateway core.
///
/// Only genuinely actionable failures cross the crate boundary: a disallowed
/// host, a missing piece of configuration, or a payload that cannot be
/// serialized. Upstream HTTP outcomes (client errors, exhausted retries, rate
/// limiting) are reported through [`crate::proxy::ProxyOutcome`] instead, so
/// callers pattern-match on them rather than catching errors. Remote cache
/// failures never surface at all; they latch the store into fallback mode.
#[derive(Debug, Error)]
pub enum Error {
    /// Destination host is not on the allow-list for its upstream family.
    /// Fatal to the request; no network call is made.
    #[error("validation error: {0}")]
    Validation(String),

    /// Required static configuration is missing or malformed.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Remote cache backend failure. Absorbed by the cache store's failover
    /// path; visible to callers only through the degraded flag in stats.
    #[error("cache backend error: {0}")]
    CacheBackend(#[from] redis::RedisError),

    /// Payload could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP transport failure below the status-code level. Retried inside the
    /// forwarder; escapes only when request construction itself fails.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

impl Error {
    pub fn validation(msg: impl Into<String>) -> Self {
        Error::Validation(msg.into())
    }

    pub fn configuration(msg: impl Into<String>) -> Self {
        Error::Configuration(msg.into())
    }
}
