//! Resilience primitives protecting scarce downstream resources.
//!
//! Currently a single primitive: a per-client trailing-window [`RateLimiter`]
//! gating the variant-analysis inference upstream. Retry/backoff policy lives
//! with the proxy forwarder, next to the classification that drives it.

mod rate_limiter;

pub use rate_limiter::RateLimiter;
