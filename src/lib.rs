//! # genome-gateway
//!
//! Cache-through gateway shielding slow, rate-limited, or unreliable
//! genomic data upstreams behind a consistent local interface.
//!
//! ## Overview
//!
//! The gateway sits between an HTTP routing layer and three external
//! services: a gene-reference/clinical-variant API (NCBI), a genome-assembly
//! and sequence API (UCSC), and a GPU-backed variant-analysis inference
//! endpoint. Every forwarded call is validated against a host allow-list,
//! answered from cache when possible, retried with backoff on transient
//! failure, and written through to the cache on success.
//!
//! The cache itself is dual-tier: a remote shared Redis-compatible store with
//! a process-local in-memory fallback. The first remote failure latches the
//! store onto the fallback for the life of the process, so callers see a
//! possibly-cold cache instead of remote errors.
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`cache`] | Key scheme, TTL policy, dual-tier store with failover |
//! | [`proxy`] | Allow-list validation, retry/backoff, write-through forwarding |
//! | [`resilience`] | Per-client rate limiting for the inference upstream |
//! | [`gateway`] | Facade wiring the pieces together for the routing layer |
//! | [`config`] | Static startup configuration |
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use genome_gateway::{Gateway, GatewayConfig, ProxyOutcome};
//!
//! #[tokio::main]
//! async fn main() -> genome_gateway::Result<()> {
//!     let gateway = Gateway::connect(GatewayConfig::from_env()).await?;
//!
//!     let outcome = gateway
//!         .forward_ucsc("https://api.genome.ucsc.edu/list/ucscGenomes")
//!         .await?;
//!     match outcome {
//!         ProxyOutcome::Success { document, .. } => println!("{document}"),
//!         other => eprintln!("upstream said {}", other.status()),
//!     }
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod gateway;
pub mod proxy;
pub mod resilience;

pub use cache::{CacheKey, CacheStats, CacheStore, Category};
pub use config::{GatewayConfig, RateLimiterConfig, RedisConfig};
pub use error::Error;
pub use gateway::Gateway;
pub use proxy::{ProxyOutcome, VariantRequest};
pub use resilience::RateLimiter;

/// Result type alias for the library.
pub type Result<T> = std::result::Result<T, Error>;

/// Install a `tracing` subscriber reading its filter from `RUST_LOG`.
///
/// For the embedding server's convenience; safe to call more than once.
pub fn init_tracing() {
    use once_cell::sync::OnceCell;
    static INIT: OnceCell<()> = OnceCell::new();
    INIT.get_or_init(|| {
        tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .init();
    });
}
