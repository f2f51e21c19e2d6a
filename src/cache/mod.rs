//! Dual-tier caching for genomic data.
//!
//! A remote shared cache (Redis-compatible, durable across restarts) backed
//! by a process-local in-memory cache that takes over transparently when the
//! remote fails. The failover latches: once the store degrades it stays on
//! the fallback until explicitly reset, so an incident costs one remote
//! timeout instead of one per request.
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`CacheKey`] / [`Category`] | Deterministic namespaced key construction and TTL policy |
//! | [`CacheStore`] | Dual-backend store with latching failover |
//! | [`CacheBackend`] | Trait implemented by both tiers |
//! | [`MemoryCache`] | In-process fallback backend |
//! | [`RedisBackend`] | Remote shared backend |

mod backend;
mod key;
mod redis;
mod store;

pub use backend::{CacheBackend, CacheStats, MemoryCache, ServerStats};
pub use key::{CacheKey, Category, NAMESPACE};
pub use self::redis::{ConnectionInfo, RedisBackend};
pub use store::CacheStore;
