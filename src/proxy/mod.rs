//! Resilient proxy forwarding with write-through caching.
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`ProxyForwarder`] | Validate → cache lookup → forward-with-retry → cache write |
//! | [`ProxyOutcome`] | Tagged result callers pattern-match on |
//! | [`VariantRequest`] | Identifying parameters for the inference upstream |
//! | [`Sleeper`] | Injectable backoff delay (tests run without wall-clock waits) |

mod forwarder;
mod outcome;

pub use forwarder::{
    ProxyConfig, ProxyForwarder, Sleeper, TokioSleeper, UpstreamFamily, VariantRequest,
};
pub use outcome::ProxyOutcome;
