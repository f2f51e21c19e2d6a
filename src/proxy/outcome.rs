//! Tagged result of a forwarding attempt.

use crate::cache::Category;
use serde_json::Value;
use std::time::Duration;

/// What came back from (or instead of) an upstream call.
///
/// A single tagged type rather than error-or-tuple shapes, so callers match
/// exhaustively: success carries the document, client errors surface the
/// upstream's own status and body, server errors stand for an exhausted
/// retry budget, and rate limiting is decided locally before any network
/// activity.
#[derive(Debug, Clone, PartialEq)]
pub enum ProxyOutcome {
    /// 2xx response, parsed and written through to the cache (or served from
    /// it without a network call).
    Success { document: Value, category: Category },
    /// Non-429 4xx from the upstream. Never retried, never cached.
    ClientError {
        status: u16,
        message: String,
        details: String,
    },
    /// Retry budget exhausted on 5xx, upstream 429, or transport failure.
    ServerError {
        status: u16,
        message: String,
        details: String,
    },
    /// Rejected by the local rate limiter; no network call was made.
    RateLimited { retry_after: Duration },
}

impl ProxyOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ProxyOutcome::Success { .. })
    }

    /// HTTP status code equivalent, for the routing layer to relay.
    pub fn status(&self) -> u16 {
        match self {
            ProxyOutcome::Success { .. } => 200,
            ProxyOutcome::ClientError { status, .. } => *status,
            ProxyOutcome::ServerError { status, .. } => *status,
            ProxyOutcome::RateLimited { .. } => 429,
        }
    }

    pub fn document(&self) -> Option<&Value> {
        match self {
            ProxyOutcome::Success { document, .. } => Some(document),
            _ => None,
        }
    }
}
