//! Per-client request rate limiting.

use crate::config::RateLimiterConfig;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Trailing-window request counter, one window per client identity.
///
/// Protects the scarce GPU inference upstream from a single client saturating
/// it. On each call the client's window is pruned of timestamps older than
/// the window length, then the request is admitted iff the pruned count is
/// below the limit. A rejection does not mutate the window. Windows are not
/// persisted; after a restart every client starts fresh, which is acceptable
/// for abuse mitigation.
pub struct RateLimiter {
    cfg: RateLimiterConfig,
    windows: Mutex<HashMap<String, Vec<Instant>>>,
}

impl RateLimiter {
    pub fn new(cfg: RateLimiterConfig) -> Self {
        Self {
            cfg,
            windows: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &RateLimiterConfig {
        &self.cfg
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Vec<Instant>>> {
        self.windows.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Admit or reject one request for `client_id`.
    pub fn allow(&self, client_id: &str) -> bool {
        let now = Instant::now();
        let mut windows = self.lock();
        let window = windows.entry(client_id.to_string()).or_default();
        window.retain(|t| now.duration_since(*t) < self.cfg.window);

        if window.len() < self.cfg.max_requests {
            window.push(now);
            true
        } else {
            tracing::warn!(
                client_id = %client_id,
                max_requests = self.cfg.max_requests,
                window_secs = self.cfg.window.as_secs(),
                "rate limit exceeded"
            );
            false
        }
    }

    /// Time until the client's oldest in-window request ages out, i.e. when
    /// the next request could be admitted. Zero when the client is not
    /// currently limited.
    pub fn retry_after(&self, client_id: &str) -> Duration {
        let now = Instant::now();
        let mut windows = self.lock();
        let Some(window) = windows.get_mut(client_id) else {
            return Duration::ZERO;
        };
        window.retain(|t| now.duration_since(*t) < self.cfg.window);
        if window.len() < self.cfg.max_requests {
            return Duration::ZERO;
        }
        match window.first() {
            Some(oldest) => (*oldest + self.cfg.window).saturating_duration_since(now),
            None => Duration::ZERO,
        }
    }
}
