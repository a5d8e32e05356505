//! Periodic cleanup of expired sessions and rate-limit windows.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{interval_at, Instant};

use crate::lifecycle::shutdown::ShutdownListener;
use crate::observability::metrics;
use crate::security::RateLimiter;
use crate::session::SessionStore;

/// Background reaper. Runs until shutdown is triggered.
pub struct Sweeper {
    sessions: Arc<dyn SessionStore>,
    rate_limiter: Arc<RateLimiter>,
    every: Duration,
}

impl Sweeper {
    pub fn new(sessions: Arc<dyn SessionStore>, rate_limiter: Arc<RateLimiter>, every: Duration) -> Self {
        Self {
            sessions,
            rate_limiter,
            every,
        }
    }

    /// One sweep pass.
    pub async fn sweep_once(&self) {
        match self.sessions.sweep().await {
            Ok(removed) => {
                metrics::record_sessions_swept(removed);
                tracing::debug!(removed, "Swept expired sessions");
            }
            Err(e) => tracing::warn!(error = %e, "Session sweep failed"),
        }
        let windows = self.rate_limiter.sweep();
        tracing::debug!(removed = windows, "Swept expired rate-limit windows");
    }

    pub async fn run(self, mut shutdown: ShutdownListener) {
        let mut ticker = interval_at(Instant::now() + self.every, self.every);
        tracing::info!(interval_secs = self.every.as_secs(), "Sweeper started");
        loop {
            tokio::select! {
                _ = ticker.tick() => self.sweep_once().await,
                _ = shutdown.wait() => {
                    tracing::info!("Sweeper stopping");
                    return;
                }
            }
        }
    }
}
