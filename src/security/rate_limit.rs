//! Fixed-window rate limiting keyed by client address.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, HeaderName, HeaderValue, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;

use crate::config::Settings;
use crate::http::error::ApiError;
use crate::observability::metrics;
use crate::security::headers::client_ip;

const RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("ratelimit-limit");
const RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("ratelimit-remaining");
const RATELIMIT_RESET: HeaderName = HeaderName::from_static("ratelimit-reset");

/// Counter for one client within the current window.
#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    hits: u32,
}

/// Result of counting one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    /// Time until the window resets.
    pub reset_after: Duration,
}

impl RateDecision {
    fn write_headers(&self, headers: &mut HeaderMap) {
        let reset = self.reset_after.as_secs_f64().ceil() as u64;
        headers.insert(RATELIMIT_LIMIT, HeaderValue::from(self.limit));
        headers.insert(RATELIMIT_REMAINING, HeaderValue::from(self.remaining));
        headers.insert(RATELIMIT_RESET, HeaderValue::from(reset));
        if !self.allowed {
            headers.insert(axum::http::header::RETRY_AFTER, HeaderValue::from(reset));
        }
    }
}

/// Per-client request counters.
#[derive(Debug)]
pub struct RateLimiter {
    windows: DashMap<String, Window>,
    window: Duration,
    max_requests: u32,
    trusted_proxy_hops: usize,
}

impl RateLimiter {
    pub fn new(window: Duration, max_requests: u32, trusted_proxy_hops: usize) -> Self {
        Self {
            windows: DashMap::new(),
            window,
            max_requests,
            trusted_proxy_hops,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            settings.rate_limit_window,
            settings.rate_limit_max,
            settings.trusted_proxy_hops,
        )
    }

    /// Count a request from `client` at `now`.
    pub fn check_at(&self, client: &str, now: Instant) -> RateDecision {
        let mut entry = self.windows.entry(client.to_string()).or_insert(Window {
            started: now,
            hits: 0,
        });
        if now.duration_since(entry.started) >= self.window {
            *entry = Window {
                started: now,
                hits: 0,
            };
        }
        entry.hits = entry.hits.saturating_add(1);

        let elapsed = now.duration_since(entry.started);
        RateDecision {
            allowed: entry.hits <= self.max_requests,
            limit: self.max_requests,
            remaining: self.max_requests.saturating_sub(entry.hits),
            reset_after: self.window.saturating_sub(elapsed),
        }
    }

    pub fn check(&self, client: &str) -> RateDecision {
        self.check_at(client, Instant::now())
    }

    /// Drop windows that have already elapsed. Returns how many were removed.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let before = self.windows.len();
        self.windows
            .retain(|_, w| now.duration_since(w.started) < self.window);
        before.saturating_sub(self.windows.len())
    }

    pub fn tracked_clients(&self) -> usize {
        self.windows.len()
    }

    fn client_key<B>(&self, request: &Request<B>) -> String {
        client_ip(request, self.trusted_proxy_hops)
            .map(|ip: IpAddr| ip.to_string())
            .unwrap_or_else(|| "unknown".to_string())
    }
}

/// Rate-limit stage.
pub async fn rate_limit_middleware(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let client = limiter.client_key(&request);
    let decision = limiter.check(&client);

    if !decision.allowed {
        tracing::warn!(
            client = %client,
            path = %request.uri().path(),
            limit = decision.limit,
            "Rate limit exceeded"
        );
        metrics::record_rate_limited();
        let mut response = ApiError::RateLimited.into_response();
        decision.write_headers(response.headers_mut());
        return response;
    }

    let mut response = next.run(request).await;
    decision.write_headers(response.headers_mut());
    response
}
