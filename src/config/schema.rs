//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the API.
//! All types derive Serde traits for deserialization from config files.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Placeholder secrets accepted only outside production.
pub const DEV_SESSION_SECRET: &str = "dev-session-secret-change-me-in-production";
pub const DEV_JWT_SECRET: &str = "dev-jwt-secret-change-me-in-production";

/// Root configuration for the API server.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ApiConfig {
    /// Listener and deployment mode.
    pub server: ServerConfig,

    /// Cross-origin allow-list.
    pub cors: CorsConfig,

    /// Session cookie and store settings.
    pub session: SessionConfig,

    /// Rate limiting configuration.
    pub rate_limit: RateLimitConfig,

    /// Token issuing and verification.
    pub auth: AuthConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Deployment mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Development,
    Test,
    Production,
}

impl Mode {
    pub fn is_production(self) -> bool {
        matches!(self, Mode::Production)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Development => "development",
            Mode::Test => "test",
            Mode::Production => "production",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Ok(Mode::Production),
            "development" | "dev" => Ok(Mode::Development),
            "test" => Ok(Mode::Test),
            other => Err(format!("unknown mode '{}'", other)),
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Interface to bind (e.g., "0.0.0.0").
    pub host: String,

    /// Listening port.
    pub port: u16,

    /// Deployment mode.
    pub mode: Mode,

    /// Request timeout (total time for request/response) in seconds.
    pub request_timeout_secs: u64,

    /// Maximum accepted request body in bytes.
    pub max_body_bytes: usize,

    /// Reverse proxies in front of the API that append to `X-Forwarded-For`.
    /// Honoured in production only; 0 disables forwarded-header trust.
    pub trusted_proxy_hops: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            mode: Mode::Development,
            request_timeout_secs: 30,
            max_body_bytes: 10 * 1024 * 1024, // 10MB
            trusted_proxy_hops: 1,
        }
    }
}

/// Cross-origin configuration.
///
/// Entries are exact origins (`https://app.example.com`) or patterns
/// prefixed with `regex:`. Order matters: first match wins.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,

    /// Preflight cache lifetime in seconds.
    pub max_age_secs: u64,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec![
                "http://localhost:3000".to_string(),
                "http://localhost:5173".to_string(),
                "https://www.example.com".to_string(),
                r"regex:^https?://localhost(:\d+)?$".to_string(),
                r"regex:^https://([a-z0-9-]+\.)*example\.com$".to_string(),
            ],
            max_age_secs: 24 * 60 * 60,
        }
    }
}

/// Session configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Key used to sign the session cookie.
    pub secret: String,

    /// Session cookie name.
    pub cookie_name: String,

    /// Sliding expiry in seconds.
    pub ttl_secs: u64,

    /// Interval between expired-session sweeps in seconds.
    pub sweep_interval_secs: u64,

    /// Cookie domain used in production.
    pub production_domain: String,

    /// Cookie domain used outside production.
    pub development_domain: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            secret: DEV_SESSION_SECRET.to_string(),
            cookie_name: "sid".to_string(),
            ttl_secs: 2 * 60 * 60,
            sweep_interval_secs: 15 * 60,
            production_domain: "example.com".to_string(),
            development_domain: "localhost".to_string(),
        }
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting.
    pub enabled: bool,

    /// Window length in milliseconds.
    pub window_ms: u64,

    /// Maximum requests per client per window.
    pub max_requests: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            window_ms: 15 * 60 * 1000,
            max_requests: 100,
        }
    }
}

/// Token configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// HS256 signing secret for access and refresh tokens.
    pub jwt_secret: String,

    pub access_token_ttl_secs: u64,

    pub refresh_token_ttl_secs: u64,

    /// Lifetime of the remember-me cookie and its stored token.
    pub remember_token_ttl_days: u32,

    pub remember_cookie_name: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: DEV_JWT_SECRET.to_string(),
            access_token_ttl_secs: 15 * 60,
            refresh_token_ttl_secs: 7 * 24 * 60 * 60,
            remember_token_ttl_days: 30,
            remember_cookie_name: "remember_token".to_string(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Default log filter when `RUST_LOG` is unset. Empty means per-mode default.
    pub log_filter: String,

    /// Enable the Prometheus scrape endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_filter: String::new(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
