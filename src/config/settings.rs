//! Resolved runtime settings.
//!
//! Every value that depends on the deployment mode is computed here once, so
//! pipeline stages read plain fields instead of re-deriving them per request.

use std::time::Duration;

use tower_cookies::cookie::SameSite;

use crate::config::schema::{ApiConfig, AuthConfig, Mode, ObservabilityConfig};

/// How the `Secure` cookie attribute is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CookieSecurity {
    /// Always set `Secure`.
    Always,
    /// Set `Secure` only when the request arrived over https.
    Auto,
}

/// Attributes of the session cookie.
#[derive(Debug, Clone)]
pub struct SessionCookiePolicy {
    pub name: String,
    pub secure: CookieSecurity,
    pub same_site: SameSite,
    pub domain: String,
    pub http_only: bool,
    pub ttl: Duration,
}

/// Settings consumed by the pipeline, derived from a validated `ApiConfig`.
#[derive(Debug, Clone)]
pub struct Settings {
    pub mode: Mode,
    pub bind_address: String,
    pub request_timeout: Duration,
    pub max_body_bytes: usize,

    /// Honour `X-Forwarded-*` headers from a reverse proxy.
    pub trust_proxy: bool,
    /// Trusted proxies appending to `X-Forwarded-For`; 0 when untrusted.
    pub trusted_proxy_hops: usize,
    /// Per-request logging via `TraceLayer`.
    pub request_logging: bool,
    /// Surface error messages and source chains to clients.
    pub expose_error_details: bool,
    /// Mount the `/api/test` utilities.
    pub mount_test_routes: bool,

    pub cors_origins: Vec<String>,
    pub cors_max_age: Duration,

    pub session_cookie: SessionCookiePolicy,
    pub session_secret: Vec<u8>,
    pub session_sweep_interval: Duration,

    pub rate_limit_enabled: bool,
    pub rate_limit_window: Duration,
    pub rate_limit_max: u32,

    pub auth: AuthConfig,
    pub observability: ObservabilityConfig,
}

impl Settings {
    pub fn from_config(config: &ApiConfig) -> Self {
        let mode = config.server.mode;
        let production = mode.is_production();

        let session_cookie = SessionCookiePolicy {
            name: config.session.cookie_name.clone(),
            secure: if production {
                CookieSecurity::Always
            } else {
                CookieSecurity::Auto
            },
            // Frontend and API live on different sites in production.
            same_site: if production { SameSite::None } else { SameSite::Lax },
            domain: if production {
                config.session.production_domain.clone()
            } else {
                config.session.development_domain.clone()
            },
            http_only: true,
            ttl: Duration::from_secs(config.session.ttl_secs),
        };

        let trusted_proxy_hops = if production {
            config.server.trusted_proxy_hops
        } else {
            0
        };

        Self {
            mode,
            bind_address: format!("{}:{}", config.server.host, config.server.port),
            request_timeout: Duration::from_secs(config.server.request_timeout_secs),
            max_body_bytes: config.server.max_body_bytes,
            trust_proxy: trusted_proxy_hops > 0,
            trusted_proxy_hops,
            request_logging: !production,
            expose_error_details: !production,
            mount_test_routes: !production,
            cors_origins: config.cors.allowed_origins.clone(),
            cors_max_age: Duration::from_secs(config.cors.max_age_secs),
            session_cookie,
            session_secret: config.session.secret.as_bytes().to_vec(),
            session_sweep_interval: Duration::from_secs(config.session.sweep_interval_secs),
            rate_limit_enabled: config.rate_limit.enabled,
            rate_limit_window: Duration::from_millis(config.rate_limit.window_ms),
            rate_limit_max: config.rate_limit.max_requests,
            auth: config.auth.clone(),
            observability: config.observability.clone(),
        }
    }

    pub fn is_production(&self) -> bool {
        self.mode.is_production()
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::from_config(&ApiConfig::default())
    }
}
