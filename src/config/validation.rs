//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (windows > 0, ports valid)
//! - Reject placeholder secrets in production
//! - Check that every CORS entry is a valid origin or compilable pattern
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ApiConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;

use crate::config::schema::{ApiConfig, DEV_JWT_SECRET, DEV_SESSION_SECRET};
use crate::security::cors::OriginMatcher;

const MIN_PRODUCTION_SECRET_LEN: usize = 32;
const MAX_PROXY_HOPS: usize = 8;

/// A single semantic problem with the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a fully merged configuration.
pub fn validate_config(config: &ApiConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let production = config.server.mode.is_production();

    if config.server.port == 0 {
        errors.push(ValidationError::new("server.port", "must be non-zero"));
    }
    if config.server.request_timeout_secs == 0 {
        errors.push(ValidationError::new("server.request_timeout_secs", "must be > 0"));
    }
    if config.server.max_body_bytes == 0 {
        errors.push(ValidationError::new("server.max_body_bytes", "must be > 0"));
    }
    if config.server.trusted_proxy_hops > MAX_PROXY_HOPS {
        errors.push(ValidationError::new(
            "server.trusted_proxy_hops",
            format!("must be <= {}", MAX_PROXY_HOPS),
        ));
    }

    if config.rate_limit.window_ms == 0 {
        errors.push(ValidationError::new("rate_limit.window_ms", "must be > 0"));
    }
    if config.rate_limit.max_requests == 0 {
        errors.push(ValidationError::new("rate_limit.max_requests", "must be > 0"));
    }

    if config.session.ttl_secs == 0 {
        errors.push(ValidationError::new("session.ttl_secs", "must be > 0"));
    }
    if config.session.sweep_interval_secs == 0 {
        errors.push(ValidationError::new("session.sweep_interval_secs", "must be > 0"));
    }
    if config.session.cookie_name.is_empty() {
        errors.push(ValidationError::new("session.cookie_name", "must not be empty"));
    }
    if production && config.session.production_domain.is_empty() {
        errors.push(ValidationError::new(
            "session.production_domain",
            "required in production",
        ));
    }

    check_secret(
        &mut errors,
        "session.secret",
        &config.session.secret,
        DEV_SESSION_SECRET,
        production,
    );
    check_secret(
        &mut errors,
        "auth.jwt_secret",
        &config.auth.jwt_secret,
        DEV_JWT_SECRET,
        production,
    );

    if config.auth.access_token_ttl_secs == 0 {
        errors.push(ValidationError::new("auth.access_token_ttl_secs", "must be > 0"));
    }
    if config.auth.refresh_token_ttl_secs <= config.auth.access_token_ttl_secs {
        errors.push(ValidationError::new(
            "auth.refresh_token_ttl_secs",
            "must outlive the access token",
        ));
    }

    for entry in &config.cors.allowed_origins {
        if let Err(e) = OriginMatcher::parse(entry) {
            errors.push(ValidationError::new(
                "cors.allowed_origins",
                format!("'{}': {}", entry, e),
            ));
        }
    }

    if config.observability.metrics_enabled
        && config
            .observability
            .metrics_address
            .parse::<std::net::SocketAddr>()
            .is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            "must be a socket address",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_secret(
    errors: &mut Vec<ValidationError>,
    field: &'static str,
    value: &str,
    placeholder: &str,
    production: bool,
) {
    if value.is_empty() {
        errors.push(ValidationError::new(field, "must not be empty"));
        return;
    }
    if production && value == placeholder {
        errors.push(ValidationError::new(field, "placeholder secret used in production"));
    } else if production && value.len() < MIN_PRODUCTION_SECRET_LEN {
        errors.push(ValidationError::new(
            field,
            format!("must be at least {} bytes in production", MIN_PRODUCTION_SECRET_LEN),
        ));
    }
}
