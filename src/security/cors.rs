//! Cross-origin access control.
//!
//! # Responsibilities
//! - Decide whether an `Origin` may call the API with credentials
//! - Answer preflight (`OPTIONS`) requests without reaching any route
//! - Decorate allowed responses with the CORS response headers
//!
//! # Design Decisions
//! - Allow-list is ordered; first matching entry wins
//! - Requests without `Origin` are allowed (non-browser and server-to-server
//!   clients)
//! - Patterns are compiled once at startup and matched case-insensitively

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use regex_automata::meta::Regex;
use thiserror::Error;

use crate::http::error::ApiError;
use crate::observability::metrics;

const PATTERN_PREFIX: &str = "regex:";
const MAX_PATTERN_LENGTH: usize = 1_024;
const MAX_ORIGIN_LENGTH: usize = 4_096;

const ALLOWED_METHODS: &str = "GET, POST, PUT, PATCH, DELETE, OPTIONS";
const ALLOWED_HEADERS: &str =
    "Content-Type, Authorization, X-Access-Token, X-Refresh-Token, X-XSRF-Token, X-Requested-With, Accept";
const EXPOSED_HEADERS: &str =
    "X-Total-Count, X-Page, X-Per-Page, X-Access-Token, X-Refresh-Token, Set-Cookie";

#[derive(Debug, Error)]
pub enum PatternError {
    #[error("failed to compile origin pattern: {0}")]
    Build(#[from] Box<regex_automata::meta::BuildError>),

    #[error("origin pattern length {length} exceeds maximum allowed {max}")]
    TooLong { length: usize, max: usize },

    #[error("not an http(s) origin")]
    NotAnOrigin,
}

/// A single allow-list entry.
#[derive(Clone)]
pub enum OriginMatcher {
    Exact(String),
    Pattern(Regex),
}

impl fmt::Debug for OriginMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OriginMatcher::Exact(value) => f.debug_tuple("Exact").field(value).finish(),
            OriginMatcher::Pattern(_) => f.write_str("Pattern(..)"),
        }
    }
}

impl OriginMatcher {
    /// Parse a configured entry: `regex:<pattern>` or an exact origin.
    pub fn parse(entry: &str) -> Result<Self, PatternError> {
        match entry.strip_prefix(PATTERN_PREFIX) {
            Some(pattern) => Self::pattern(pattern),
            None => Self::exact(entry),
        }
    }

    fn exact(origin: &str) -> Result<Self, PatternError> {
        let parsed = url::Url::parse(origin).map_err(|_| PatternError::NotAnOrigin)?;
        if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
            return Err(PatternError::NotAnOrigin);
        }
        Ok(Self::Exact(origin.trim_end_matches('/').to_string()))
    }

    fn pattern(pattern: &str) -> Result<Self, PatternError> {
        if pattern.len() > MAX_PATTERN_LENGTH {
            return Err(PatternError::TooLong {
                length: pattern.len(),
                max: MAX_PATTERN_LENGTH,
            });
        }
        let regex = Regex::new(&format!("(?i:{})", pattern)).map_err(Box::new)?;
        Ok(Self::Pattern(regex))
    }

    pub fn matches(&self, origin: &str) -> bool {
        match self {
            OriginMatcher::Exact(value) => value.eq_ignore_ascii_case(origin),
            OriginMatcher::Pattern(regex) => regex.is_match(origin),
        }
    }
}

/// Outcome of evaluating a request's origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OriginDecision {
    /// No `Origin` header.
    NoOrigin,
    /// Origin matched an allow-list entry; echo it back.
    Allowed(HeaderValue),
    Denied,
}

/// Compiled allow-list plus the fixed header values.
#[derive(Debug, Clone)]
pub struct CorsPolicy {
    matchers: Vec<OriginMatcher>,
    max_age: HeaderValue,
}

impl CorsPolicy {
    pub fn new<I, S>(entries: I, max_age: Duration) -> Result<Self, PatternError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let matchers = entries
            .into_iter()
            .map(|entry| OriginMatcher::parse(entry.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            matchers,
            max_age: HeaderValue::from(max_age.as_secs()),
        })
    }

    pub fn authorize(&self, origin: Option<&HeaderValue>) -> OriginDecision {
        let Some(origin) = origin else {
            return OriginDecision::NoOrigin;
        };
        let Ok(candidate) = origin.to_str() else {
            return OriginDecision::Denied;
        };
        if candidate.len() > MAX_ORIGIN_LENGTH {
            return OriginDecision::Denied;
        }
        if self.matchers.iter().any(|m| m.matches(candidate)) {
            OriginDecision::Allowed(origin.clone())
        } else {
            OriginDecision::Denied
        }
    }

    fn preflight_response(&self, decision: &OriginDecision) -> Response {
        let mut response = StatusCode::NO_CONTENT.into_response();
        let headers = response.headers_mut();
        apply_origin_headers(headers, decision);
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static(ALLOWED_METHODS),
        );
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static(ALLOWED_HEADERS),
        );
        headers.insert(header::ACCESS_CONTROL_MAX_AGE, self.max_age.clone());
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from_static("0"));
        response
    }
}

fn apply_origin_headers(headers: &mut HeaderMap, decision: &OriginDecision) {
    if let OriginDecision::Allowed(origin) = decision {
        headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin.clone());
        headers.append(header::VARY, HeaderValue::from_static("Origin"));
    }
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
        HeaderValue::from_static("true"),
    );
}

/// CORS stage. Denied origins fail with `ApiError::CorsRejected`; `OPTIONS`
/// requests end here with `204 No Content`.
pub async fn cors_middleware(
    State(policy): State<Arc<CorsPolicy>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let decision = policy.authorize(request.headers().get(header::ORIGIN));

    if decision == OriginDecision::Denied {
        let origin = request
            .headers()
            .get(header::ORIGIN)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("<non-ascii>");
        tracing::warn!(
            origin = %origin,
            method = %request.method(),
            path = %request.uri().path(),
            "CORS request from disallowed origin"
        );
        metrics::record_cors_rejected();
        return ApiError::CorsRejected.into_response();
    }

    if request.method() == Method::OPTIONS {
        return policy.preflight_response(&decision);
    }

    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    apply_origin_headers(headers, &decision);
    headers.insert(
        header::ACCESS_CONTROL_EXPOSE_HEADERS,
        HeaderValue::from_static(EXPOSED_HEADERS),
    );
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CorsConfig;

    fn policy() -> CorsPolicy {
        let config = CorsConfig::default();
        CorsPolicy::new(&config.allowed_origins, Duration::from_secs(config.max_age_secs)).unwrap()
    }

    fn decide(origin: &str) -> OriginDecision {
        policy().authorize(Some(&HeaderValue::from_str(origin).unwrap()))
    }

    #[test]
    fn test_exact_origin_allowed() {
        assert!(matches!(decide("http://localhost:3000"), OriginDecision::Allowed(_)));
        assert!(matches!(decide("https://www.example.com"), OriginDecision::Allowed(_)));
    }

    #[test]
    fn test_pattern_origins() {
        assert!(matches!(decide("http://localhost:8123"), OriginDecision::Allowed(_)));
        assert!(matches!(decide("https://app.example.com"), OriginDecision::Allowed(_)));
        assert!(matches!(decide("https://a.b.example.com"), OriginDecision::Allowed(_)));
        assert!(matches!(decide("HTTPS://APP.EXAMPLE.COM"), OriginDecision::Allowed(_)));
    }

    #[test]
    fn test_unknown_origins_denied() {
        assert_eq!(decide("https://evil.test"), OriginDecision::Denied);
        assert_eq!(decide("https://example.com.evil.test"), OriginDecision::Denied);
        assert_eq!(decide("http://app.example.com"), OriginDecision::Denied);
        assert_eq!(decide("http://localhost.evil.test"), OriginDecision::Denied);
    }

    #[test]
    fn test_missing_origin_allowed() {
        assert_eq!(policy().authorize(None), OriginDecision::NoOrigin);
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(OriginMatcher::parse("regex:(["), Err(PatternError::Build(_))));
        assert!(matches!(OriginMatcher::parse("ftp://files.test"), Err(PatternError::NotAnOrigin)));
        assert!(matches!(OriginMatcher::parse("nonsense"), Err(PatternError::NotAnOrigin)));
        let long = format!("regex:{}", "a".repeat(MAX_PATTERN_LENGTH + 1));
        assert!(matches!(OriginMatcher::parse(&long), Err(PatternError::TooLong { .. })));
    }

    #[test]
    fn test_preflight_headers() {
        let policy = policy();
        let decision = OriginDecision::Allowed(HeaderValue::from_static("http://localhost:3000"));
        let response = policy.preflight_response(&decision);
        let headers = response.headers();

        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "http://localhost:3000");
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");
        assert_eq!(headers[header::ACCESS_CONTROL_MAX_AGE], "86400");
        assert!(headers[header::ACCESS_CONTROL_ALLOW_HEADERS]
            .to_str()
            .unwrap()
            .contains("X-Refresh-Token"));
    }

    #[test]
    fn test_exposed_headers_cover_tokens() {
        let exposed = EXPOSED_HEADERS.to_ascii_lowercase();
        for name in ["x-access-token", "x-refresh-token", "x-total-count", "set-cookie"] {
            assert!(exposed.contains(name), "{} not exposed", name);
        }
    }
}
