//! Security response headers and reverse-proxy header trust.
//!
//! # Responsibilities
//! - Add hardening headers to every response
//! - Derive the client address and scheme, honouring `X-Forwarded-*`
//!   only when the deployment sits behind a trusted proxy
//!
//! # Design Decisions
//! - Headers are added only if a handler did not set them already
//! - Never trust `X-Forwarded-*` unless proxy trust is on

use std::net::{IpAddr, SocketAddr};

use axum::{
    extract::ConnectInfo,
    http::{header, HeaderMap, HeaderName, HeaderValue, Request, Uri},
};

/// Hardening headers applied by the security-headers stage.
pub const SECURITY_HEADERS: [(HeaderName, HeaderValue); 10] = [
    (
        header::CONTENT_SECURITY_POLICY,
        HeaderValue::from_static("default-src 'self'; frame-ancestors 'self'; object-src 'none'"),
    ),
    (
        HeaderName::from_static("cross-origin-opener-policy"),
        HeaderValue::from_static("same-origin"),
    ),
    // The API is read by a frontend on another origin.
    (
        HeaderName::from_static("cross-origin-resource-policy"),
        HeaderValue::from_static("cross-origin"),
    ),
    (
        HeaderName::from_static("origin-agent-cluster"),
        HeaderValue::from_static("?1"),
    ),
    (header::REFERRER_POLICY, HeaderValue::from_static("no-referrer")),
    (
        header::STRICT_TRANSPORT_SECURITY,
        HeaderValue::from_static("max-age=15552000; includeSubDomains"),
    ),
    (header::X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff")),
    (header::X_DNS_PREFETCH_CONTROL, HeaderValue::from_static("off")),
    (header::X_FRAME_OPTIONS, HeaderValue::from_static("SAMEORIGIN")),
    (header::X_XSS_PROTECTION, HeaderValue::from_static("0")),
];

const X_FORWARDED_FOR: &str = "x-forwarded-for";
const X_FORWARDED_PROTO: &str = "x-forwarded-proto";

/// Client address used for rate limiting and logs.
///
/// Each trusted proxy appends the address it received the request from, so
/// with `trusted_hops` proxies the client is the `trusted_hops`-th entry from
/// the right. Entries further left are client-supplied and ignored. If the
/// header holds fewer entries, the left-most one is used. Without trust, or if
/// the chosen entry is missing or malformed, the socket peer address.
pub fn client_ip<B>(request: &Request<B>, trusted_hops: usize) -> Option<IpAddr> {
    if trusted_hops > 0 {
        let forwarded = request
            .headers()
            .get(X_FORWARDED_FOR)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| forwarded_client(v, trusted_hops));
        if forwarded.is_some() {
            return forwarded;
        }
    }
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
}

fn forwarded_client(header: &str, trusted_hops: usize) -> Option<IpAddr> {
    let entries: Vec<&str> = header.split(',').map(str::trim).collect();
    let index = entries.len().saturating_sub(trusted_hops);
    entries.get(index)?.parse().ok()
}

/// Whether the client reached us over https.
pub fn is_https(headers: &HeaderMap, uri: &Uri, trust_proxy: bool) -> bool {
    if uri.scheme_str() == Some("https") {
        return true;
    }
    trust_proxy
        && headers
            .get(X_FORWARDED_PROTO)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .is_some_and(|proto| proto.trim().eq_ignore_ascii_case("https"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    fn request(forwarded_for: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri("/");
        if let Some(value) = forwarded_for {
            builder = builder.header(X_FORWARDED_FOR, value);
        }
        let mut req = builder.body(Body::empty()).unwrap();
        req.extensions_mut()
            .insert(ConnectInfo("10.0.0.1:4000".parse::<SocketAddr>().unwrap()));
        req
    }

    #[test]
    fn test_forwarded_for_ignored_without_trust() {
        let req = request(Some("203.0.113.9"));
        assert_eq!(client_ip(&req, 0), Some("10.0.0.1".parse().unwrap()));
    }

    #[test]
    fn test_forwarded_for_uses_entry_appended_by_proxy() {
        let req = request(Some("198.18.0.1, 203.0.113.9"));
        assert_eq!(client_ip(&req, 1), Some("203.0.113.9".parse().unwrap()));
    }

    #[test]
    fn test_forwarded_for_counts_trusted_hops_from_right() {
        let req = request(Some("198.18.0.1, 203.0.113.9, 10.1.0.4"));
        assert_eq!(client_ip(&req, 2), Some("203.0.113.9".parse().unwrap()));

        let short = request(Some("203.0.113.9"));
        assert_eq!(client_ip(&short, 3), Some("203.0.113.9".parse().unwrap()));
    }

    #[test]
    fn test_spoofed_prefix_does_not_change_identity() {
        for spoof in ["10.9.9.1", "10.9.9.2", "garbage"] {
            let header = format!("{}, 203.0.113.50", spoof);
            let req = request(Some(header.as_str()));
            assert_eq!(client_ip(&req, 1), Some("203.0.113.50".parse().unwrap()));
        }
    }

    #[test]
    fn test_malformed_forwarded_for_falls_back() {
        let req = request(Some("garbage"));
        assert_eq!(client_ip(&req, 1), Some("10.0.0.1".parse().unwrap()));
    }

    #[test]
    fn test_https_detection() {
        let mut headers = HeaderMap::new();
        headers.insert(X_FORWARDED_PROTO, HeaderValue::from_static("https"));
        let uri: Uri = "/".parse().unwrap();

        assert!(!is_https(&headers, &uri, false));
        assert!(is_https(&headers, &uri, true));
        assert!(!is_https(&HeaderMap::new(), &uri, true));
    }
}
