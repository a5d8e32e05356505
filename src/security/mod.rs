//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → cors.rs (origin allow-list, preflight short-circuit)
//!     → headers.rs (hardening headers on the way out)
//!     → rate_limit.rs (fixed window per client address)
//!     → Pass to cookies/session/auth
//! ```
//!
//! # Design Decisions
//! - Fail closed: a disallowed origin or exhausted window never reaches a route
//! - No trust in `X-Forwarded-*` unless the deployment sits behind a proxy

pub mod cors;
pub mod headers;
pub mod rate_limit;

pub use cors::{cors_middleware, CorsPolicy, OriginMatcher};
pub use rate_limit::{rate_limit_middleware, RateLimiter};
