//! Cookie-backed server-side sessions.
//!
//! # Data Flow
//! ```text
//! sid cookie (signed id)
//!     → signing.rs (verify HMAC, recover id)
//!     → store.rs (load live record)
//!     → handle.rs (Session attached to the request)
//!     → handlers read/write the Session
//!     → middleware.rs (save with fresh expiry, re-issue cookie, or destroy)
//! ```
//!
//! # Design Decisions
//! - Storage sits behind `SessionStore`; the bundled store is process-local
//!   and loses everything on restart
//! - Bad signatures are treated exactly like a missing cookie
//! - Expired sessions are reaped by the background sweeper

pub mod handle;
pub mod middleware;
pub mod signing;
pub mod store;

pub use handle::Session;
pub use middleware::{resolve_session, SessionManager};
pub use store::{MemorySessionStore, SessionRecord, SessionStore};
