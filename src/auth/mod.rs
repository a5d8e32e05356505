//! Authentication chain.
//!
//! # Data Flow
//! ```text
//! request
//!     → verify.rs   (access token → Identity)
//!     → remember.rs (remember cookie → Identity, fresh access token)
//!     → loader.rs   (Identity → CurrentUser, or anonymous)
//!     → route handlers (RequireUser / MaybeUser extractors)
//! ```
//!
//! # Design Decisions
//! - No stage rejects a request; handlers decide whether a user is required
//! - Each stage only reads what earlier stages attached to the request

pub mod identity;
pub mod loader;
pub mod password;
pub mod remember;
pub mod token;
pub mod verify;

pub use identity::{CurrentUser, Identity, IdentitySource, MaybeUser, RequireUser};
pub use loader::load_user;
pub use remember::check_remember_token;
pub use token::{TokenKind, TokenPair, TokenService};
pub use verify::verify_token;
