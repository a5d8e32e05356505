//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! defaults (schema.rs)
//!     → optional TOML file (loader.rs)
//!     → environment overrides (loader.rs)
//!     → validation.rs (semantic checks)
//!     → settings.rs (mode-dependent values resolved once)
//!     → Settings shared via Arc to every pipeline stage
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; there is no hot reload
//! - All fields have defaults to allow an empty or missing config file
//! - Stages branch on `Settings` fields, never on raw environment lookups

pub mod loader;
pub mod schema;
pub mod settings;
pub mod validation;

pub use loader::{apply_env_overrides, load_config, ConfigError};
pub use schema::{
    ApiConfig, AuthConfig, CorsConfig, Mode, ObservabilityConfig, RateLimitConfig, ServerConfig,
    SessionConfig,
};
pub use settings::{CookieSecurity, SessionCookiePolicy, Settings};
