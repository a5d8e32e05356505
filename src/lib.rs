//! Property listing API server library.

pub mod auth;
pub mod config;
pub mod db;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod routes;
pub mod security;
pub mod session;

pub use config::{ApiConfig, Settings};
pub use http::{ApiServer, AppState};
pub use lifecycle::Shutdown;
