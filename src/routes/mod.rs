//! Sub-routers mounted under `/api`.
//!
//! Each router owns one path prefix. Handlers talk to the repositories in
//! `AppState` and fail with `ApiError`; they never render errors themselves.

pub mod auth;
pub mod properties;
pub mod search;
pub mod testing;
pub mod users;

use axum::Router;
use uuid::Uuid;

use crate::config::Settings;
use crate::http::{ApiError, AppState};

/// Every `/api/*` router. `/api/test` is left out when test routes are off.
pub fn api_router(settings: &Settings) -> Router<AppState> {
    let router = Router::new()
        .nest("/api/auth", auth::router())
        .nest("/api/users", users::router())
        .nest("/api/search", search::router())
        .nest("/api/properties", properties::router());

    if settings.mount_test_routes {
        router.nest("/api/test", testing::router())
    } else {
        router
    }
}

pub async fn not_found() -> ApiError {
    ApiError::RouteNotFound
}

/// Parse a path id, rejecting malformed ones with 400.
pub(crate) fn parse_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::BadRequest(format!("Invalid id: {}", raw)))
}
