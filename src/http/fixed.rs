//! Endpoints served ahead of the authentication chain.

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::http::error::ApiError;
use crate::http::AppState;
use crate::session::Session;

pub const BANNER: &str = "Property API is running";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(banner))
        .route("/favicon.ico", get(favicon))
        .route("/health", get(health))
        .route("/api/session-test", get(session_test))
}

async fn banner() -> &'static str {
    BANNER
}

async fn favicon() -> StatusCode {
    StatusCode::NO_CONTENT
}

#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub timestamp: String,
    /// Seconds since startup, from a monotonic clock.
    pub uptime: f64,
    pub database: bool,
}

async fn health(State(state): State<AppState>) -> Json<HealthReport> {
    let database = match state.database.ping().await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(error = %e, "Database ping failed");
            false
        }
    };
    Json(HealthReport {
        status: if database { "ok" } else { "degraded" },
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        uptime: state.started_at.elapsed().as_secs_f64(),
        database,
    })
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SessionTest {
    message: &'static str,
    views: u64,
    session_id: String,
    session: Value,
}

async fn session_test(session: Session) -> Result<impl IntoResponse, ApiError> {
    let views = session.get::<u64>("views").unwrap_or(0) + 1;
    session
        .insert("views", views)
        .map_err(|e| ApiError::internal_with("Failed to update session", e))?;

    Ok(Json(SessionTest {
        message: "Session is working",
        views,
        session_id: session.id(),
        session: session.to_json(),
    }))
}
