//! `/api/test`: diagnostics, mounted only outside production.

use axum::{response::IntoResponse, routing::{get, post}, Router};
use chrono::Utc;
use serde_json::{json, Value};

use crate::auth::MaybeUser;
use crate::http::response::ok;
use crate::http::{ApiBody, ApiError, AppState};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/ping", get(ping))
        .route("/echo", post(echo))
        .route("/error", get(force_error))
        .route("/panic", get(force_panic))
        .route("/whoami", get(whoami))
}

async fn ping() -> impl IntoResponse {
    ok(json!({ "message": "pong", "timestamp": Utc::now().to_rfc3339() }))
}

async fn echo(ApiBody(body): ApiBody<Value>) -> impl IntoResponse {
    ok(body)
}

async fn force_error() -> Result<(), ApiError> {
    Err(ApiError::internal_with(
        "Forced test error",
        std::io::Error::new(std::io::ErrorKind::Other, "simulated downstream failure"),
    ))
}

async fn force_panic() -> &'static str {
    panic!("forced test panic")
}

async fn whoami(MaybeUser(user): MaybeUser) -> impl IntoResponse {
    ok(json!({ "authenticated": user.is_some(), "user": user }))
}
