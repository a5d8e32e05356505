//! `/api/auth`: login, token refresh, logout and the current user.

use std::time::Duration;

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, HeaderValue, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_cookies::Cookies;

use crate::auth::password::verify_password;
use crate::auth::remember::{remember_cookie, removal_cookie};
use crate::auth::verify::{ACCESS_TOKEN_HEADER, REFRESH_TOKEN_HEADER};
use crate::auth::{RequireUser, TokenKind, TokenPair};
use crate::db::User;
use crate::http::response::ok;
use crate::http::{ApiBody, ApiError, AppState};
use crate::security::headers::is_https;
use crate::session::Session;

/// Session key holding the logged-in user's id.
pub const SESSION_USER_KEY: &str = "userId";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/login", post(login))
        .route("/refresh", post(refresh))
        .route("/logout", post(logout))
        .route("/me", get(me))
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub remember: bool,
}

#[derive(Debug, Serialize)]
struct LoginResponse {
    user: User,
    #[serde(flatten)]
    tokens: TokenPair,
}

fn invalid_credentials() -> ApiError {
    ApiError::Status {
        status: StatusCode::UNAUTHORIZED,
        message: "Invalid email or password".to_string(),
    }
}

/// Attach both tokens as response headers.
fn with_token_headers(mut response: Response, tokens: &TokenPair) -> Response {
    let headers = response.headers_mut();
    for (name, value) in [
        (ACCESS_TOKEN_HEADER, &tokens.access_token),
        (REFRESH_TOKEN_HEADER, &tokens.refresh_token),
    ] {
        if let Ok(value) = HeaderValue::from_str(value) {
            headers.insert(name, value);
        }
    }
    response
}

async fn login(
    State(state): State<AppState>,
    session: Session,
    cookies: Cookies,
    headers: HeaderMap,
    uri: Uri,
    ApiBody(body): ApiBody<LoginRequest>,
) -> Result<Response, ApiError> {
    let email = body.email.trim().to_lowercase();
    let user = state
        .users
        .find_by_email(&email)
        .await?
        .filter(|user| verify_password(&body.password, &user.password_hash))
        .ok_or_else(|| {
            tracing::debug!(email = %email, "Login rejected");
            invalid_credentials()
        })?;

    // New id on privilege change.
    session.cycle_id();
    session
        .insert(SESSION_USER_KEY, user.id)
        .map_err(|e| ApiError::internal_with("Failed to update session", e))?;

    if body.remember {
        let ttl = Duration::from_secs(u64::from(state.settings.auth.remember_token_ttl_days) * 86_400);
        let token = state.remember_tokens.issue(user.id, ttl).await?;
        let https = is_https(&headers, &uri, state.settings.trust_proxy);
        cookies.add(remember_cookie(&state.settings, token, https));
    }

    let tokens = state.tokens.issue_pair(user.id)?;
    tracing::info!(user_id = %user.id, remember = body.remember, "User logged in");

    let response = ok(LoginResponse {
        user,
        tokens: tokens.clone(),
    })
    .into_response();
    Ok(with_token_headers(response, &tokens))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest {
    refresh_token: Option<String>,
}

/// Refresh token from `X-Refresh-Token`, else from the JSON body.
fn refresh_token(headers: &HeaderMap, body: &[u8]) -> Result<String, ApiError> {
    if let Some(token) = headers
        .get(&REFRESH_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
    {
        return Ok(token.to_string());
    }
    let parsed: RefreshRequest = if body.is_empty() {
        RefreshRequest::default()
    } else {
        serde_json::from_slice(body).map_err(|e| ApiError::BadRequest(e.to_string()))?
    };
    parsed
        .refresh_token
        .ok_or_else(|| ApiError::BadRequest("Refresh token is required".to_string()))
}

async fn refresh(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let token = refresh_token(&headers, &body)?;
    let claims = state.tokens.verify(&token, TokenKind::Refresh)?;

    // Tokens outlive deleted accounts.
    if state.users.find_by_id(claims.sub).await?.is_none() {
        return Err(ApiError::Unauthorized);
    }

    let tokens = state.tokens.issue_pair(claims.sub)?;
    let response = ok(tokens.clone()).into_response();
    Ok(with_token_headers(response, &tokens))
}

async fn logout(
    State(state): State<AppState>,
    session: Session,
    cookies: Cookies,
) -> Result<impl IntoResponse, ApiError> {
    let name = &state.settings.auth.remember_cookie_name;
    if let Some(token) = cookies.get(name).map(|c| c.value().to_string()) {
        state.remember_tokens.revoke(&token).await?;
        cookies.remove(removal_cookie(&state.settings));
    }
    session.destroy();
    Ok(ok(json!({ "message": "Logged out" })))
}

async fn me(RequireUser(user): RequireUser) -> impl IntoResponse {
    ok(user)
}
