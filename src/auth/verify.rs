//! Stage 1: access-token verification.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderName},
    middleware::Next,
    response::Response,
};

use crate::auth::identity::{Identity, IdentitySource};
use crate::auth::token::TokenKind;
use crate::http::AppState;

pub const ACCESS_TOKEN_HEADER: HeaderName = HeaderName::from_static("x-access-token");
pub const REFRESH_TOKEN_HEADER: HeaderName = HeaderName::from_static("x-refresh-token");

/// Attach an `Identity` when the request carries a valid access token.
///
/// Bad or expired tokens never fail the request; the request simply
/// continues anonymously.
pub async fn verify_token(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let identity = access_token(request.headers()).and_then(|token| {
        match state.tokens.verify(token, TokenKind::Access) {
            Ok(claims) => Some(Identity {
                user_id: claims.sub,
                source: IdentitySource::AccessToken,
            }),
            Err(e) => {
                tracing::debug!(error = %e, "Access token rejected");
                None
            }
        }
    });

    if let Some(identity) = identity {
        request.extensions_mut().insert(identity);
    }
    next.run(request).await
}

/// `Authorization: Bearer <token>` first, then `X-Access-Token`.
pub fn access_token(headers: &HeaderMap) -> Option<&str> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim);

    bearer
        .or_else(|| {
            headers
                .get(&ACCESS_TOKEN_HEADER)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
        })
        .filter(|token| !token.is_empty())
}
