//! Stage 2: remember-token check.

use axum::{
    extract::{Request, State},
    http::HeaderValue,
    middleware::Next,
    response::Response,
};
use tower_cookies::{cookie::time, Cookie, Cookies};

use crate::auth::identity::{Identity, IdentitySource};
use crate::auth::token::TokenKind;
use crate::auth::verify::ACCESS_TOKEN_HEADER;
use crate::config::{CookieSecurity, Settings};
use crate::http::AppState;

/// Re-establish identity from the remember-me cookie when no access token did.
///
/// A successful check also hands the client a fresh access token in
/// `X-Access-Token`. Unknown or expired remember tokens clear the cookie.
pub async fn check_remember_token(
    State(state): State<AppState>,
    cookies: Cookies,
    mut request: Request,
    next: Next,
) -> Response {
    if request.extensions().get::<Identity>().is_some() {
        return next.run(request).await;
    }

    let name = &state.settings.auth.remember_cookie_name;
    let Some(token) = cookies.get(name).map(|c| c.value().to_string()) else {
        return next.run(request).await;
    };

    let mut reissued = None;
    match state.remember_tokens.resolve(&token).await {
        Ok(Some(user_id)) => {
            request.extensions_mut().insert(Identity {
                user_id,
                source: IdentitySource::RememberToken,
            });
            match state.tokens.issue(user_id, TokenKind::Access) {
                Ok(access) => reissued = Some(access),
                Err(e) => tracing::warn!(error = %e, "Failed to re-issue access token"),
            }
            tracing::debug!(user_id = %user_id, "Identity restored from remember token");
        }
        Ok(None) => {
            tracing::debug!("Unknown or expired remember token, clearing cookie");
            cookies.remove(removal_cookie(&state.settings));
        }
        Err(e) => {
            tracing::warn!(error = %e, "Remember token lookup failed");
        }
    }

    let mut response = next.run(request).await;
    if let Some(access) = reissued.and_then(|t| HeaderValue::from_str(&t).ok()) {
        response.headers_mut().insert(ACCESS_TOKEN_HEADER, access);
    }
    response
}

/// The remember-me cookie, sharing the session cookie's attributes.
pub fn remember_cookie(settings: &Settings, token: String, https: bool) -> Cookie<'static> {
    let policy = &settings.session_cookie;
    let days = i64::from(settings.auth.remember_token_ttl_days);
    Cookie::build((settings.auth.remember_cookie_name.clone(), token))
        .path("/")
        .domain(policy.domain.clone())
        .http_only(true)
        .same_site(policy.same_site)
        .secure(policy.secure == CookieSecurity::Always || https)
        .max_age(time::Duration::days(days))
        .build()
}

/// Cookie matching `remember_cookie` for removal.
pub fn removal_cookie(settings: &Settings) -> Cookie<'static> {
    Cookie::build((settings.auth.remember_cookie_name.clone(), ""))
        .path("/")
        .domain(settings.session_cookie.domain.clone())
        .build()
}
