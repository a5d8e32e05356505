//! Request-scoped authentication state and the extractors handlers use.

use axum::{extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

use crate::db::User;
use crate::http::error::ApiError;

/// How the identity was established.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentitySource {
    AccessToken,
    RememberToken,
}

/// A verified claim that the request acts for `user_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    pub user_id: Uuid,
    pub source: IdentitySource,
}

/// The loaded user record, attached by the user loader.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

/// Fails with 401 when the request is anonymous.
#[derive(Debug, Clone)]
pub struct RequireUser(pub User);

impl<S> FromRequestParts<S> for RequireUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .map(|current| RequireUser(current.0.clone()))
            .ok_or(ApiError::Unauthorized)
    }
}

/// The current user if any; never rejects.
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<User>);

impl<S> FromRequestParts<S> for MaybeUser
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(MaybeUser(
            parts.extensions.get::<CurrentUser>().map(|current| current.0.clone()),
        ))
    }
}
