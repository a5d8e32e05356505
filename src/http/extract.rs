//! Body and query extraction with failures routed through `ApiError`.

use axum::{
    extract::{
        rejection::{FormRejection, JsonRejection},
        FromRequest, FromRequestParts, Query, Request,
    },
    http::{header, request::Parts},
    Form, Json,
};
use serde::de::DeserializeOwned;

use crate::http::error::ApiError;

/// `Json<T>` whose rejections render as `{ success: false, error }`.
///
/// Oversized bodies surface as 413 via the body-limit stage.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(ApiJson(value)),
            Err(rejection) => Err(rejection_to_error(rejection)),
        }
    }
}

fn rejection_to_error(rejection: JsonRejection) -> ApiError {
    ApiError::Status {
        status: rejection.status(),
        message: rejection.body_text(),
    }
}

fn form_rejection_to_error(rejection: FormRejection) -> ApiError {
    ApiError::Status {
        status: rejection.status(),
        message: rejection.body_text(),
    }
}

/// Request body as either `application/x-www-form-urlencoded` or JSON.
///
/// Url-encoded bodies go through `Form<T>`; anything else is treated as JSON,
/// so a missing or foreign content type still fails with 415.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiBody<T>(pub T);

impl<S, T> FromRequest<S> for ApiBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        if is_form(&req) {
            Form::<T>::from_request(req, state)
                .await
                .map(|Form(value)| ApiBody(value))
                .map_err(form_rejection_to_error)
        } else {
            ApiJson::<T>::from_request(req, state)
                .await
                .map(|ApiJson(value)| ApiBody(value))
        }
    }
}

fn is_form(req: &Request) -> bool {
    req.headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .is_some_and(|mime| {
            mime.trim()
                .eq_ignore_ascii_case("application/x-www-form-urlencoded")
        })
}

/// `Query<T>` whose rejections render as `400 { success: false, error }`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiQuery<T>(pub T);

impl<S, T> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Query::<T>::from_request_parts(parts, state)
            .await
            .map(|Query(value)| ApiQuery(value))
            .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))
    }
}
