//! Failure type shared by every stage and the terminal error handler.
//!
//! Stages and handlers fail by returning `ApiError`. Its response carries an
//! `ErrorReport` extension; `handle_errors`, registered once as the outermost
//! stage, takes that report out and renders the final body for the current
//! mode. Responses without a report pass through untouched.

use std::any::Any;
use std::error::Error as StdError;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::auth::token::TokenError;
use crate::config::Settings;
use crate::db::StoreError;

/// Message shown instead of internal details in production.
pub const GENERIC_ERROR: &str = "Internal server error";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Not allowed by CORS")]
    CorsRejected,

    #[error("Too many requests, please try again later.")]
    RateLimited,

    #[error("Authentication required")]
    Unauthorized,

    #[error("{0}")]
    Forbidden(String),

    #[error("Route not found")]
    RouteNotFound,

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    /// Failure with an explicitly declared status.
    #[error("{message}")]
    Status { status: StatusCode, message: String },

    #[error("{message}")]
    Internal {
        message: String,
        #[source]
        source: Option<Box<dyn StdError + Send + Sync>>,
    },

    #[error("database error")]
    Store(#[from] StoreError),

    #[error("invalid token")]
    Token(#[from] TokenError),
}

impl ApiError {
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
            source: None,
        }
    }

    pub fn internal_with<E>(message: impl Into<String>, source: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self::Internal {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::CorsRejected => StatusCode::FORBIDDEN,
            ApiError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::RouteNotFound | ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Status { status, .. } => *status,
            ApiError::Token(_) => StatusCode::UNAUTHORIZED,
            ApiError::Internal { .. } | ApiError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn report(&self) -> ErrorReport {
        let mut chain = Vec::new();
        let mut source = self.source();
        while let Some(err) = source {
            chain.push(err.to_string());
            source = err.source();
        }
        ErrorReport {
            status: self.status(),
            message: self.to_string(),
            chain,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let report = self.report();
        let mut response = (
            report.status,
            Json(ErrorBody {
                success: false,
                error: &report.message,
                stack: Vec::new(),
            }),
        )
            .into_response();
        response.extensions_mut().insert(report);
        response
    }
}

/// Failure details travelling with a response until the error handler.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub status: StatusCode,
    pub message: String,
    pub chain: Vec<String>,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    success: bool,
    error: &'a str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    stack: Vec<String>,
}

/// Render the client-facing body for a report.
pub fn render_error(report: &ErrorReport, expose_details: bool) -> Vec<u8> {
    let redact = !expose_details && report.status.is_server_error();
    let body = ErrorBody {
        success: false,
        error: if redact { GENERIC_ERROR } else { &report.message },
        stack: if expose_details {
            report.chain.clone()
        } else {
            Vec::new()
        },
    };
    serde_json::to_vec(&body).unwrap_or_else(|_| {
        format!(r#"{{"success":false,"error":"{}"}}"#, GENERIC_ERROR).into_bytes()
    })
}

/// Terminal error stage.
pub async fn handle_errors(
    State(settings): State<Arc<Settings>>,
    request: Request,
    next: Next,
) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let mut response = next.run(request).await;
    let Some(report) = response.extensions_mut().remove::<ErrorReport>() else {
        return response;
    };

    if report.status.is_server_error() {
        tracing::error!(
            method = %method,
            path = %path,
            status = report.status.as_u16(),
            error = %report.message,
            chain = ?report.chain,
            "Request failed"
        );
    } else {
        tracing::debug!(
            method = %method,
            path = %path,
            status = report.status.as_u16(),
            error = %report.message,
            "Request rejected"
        );
    }

    let body = render_error(&report, settings.expose_error_details);
    let (mut parts, _) = response.into_parts();
    parts.status = report.status;
    parts.headers.remove(header::CONTENT_LENGTH);
    parts.headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    Response::from_parts(parts, Body::from(body))
}

/// Convert a caught panic into a 500 that flows through `handle_errors`.
pub fn panic_response(payload: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    };
    ApiError::internal(format!("handler panicked: {}", detail)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(status: StatusCode, message: &str) -> ErrorReport {
        ErrorReport {
            status,
            message: message.to_string(),
            chain: vec!["connection reset".to_string()],
        }
    }

    fn parse(bytes: Vec<u8>) -> serde_json::Value {
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_production_redacts_server_errors() {
        let body = parse(render_error(
            &report(StatusCode::INTERNAL_SERVER_ERROR, "db exploded"),
            false,
        ));
        assert_eq!(body, serde_json::json!({ "success": false, "error": GENERIC_ERROR }));
    }

    #[test]
    fn test_production_keeps_client_errors() {
        let body = parse(render_error(&report(StatusCode::FORBIDDEN, "Not allowed by CORS"), false));
        assert_eq!(body["error"], "Not allowed by CORS");
        assert!(body.get("stack").is_none());
    }

    #[test]
    fn test_development_exposes_chain() {
        let body = parse(render_error(
            &report(StatusCode::INTERNAL_SERVER_ERROR, "db exploded"),
            true,
        ));
        assert_eq!(body["error"], "db exploded");
        assert_eq!(body["stack"][0], "connection reset");
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(ApiError::RouteNotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::RateLimited.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(ApiError::internal("x").status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            ApiError::Status {
                status: StatusCode::PAYLOAD_TOO_LARGE,
                message: "too big".into()
            }
            .status(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
    }

    #[test]
    fn test_report_collects_sources() {
        let err = ApiError::internal_with(
            "lookup failed",
            std::io::Error::new(std::io::ErrorKind::Other, "socket closed"),
        );
        let report = err.report();
        assert_eq!(report.message, "lookup failed");
        assert_eq!(report.chain, vec!["socket closed".to_string()]);
    }
}
