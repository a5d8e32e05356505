//! Request pipeline composition.
//!
//! # Data Flow
//! ```text
//! request id → metrics → error handler → panic catcher → timeout
//!     → CORS (preflight ends here)
//!     → security headers → rate limit → cookies → body limit → session
//!     → request log (non-production)
//!     → fixed endpoints | token → remember → user loader → /api/* routers
//!     → not found
//! ```
//!
//! # Design Decisions
//! - Stage order is data: a `PipelinePlan` is validated before a single
//!   layer is applied, so a misordered pipeline fails at startup
//! - The error handler is listed last (it handles what every earlier stage
//!   raises) but wraps everything, so failures are rendered exactly once
//! - Fixed endpoints bypass the authentication chain

use std::collections::HashSet;
use std::fmt;

use axum::{
    body::Body,
    extract::DefaultBodyLimit,
    middleware,
    Router,
};
use thiserror::Error;
use tower_cookies::CookieManagerLayer;
use tower_http::{
    catch_panic::CatchPanicLayer,
    set_header::SetResponseHeaderLayer,
    trace::{DefaultOnResponse, TraceLayer},
};

use crate::auth::{check_remember_token, load_user, verify_token};
use crate::config::Settings;
use crate::http::error::{handle_errors, panic_response};
use crate::http::fixed;
use crate::http::request::{enforce_timeout, propagate_request_id, set_request_id};
use crate::http::AppState;
use crate::observability::{metrics::track_requests, tracing::make_span};
use crate::routes;
use crate::security::{cors_middleware, headers::SECURITY_HEADERS, rate_limit_middleware};
use crate::session::resolve_session;

/// One step of the request pipeline, in request order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Cors,
    SecurityHeaders,
    RateLimit,
    Cookies,
    BodyParsing,
    Session,
    RequestLog,
    FixedEndpoints,
    VerifyToken,
    RememberToken,
    LoadUser,
    Routes,
    NotFound,
    ErrorHandler,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl Stage {
    /// Stages that wrap everything after them in the plan.
    fn is_wrapping(self) -> bool {
        matches!(
            self,
            Stage::Cors
                | Stage::SecurityHeaders
                | Stage::RateLimit
                | Stage::Cookies
                | Stage::BodyParsing
                | Stage::Session
                | Stage::RequestLog
        )
    }
}

/// Stages every plan must contain.
const REQUIRED: [Stage; 12] = [
    Stage::Cors,
    Stage::SecurityHeaders,
    Stage::Cookies,
    Stage::BodyParsing,
    Stage::Session,
    Stage::FixedEndpoints,
    Stage::VerifyToken,
    Stage::RememberToken,
    Stage::LoadUser,
    Stage::Routes,
    Stage::NotFound,
    Stage::ErrorHandler,
];

/// Pairs `(a, b)` where `a` must come before `b`.
const ORDERING: [(Stage, Stage); 11] = [
    (Stage::Cookies, Stage::Session),
    (Stage::Cookies, Stage::RememberToken),
    (Stage::BodyParsing, Stage::VerifyToken),
    (Stage::Session, Stage::VerifyToken),
    (Stage::SecurityHeaders, Stage::RateLimit),
    (Stage::VerifyToken, Stage::RememberToken),
    (Stage::RememberToken, Stage::LoadUser),
    (Stage::LoadUser, Stage::Routes),
    (Stage::FixedEndpoints, Stage::Routes),
    (Stage::FixedEndpoints, Stage::VerifyToken),
    (Stage::RequestLog, Stage::FixedEndpoints),
];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PipelineError {
    #[error("stage {0} appears more than once")]
    Duplicate(Stage),

    #[error("required stage {0} is missing")]
    Missing(Stage),

    #[error("CORS must be the first stage, found {0}")]
    CorsNotFirst(Stage),

    #[error("error handler must be the last stage")]
    ErrorHandlerNotLast,

    #[error("not-found fallback must directly precede the error handler")]
    NotFoundMisplaced,

    #[error("stage {before} must run before {after}")]
    Misordered { before: Stage, after: Stage },

    #[error("wrapping stage {0} placed after the endpoints")]
    WrappingAfterEndpoints(Stage),
}

/// Ordered list of stages the router is built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelinePlan {
    stages: Vec<Stage>,
}

impl PipelinePlan {
    pub fn new(stages: Vec<Stage>) -> Self {
        Self { stages }
    }

    /// The plan for the given deployment.
    pub fn standard(settings: &Settings) -> Self {
        let mut stages = vec![Stage::Cors, Stage::SecurityHeaders];
        if settings.rate_limit_enabled {
            stages.push(Stage::RateLimit);
        }
        stages.extend([Stage::Cookies, Stage::BodyParsing, Stage::Session]);
        if settings.request_logging {
            stages.push(Stage::RequestLog);
        }
        stages.extend([
            Stage::FixedEndpoints,
            Stage::VerifyToken,
            Stage::RememberToken,
            Stage::LoadUser,
            Stage::Routes,
            Stage::NotFound,
            Stage::ErrorHandler,
        ]);
        Self { stages }
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn contains(&self, stage: Stage) -> bool {
        self.stages.contains(&stage)
    }

    fn position(&self, stage: Stage) -> Option<usize> {
        self.stages.iter().position(|s| *s == stage)
    }

    /// Check the plan; the first violation found is returned.
    pub fn validate(&self) -> Result<(), PipelineError> {
        let mut seen = HashSet::new();
        for stage in &self.stages {
            if !seen.insert(*stage) {
                return Err(PipelineError::Duplicate(*stage));
            }
        }
        for stage in REQUIRED {
            if !seen.contains(&stage) {
                return Err(PipelineError::Missing(stage));
            }
        }

        if let Some(first) = self.stages.first().filter(|s| **s != Stage::Cors) {
            return Err(PipelineError::CorsNotFirst(*first));
        }
        if self.stages.last() != Some(&Stage::ErrorHandler) {
            return Err(PipelineError::ErrorHandlerNotLast);
        }
        if self.stages.iter().rev().nth(1) != Some(&Stage::NotFound) {
            return Err(PipelineError::NotFoundMisplaced);
        }

        for (before, after) in ORDERING {
            if let (Some(a), Some(b)) = (self.position(before), self.position(after)) {
                if a > b {
                    return Err(PipelineError::Misordered { before, after });
                }
            }
        }

        // Layers can only wrap what follows them, so all of them must precede
        // the first endpoint stage.
        let first_endpoint = self.position(Stage::FixedEndpoints).unwrap_or(0);
        if let Some(late) = self.stages[first_endpoint..]
            .iter()
            .find(|s| s.is_wrapping())
        {
            return Err(PipelineError::WrappingAfterEndpoints(*late));
        }
        Ok(())
    }
}

/// Build the router for `plan`, after validating it.
pub fn build_router(plan: &PipelinePlan, state: AppState) -> Result<Router, PipelineError> {
    plan.validate()?;
    let settings = state.settings.clone();

    // Endpoints: fixed routes skip the authentication chain.
    let api = routes::api_router(&settings)
        .layer(middleware::from_fn_with_state(state.clone(), load_user))
        .layer(middleware::from_fn_with_state(state.clone(), check_remember_token))
        .layer(middleware::from_fn_with_state(state.clone(), verify_token));

    let mut router = fixed::router()
        .merge(api)
        .fallback(routes::not_found)
        .with_state(state.clone());

    // Wrapping stages, innermost first.
    for stage in plan.stages().iter().rev().filter(|s| s.is_wrapping()) {
        router = match stage {
            Stage::Cors => router.layer(middleware::from_fn_with_state(
                state.cors.clone(),
                cors_middleware,
            )),
            Stage::SecurityHeaders => SECURITY_HEADERS
                .into_iter()
                .fold(router, |router, (name, value)| {
                    router.layer(SetResponseHeaderLayer::if_not_present(name, value))
                }),
            Stage::RateLimit => router.layer(middleware::from_fn_with_state(
                state.rate_limiter.clone(),
                rate_limit_middleware,
            )),
            Stage::Cookies => router.layer(CookieManagerLayer::new()),
            Stage::BodyParsing => router.layer(DefaultBodyLimit::max(settings.max_body_bytes)),
            Stage::Session => router.layer(middleware::from_fn_with_state(
                state.sessions.clone(),
                resolve_session,
            )),
            Stage::RequestLog => router.layer(
                TraceLayer::new_for_http()
                    .make_span_with(make_span::<Body>)
                    .on_response(DefaultOnResponse::new().level(tracing::Level::INFO)),
            ),
            _ => router,
        };
    }

    tracing::debug!(stages = ?plan.stages(), "Pipeline assembled");

    let router = router
        .layer(middleware::from_fn_with_state(
            settings.request_timeout,
            enforce_timeout,
        ))
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(middleware::from_fn_with_state(settings.clone(), handle_errors))
        .layer(middleware::from_fn(track_requests))
        .layer(propagate_request_id())
        .layer(set_request_id());

    Ok(router)
}
