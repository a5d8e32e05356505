//! Stage 3: user loading.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::auth::identity::{CurrentUser, Identity};
use crate::http::AppState;

/// Resolve the identity into a full user record.
///
/// A missing user or a failed lookup drops the identity and the request
/// continues anonymously.
pub async fn load_user(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    let Some(identity) = request.extensions().get::<Identity>().copied() else {
        return next.run(request).await;
    };

    match state.users.find_by_id(identity.user_id).await {
        Ok(Some(user)) => {
            request.extensions_mut().insert(CurrentUser(user));
        }
        Ok(None) => {
            tracing::debug!(user_id = %identity.user_id, "Identity refers to unknown user");
            request.extensions_mut().remove::<Identity>();
        }
        Err(e) => {
            tracing::warn!(user_id = %identity.user_id, error = %e, "User lookup failed");
            request.extensions_mut().remove::<Identity>();
        }
    }
    next.run(request).await
}
