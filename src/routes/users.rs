//! `/api/users`

use axum::{
    extract::{Path, State},
    response::IntoResponse,
    routing::get,
    Router,
};

use crate::auth::RequireUser;
use crate::http::response::{ok, Paginated, Pagination};
use crate::http::{ApiError, ApiQuery, AppState};
use crate::routes::parse_id;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_users))
        .route("/{id}", get(get_user))
}

async fn list_users(
    State(state): State<AppState>,
    RequireUser(_viewer): RequireUser,
    ApiQuery(pagination): ApiQuery<Pagination>,
) -> Result<impl IntoResponse, ApiError> {
    let pagination = pagination.normalized();
    let (items, total) = state
        .users
        .list(pagination.offset(), pagination.limit())
        .await?;
    Ok(Paginated {
        items,
        total,
        pagination,
    })
}

async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_id(&id)?;
    let user = state
        .users
        .find_by_id(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;
    Ok(ok(user))
}
