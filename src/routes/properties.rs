//! `/api/properties`: listing CRUD.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Router,
};

use crate::auth::RequireUser;
use crate::db::{NewProperty, PropertyQuery};
use crate::http::response::{created, ok, Paginated, Pagination};
use crate::http::{ApiError, ApiJson, ApiQuery, AppState};
use crate::routes::parse_id;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_properties).post(create_property))
        .route("/{id}", get(get_property).delete(delete_property))
}

async fn list_properties(
    State(state): State<AppState>,
    ApiQuery(pagination): ApiQuery<Pagination>,
) -> Result<impl IntoResponse, ApiError> {
    let pagination = pagination.normalized();
    let (items, total) = state
        .properties
        .search(&PropertyQuery::default(), pagination.offset(), pagination.limit())
        .await?;
    Ok(Paginated {
        items,
        total,
        pagination,
    })
}

async fn get_property(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_id(&id)?;
    let property = state
        .properties
        .find_by_id(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Property not found".to_string()))?;
    Ok(ok(property))
}

async fn create_property(
    State(state): State<AppState>,
    RequireUser(owner): RequireUser,
    ApiJson(input): ApiJson<NewProperty>,
) -> Result<impl IntoResponse, ApiError> {
    input.validate().map_err(ApiError::BadRequest)?;
    let property = state.properties.insert(owner.id, input).await?;
    tracing::info!(property_id = %property.id, owner_id = %owner.id, "Property listed");
    Ok(created(property))
}

async fn delete_property(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_id(&id)?;
    let property = state
        .properties
        .find_by_id(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Property not found".to_string()))?;

    if property.owner_id != user.id {
        return Err(ApiError::Forbidden(
            "Only the owner can delete this listing".to_string(),
        ));
    }

    if !state.properties.delete(id).await? {
        return Err(ApiError::NotFound("Property not found".to_string()));
    }
    tracing::info!(property_id = %id, owner_id = %user.id, "Property deleted");
    Ok(StatusCode::NO_CONTENT)
}
