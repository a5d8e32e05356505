//! `/api/search`: filtered property listings.

use axum::{extract::State, response::IntoResponse, routing::get, Router};
use serde::Deserialize;

use crate::db::PropertyQuery;
use crate::http::response::{Paginated, Pagination, DEFAULT_PER_PAGE};
use crate::http::{ApiError, ApiQuery, AppState};

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(search))
}

/// Query string of `GET /api/search`.
#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    pub q: Option<String>,
    pub city: Option<String>,
    pub min_price: Option<u64>,
    pub max_price: Option<u64>,
    pub min_bedrooms: Option<u8>,
    pub page: Option<usize>,
    pub per_page: Option<usize>,
}

impl SearchParams {
    fn split(self) -> Result<(PropertyQuery, Pagination), ApiError> {
        if let (Some(min), Some(max)) = (self.min_price, self.max_price) {
            if min > max {
                return Err(ApiError::BadRequest(
                    "min_price must not exceed max_price".to_string(),
                ));
            }
        }
        let pagination = Pagination {
            page: self.page.unwrap_or(1),
            per_page: self.per_page.unwrap_or(DEFAULT_PER_PAGE),
        }
        .normalized();
        let query = PropertyQuery {
            q: self.q,
            city: self.city,
            min_price: self.min_price,
            max_price: self.max_price,
            min_bedrooms: self.min_bedrooms,
        };
        Ok((query, pagination))
    }
}

async fn search(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<SearchParams>,
) -> Result<impl IntoResponse, ApiError> {
    let (query, pagination) = params.split()?;
    let (items, total) = state
        .properties
        .search(&query, pagination.offset(), pagination.limit())
        .await?;
    tracing::debug!(total, page = pagination.page, "Search completed");
    Ok(Paginated {
        items,
        total,
        pagination,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_defaults() {
        let (query, pagination) = SearchParams::default().split().unwrap();
        assert!(query.q.is_none());
        assert_eq!(pagination.page, 1);
        assert_eq!(pagination.per_page, DEFAULT_PER_PAGE);
    }

    #[test]
    fn test_inverted_price_range_rejected() {
        let params = SearchParams {
            min_price: Some(500),
            max_price: Some(100),
            ..Default::default()
        };
        assert!(matches!(params.split(), Err(ApiError::BadRequest(_))));
    }
}
