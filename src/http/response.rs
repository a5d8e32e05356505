//! Response helpers shared by the route handlers.
//!
//! # Design Decisions
//! - Success bodies use `{ "success": true, "data": ... }`, mirroring the
//!   `{ "success": false, "error": ... }` failures
//! - Pagination metadata also travels in headers, which CORS exposes

use axum::{
    http::{HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

pub const X_TOTAL_COUNT: HeaderName = HeaderName::from_static("x-total-count");
pub const X_PAGE: HeaderName = HeaderName::from_static("x-page");
pub const X_PER_PAGE: HeaderName = HeaderName::from_static("x-per-page");

pub const DEFAULT_PER_PAGE: usize = 20;
pub const MAX_PER_PAGE: usize = 100;

/// `{ "success": true, "data": T }`
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub success: bool,
    pub data: T,
}

pub fn ok<T: Serialize>(data: T) -> Json<Envelope<T>> {
    Json(Envelope {
        success: true,
        data,
    })
}

pub fn created<T: Serialize>(data: T) -> (StatusCode, Json<Envelope<T>>) {
    (StatusCode::CREATED, ok(data))
}

/// `page` / `per_page` query parameters.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct Pagination {
    pub page: usize,
    pub per_page: usize,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: DEFAULT_PER_PAGE,
        }
    }
}

impl Pagination {
    /// Clamp out-of-range values instead of rejecting them.
    pub fn normalized(self) -> Self {
        Self {
            page: self.page.max(1),
            per_page: self.per_page.clamp(1, MAX_PER_PAGE),
        }
    }

    pub fn offset(&self) -> usize {
        (self.page.saturating_sub(1)).saturating_mul(self.per_page)
    }

    pub fn limit(&self) -> usize {
        self.per_page
    }
}

/// One page of results plus the total match count.
#[derive(Debug)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub total: usize,
    pub pagination: Pagination,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PageMeta {
    page: usize,
    per_page: usize,
    total: usize,
    total_pages: usize,
}

#[derive(Serialize)]
struct PageBody<T> {
    success: bool,
    data: Vec<T>,
    pagination: PageMeta,
}

impl<T: Serialize> IntoResponse for Paginated<T> {
    fn into_response(self) -> Response {
        let Pagination { page, per_page } = self.pagination;
        let body = PageBody {
            success: true,
            data: self.items,
            pagination: PageMeta {
                page,
                per_page,
                total: self.total,
                total_pages: self.total.div_ceil(per_page.max(1)),
            },
        };
        let mut response = Json(body).into_response();
        let headers = response.headers_mut();
        headers.insert(X_TOTAL_COUNT, HeaderValue::from(self.total));
        headers.insert(X_PAGE, HeaderValue::from(page));
        headers.insert(X_PER_PAGE, HeaderValue::from(per_page));
        response
    }
}
