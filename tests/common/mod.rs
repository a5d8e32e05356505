//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;

use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{header, Method, Request, Response},
    Router,
};
use property_api::config::{ApiConfig, Mode, Settings};
use property_api::db::MemoryDatabase;
use property_api::{ApiServer, AppState};
use serde_json::Value;
use tower::ServiceExt;

pub const CLIENT_ADDR: &str = "198.51.100.7:40000";

/// Settings for `mode`, with `tweak` applied to the raw config first.
pub fn settings_with(mode: Mode, tweak: impl FnOnce(&mut ApiConfig)) -> Settings {
    let mut config = ApiConfig::default();
    config.server.mode = mode;
    tweak(&mut config);
    Settings::from_config(&config)
}

pub fn settings(mode: Mode) -> Settings {
    settings_with(mode, |_| {})
}

/// Router plus the state behind it, over a seeded in-memory database.
pub fn app(settings: Settings) -> (Router, AppState) {
    let state = AppState::in_memory(settings, MemoryDatabase::with_demo_data())
        .expect("default CORS list compiles");
    let server = ApiServer::new(state.clone()).expect("standard plan is valid");
    (server.router(), state)
}

pub fn dev_app() -> Router {
    app(settings(Mode::Development)).0
}

/// Request builder carrying a peer address, as `axum::serve` would provide.
pub fn request(method: Method, uri: &str) -> axum::http::request::Builder {
    let addr: SocketAddr = CLIENT_ADDR.parse().unwrap();
    Request::builder()
        .method(method)
        .uri(uri)
        .extension(ConnectInfo(addr))
}

pub fn get(uri: &str) -> Request<Body> {
    request(Method::GET, uri).body(Body::empty()).unwrap()
}

pub fn post_json(uri: &str, body: Value) -> Request<Body> {
    request(Method::POST, uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub async fn send(router: &Router, request: Request<Body>) -> Response<Body> {
    router.clone().oneshot(request).await.unwrap()
}

pub async fn json_body(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

pub async fn text_body(response: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// `name=value` of a cookie set by the response, if any.
pub fn set_cookie(response: &Response<Body>, name: &str) -> Option<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .map(|v| v.split(';').next().unwrap_or_default().trim().to_string())
        .find(|pair| pair.starts_with(&format!("{}=", name)))
}

/// Raw `Set-Cookie` header line for `name`.
pub fn set_cookie_line(response: &Response<Body>, name: &str) -> Option<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|line| line.starts_with(&format!("{}=", name)))
        .map(str::to_string)
}
