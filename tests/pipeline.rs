//! End-to-end behaviour of the request pipeline, driven without a socket.

mod common;

use axum::{
    body::Body,
    http::{header, Method, StatusCode},
};
use property_api::config::Mode;
use property_api::db::memory::{DEMO_EMAIL, DEMO_PASSWORD};
use property_api::http::{ApiServer, PipelineError, PipelinePlan, Stage};
use property_api::AppState;
use serde_json::json;

use common::*;

// --- Origin authorization ---

#[tokio::test]
async fn test_allowed_origins_get_credentialed_cors_headers() {
    let router = dev_app();
    for origin in [
        "http://localhost:3000",
        "http://localhost:5173",
        "https://www.example.com",
        "http://localhost:4200",
        "https://app.example.com",
    ] {
        let response = send(
            &router,
            request(Method::GET, "/health")
                .header(header::ORIGIN, origin)
                .body(Body::empty())
                .unwrap(),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK, "origin {}", origin);
        let headers = response.headers();
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], origin);
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");
        assert!(headers[header::ACCESS_CONTROL_EXPOSE_HEADERS]
            .to_str()
            .unwrap()
            .contains("X-Access-Token"));
    }
}

#[tokio::test]
async fn test_disallowed_origin_is_rejected() {
    let router = dev_app();
    let response = send(
        &router,
        request(Method::GET, "/api/properties")
            .header(header::ORIGIN, "https://evil.test")
            .body(Body::empty())
            .unwrap(),
    )
    .await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
    let body = json_body(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "Not allowed by CORS");
}

#[tokio::test]
async fn test_request_without_origin_is_allowed() {
    let router = dev_app();
    let response = send(&router, get("/api/properties")).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_preflight_answered_without_reaching_routes() {
    let router = dev_app();
    for path in ["/api/properties", "/api/does-not-exist", "/"] {
        let response = send(
            &router,
            request(Method::OPTIONS, path)
                .header(header::ORIGIN, "http://localhost:3000")
                .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

        assert_eq!(response.status(), StatusCode::NO_CONTENT, "path {}", path);
        assert_eq!(response.headers()[header::ACCESS_CONTROL_MAX_AGE], "86400");
        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "http://localhost:3000"
        );
        assert!(text_body(response).await.is_empty());
    }
}

// --- Security headers and request id ---

#[tokio::test]
async fn test_security_headers_and_request_id() {
    let router = dev_app();
    let response = send(&router, get("/")).await;

    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers();
    assert_eq!(headers[header::X_CONTENT_TYPE_OPTIONS], "nosniff");
    assert_eq!(headers[header::X_FRAME_OPTIONS], "SAMEORIGIN");
    assert_eq!(headers["cross-origin-resource-policy"], "cross-origin");
    assert!(headers.contains_key("x-request-id"));
    assert_eq!(text_body(response).await, "Property API is running");
}

#[tokio::test]
async fn test_client_request_id_is_echoed() {
    let router = dev_app();
    let response = send(
        &router,
        request(Method::GET, "/health")
            .header("x-request-id", "trace-me")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.headers()["x-request-id"], "trace-me");
}

// --- Rate limiting ---

#[tokio::test]
async fn test_rate_limit_rejects_request_over_ceiling() {
    let (router, _) = app(settings_with(Mode::Development, |c| {
        c.rate_limit.max_requests = 3;
    }));

    for remaining in ["2", "1", "0"] {
        let response = send(&router, get("/health")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["ratelimit-remaining"], remaining);
    }

    let response = send(&router, get("/health")).await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(response.headers().contains_key(header::RETRY_AFTER));
    assert_eq!(
        json_body(response).await,
        json!({ "success": false, "error": "Too many requests, please try again later." })
    );
}

#[tokio::test]
async fn test_rate_limit_window_resets() {
    let (router, _) = app(settings_with(Mode::Development, |c| {
        c.rate_limit.max_requests = 1;
        c.rate_limit.window_ms = 200;
    }));

    assert_eq!(send(&router, get("/health")).await.status(), StatusCode::OK);
    assert_eq!(
        send(&router, get("/health")).await.status(),
        StatusCode::TOO_MANY_REQUESTS
    );
    tokio::time::sleep(std::time::Duration::from_millis(250)).await;
    assert_eq!(send(&router, get("/health")).await.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_preflight_not_counted_by_rate_limit() {
    let (router, _) = app(settings_with(Mode::Development, |c| {
        c.rate_limit.max_requests = 1;
    }));
    for _ in 0..3 {
        let response = send(
            &router,
            request(Method::OPTIONS, "/health").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }
    assert_eq!(send(&router, get("/health")).await.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_rate_limit_ignores_client_supplied_forwarded_prefix() {
    let (router, _) = app(settings_with(Mode::Production, |c| {
        c.rate_limit.max_requests = 2;
    }));

    let mut statuses = Vec::new();
    for i in 0..4 {
        let response = send(
            &router,
            request(Method::GET, "/health")
                .header("x-forwarded-for", format!("10.9.9.{}, 203.0.113.50", i))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        statuses.push(response.status());
    }
    assert_eq!(
        statuses,
        [
            StatusCode::OK,
            StatusCode::OK,
            StatusCode::TOO_MANY_REQUESTS,
            StatusCode::TOO_MANY_REQUESTS
        ]
    );

    // A different address appended by the proxy is a different client.
    let other = send(
        &router,
        request(Method::GET, "/health")
            .header("x-forwarded-for", "203.0.113.51")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(other.status(), StatusCode::OK);
}

// --- Fixed endpoints ---

#[tokio::test]
async fn test_health_uptime_is_monotonic() {
    let router = dev_app();

    let first = json_body(send(&router, get("/health")).await).await;
    tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    let second = json_body(send(&router, get("/health")).await).await;

    assert_eq!(first["status"], "ok");
    assert_eq!(first["database"], true);
    assert!(first["timestamp"].as_str().unwrap().contains('T'));
    assert!(second["uptime"].as_f64().unwrap() >= first["uptime"].as_f64().unwrap());
}

#[tokio::test]
async fn test_health_reports_closed_database() {
    let (router, state) = app(settings(Mode::Development));
    state.database.close().await;

    let response = send(&router, get("/health")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["database"], false);
}

#[tokio::test]
async fn test_favicon_is_no_content() {
    let response = send(&dev_app(), get("/favicon.ico")).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

// --- Sessions ---

#[tokio::test]
async fn test_session_views_increment_per_session() {
    let router = dev_app();

    let response = send(&router, get("/api/session-test")).await;
    let cookie = set_cookie(&response, "sid").expect("session cookie issued");
    let first = json_body(response).await;
    assert_eq!(first["views"], 1);
    assert_eq!(first["session"]["views"], 1);
    assert_eq!(first["session"]["cookie"]["httpOnly"], true);

    for expected in [2, 3] {
        let response = send(
            &router,
            request(Method::GET, "/api/session-test")
                .header(header::COOKIE, &cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        let body = json_body(response).await;
        assert_eq!(body["views"], expected);
        assert_eq!(body["sessionId"], first["sessionId"]);
    }

    // Another client starts from scratch.
    let other = json_body(send(&router, get("/api/session-test")).await).await;
    assert_eq!(other["views"], 1);
    assert_ne!(other["sessionId"], first["sessionId"]);
}

#[tokio::test]
async fn test_tampered_session_cookie_is_ignored() {
    let router = dev_app();
    let response = send(&router, get("/api/session-test")).await;
    let cookie = set_cookie(&response, "sid").unwrap();

    let forged = cookie.replacen("sid=", "sid=0", 1);

    let body = json_body(
        send(
            &router,
            request(Method::GET, "/api/session-test")
                .header(header::COOKIE, forged)
                .body(Body::empty())
                .unwrap(),
        )
        .await,
    )
    .await;
    assert_eq!(body["views"], 1);
}

#[tokio::test]
async fn test_untouched_session_sets_no_cookie() {
    let response = send(&dev_app(), get("/health")).await;
    assert!(set_cookie(&response, "sid").is_none());
}

#[tokio::test]
async fn test_production_session_cookie_attributes() {
    let (router, _) = app(settings(Mode::Production));
    let response = send(&router, get("/api/session-test")).await;
    let line = set_cookie_line(&response, "sid").unwrap();

    assert!(line.contains("Secure"));
    assert!(line.contains("SameSite=None"));
    assert!(line.contains("Domain=example.com"));
    assert!(line.contains("HttpOnly"));
}

// --- Not found and errors ---

#[tokio::test]
async fn test_unknown_route_shape() {
    let response = send(&dev_app(), get("/api/nonexistent")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        json_body(response).await,
        json!({ "success": false, "error": "Route not found" })
    );
}

#[tokio::test]
async fn test_development_error_exposes_message() {
    let response = send(&dev_app(), get("/api/test/error")).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = json_body(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "Forced test error");
    assert_eq!(body["stack"][0], "simulated downstream failure");
}

#[tokio::test]
async fn test_production_error_is_redacted() {
    let mut settings = settings(Mode::Production);
    settings.mount_test_routes = true;
    let (router, _) = app(settings);

    let response = send(&router, get("/api/test/error")).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        json_body(response).await,
        json!({ "success": false, "error": "Internal server error" })
    );
}

#[tokio::test]
async fn test_panic_is_rendered_as_internal_error() {
    let response = send(&dev_app(), get("/api/test/panic")).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = json_body(response).await;
    assert!(body["error"].as_str().unwrap().contains("forced test panic"));
}

#[tokio::test]
async fn test_test_routes_hidden_in_production() {
    let (router, _) = app(settings(Mode::Production));
    let response = send(&router, get("/api/test/ping")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_echo_and_malformed_json() {
    let router = dev_app();
    let body = json_body(send(&router, post_json("/api/test/echo", json!({ "a": 1 }))).await).await;
    assert_eq!(body["data"], json!({ "a": 1 }));

    let response = send(
        &router,
        request(Method::POST, "/api/test/echo")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{broken"))
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["success"], false);
}

#[tokio::test]
async fn test_urlencoded_bodies_are_parsed() {
    let router = dev_app();
    let form = |uri: &str, body: String| {
        request(Method::POST, uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body))
            .unwrap()
    };

    let echoed = json_body(send(&router, form("/api/test/echo", "a=1&b=two".into())).await).await;
    assert_eq!(echoed["data"], json!({ "a": "1", "b": "two" }));

    let response = send(
        &router,
        form(
            "/api/auth/login",
            format!("email={}&password={}&remember=true", DEMO_EMAIL, DEMO_PASSWORD),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(set_cookie(&response, "remember_token").is_some());
    let body = json_body(response).await;
    assert_eq!(body["data"]["user"]["email"], DEMO_EMAIL);
}

#[tokio::test]
async fn test_oversized_body_rejected() {
    let (router, _) = app(settings_with(Mode::Development, |c| {
        c.server.max_body_bytes = 64;
    }));
    let big = json!({ "padding": "x".repeat(512) });
    let response = send(&router, post_json("/api/test/echo", big)).await;
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

// --- Pipeline plan ---

#[tokio::test]
async fn test_misordered_plan_refused() {
    let settings = settings(Mode::Development);
    let state = AppState::in_memory(settings.clone(), property_api::db::MemoryDatabase::new()).unwrap();

    let mut stages = PipelinePlan::standard(&settings).stages().to_vec();
    stages.retain(|s| *s != Stage::ErrorHandler);
    stages.insert(0, Stage::ErrorHandler);

    let result = ApiServer::with_plan(state, &PipelinePlan::new(stages));
    assert!(matches!(result, Err(PipelineError::CorsNotFirst(Stage::ErrorHandler))));
}

// --- Authentication chain ---

async fn login(router: &axum::Router, remember: bool) -> axum::http::Response<Body> {
    send(
        router,
        post_json(
            "/api/auth/login",
            json!({ "email": DEMO_EMAIL, "password": DEMO_PASSWORD, "remember": remember }),
        ),
    )
    .await
}

#[tokio::test]
async fn test_login_and_bearer_access() {
    let router = dev_app();
    let response = login(&router, false).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-refresh-token"));
    assert!(set_cookie(&response, "remember_token").is_none());
    let body = json_body(response).await;
    let token = body["data"]["accessToken"].as_str().unwrap().to_string();
    assert!(body["data"]["user"].get("passwordHash").is_none());

    let response = send(
        &router,
        request(Method::GET, "/api/users")
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-total-count"], "1");
    assert_eq!(response.headers()["x-page"], "1");
}

#[tokio::test]
async fn test_wrong_password_rejected() {
    let router = dev_app();
    let response = send(
        &router,
        post_json("/api/auth/login", json!({ "email": DEMO_EMAIL, "password": "nope" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(response).await["error"], "Invalid email or password");
}

#[tokio::test]
async fn test_anonymous_and_bad_token_requests_pass_through() {
    let router = dev_app();

    let response = send(&router, get("/api/users")).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        json_body(response).await,
        json!({ "success": false, "error": "Authentication required" })
    );

    // An invalid token does not block public routes.
    let response = send(
        &router,
        request(Method::GET, "/api/properties")
            .header("x-access-token", "not-a-jwt")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_remember_cookie_restores_identity() {
    let router = dev_app();
    let response = login(&router, true).await;
    let remember = set_cookie(&response, "remember_token").expect("remember cookie issued");

    let response = send(
        &router,
        request(Method::GET, "/api/auth/me")
            .header(header::COOKIE, &remember)
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-access-token"));
    assert_eq!(json_body(response).await["data"]["email"], DEMO_EMAIL);
}

#[tokio::test]
async fn test_unknown_remember_cookie_is_cleared() {
    let router = dev_app();
    let response = send(
        &router,
        request(Method::GET, "/api/test/whoami")
            .header(header::COOKIE, "remember_token=bogus")
            .body(Body::empty())
            .unwrap(),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(set_cookie_line(&response, "remember_token").is_some());
    assert!(!response.headers().contains_key("x-access-token"));
    assert_eq!(json_body(response).await["data"]["authenticated"], false);
}

#[tokio::test]
async fn test_logout_revokes_remember_token() {
    let router = dev_app();
    let remember = set_cookie(&login(&router, true).await, "remember_token").unwrap();

    let response = send(
        &router,
        request(Method::POST, "/api/auth/logout")
            .header(header::COOKIE, &remember)
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = send(
        &router,
        request(Method::GET, "/api/auth/me")
            .header(header::COOKIE, &remember)
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_refresh_issues_new_pair() {
    let router = dev_app();
    let body = json_body(login(&router, false).await).await;
    let refresh = body["data"]["refreshToken"].as_str().unwrap();
    let access = body["data"]["accessToken"].as_str().unwrap();

    let response = send(
        &router,
        post_json("/api/auth/refresh", json!({ "refreshToken": refresh })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(json_body(response).await["data"]["accessToken"].is_string());

    // Access tokens cannot be used to refresh.
    let response = send(
        &router,
        post_json("/api/auth/refresh", json!({ "refreshToken": access })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

// --- Listings ---

#[tokio::test]
async fn test_search_filters_and_paginates() {
    let router = dev_app();
    let response = send(&router, get("/api/search?city=lisbon&per_page=1")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-total-count"], "2");
    assert_eq!(response.headers()["x-per-page"], "1");
    let body = json_body(response).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
    assert_eq!(body["pagination"]["totalPages"], 2);

    let response = send(&router, get("/api/search?min_price=abc")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_property_lifecycle() {
    let router = dev_app();
    let body = json_body(login(&router, false).await).await;
    let bearer = format!("Bearer {}", body["data"]["accessToken"].as_str().unwrap());

    let anonymous = send(
        &router,
        post_json("/api/properties", json!({ "title": "Loft", "city": "Braga", "price": 1 })),
    )
    .await;
    assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);

    let response = send(
        &router,
        request(Method::POST, "/api/properties")
            .header(header::AUTHORIZATION, &bearer)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(
                json!({ "title": "Loft", "city": "Braga", "price": 99_000 }).to_string(),
            ))
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let id = json_body(response).await["data"]["id"].as_str().unwrap().to_string();

    let path = format!("/api/properties/{}", id);
    assert_eq!(send(&router, get(&path)).await.status(), StatusCode::OK);

    let response = send(
        &router,
        request(Method::DELETE, &path)
            .header(header::AUTHORIZATION, &bearer)
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(send(&router, get(&path)).await.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        send(&router, get("/api/properties/not-a-uuid")).await.status(),
        StatusCode::BAD_REQUEST
    );
}
