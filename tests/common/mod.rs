#![allow(dead_code)]

use axum::{
    Router,
    body::Body,
    http::{Request, Response},
};
use gatehouse::{ServerConfig, create_app, db::Database};
use tower::ServiceExt;

pub const ACCESS_SECRET: &[u8] = b"access-secret-for-integration-tests";
pub const REFRESH_SECRET: &[u8] = b"refresh-secret-for-integration-tests";

/// Create a test app with default TTLs and an in-memory database.
pub async fn create_test_app() -> (Router, Database) {
    create_test_app_with_ttls(300, 14 * 24 * 60 * 60).await
}

/// Create a test app with explicit token TTLs (0 = expires immediately).
pub async fn create_test_app_with_ttls(access_ttl: u64, refresh_ttl: u64) -> (Router, Database) {
    let db = Database::open(":memory:")
        .await
        .expect("Failed to open test database");

    let config = ServerConfig {
        db: db.clone(),
        access_secret: ACCESS_SECRET.to_vec(),
        refresh_secret: REFRESH_SECRET.to_vec(),
        access_ttl_secs: access_ttl,
        refresh_ttl_secs: refresh_ttl,
        secure_cookies: false, // Tests run on localhost HTTP
    };

    (create_app(&config), db)
}

/// Send a JSON POST request.
pub async fn post_json(app: &Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    app.clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap()
}

/// Send a JSON POST request with a bearer access token.
pub async fn post_json_auth(
    app: &Router,
    uri: &str,
    bearer: &str,
    body: serde_json::Value,
) -> Response<Body> {
    app.clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .header("authorization", format!("Bearer {}", bearer))
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap()
}

/// Send a GET request with optional Cookie and Authorization headers.
pub async fn get_with_headers(
    app: &Router,
    uri: &str,
    cookie: Option<&str>,
    bearer: Option<&str>,
) -> Response<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header("cookie", cookie);
    }
    if let Some(token) = bearer {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }
    app.clone()
        .oneshot(builder.body(Body::empty()).unwrap())
        .await
        .unwrap()
}

/// Register an account through the API.
pub async fn register(
    app: &Router,
    username: &str,
    email: &str,
    password: &str,
) -> Response<Body> {
    post_json(
        app,
        "/api/users",
        serde_json::json!({
            "fullName": "Test User",
            "username": username,
            "email": email,
            "password": password,
        }),
    )
    .await
}

/// Log in through the API.
pub async fn login(app: &Router, identifier: &str, password: &str) -> Response<Body> {
    post_json(
        app,
        "/api/login",
        serde_json::json!({
            "usernameOrEmail": identifier,
            "password": password,
        }),
    )
    .await
}

/// Register and log in, returning (access_token, refresh_token).
pub async fn register_and_login(
    app: &Router,
    username: &str,
    email: &str,
    password: &str,
) -> (String, String) {
    let response = register(app, username, email, password).await;
    assert_eq!(response.status(), axum::http::StatusCode::CREATED);

    let response = login(app, username, password).await;
    assert_eq!(response.status(), axum::http::StatusCode::OK);

    let body = body_json(response).await;
    (
        body["accessToken"].as_str().unwrap().to_string(),
        body["refreshToken"].as_str().unwrap().to_string(),
    )
}

/// Read a response body as JSON.
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Extract Set-Cookie headers from a response.
pub fn extract_set_cookies(response: &Response<Body>) -> Vec<String> {
    response
        .headers()
        .get_all("set-cookie")
        .iter()
        .filter_map(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .collect()
}

/// Get the value of a named cookie from Set-Cookie strings.
pub fn cookie_value(cookies: &[String], name: &str) -> Option<String> {
    cookies.iter().find_map(|c| {
        let (pair, _) = c.split_once(';')?;
        let (key, value) = pair.split_once('=')?;
        if key == name && !value.is_empty() {
            Some(value.to_string())
        } else {
            None
        }
    })
}

/// Check if cookies contain a token being cleared (Max-Age=0).
pub fn has_cleared_cookie(cookies: &[String], cookie_name: &str) -> bool {
    cookies
        .iter()
        .any(|c| c.starts_with(&format!("{}=", cookie_name)) && c.contains("Max-Age=0"))
}

/// Cookie header value carrying both tokens.
pub fn auth_cookies(access_token: &str, refresh_token: &str) -> String {
    format!(
        "access_token={}; refresh_token={}",
        access_token, refresh_token
    )
}

/// Cookie header value carrying only the refresh token.
pub fn refresh_cookie_only(refresh_token: &str) -> String {
    format!("refresh_token={}", refresh_token)
}
