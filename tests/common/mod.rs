#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{HeaderMap, Request, StatusCode, header},
};
use serde_json::Value;
use tokenpair::{
    ServerConfig,
    auth::{Argon2Hasher, LogoutPolicy},
    create_app,
    db::Database,
    jwt::TokenSettings,
};
use tower::ServiceExt;

pub const ACCESS_SECRET: &[u8] = b"access-secret-for-integration-tests!!";
pub const REFRESH_SECRET: &[u8] = b"refresh-secret-for-integration-tests!";

/// Knobs for building a test app.
pub struct TestOptions {
    pub logout_policy: LogoutPolicy,
    pub access_ttl_secs: u64,
    pub refresh_ttl_secs: u64,
    pub login_rate_per_minute: u32,
    pub secure_cookies: bool,
}

impl Default for TestOptions {
    fn default() -> Self {
        Self {
            logout_policy: LogoutPolicy::ClientOnly,
            access_ttl_secs: 60 * 60,
            refresh_ttl_secs: 2 * 60 * 60,
            login_rate_per_minute: 0,
            secure_cookies: false,
        }
    }
}

pub fn token_settings(options: &TestOptions) -> TokenSettings {
    TokenSettings::new(ACCESS_SECRET.to_vec(), REFRESH_SECRET.to_vec())
        .with_lifetimes(options.access_ttl_secs, options.refresh_ttl_secs)
}

/// Create a test app backed by an in-memory SQLite database.
pub async fn create_test_app() -> (Router, Database) {
    create_test_app_with(TestOptions::default()).await
}

pub async fn create_test_app_with(options: TestOptions) -> (Router, Database) {
    let db = Database::open(":memory:")
        .await
        .expect("Failed to open test database");
    let config = ServerConfig {
        store: Arc::new(db.users()),
        tokens: token_settings(&options),
        hasher: Arc::new(Argon2Hasher::with_cost(8 * 1024, 1).expect("valid argon2 cost")),
        secure_cookies: options.secure_cookies,
        logout_policy: options.logout_policy,
        login_rate_per_minute: options.login_rate_per_minute,
        trust_forwarded_for: true,
    };
    (create_app(&config), db)
}

/// A response reduced to what the tests look at.
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestResponse {
    /// Value of the `refreshtoken` cookie set by this response, if any.
    pub fn refresh_cookie(&self) -> Option<String> {
        self.set_cookie().and_then(|cookie| {
            cookie
                .split(';')
                .next()
                .and_then(|pair| pair.strip_prefix("refreshtoken="))
                .map(str::to_string)
        })
    }

    pub fn set_cookie(&self) -> Option<&str> {
        self.headers
            .get(header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
    }
}

pub async fn send(app: &Router, request: Request<Body>) -> TestResponse {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    TestResponse {
        status,
        headers,
        body,
    }
}

pub async fn post_json(app: &Router, uri: &str, body: Value) -> TestResponse {
    send(
        app,
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
    )
    .await
}

pub async fn register(app: &Router, email: &str, full_name: &str, password: &str) -> TestResponse {
    post_json(
        app,
        "/register",
        serde_json::json!({ "email": email, "fullName": full_name, "password": password }),
    )
    .await
}

pub async fn login(app: &Router, email: &str, password: &str) -> TestResponse {
    post_json(
        app,
        "/login",
        serde_json::json!({ "email": email, "password": password }),
    )
    .await
}

/// Register and log in, returning (user id, access token, refresh token).
pub async fn register_and_login(
    app: &Router,
    email: &str,
    password: &str,
) -> (String, String, String) {
    let registered = register(app, email, "Test User", password).await;
    assert_eq!(registered.status, StatusCode::OK, "register failed: {}", registered.body);

    let logged_in = login(app, email, password).await;
    assert_eq!(logged_in.status, StatusCode::OK, "login failed: {}", logged_in.body);

    let user_id = logged_in.body["loginResult"]["userId"]
        .as_str()
        .unwrap()
        .to_string();
    let access = logged_in.body["loginResult"]["token"]
        .as_str()
        .unwrap()
        .to_string();
    let refresh = logged_in.refresh_cookie().expect("login sets refresh cookie");
    (user_id, access, refresh)
}

pub async fn refresh(app: &Router, refresh_token: Option<&str>) -> TestResponse {
    let mut builder = Request::builder().method("POST").uri("/refresh_token");
    if let Some(token) = refresh_token {
        builder = builder.header(header::COOKIE, format!("refreshtoken={}", token));
    }
    send(app, builder.body(Body::empty()).unwrap()).await
}

pub async fn protected(app: &Router, authorization: Option<&str>) -> TestResponse {
    let mut builder = Request::builder().method("POST").uri("/protected");
    if let Some(value) = authorization {
        builder = builder.header(header::AUTHORIZATION, value);
    }
    send(app, builder.body(Body::empty()).unwrap()).await
}

pub async fn logout(app: &Router, access_token: Option<&str>) -> TestResponse {
    let mut builder = Request::builder().method("POST").uri("/logout");
    if let Some(token) = access_token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    send(app, builder.body(Body::empty()).unwrap()).await
}
