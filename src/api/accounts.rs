//! Account API endpoints.
//!
//! - POST `/register` - Create an account
//! - POST `/login` - Check credentials, return an access token and set the refresh cookie
//! - POST `/logout` - Clear the refresh cookie

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    http::{StatusCode, header::SET_COOKIE},
    middleware,
    response::IntoResponse,
    routing::post,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

use super::ApiState;
use super::error::ApiError;
use crate::auth::{OptionalAuth, clear_refresh_cookie, refresh_cookie};
use crate::db::UserProfile;
use crate::rate_limit::{RateLimitConfig, rate_limit_credentials};

pub fn router(state: ApiState, rate_limit: Option<Arc<RateLimitConfig>>) -> Router {
    let credentials = Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .with_state(state.clone());

    let credentials = match rate_limit {
        Some(config) => {
            credentials.layer(middleware::from_fn_with_state(config, rate_limit_credentials))
        }
        None => credentials,
    };

    Router::new()
        .route("/logout", post(logout))
        .with_state(state)
        .merge(credentials)
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegisterRequest {
    email: String,
    full_name: String,
    password: String,
}

#[derive(Serialize)]
struct RegisterResponse {
    error: bool,
    response: UserProfile,
}

async fn register(
    State(state): State<ApiState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(payload) = payload?;

    let user = state
        .sessions
        .register(&payload.email, &payload.full_name, &payload.password)
        .await?;

    Ok((
        StatusCode::OK,
        Json(RegisterResponse {
            error: false,
            response: user,
        }),
    ))
}

#[derive(Deserialize)]
struct LoginRequest {
    email: String,
    password: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LoginResult {
    user_id: String,
    name: String,
    token: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LoginResponse {
    error: bool,
    login_result: LoginResult,
}

async fn login(
    State(state): State<ApiState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(payload) = payload?;

    let outcome = state
        .sessions
        .login(&payload.email, &payload.password)
        .await?;

    let cookie = refresh_cookie(
        &outcome.tokens.refresh.token,
        outcome.tokens.refresh.duration,
        state.secure_cookies,
    );

    Ok((
        StatusCode::OK,
        [(SET_COOKIE, cookie)],
        Json(LoginResponse {
            error: false,
            login_result: LoginResult {
                user_id: outcome.user.id,
                name: outcome.user.full_name,
                token: outcome.tokens.access.token,
            },
        }),
    ))
}

/// Clear the refresh cookie. The stored refresh token is only revoked when the
/// server runs with the revoking logout policy and the caller sends a valid
/// access token.
async fn logout(
    State(state): State<ApiState>,
    OptionalAuth(user): OptionalAuth,
) -> Result<impl IntoResponse, ApiError> {
    state
        .sessions
        .logout(user.as_ref().map(|u| u.subject_id.as_str()))
        .await?;

    Ok((
        StatusCode::OK,
        [(SET_COOKIE, clear_refresh_cookie(state.secure_cookies))],
        Json(json!({ "message": "Logged Out" })),
    ))
}
