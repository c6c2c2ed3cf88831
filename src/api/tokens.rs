//! Token refresh endpoint.
//!
//! - POST `/refresh_token` - Exchange the refresh cookie for a new access token

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode, header::SET_COOKIE},
    response::{IntoResponse, Response},
    routing::post,
};
use serde::Serialize;

use super::ApiState;
use crate::auth::{REFRESH_COOKIE_NAME, REFRESH_COOKIE_PATH, get_cookie, refresh_cookie};

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route(REFRESH_COOKIE_PATH, post(refresh_token))
        .with_state(state)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshResponse {
    access_token: String,
}

/// Rotate the session. The refresh token in the cookie must still be the one
/// stored for its subject; on success both tokens are replaced.
///
/// Denials answer with an empty access token rather than an error status, so
/// the cookie is left as it was.
async fn refresh_token(State(state): State<ApiState>, headers: HeaderMap) -> Response {
    let cookie = get_cookie(&headers, REFRESH_COOKIE_NAME);

    match state.sessions.refresh(cookie).await {
        Ok(pair) => {
            let cookie = refresh_cookie(
                &pair.refresh.token,
                pair.refresh.duration,
                state.secure_cookies,
            );
            (
                StatusCode::OK,
                [(SET_COOKIE, cookie)],
                Json(RefreshResponse {
                    access_token: pair.access.token,
                }),
            )
                .into_response()
        }
        Err(denied) => denied.into_response(),
    }
}
