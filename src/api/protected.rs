//! Routes behind the access-token guard.
//!
//! - POST `/protected` - Sample resource that requires a bearer access token

use axum::{Json, Router, middleware, response::IntoResponse, routing::post};
use serde::Serialize;

use super::ApiState;
use crate::auth::{Auth, require_access_token};

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/protected", post(protected_data))
        .route_layer(middleware::from_fn_with_state(
            state.codec.clone(),
            require_access_token,
        ))
        .with_state(state)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ProtectedResponse {
    data: &'static str,
    user_id: String,
}

async fn protected_data(Auth(user): Auth) -> impl IntoResponse {
    Json(ProtectedResponse {
        data: "This is protected data",
        user_id: user.subject_id,
    })
}
