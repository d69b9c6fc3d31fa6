//! Route handlers backed by [`ServerDependency`].

use axum::{
    extract::{Extension, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::json;

use crate::http::dependency::ServerDependency;
use crate::http::request::RequestId;

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
}

/// `POST /users`
pub async fn create_user(
    State(dependency): State<ServerDependency>,
    Extension(request_id): Extension<RequestId>,
    Json(body): Json<CreateUserRequest>,
) -> Response {
    match dependency.create_user(request_id, body.username).await {
        Ok(()) => (StatusCode::CREATED, Json(json!({"status": 1}))).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "create user failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"status": 0, "error": e.to_string()})),
            )
                .into_response()
        }
    }
}
