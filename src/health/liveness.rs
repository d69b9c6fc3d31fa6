//! Liveness probe handler.
//!
//! Consulted by load balancers to decide whether to keep routing traffic here.
//! Fails with 503 as soon as shutdown begins.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::health::HealthGate;
use crate::http::response::{HEALTHY_BODY, UNHEALTHY_BODY};

pub async fn liveness(State(health): State<HealthGate>) -> Response {
    if health.is_unhealthy() {
        return (StatusCode::SERVICE_UNAVAILABLE, UNHEALTHY_BODY).into_response();
    }
    (StatusCode::OK, HEALTHY_BODY).into_response()
}
