//! Request correlation.
//!
//! # Responsibilities
//! - Take the caller's `X-Request-Id` or generate a UUID v4
//! - Attach it to the request (extensions) for handlers
//! - Record it on the request span so every log line carries it
//!
//! # Design Decisions
//! - The header value is never validated
//! - The id is not echoed back in response headers

use std::fmt;

use axum::{body::Body, http::Request, middleware::Next, response::Response};
use uuid::Uuid;

use crate::observability::sink::REQUEST_ID_KEY;

/// Inbound header carrying a caller-supplied correlation id.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Per-request correlation id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestId(String);

impl RequestId {
    /// Generate a fresh random id.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Use the header value if present and non-empty, else generate one.
    pub fn from_request<B>(request: &Request<B>) -> Self {
        request
            .headers()
            .get(X_REQUEST_ID)
            .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
            .filter(|v| !v.is_empty())
            .map(Self)
            .unwrap_or_else(Self::generate)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Middleware assigning the correlation id.
pub async fn assign_request_id(mut req: Request<Body>, next: Next) -> Response {
    let request_id = RequestId::from_request(&req);
    tracing::Span::current().record(REQUEST_ID_KEY, request_id.as_str());
    req.extensions_mut().insert(request_id);
    next.run(req).await
}
