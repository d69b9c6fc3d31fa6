//! Response shaping.
//!
//! # Responsibilities
//! - Mark responses as JSON (except the raw `/files` family)
//! - Fixed bodies for the liveness probe and the router fallbacks
//! - The [`Aborted`] marker for responses that must never reach the client
//!
//! # Design Decisions
//! - Content type is decided from the request URI; a handler's explicit
//!   content type is kept
//! - An aborted response is a value checked by the connection dispatcher,
//!   not a panic

use axum::{
    body::Body,
    http::{header, HeaderValue, Request, StatusCode, Uri},
    middleware::Next,
    response::{IntoResponse, Response},
};

pub const HEALTHY_BODY: &str = r#"{"status": 1}"#;
pub const UNHEALTHY_BODY: &str = r#"{"status": 0}"#;
pub const NOT_FOUND_BODY: &str = r#"{"status": 0, "error": "requested url not found"}"#;
pub const METHOD_NOT_ALLOWED_BODY: &str =
    r#"{"status": 0, "error": "request method not allowed"}"#;

/// URI fragment identifying raw file transfer routes.
pub const FILES_PATH_MARKER: &str = "/files";

const PLAIN_TEXT: &str = "text/plain";

/// Whether responses to `uri` are shaped as JSON.
pub fn wants_json(uri: &Uri) -> bool {
    !uri.to_string().contains(FILES_PATH_MARKER)
}

/// Set `Content-Type: application/json` unless the handler chose its own.
///
/// Axum's implicit `text/plain` for string bodies counts as not chosen.
pub fn mark_json(response: &mut Response) {
    let chosen = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| !v.starts_with(PLAIN_TEXT));
    if !chosen {
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
    }
}

/// Middleware setting `Content-Type: application/json`.
pub async fn json_content_type(req: Request<Body>, next: Next) -> Response {
    let json = wants_json(req.uri());
    let mut response = next.run(req).await;
    if json {
        mark_json(&mut response);
    }
    response
}

/// Router fallback for unknown paths.
pub async fn not_found() -> Response {
    (StatusCode::NOT_FOUND, NOT_FOUND_BODY).into_response()
}

/// Router fallback for known paths with an unsupported method.
pub async fn method_not_allowed() -> Response {
    (StatusCode::METHOD_NOT_ALLOWED, METHOD_NOT_ALLOWED_BODY).into_response()
}

/// Response marker asking the transport to drop the connection without
/// writing anything.
///
/// Handlers return it directly; the connection dispatcher turns it into a
/// service error so hyper closes the connection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Aborted;

impl IntoResponse for Aborted {
    fn into_response(self) -> Response {
        let mut response = Response::new(Body::empty());
        response.extensions_mut().insert(Aborted);
        response
    }
}

/// Whether a response carries the [`Aborted`] marker.
pub fn is_aborted(response: &Response) -> bool {
    response.extensions().get::<Aborted>().is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aborted_marker_round_trips_through_response() {
        let response = Aborted.into_response();
        assert!(is_aborted(&response));
        assert!(!is_aborted(&StatusCode::OK.into_response()));
    }

    #[test]
    fn files_routes_are_not_json() {
        assert!(wants_json(&Uri::from_static("/health")));
        assert!(!wants_json(&Uri::from_static("/files/report.csv")));
        assert!(!wants_json(&Uri::from_static("/api/files")));
    }

    #[test]
    fn marks_untyped_and_plain_text_responses() {
        let mut response = StatusCode::INTERNAL_SERVER_ERROR.into_response();
        mark_json(&mut response);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");

        let mut response = "{}".into_response();
        mark_json(&mut response);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");
    }

    #[test]
    fn keeps_handler_content_type() {
        let mut response = ([(header::CONTENT_TYPE, "text/csv")], "a,b").into_response();
        mark_json(&mut response);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/csv");
    }

    #[tokio::test]
    async fn fallbacks_use_fixed_bodies() {
        let response = not_found().await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(&body[..], NOT_FOUND_BODY.as_bytes());

        let response = method_not_allowed().await;
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(&body[..], METHOD_NOT_ALLOWED_BODY.as_bytes());
    }
}
