//! Cross-cutting request middleware.
//!
//! # Order (outermost first)
//! ```text
//! TraceLayer            request span with an empty request_id field
//! recover_panic         catches panics from everything below
//! assign_request_id     fills request_id on the span + request extensions
//! json_content_type     Content-Type: application/json (except /files)
//! handler
//! ```

pub mod recover;

use axum::{body::Body, http::Request, middleware, Router};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::http::request::assign_request_id;
use crate::http::response::json_content_type;

pub use recover::{install_panic_hook, recover_panic, PanicScope};

/// Wrap every route of `router` (fallbacks included) in the middleware chain.
pub fn apply(router: Router) -> Router {
    router.layer(
        ServiceBuilder::new()
            .layer(
                TraceLayer::new_for_http()
                    .make_span_with(|req: &Request<Body>| {
                        tracing::info_span!(
                            "request",
                            method = %req.method(),
                            uri = %req.uri(),
                            request_id = tracing::field::Empty,
                        )
                    })
                    .on_failure(()),
            )
            .layer(middleware::from_fn(recover_panic))
            .layer(middleware::from_fn(assign_request_id))
            .layer(middleware::from_fn(json_content_type)),
    )
}
