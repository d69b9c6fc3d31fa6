//! Business operations injected by the caller.
//!
//! The server only routes to these; what they do is up to the binary (or the
//! tests) constructing the [`ServerDependency`].

use std::future::Future;
use std::sync::Arc;

use axum::BoxError;
use futures_util::future::BoxFuture;

use crate::http::request::RequestId;

type CreateUserFn =
    dyn Fn(RequestId, String) -> BoxFuture<'static, Result<(), BoxError>> + Send + Sync;

/// Operations the HTTP handlers delegate to.
#[derive(Clone)]
pub struct ServerDependency {
    create_user: Arc<CreateUserFn>,
}

impl ServerDependency {
    pub fn new<F, Fut>(create_user: F) -> Self
    where
        F: Fn(RequestId, String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        Self {
            create_user: Arc::new(
                move |id: RequestId, username: String| -> BoxFuture<'static, Result<(), BoxError>> {
                    Box::pin(create_user(id, username))
                },
            ),
        }
    }

    pub async fn create_user(&self, request_id: RequestId, username: String) -> Result<(), BoxError> {
        (self.create_user)(request_id, username).await
    }
}

impl Default for ServerDependency {
    /// Accepts every user without doing anything.
    fn default() -> Self {
        Self::new(|_, _| async { Ok::<(), BoxError>(()) })
    }
}

impl std::fmt::Debug for ServerDependency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerDependency").finish_non_exhaustive()
    }
}
