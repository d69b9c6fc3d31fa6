//! Panic containment middleware.
//!
//! A panic inside any inner layer or handler is caught, logged as a single
//! critical record carrying the panic site's backtrace, and turned into a 500.
//! `Connection: Upgrade` requests get the connection dropped instead, since no
//! status line can be written for them.
//!
//! The backtrace is captured by a process panic hook while the inner future is
//! polled inside a [`PanicScope`]; panics outside a scope go to the previous
//! hook untouched.

use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::{Cell, RefCell};
use std::future::Future;
use std::panic::{self, AssertUnwindSafe, PanicHookInfo};
use std::pin::Pin;
use std::sync::Once;
use std::task::{Context, Poll};

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use futures_util::FutureExt;

use crate::http::response::{mark_json, wants_json, Aborted};

thread_local! {
    static SCOPE_DEPTH: Cell<usize> = const { Cell::new(0) };
    static LAST_PANIC: RefCell<Option<CapturedPanic>> = const { RefCell::new(None) };
}

static HOOK: Once = Once::new();

/// Backtrace and location recorded at the panic site.
#[derive(Debug)]
pub struct CapturedPanic {
    pub location: String,
    pub backtrace: String,
}

/// Install the capturing panic hook. Safe to call repeatedly.
pub fn install_panic_hook() {
    HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info: &PanicHookInfo<'_>| {
            if SCOPE_DEPTH.with(Cell::get) == 0 {
                previous(info);
                return;
            }
            let location = info
                .location()
                .map(|l| format!("{}:{}", l.file(), l.line()))
                .unwrap_or_default();
            let captured = CapturedPanic {
                location,
                backtrace: Backtrace::force_capture().to_string(),
            };
            LAST_PANIC.with(|slot| *slot.borrow_mut() = Some(captured));
        }));
    });
}

/// Take the panic captured on this thread, if any.
fn take_captured() -> Option<CapturedPanic> {
    LAST_PANIC.with(|slot| slot.borrow_mut().take())
}

struct ScopeGuard;

impl ScopeGuard {
    fn enter() -> Self {
        SCOPE_DEPTH.with(|depth| depth.set(depth.get() + 1));
        ScopeGuard
    }
}

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        SCOPE_DEPTH.with(|depth| depth.set(depth.get().saturating_sub(1)));
    }
}

/// Future wrapper marking its polls as recoverable for the panic hook.
pub struct PanicScope<F> {
    inner: Pin<Box<F>>,
}

impl<F: Future> PanicScope<F> {
    pub fn new(inner: F) -> Self {
        Self {
            inner: Box::pin(inner),
        }
    }
}

impl<F: Future> Future for PanicScope<F> {
    type Output = F::Output;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let _guard = ScopeGuard::enter();
        self.inner.as_mut().poll(cx)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

fn is_upgrade(req: &Request<Body>) -> bool {
    req.headers()
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .any(|token| token.trim().eq_ignore_ascii_case("upgrade"))
}

/// Middleware containing panics from every inner layer.
pub async fn recover_panic(req: Request<Body>, next: Next) -> Response {
    install_panic_hook();
    let upgrade = is_upgrade(&req);
    let json = wants_json(req.uri());

    match AssertUnwindSafe(PanicScope::new(next.run(req)))
        .catch_unwind()
        .await
    {
        Ok(response) => response,
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            let captured = take_captured();
            let (location, stack) = captured
                .map(|c| (c.location, c.backtrace))
                .unwrap_or_default();

            crate::critical!(
                panic = %message,
                location = %location,
                stack = %stack,
                "recovered from panic in request handler"
            );

            if upgrade {
                Aborted.into_response()
            } else {
                let mut response = StatusCode::INTERNAL_SERVER_ERROR.into_response();
                if json {
                    mark_json(&mut response);
                }
                response
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_panic_messages() {
        let payload: Box<dyn Any + Send> = Box::new("static message");
        assert_eq!(panic_message(payload.as_ref()), "static message");

        let payload: Box<dyn Any + Send> = Box::new(format!("owned {}", 1));
        assert_eq!(panic_message(payload.as_ref()), "owned 1");

        let payload: Box<dyn Any + Send> = Box::new(42u8);
        assert_eq!(panic_message(payload.as_ref()), "non-string panic payload");
    }

    #[test]
    fn detects_upgrade_token() {
        let req = Request::builder()
            .header(header::CONNECTION, "keep-alive, Upgrade")
            .body(Body::empty())
            .unwrap();
        assert!(is_upgrade(&req));

        let req = Request::builder()
            .header(header::CONNECTION, "keep-alive")
            .body(Body::empty())
            .unwrap();
        assert!(!is_upgrade(&req));
    }

    #[tokio::test]
    async fn scope_captures_backtrace_at_panic_site() {
        install_panic_hook();
        let result = AssertUnwindSafe(PanicScope::new(async {
            panic!("inside scope");
        }))
        .catch_unwind()
        .await;

        assert!(result.is_err());
        let captured = take_captured().expect("hook should capture the panic");
        assert!(captured.location.contains("recover.rs"));
        assert!(!captured.backtrace.is_empty());
        assert_eq!(SCOPE_DEPTH.with(Cell::get), 0);
    }
}
