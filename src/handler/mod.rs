//! Handler and middleware contracts.
//!
//! # Data Flow
//! ```text
//! Registration:
//!     closure / struct / service name
//!     → Callback (tagged: Bound | Construct | Service)
//!
//! App::build:
//!     Callback + Registry → HandlerRef (or a configuration error)
//!
//! Per request:
//!     route has middleware?  → middleware.handle(req, res, Next(handler))
//!     otherwise              → handler.call(req, res)
//! ```
//!
//! # Design Decisions
//! - Handlers are explicit trait objects, never probed at request time
//! - Every callback is resolved before serving starts
//! - Handlers and middleware return a response value; they never touch
//!   the transport connection

pub mod callback;
pub mod middleware;

use std::future::Future;
use std::sync::Arc;

use futures_util::future::BoxFuture;

use crate::http::{Request, Response};

pub use callback::{Callback, FromRegistry};
pub use middleware::{middleware_fn, Middleware, MiddlewareRef, Next};

/// Error type handlers and middleware may fail with.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// What a handler or middleware produces.
pub type HandlerResult = Result<Response, BoxError>;

/// Shared handle to a resolved handler.
pub type HandlerRef = Arc<dyn Handler>;

/// A request handler.
///
/// Receives the request (with route parameters as attributes) and the fresh
/// response for this request, and returns the response to send.
pub trait Handler: Send + Sync + 'static {
    fn call(&self, request: Request, response: Response) -> BoxFuture<'_, HandlerResult>;
}

/// Adapter turning an async closure into a [`Handler`].
pub struct FnHandler<F>(F);

/// Wrap an async closure `|request, response| async { ... }` as a handler.
pub fn handler_fn<F, Fut>(f: F) -> FnHandler<F>
where
    F: Fn(Request, Response) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    FnHandler(f)
}

impl<F, Fut> Handler for FnHandler<F>
where
    F: Fn(Request, Response) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    fn call(&self, request: Request, response: Response) -> BoxFuture<'_, HandlerResult> {
        Box::pin((self.0)(request, response))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{Method, StatusCode};

    #[tokio::test]
    async fn test_handler_fn_returns_response() {
        let handler = handler_fn(|request: Request, mut response: Response| async move {
            response.write(format!("hello {}", request.path()));
            Ok(response.with_status(StatusCode::CREATED))
        });

        let request = Request::new(Method::GET, "/world".parse().unwrap());
        let response = handler.call(request, Response::new()).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.body(), b"hello /world");
    }

    #[tokio::test]
    async fn test_handler_error_is_returned() {
        let handler = handler_fn(|_req: Request, _res: Response| async move {
            Err::<Response, BoxError>("boom".into())
        });

        let request = Request::new(Method::GET, "/".parse().unwrap());
        let err = handler.call(request, Response::new()).await.unwrap_err();
        assert_eq!(err.to_string(), "boom");
    }
}
