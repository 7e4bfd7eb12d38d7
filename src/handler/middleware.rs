//! Middleware invocation.
//!
//! # Responsibilities
//! - Run in place of the route handler when a route declares middleware
//! - Hand the handler over as [`Next`]
//!
//! # Design Decisions
//! - Middleware decides whether and how often to call `next`
//!   (zero for short-circuit, several for retries)
//! - Whatever middleware returns is the final response

use std::future::Future;
use std::sync::Arc;

use futures_util::future::BoxFuture;

use crate::handler::{HandlerRef, HandlerResult};
use crate::http::{Request, Response};

/// Shared handle to route middleware.
pub type MiddlewareRef = Arc<dyn Middleware>;

/// Wraps the handler of a route.
pub trait Middleware: Send + Sync + 'static {
    fn handle(
        &self,
        request: Request,
        response: Response,
        next: Next,
    ) -> BoxFuture<'_, HandlerResult>;
}

/// The wrapped handler, callable any number of times.
#[derive(Clone)]
pub struct Next {
    handler: HandlerRef,
}

impl Next {
    pub fn new(handler: HandlerRef) -> Self {
        Self { handler }
    }

    /// Invoke the route handler.
    pub fn run(&self, request: Request, response: Response) -> BoxFuture<'static, HandlerResult> {
        let handler = self.handler.clone();
        Box::pin(async move { handler.call(request, response).await })
    }
}

/// Adapter turning an async closure into [`Middleware`].
pub struct FnMiddleware<F>(F);

/// Wrap `|request, response, next| async { ... }` as middleware.
pub fn middleware_fn<F, Fut>(f: F) -> FnMiddleware<F>
where
    F: Fn(Request, Response, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    FnMiddleware(f)
}

impl<F, Fut> Middleware for FnMiddleware<F>
where
    F: Fn(Request, Response, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    fn handle(
        &self,
        request: Request,
        response: Response,
        next: Next,
    ) -> BoxFuture<'_, HandlerResult> {
        Box::pin((self.0)(request, response, next))
    }
}
