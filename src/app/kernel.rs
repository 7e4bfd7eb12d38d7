//! Per-request dispatch.
//!
//! # Data Flow
//! ```text
//! TransportRequest
//!     → Router::dispatch(method, path)
//!     → Found:            from_transport → with_attributes(params)
//!                         → middleware.handle(.., Next(handler)) or handler.call
//!                         → to_transport → sink.end()
//!     → MethodNotAllowed: 405 + Allow + "Method Not Allowed" → sink.end()
//!     → NotFound:         404 + "Not Found" → sink.end()
//! ```
//!
//! # Design Decisions
//! - The sink is ended exactly once, by this module, on every success path
//! - Handler failures are returned untouched; the transport decides how to
//!   answer them

use std::sync::Arc;
use std::time::Instant;

use axum::http::header::ALLOW;
use axum::http::{HeaderValue, Method, StatusCode};

use crate::app::routes::Endpoint;
use crate::error::DispatchError;
use crate::handler::Next;
use crate::http::{
    from_transport, to_transport, AdapterError, Response, ResponseSink, TransportRequest,
};
use crate::observability::metrics;
use crate::routing::{Outcome, Router};

/// Compiled application: the frozen router and its resolved handlers.
#[derive(Clone)]
pub struct Kernel {
    router: Arc<Router<Endpoint>>,
}

impl Kernel {
    pub(crate) fn new(router: Router<Endpoint>) -> Self {
        Self {
            router: Arc::new(router),
        }
    }

    /// Number of compiled (method, pattern) routes.
    pub fn routes(&self) -> usize {
        self.router.len()
    }

    /// Dispatch one request and write the result into `sink`.
    pub async fn handle<S: ResponseSink>(
        &self,
        native: &TransportRequest,
        mut sink: S,
    ) -> Result<S::Output, DispatchError> {
        let started = Instant::now();
        let method = &native.method;
        let path = native.uri.path();

        let (outcome, response) = match self.router.dispatch(method, path) {
            Outcome::Found(found) => {
                tracing::debug!(
                    method = %method,
                    path = %path,
                    pattern = found.pattern,
                    "Route matched"
                );
                let request = from_transport(native)?.with_attributes(found.params);
                let endpoint = found.target;

                let result = match &endpoint.middleware {
                    Some(middleware) => {
                        let next = Next::new(endpoint.handler.clone());
                        middleware.handle(request, Response::new(), next).await
                    }
                    None => endpoint.handler.call(request, Response::new()).await,
                };

                match result {
                    Ok(response) => ("found", response),
                    Err(e) => {
                        let status = StatusCode::INTERNAL_SERVER_ERROR.as_u16();
                        metrics::record_request(method, "error", status, started);
                        return Err(DispatchError::Handler(e));
                    }
                }
            }
            Outcome::MethodNotAllowed { allowed } => {
                tracing::debug!(
                    method = %method,
                    path = %path,
                    allowed = ?allowed,
                    "Method not allowed"
                );
                ("method_not_allowed", method_not_allowed(&allowed)?)
            }
            Outcome::NotFound => {
                tracing::debug!(method = %method, path = %path, "No route matched");
                (
                    "not_found",
                    Response::new()
                        .with_status(StatusCode::NOT_FOUND)
                        .with_text("Not Found"),
                )
            }
        };

        let status = response.status();
        to_transport(response, &mut sink)?;
        metrics::record_request(method, outcome, status.as_u16(), started);
        Ok(sink.end())
    }
}

fn method_not_allowed(allowed: &[Method]) -> Result<Response, AdapterError> {
    let allow = allowed
        .iter()
        .map(Method::as_str)
        .collect::<Vec<_>>()
        .join(", ");
    let allow = HeaderValue::from_str(&allow).map_err(|_| AdapterError::InvalidHeader {
        name: ALLOW.to_string(),
    })?;

    Ok(Response::new()
        .with_status(StatusCode::METHOD_NOT_ALLOWED)
        .with_header(ALLOW, allow)
        .with_text("Method Not Allowed"))
}
