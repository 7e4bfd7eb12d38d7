//! HTTP server setup and event wiring.
//!
//! # Responsibilities
//! - Create the Axum router that feeds every request to one callback
//! - Wire up middleware (request ID, tracing, timeout)
//! - Collect request bodies up to the configured limit
//! - Emit `Start`, `Request` and `Shutdown` events
//! - Serve until the shutdown future resolves, then drain
//!
//! # Design Decisions
//! - Routing is not Axum's job here: a single fallback handler receives
//!   everything and hands it to the registered request callback
//! - A failing request callback is logged and answered with a bare 500;
//!   the failure never leaks past that one request

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{header::SET_COOKIE, HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::IntoResponse,
    Router,
};
use bytes::Bytes;
use futures_util::future::BoxFuture;
use http_body_util::LengthLimitError;
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::ServerConfig;
use crate::handler::BoxError;
use crate::http::adapter::{AdapterError, ResponseSink, TransportRequest};
use crate::http::cookie::ResponseCookie;
use crate::http::request_id::{MakeRequestUuid, X_REQUEST_ID};

pub type StartCallback = Box<dyn FnOnce(&StartInfo) + Send>;
pub type ShutdownCallback = Box<dyn FnOnce() + Send>;
pub type RequestFuture = BoxFuture<'static, Result<Finished, BoxError>>;
pub type RequestCallback =
    Arc<dyn Fn(TransportRequest, NativeResponse) -> RequestFuture + Send + Sync>;

/// Passed to the `Start` callback once the listener is bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StartInfo {
    pub local_addr: SocketAddr,
}

/// A server lifecycle event together with its callback.
pub enum ServerEvent {
    Start(StartCallback),
    Request(RequestCallback),
    Shutdown(ShutdownCallback),
}

impl ServerEvent {
    pub fn start(f: impl FnOnce(&StartInfo) + Send + 'static) -> Self {
        ServerEvent::Start(Box::new(f))
    }

    pub fn request<F, Fut>(f: F) -> Self
    where
        F: Fn(TransportRequest, NativeResponse) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Finished, BoxError>> + Send + 'static,
    {
        ServerEvent::Request(Arc::new(
            move |native: TransportRequest, sink: NativeResponse| -> RequestFuture {
                Box::pin(f(native, sink))
            },
        ))
    }

    pub fn shutdown(f: impl FnOnce() + Send + 'static) -> Self {
        ServerEvent::Shutdown(Box::new(f))
    }
}

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("no request callback registered")]
    MissingRequestHandler,
}

/// Transport-native response writer backed by an Axum response.
#[derive(Debug, Default)]
pub struct NativeResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

impl NativeResponse {
    pub fn new() -> Self {
        Self::default()
    }
}

/// A response that has been ended and is ready to be sent.
#[derive(Debug)]
pub struct Finished(axum::response::Response);

impl Finished {
    pub fn into_inner(self) -> axum::response::Response {
        self.0
    }
}

impl IntoResponse for Finished {
    fn into_response(self) -> axum::response::Response {
        self.0
    }
}

impl ResponseSink for NativeResponse {
    type Output = Finished;

    fn header(&mut self, name: &HeaderName, value: HeaderValue) {
        self.headers.insert(name.clone(), value);
    }

    fn cookie(&mut self, cookie: &ResponseCookie) -> Result<(), AdapterError> {
        self.headers.append(SET_COOKIE, cookie.to_header_value()?);
        Ok(())
    }

    fn status(&mut self, status: StatusCode) {
        self.status = status;
    }

    fn write(&mut self, body: Bytes) {
        self.body = body;
    }

    fn end(self) -> Finished {
        let mut response = axum::response::Response::new(Body::from(self.body));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        Finished(response)
    }
}

#[derive(Clone)]
struct ServerState {
    on_request: RequestCallback,
    body_limit: usize,
}

/// Event-driven HTTP server.
pub struct HttpServer {
    config: ServerConfig,
    on_start: Option<StartCallback>,
    on_request: Option<RequestCallback>,
    on_shutdown: Option<ShutdownCallback>,
}

impl HttpServer {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            on_start: None,
            on_request: None,
            on_shutdown: None,
        }
    }

    /// Bind a callback to an event, replacing any earlier one.
    pub fn on(&mut self, event: ServerEvent) -> &mut Self {
        match event {
            ServerEvent::Start(f) => self.on_start = Some(f),
            ServerEvent::Request(f) => self.on_request = Some(f),
            ServerEvent::Shutdown(f) => self.on_shutdown = Some(f),
        }
        self
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    pub fn router(&self) -> Result<Router, ServerError> {
        let on_request = self
            .on_request
            .clone()
            .ok_or(ServerError::MissingRequestHandler)?;
        let state = ServerState {
            on_request,
            body_limit: self.config.body_limit_bytes,
        };

        let trace = TraceLayer::new_for_http().make_span_with(request_span);

        Ok(Router::new()
            .fallback(handle_request)
            .with_state(state)
            .layer(TimeoutLayer::new(Duration::from_secs(self.config.request_timeout_secs)))
            .layer(PropagateRequestIdLayer::new(X_REQUEST_ID))
            .layer(trace)
            .layer(SetRequestIdLayer::new(X_REQUEST_ID, MakeRequestUuid)))
    }

    /// Serve on `listener` until `shutdown` resolves.
    ///
    /// `Start` fires once the router is ready, `Shutdown` once in-flight
    /// requests have drained.
    pub async fn start<F>(mut self, listener: TcpListener, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let router = self.router()?;
        let local_addr = listener.local_addr()?;

        if let Some(on_start) = self.on_start.take() {
            on_start(&StartInfo { local_addr });
        }

        let app = router.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await?;

        tracing::info!("HTTP server stopped");
        if let Some(on_shutdown) = self.on_shutdown.take() {
            on_shutdown();
        }
        Ok(())
    }
}

fn request_span(request: &axum::http::Request<Body>) -> tracing::Span {
    let request_id = request
        .headers()
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-");
    tracing::info_span!(
        "request",
        method = %request.method(),
        uri = %request.uri(),
        request_id = %request_id,
    )
}

/// Fallback handler: collect the body and hand the request to the callback.
async fn handle_request(
    State(state): State<ServerState>,
    request: axum::extract::Request,
) -> axum::response::Response {
    let (parts, body) = request.into_parts();
    let remote_addr = parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);

    let body = match axum::body::to_bytes(body, state.body_limit).await {
        Ok(body) => body,
        Err(e) if is_length_limit(&e) => {
            tracing::warn!(limit = state.body_limit, "Request body over limit");
            return StatusCode::PAYLOAD_TOO_LARGE.into_response();
        }
        Err(e) => {
            tracing::warn!(error = %e, "Failed to read request body");
            return StatusCode::BAD_REQUEST.into_response();
        }
    };

    let mut native = TransportRequest::new(parts, body);
    if let Some(addr) = remote_addr {
        native = native.with_remote_addr(addr);
    }

    match (state.on_request)(native, NativeResponse::new()).await {
        Ok(finished) => finished.into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Request callback failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

fn is_length_limit(err: &axum::Error) -> bool {
    let mut source: Option<&(dyn std::error::Error + 'static)> = Some(err);
    while let Some(e) = source {
        if e.is::<LengthLimitError>() {
            return true;
        }
        source = e.source();
    }
    false
}
