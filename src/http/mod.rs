//! HTTP message and transport subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum fallback, request ID, tracing, timeout, body limit)
//!     → TransportRequest + NativeResponse sink
//!     → [request callback: app kernel]
//!         → adapter.rs from_transport → Request (request.rs, cookie.rs)
//!         → handler / middleware → Response (response.rs)
//!         → adapter.rs to_transport → headers, cookies, status, body
//!     → sink.end() → Send to client
//! ```

pub mod adapter;
pub mod cookie;
pub mod request;
pub mod request_id;
pub mod response;
pub mod server;

pub use adapter::{from_transport, to_transport, AdapterError, ResponseSink, TransportRequest};
pub use cookie::{Cookies, ResponseCookie};
pub use request::{Attributes, Request};
pub use request_id::{MakeRequestUuid, RequestIdExt, X_REQUEST_ID};
pub use response::Response;
pub use server::{
    Finished, HttpServer, NativeResponse, RequestFuture, ServerError, ServerEvent, StartInfo,
};
