//! Request correlation IDs.
//!
//! # Design Decisions
//! - The ID is assigned at the outermost layer, before tracing starts
//! - A client-supplied `x-request-id` is kept as-is
//! - The same ID is echoed on the response

use axum::http::{HeaderName, HeaderValue};
use tower_http::request_id::{MakeRequestId, RequestId};
use uuid::Uuid;

use crate::http::request::Request;

/// Header carrying the request ID.
pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Generates UUID v4 request IDs.
#[derive(Debug, Clone, Copy, Default)]
pub struct MakeRequestUuid;

impl MakeRequestId for MakeRequestUuid {
    fn make_request_id<B>(&mut self, _request: &axum::http::Request<B>) -> Option<RequestId> {
        let id = Uuid::new_v4().to_string();
        HeaderValue::from_str(&id).ok().map(RequestId::new)
    }
}

/// Access to the request ID from handlers.
pub trait RequestIdExt {
    fn request_id(&self) -> Option<&str>;
}

impl RequestIdExt for Request {
    fn request_id(&self) -> Option<&str> {
        self.header(X_REQUEST_ID.as_str())
            .and_then(|v| v.to_str().ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Method;

    #[test]
    fn test_generated_ids_are_unique_uuids() {
        let request = axum::http::Request::new(());
        let mut make = MakeRequestUuid;
        let a = make.make_request_id(&request).unwrap();
        let b = make.make_request_id(&request).unwrap();

        let a = a.header_value().to_str().unwrap();
        assert!(Uuid::parse_str(a).is_ok());
        assert_ne!(a, b.header_value().to_str().unwrap());
    }

    #[test]
    fn test_request_id_ext() {
        let request = Request::new(Method::GET, "/".parse().unwrap())
            .with_header(X_REQUEST_ID, HeaderValue::from_static("req-1"));
        assert_eq!(request.request_id(), Some("req-1"));
        assert_eq!(Request::new(Method::GET, "/".parse().unwrap()).request_id(), None);
    }
}
