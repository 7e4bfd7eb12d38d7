//! Conversion between transport-native messages and the abstract ones.
//!
//! # Responsibilities
//! - Snapshot a transport request into a [`Request`] without mutating it
//! - Write a [`Response`] into a transport [`ResponseSink`]
//!
//! # Design Decisions
//! - Headers and cookies are always written before status and body
//! - All values of one header name go out as a single comma-joined line
//! - Ending the sink is left to the caller, so it happens exactly once

use std::net::SocketAddr;

use axum::http::request::Parts;
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri, Version};
use bytes::{Bytes, BytesMut};
use thiserror::Error;

use crate::http::cookie::{Cookies, ResponseCookie};
use crate::http::request::Request;
use crate::http::response::Response;

/// Failure adapting one request or response.
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("cookie header is not visible ASCII")]
    MalformedCookieHeader,

    #[error("cookie `{name}` cannot be encoded: {reason}")]
    InvalidCookie { name: String, reason: String },

    #[error("header `{name}` cannot be encoded")]
    InvalidHeader { name: String },
}

/// A fully received request, as the transport saw it.
#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub method: Method,
    pub uri: Uri,
    pub version: Version,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub remote_addr: Option<SocketAddr>,
}

impl TransportRequest {
    pub fn new(parts: Parts, body: Bytes) -> Self {
        Self {
            method: parts.method,
            uri: parts.uri,
            version: parts.version,
            headers: parts.headers,
            body,
            remote_addr: None,
        }
    }

    pub fn with_remote_addr(mut self, addr: SocketAddr) -> Self {
        self.remote_addr = Some(addr);
        self
    }
}

/// Transport-native response writer.
///
/// `end` consumes the sink, so a response can only be finished once.
pub trait ResponseSink {
    type Output;

    fn header(&mut self, name: &HeaderName, value: HeaderValue);

    fn cookie(&mut self, cookie: &ResponseCookie) -> Result<(), AdapterError>;

    fn status(&mut self, status: StatusCode);

    fn write(&mut self, body: Bytes);

    fn end(self) -> Self::Output;
}

/// Build the abstract request for `native`.
pub fn from_transport(native: &TransportRequest) -> Result<Request, AdapterError> {
    let cookies = Cookies::from_headers(&native.headers)?;
    Ok(Request::from_parts(
        native.method.clone(),
        native.uri.clone(),
        native.version,
        native.headers.clone(),
        cookies,
        native.body.clone(),
        native.remote_addr,
    ))
}

/// Write `response` into `sink`: headers, cookies, status, then body.
pub fn to_transport<S: ResponseSink>(response: Response, sink: &mut S) -> Result<(), AdapterError> {
    let (status, headers, cookies, body) = response.into_parts();

    for name in headers.keys() {
        sink.header(name, joined(name, &headers)?);
    }
    for cookie in &cookies {
        sink.cookie(cookie)?;
    }
    sink.status(status);
    sink.write(body);
    Ok(())
}

fn joined(name: &HeaderName, headers: &HeaderMap) -> Result<HeaderValue, AdapterError> {
    let mut values = headers.get_all(name).iter();
    let Some(first) = values.next() else {
        return Err(AdapterError::InvalidHeader {
            name: name.to_string(),
        });
    };

    let mut line = BytesMut::from(first.as_bytes());
    for value in values {
        line.extend_from_slice(b",");
        line.extend_from_slice(value.as_bytes());
    }
    HeaderValue::from_maybe_shared(line.freeze()).map_err(|_| AdapterError::InvalidHeader {
        name: name.to_string(),
    })
}
