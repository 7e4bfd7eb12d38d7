//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::net::SocketAddr;

use axum::http::{HeaderName, HeaderValue, Method, Request, StatusCode};
use bytes::Bytes;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use lightmoon::error::AppError;
use lightmoon::http::{AdapterError, ResponseSink, TransportRequest};
use lightmoon::{App, ResponseCookie, Shutdown};

/// One call made on a [`RecordingSink`].
#[derive(Debug, Clone, PartialEq)]
pub enum SinkCall {
    Header(String, String),
    Cookie(ResponseCookie),
    Status(StatusCode),
    Write(Bytes),
    End,
}

/// Response sink that records every call in order.
#[derive(Debug, Default)]
pub struct RecordingSink {
    calls: Vec<SinkCall>,
}

impl ResponseSink for RecordingSink {
    type Output = Recorded;

    fn header(&mut self, name: &HeaderName, value: HeaderValue) {
        self.calls.push(SinkCall::Header(
            name.to_string(),
            value.to_str().unwrap().to_string(),
        ));
    }

    fn cookie(&mut self, cookie: &ResponseCookie) -> Result<(), AdapterError> {
        self.calls.push(SinkCall::Cookie(cookie.clone()));
        Ok(())
    }

    fn status(&mut self, status: StatusCode) {
        self.calls.push(SinkCall::Status(status));
    }

    fn write(&mut self, body: Bytes) {
        self.calls.push(SinkCall::Write(body));
    }

    fn end(mut self) -> Recorded {
        self.calls.push(SinkCall::End);
        Recorded { calls: self.calls }
    }
}

/// Everything a finished [`RecordingSink`] saw.
#[derive(Debug)]
pub struct Recorded {
    pub calls: Vec<SinkCall>,
}

impl Recorded {
    pub fn status(&self) -> Option<StatusCode> {
        self.calls.iter().find_map(|c| match c {
            SinkCall::Status(s) => Some(*s),
            _ => None,
        })
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.calls.iter().find_map(|c| match c {
            SinkCall::Header(n, v) if n == name => Some(v.as_str()),
            _ => None,
        })
    }

    pub fn body(&self) -> String {
        self.calls
            .iter()
            .find_map(|c| match c {
                SinkCall::Write(b) => Some(String::from_utf8_lossy(b).into_owned()),
                _ => None,
            })
            .unwrap_or_default()
    }

    pub fn ends(&self) -> usize {
        self.calls.iter().filter(|c| **c == SinkCall::End).count()
    }
}

/// Build a transport request as the server would hand it over.
pub fn native(method: Method, uri: &str) -> TransportRequest {
    native_with(Request::builder().method(method).uri(uri), Bytes::new())
}

pub fn native_with(builder: axum::http::request::Builder, body: Bytes) -> TransportRequest {
    let (parts, _) = builder.body(()).unwrap().into_parts();
    TransportRequest::new(parts, body)
}

/// Serve `app` on an ephemeral port until the returned [`Shutdown`] fires.
pub async fn spawn_app(app: App) -> (SocketAddr, Shutdown, JoinHandle<Result<(), AppError>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let handle = tokio::spawn(app.serve(listener, shutdown.wait()));
    (addr, shutdown, handle)
}
