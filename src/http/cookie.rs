//! Request cookie parsing and response cookie encoding.

use axum::http::header::COOKIE;
use axum::http::{HeaderMap, HeaderValue};
use cookie::time::OffsetDateTime;
use cookie::Cookie;

use crate::http::adapter::AdapterError;

/// Cookies sent by the client, in arrival order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cookies(Vec<(String, String)>);

impl Cookies {
    /// Parse every `Cookie` header. Malformed pairs are skipped; a header
    /// that is not visible ASCII fails the whole request.
    pub fn from_headers(headers: &HeaderMap) -> Result<Self, AdapterError> {
        let mut pairs = Vec::new();
        for value in headers.get_all(COOKIE) {
            let text = value
                .to_str()
                .map_err(|_| AdapterError::MalformedCookieHeader)?;
            for cookie in Cookie::split_parse_encoded(text) {
                match cookie {
                    Ok(cookie) => {
                        pairs.push((cookie.name().to_string(), cookie.value().to_string()))
                    }
                    Err(e) => tracing::debug!(error = %e, "Skipping malformed cookie pair"),
                }
            }
        }
        Ok(Self(pairs))
    }

    /// First value sent under `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub(crate) fn push(&mut self, name: String, value: String) {
        self.0.push((name, value));
    }
}

/// A cookie to set on the response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseCookie {
    pub name: String,
    pub value: String,
    /// Expiry as a unix timestamp; `None` makes a session cookie.
    pub expires: Option<i64>,
    pub path: Option<String>,
    pub domain: Option<String>,
    pub secure: bool,
    pub http_only: bool,
}

impl ResponseCookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            expires: None,
            path: None,
            domain: None,
            secure: false,
            http_only: false,
        }
    }

    /// Render as a `Set-Cookie` header value, percent-encoding name and value.
    pub fn to_header_value(&self) -> Result<HeaderValue, AdapterError> {
        if self.name.is_empty() {
            return Err(self.invalid("empty name"));
        }

        let mut builder = Cookie::build((self.name.clone(), self.value.clone()))
            .secure(self.secure)
            .http_only(self.http_only);
        if let Some(path) = &self.path {
            builder = builder.path(path.clone());
        }
        if let Some(domain) = &self.domain {
            builder = builder.domain(domain.clone());
        }
        if let Some(timestamp) = self.expires {
            let at = OffsetDateTime::from_unix_timestamp(timestamp)
                .map_err(|e| self.invalid(&e.to_string()))?;
            builder = builder.expires(at);
        }

        let rendered = builder.build().encoded().to_string();
        HeaderValue::from_str(&rendered).map_err(|e| self.invalid(&e.to_string()))
    }

    fn invalid(&self, reason: &str) -> AdapterError {
        AdapterError::InvalidCookie {
            name: self.name.clone(),
            reason: reason.to_string(),
        }
    }
}
