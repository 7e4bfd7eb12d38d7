//! Crate-level error types.

use axum::http::Method;
use thiserror::Error;

use crate::config::ConfigError;
use crate::di::RegistryError;
use crate::handler::BoxError;
use crate::http::{AdapterError, ServerError};
use crate::routing::PatternError;

/// A route registration that cannot be served.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("invalid pattern `{pattern}` for {method}: {source}")]
    Pattern {
        method: Method,
        pattern: String,
        source: PatternError,
    },

    #[error("handler for {method} `{pattern}` cannot be resolved: {source}")]
    Handler {
        method: Method,
        pattern: String,
        source: RegistryError,
    },
}

/// Failure while dispatching a single request.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("handler failed: {0}")]
    Handler(#[source] BoxError),

    #[error(transparent)]
    Adapter(#[from] AdapterError),
}

/// Failure building or running an application.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("invalid route configuration: {}", join(.0))]
    Configuration(Vec<ConfigurationError>),

    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("server error: {0}")]
    Server(#[from] ServerError),
}

fn join(errors: &[ConfigurationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
