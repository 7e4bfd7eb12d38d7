//! lightmoon: a small HTTP routing and dispatch layer on Tokio and Axum.

pub mod app;
pub mod config;
pub mod di;
pub mod error;
pub mod handler;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod routing;

pub use app::{App, Kernel, Lifecycle, Registrar, RouteGroup, RouteHandle};
pub use config::AppConfig;
pub use di::{Registry, ServiceProvider};
pub use error::{AppError, ConfigurationError, DispatchError};
pub use handler::{handler_fn, middleware_fn, Callback, FromRegistry, Handler, Middleware, Next};
pub use http::{Request, Response, ResponseCookie, StartInfo};
pub use lifecycle::Shutdown;
