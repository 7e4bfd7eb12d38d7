//! Route registration surface: verbs, groups, per-route middleware.
//!
//! # Design Decisions
//! - A group is a builder value holding its prefix; nothing global is
//!   mutated while a group callback runs
//! - Invalid patterns are recorded, not raised, so every problem can be
//!   reported together when the app is built

use std::sync::Arc;

use axum::http::Method;

use crate::di::Registry;
use crate::error::ConfigurationError;
use crate::handler::{Callback, HandlerRef, Middleware, MiddlewareRef};
use crate::routing::{Pattern, RouteTable, TargetId};

/// A registered route whose handler is not resolved yet.
pub(crate) struct PendingEndpoint {
    method: Method,
    pattern: String,
    callback: Callback,
    middleware: Option<MiddlewareRef>,
}

impl PendingEndpoint {
    pub(crate) fn resolve(self, registry: &Registry) -> Result<Endpoint, ConfigurationError> {
        let PendingEndpoint {
            method,
            pattern,
            callback,
            middleware,
        } = self;

        let handler = callback
            .resolve(registry)
            .map_err(|source| ConfigurationError::Handler {
                method,
                pattern,
                source,
            })?;
        Ok(Endpoint { handler, middleware })
    }
}

/// A resolved, invocable route target.
pub(crate) struct Endpoint {
    pub(crate) handler: HandlerRef,
    pub(crate) middleware: Option<MiddlewareRef>,
}

/// Routes and pattern errors collected during registration.
#[derive(Default)]
pub(crate) struct RouteSet {
    pub(crate) table: RouteTable<PendingEndpoint>,
    pub(crate) errors: Vec<ConfigurationError>,
}

impl RouteSet {
    fn add(
        &mut self,
        method: Method,
        pattern: String,
        callback: Callback,
        middleware: Option<MiddlewareRef>,
    ) -> RouteHandle<'_> {
        if let Err(source) = Pattern::expand(&pattern) {
            tracing::debug!(
                method = %method,
                pattern = %pattern,
                error = %source,
                "Rejected route"
            );
            self.errors.push(ConfigurationError::Pattern {
                method,
                pattern,
                source,
            });
            return RouteHandle {
                routes: self,
                target: None,
            };
        }

        let target = self.table.insert_target(PendingEndpoint {
            method: method.clone(),
            pattern: pattern.clone(),
            callback,
            middleware,
        });
        if let Err(source) = self.table.bind(method.clone(), &pattern, target) {
            self.errors.push(ConfigurationError::Pattern {
                method,
                pattern,
                source,
            });
        }

        RouteHandle {
            routes: self,
            target: Some(target),
        }
    }
}

/// Returned by every registration; attaches middleware to that route.
pub struct RouteHandle<'a> {
    routes: &'a mut RouteSet,
    target: Option<TargetId>,
}

impl RouteHandle<'_> {
    /// Run `middleware` instead of the handler, passing the handler as `next`.
    pub fn middleware(self, middleware: impl Middleware) -> Self {
        self.middleware_ref(Arc::new(middleware))
    }

    pub fn middleware_ref(mut self, middleware: MiddlewareRef) -> Self {
        if let Some(endpoint) = self.target.and_then(|id| self.routes.table.target_mut(id)) {
            endpoint.middleware = Some(middleware);
        }
        self
    }
}

/// Anything routes can be registered on: the app itself or a group.
pub trait Registrar {
    fn add_route(
        &mut self,
        method: Method,
        pattern: &str,
        callback: impl Into<Callback>,
        middleware: Option<MiddlewareRef>,
    ) -> RouteHandle<'_>;

    /// Register routes under `prefix`. Nested groups concatenate prefixes.
    fn group<F>(&mut self, prefix: &str, build: F)
    where
        F: FnOnce(&mut RouteGroup<'_>);

    fn get(&mut self, pattern: &str, callback: impl Into<Callback>) -> RouteHandle<'_> {
        self.add_route(Method::GET, pattern, callback, None)
    }

    fn post(&mut self, pattern: &str, callback: impl Into<Callback>) -> RouteHandle<'_> {
        self.add_route(Method::POST, pattern, callback, None)
    }

    fn put(&mut self, pattern: &str, callback: impl Into<Callback>) -> RouteHandle<'_> {
        self.add_route(Method::PUT, pattern, callback, None)
    }

    fn delete(&mut self, pattern: &str, callback: impl Into<Callback>) -> RouteHandle<'_> {
        self.add_route(Method::DELETE, pattern, callback, None)
    }

    fn patch(&mut self, pattern: &str, callback: impl Into<Callback>) -> RouteHandle<'_> {
        self.add_route(Method::PATCH, pattern, callback, None)
    }

    fn head(&mut self, pattern: &str, callback: impl Into<Callback>) -> RouteHandle<'_> {
        self.add_route(Method::HEAD, pattern, callback, None)
    }
}

/// Routes registered inside [`Registrar::group`].
pub struct RouteGroup<'a> {
    routes: &'a mut RouteSet,
    prefix: String,
}

impl<'a> RouteGroup<'a> {
    pub(crate) fn new(routes: &'a mut RouteSet, prefix: String) -> Self {
        Self { routes, prefix }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}

impl Registrar for RouteGroup<'_> {
    fn add_route(
        &mut self,
        method: Method,
        pattern: &str,
        callback: impl Into<Callback>,
        middleware: Option<MiddlewareRef>,
    ) -> RouteHandle<'_> {
        let full = format!("{}{}", self.prefix, pattern);
        self.routes.add(method, full, callback.into(), middleware)
    }

    fn group<F>(&mut self, prefix: &str, build: F)
    where
        F: FnOnce(&mut RouteGroup<'_>),
    {
        let prefix = format!("{}{}", self.prefix, prefix);
        build(&mut RouteGroup::new(self.routes, prefix));
    }
}

impl Registrar for RouteSet {
    fn add_route(
        &mut self,
        method: Method,
        pattern: &str,
        callback: impl Into<Callback>,
        middleware: Option<MiddlewareRef>,
    ) -> RouteHandle<'_> {
        self.add(method, pattern.to_string(), callback.into(), middleware)
    }

    fn group<F>(&mut self, prefix: &str, build: F)
    where
        F: FnOnce(&mut RouteGroup<'_>),
    {
        build(&mut RouteGroup::new(self, prefix.to_string()));
    }
}
