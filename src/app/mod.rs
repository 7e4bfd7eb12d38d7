//! Application controller.
//!
//! # Data Flow
//! ```text
//! Registration (App, mutable):
//!     get/post/put/delete/patch/head/add_route/group → routes.rs
//!     register(provider) → Registry
//!     on(Lifecycle) → EventMap
//!
//! App::build (consumes the App):
//!     every Callback resolved against the Registry
//!     → any configuration error aborts with all of them
//!     → RouteTable compiled into Router → Kernel
//!     → HttpServer with Start / Request / Shutdown bound
//!
//! App::run:
//!     build → bind listener from config → serve until SIGINT/SIGTERM
//! ```
//!
//! # Design Decisions
//! - Registration methods exist only before build; the compiled kernel
//!   cannot be changed
//! - The registry is dropped after build; handlers keep what they resolved

pub mod events;
pub mod kernel;
pub mod routes;

use std::future::Future;

use axum::http::Method;
use tokio::net::TcpListener;

use crate::config::AppConfig;
use crate::di::{Registry, ServiceProvider};
use crate::error::AppError;
use crate::handler::{BoxError, Callback, MiddlewareRef};
use crate::http::{HttpServer, ServerEvent};
use crate::lifecycle::shutdown_signal;
use crate::observability::metrics;

pub use events::Lifecycle;
pub use kernel::Kernel;
pub use routes::{Registrar, RouteGroup, RouteHandle};
pub use crate::http::StartInfo;

use events::EventMap;
use routes::RouteSet;

/// Registry key the application config is stored under.
pub const SETTING: &str = "setting";

/// An application under construction.
pub struct App {
    config: AppConfig,
    registry: Registry,
    routes: RouteSet,
    events: EventMap,
}

impl App {
    /// Create an app; `config` is also available from the registry as `"setting"`.
    pub fn new(config: AppConfig) -> Self {
        let mut registry = Registry::new();
        registry.insert(SETTING, config.clone());
        Self {
            config,
            registry,
            routes: RouteSet::default(),
            events: EventMap::default(),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    /// Let `provider` populate the registry.
    pub fn register<P: ServiceProvider>(&mut self, provider: P) -> &mut Self {
        self.registry.register(&provider);
        self
    }

    /// Bind a lifecycle callback; a later callback for the same event wins.
    pub fn on(&mut self, event: Lifecycle) -> &mut Self {
        self.events.set(event);
        self
    }

    pub fn on_start(&mut self, f: impl FnOnce(&StartInfo) + Send + 'static) -> &mut Self {
        self.on(Lifecycle::start(f))
    }

    pub fn on_shutdown(&mut self, f: impl FnOnce() + Send + 'static) -> &mut Self {
        self.on(Lifecycle::shutdown(f))
    }

    /// Resolve every handler and compile the routes.
    pub fn into_kernel(self) -> Result<Kernel, AppError> {
        self.compile().map(|(kernel, _, _)| kernel)
    }

    /// Compile the app into a server with every event bound.
    pub fn build(self) -> Result<HttpServer, AppError> {
        let (kernel, events, config) = self.compile()?;

        let mut server = HttpServer::new(config.server);
        events.bind(&mut server);
        server.on(ServerEvent::request(move |native, sink| {
            let kernel = kernel.clone();
            async move { kernel.handle(&native, sink).await.map_err(BoxError::from) }
        }));
        Ok(server)
    }

    /// Build, bind the configured address and serve until SIGINT/SIGTERM.
    pub async fn run(self) -> Result<(), AppError> {
        let address = self.config.listener.bind_address();
        let server = self.build()?;

        let listener = TcpListener::bind(&address).await?;
        tracing::debug!(address = %address, "Listener bound");
        server.start(listener, shutdown_signal()).await?;
        Ok(())
    }

    /// Build and serve on `listener` until `shutdown` resolves.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> Result<(), AppError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let server = self.build()?;
        server.start(listener, shutdown).await?;
        Ok(())
    }

    fn compile(self) -> Result<(Kernel, EventMap, AppConfig), AppError> {
        let App {
            config,
            registry,
            routes,
            events,
        } = self;
        let RouteSet { table, mut errors } = routes;

        match table.try_map(|pending| pending.resolve(&registry)) {
            Ok(table) if errors.is_empty() => {
                let router = table.compile();
                tracing::info!(routes = router.len(), "Routes compiled");
                metrics::record_routes(router.len());
                Ok((Kernel::new(router), events, config))
            }
            Ok(_) => Err(configuration_failed(errors)),
            Err(mut unresolved) => {
                errors.append(&mut unresolved);
                Err(configuration_failed(errors))
            }
        }
    }
}

fn configuration_failed(errors: Vec<crate::error::ConfigurationError>) -> AppError {
    for error in &errors {
        tracing::error!(error = %error, "Invalid route");
    }
    AppError::Configuration(errors)
}

impl Default for App {
    fn default() -> Self {
        Self::new(AppConfig::default())
    }
}

impl Registrar for App {
    fn add_route(
        &mut self,
        method: Method,
        pattern: &str,
        callback: impl Into<Callback>,
        middleware: Option<MiddlewareRef>,
    ) -> RouteHandle<'_> {
        self.routes.add_route(method, pattern, callback, middleware)
    }

    fn group<F>(&mut self, prefix: &str, build: F)
    where
        F: FnOnce(&mut RouteGroup<'_>),
    {
        self.routes.group(prefix, build);
    }
}
