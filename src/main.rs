//! lightmoon demo server.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ───────────────▶ http::server (axum fallback, request id, trace, timeout)
//!                          │
//!                          ▼
//!                      app::kernel ──▶ routing::Router::dispatch
//!                          │                 │
//!                          │        Found / MethodNotAllowed / NotFound
//!                          ▼
//!                      http::adapter (TransportRequest → Request)
//!                          │
//!                          ▼
//!                      middleware ──▶ Next ──▶ handler
//!                          │
//!                          ▼
//!     Client Response  http::adapter (Response → headers, cookies, status, body)
//!     ◀───────────────
//! ```

use std::path::PathBuf;

use axum::http::{HeaderName, HeaderValue, StatusCode};
use clap::Parser;
use futures_util::future::BoxFuture;

use lightmoon::app::SETTING;
use lightmoon::config::{load_config, validate_config, AppConfig, ConfigError};
use lightmoon::handler::HandlerResult;
use lightmoon::http::RequestIdExt;
use lightmoon::{
    handler_fn, middleware_fn, App, Callback, FromRegistry, Handler, Next, Registrar, Registry,
    Request, Response, ResponseCookie,
};

#[derive(Parser)]
#[command(name = "lightmoon")]
#[command(about = "Minimal HTTP routing and dispatch server", long_about = None)]
struct Cli {
    /// TOML config file; defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override `listener.host`.
    #[arg(long)]
    host: Option<String>,

    /// Override `listener.port`.
    #[arg(short, long)]
    port: Option<u16>,
}

/// Reports the address the app was configured with.
struct About {
    bind_address: String,
}

impl Handler for About {
    fn call(&self, request: Request, response: Response) -> BoxFuture<'_, HandlerResult> {
        Box::pin(async move {
            let body = serde_json::json!({
                "name": "lightmoon",
                "version": env!("CARGO_PKG_VERSION"),
                "listen": self.bind_address,
                "request_id": request.request_id(),
            });
            Ok(response
                .with_header(
                    axum::http::header::CONTENT_TYPE,
                    HeaderValue::from_static("application/json"),
                )
                .with_body(serde_json::to_vec(&body)?))
        })
    }
}

impl FromRegistry for About {
    fn from_registry(registry: &Registry) -> Result<Self, lightmoon::di::RegistryError> {
        let config = registry.get::<AppConfig>(SETTING)?;
        Ok(Self {
            bind_address: config.listener.bind_address(),
        })
    }
}

fn load(cli: &Cli) -> Result<AppConfig, ConfigError> {
    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => AppConfig::default(),
    };
    if let Some(host) = &cli.host {
        config.listener.host = host.clone();
    }
    if let Some(port) = cli.port {
        config.listener.port = port;
    }
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

fn routes(app: &mut App) {
    app.get("/", handler_fn(|_req: Request, res: Response| async move {
        Ok(res.with_text("Hello, lightmoon"))
    }));

    app.get("/about", Callback::construct::<About>());

    app.get("/users/{id:\\d+}", handler_fn(|req: Request, mut res: Response| async move {
        let id = req.param("id").unwrap_or_default().to_string();
        res.write(format!("user {id}"));
        Ok(res)
    }));

    app.get("/hello[/{name}]", handler_fn(|req: Request, res: Response| async move {
        let name = req.param("name").unwrap_or("stranger").to_string();
        Ok(res
            .with_cookie(ResponseCookie {
                path: Some("/".into()),
                http_only: true,
                ..ResponseCookie::new("greeted", name.clone())
            })
            .with_text(format!("Hello, {name}")))
    }));

    app.group("/api", |api| {
        api.post("/echo", handler_fn(|req: Request, res: Response| async move {
            Ok(res.with_body(req.body()))
        }))
        .middleware(middleware_fn(|req: Request, res: Response, next: Next| async move {
            if req.body().is_empty() {
                return Ok(res
                    .with_status(StatusCode::BAD_REQUEST)
                    .with_text("empty body"));
            }
            let response = next.run(req, res).await?;
            Ok(response.with_header(
                HeaderName::from_static("x-powered-by"),
                HeaderValue::from_static("lightmoon"),
            ))
        }));
    });
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load(&cli)?;

    lightmoon::observability::logging::init(&config.observability)?;
    tracing::info!("lightmoon v{} starting", env!("CARGO_PKG_VERSION"));

    tracing::info!(
        bind_address = %config.listener.bind_address(),
        request_timeout_secs = config.server.request_timeout_secs,
        body_limit_bytes = config.server.body_limit_bytes,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        if let Some(addr) = config.observability.metrics_socket_addr() {
            lightmoon::observability::metrics::init_metrics(addr)?;
        }
    }

    let mut app = App::new(config);
    routes(&mut app);
    app.on_shutdown(|| tracing::info!("Shutdown complete"));

    app.run().await?;
    Ok(())
}
