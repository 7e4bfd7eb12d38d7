//! Application lifecycle events.

use crate::http::server::{ShutdownCallback, StartCallback};
use crate::http::{HttpServer, ServerEvent, StartInfo};

/// A lifecycle event together with its callback.
pub enum Lifecycle {
    /// Once, after the listener is bound.
    Start(StartCallback),
    /// Once, after in-flight requests have drained.
    Shutdown(ShutdownCallback),
}

impl Lifecycle {
    pub fn start(f: impl FnOnce(&StartInfo) + Send + 'static) -> Self {
        Lifecycle::Start(Box::new(f))
    }

    pub fn shutdown(f: impl FnOnce() + Send + 'static) -> Self {
        Lifecycle::Shutdown(Box::new(f))
    }
}

/// Lifecycle callbacks, consumed when bound to a server.
#[derive(Default)]
pub(crate) struct EventMap {
    start: Option<StartCallback>,
    shutdown: Option<ShutdownCallback>,
}

impl EventMap {
    /// Set the callback for an event; the latest registration wins.
    pub(crate) fn set(&mut self, event: Lifecycle) {
        match event {
            Lifecycle::Start(f) => self.start = Some(f),
            Lifecycle::Shutdown(f) => self.shutdown = Some(f),
        }
    }

    /// Hand every callback to `server`, filling in the default start log.
    pub(crate) fn bind(self, server: &mut HttpServer) {
        let start = self.start.unwrap_or_else(|| Box::new(log_start));
        server.on(ServerEvent::Start(start));
        if let Some(shutdown) = self.shutdown {
            server.on(ServerEvent::Shutdown(shutdown));
        }
    }
}

fn log_start(info: &StartInfo) {
    tracing::info!(address = %info.local_addr, "Server start at {}", info.local_addr);
}
