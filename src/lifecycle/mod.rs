//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Shutdown (shutdown.rs):
//!     trigger() → every wait() future resolves → server stops accepting
//!     → in-flight requests drain → Shutdown event fires
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → resolve the shutdown future passed to App::run
//! ```

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
pub use signals::shutdown_signal;
