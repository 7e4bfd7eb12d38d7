//! Service registry used while the application is being built.
//!
//! # Data Flow
//! ```text
//! App::new / App::register(provider)
//!     → registry.rs (values and lazily shared services by key)
//!
//! App::build
//!     → handler callbacks resolve their dependencies from the registry
//!     → registry is dropped; handlers keep what they resolved
//! ```
//!
//! # Design Decisions
//! - Opaque to the routing core: it never inspects entries
//! - Only consulted during build, never per request
//! - Typed lookups fail with an explicit error instead of panicking

pub mod registry;

pub use registry::{Registry, RegistryError, ServiceProvider};
