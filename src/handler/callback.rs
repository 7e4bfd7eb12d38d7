//! Handler declarations and their resolution against the registry.

use std::any::type_name;
use std::fmt;
use std::sync::Arc;

use crate::di::{Registry, RegistryError};
use crate::handler::{Handler, HandlerRef};

type Construct = Box<dyn FnOnce(&Registry) -> Result<HandlerRef, RegistryError> + Send>;

/// A handler as declared at registration time.
///
/// Only [`Callback::resolve`] turns it into something invocable; anything
/// that fails to resolve is rejected before the server starts.
pub enum Callback {
    /// Already a handler.
    Bound(HandlerRef),
    /// A handler type built from registry dependencies.
    Construct { name: &'static str, build: Construct },
    /// A handler stored in the registry under this key.
    Service(String),
}

/// A handler type that builds itself from registry dependencies.
pub trait FromRegistry: Handler + Sized {
    fn from_registry(registry: &Registry) -> Result<Self, RegistryError>;
}

impl Callback {
    /// Declare a handler of type `H`, built from the registry at build time.
    pub fn construct<H: FromRegistry>() -> Self {
        Callback::Construct {
            name: type_name::<H>(),
            build: Box::new(|registry| {
                let handler: HandlerRef = Arc::new(H::from_registry(registry)?);
                Ok(handler)
            }),
        }
    }

    /// Declare a handler stored in the registry as a [`HandlerRef`].
    pub fn service(key: impl Into<String>) -> Self {
        Callback::Service(key.into())
    }

    pub fn resolve(self, registry: &Registry) -> Result<HandlerRef, RegistryError> {
        match self {
            Callback::Bound(handler) => Ok(handler),
            Callback::Construct { build, .. } => build(registry),
            Callback::Service(key) => registry.get_cloned::<HandlerRef>(&key),
        }
    }
}

impl<H: Handler> From<H> for Callback {
    fn from(handler: H) -> Self {
        Callback::Bound(Arc::new(handler))
    }
}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Callback::Bound(_) => f.write_str("Callback::Bound"),
            Callback::Construct { name, .. } => write!(f, "Callback::Construct({name})"),
            Callback::Service(key) => write!(f, "Callback::Service({key})"),
        }
    }
}
