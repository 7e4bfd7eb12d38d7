//! Key/value service registry.

use std::any::{type_name, Any};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use std::thread::{self, ThreadId};

use thiserror::Error;

type Shared = Arc<dyn Any + Send + Sync>;
type Factory = Box<dyn Fn(&Registry) -> Result<Shared, RegistryError> + Send + Sync>;

/// Error returned by typed registry lookups.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("no entry registered under `{0}`")]
    Missing(String),

    #[error("entry `{key}` is not a `{expected}`")]
    TypeMismatch { key: String, expected: &'static str },

    #[error("shared service `{0}` depends on itself")]
    Cycle(String),
}

enum Entry {
    Value(Shared),
    /// Built on first lookup, then shared.
    Lazy { factory: Factory, cell: OnceLock<Shared> },
}

/// Opaque registry of named dependencies.
#[derive(Default)]
pub struct Registry {
    entries: HashMap<String, Entry>,
    /// Shared services whose factory is running, per building thread.
    building: Mutex<HashSet<(ThreadId, String)>>,
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<_> = self.entries.keys().collect();
        keys.sort();
        f.debug_struct("Registry").field("keys", &keys).finish()
    }
}

/// Marks a shared service as under construction until dropped.
struct Building<'r> {
    registry: &'r Registry,
    slot: (ThreadId, String),
}

impl<'r> Building<'r> {
    fn enter(registry: &'r Registry, key: &str) -> Result<Self, RegistryError> {
        let slot = (thread::current().id(), key.to_string());
        let mut building = registry
            .building
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if !building.insert(slot.clone()) {
            return Err(RegistryError::Cycle(key.to_string()));
        }
        Ok(Self { registry, slot })
    }
}

impl Drop for Building<'_> {
    fn drop(&mut self) {
        self.registry
            .building
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.slot);
    }
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a ready value, replacing any previous entry under `key`.
    pub fn insert<T>(&mut self, key: impl Into<String>, value: T)
    where
        T: Any + Send + Sync,
    {
        self.entries.insert(key.into(), Entry::Value(Arc::new(value)));
    }

    /// Store a service built on first lookup and shared afterwards.
    ///
    /// The factory may look up other entries. A lookup that leads back to a
    /// service still being built fails with [`RegistryError::Cycle`]; a
    /// failed build is not cached and is retried on the next lookup.
    pub fn share<T, F>(&mut self, key: impl Into<String>, factory: F)
    where
        T: Any + Send + Sync,
        F: Fn(&Registry) -> Result<T, RegistryError> + Send + Sync + 'static,
    {
        let factory: Factory =
            Box::new(move |registry| factory(registry).map(|value| Arc::new(value) as Shared));
        self.entries.insert(
            key.into(),
            Entry::Lazy {
                factory,
                cell: OnceLock::new(),
            },
        );
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up `key` as a shared `T`.
    pub fn get<T>(&self, key: &str) -> Result<Arc<T>, RegistryError>
    where
        T: Any + Send + Sync,
    {
        let shared = match self.entries.get(key) {
            Some(Entry::Value(value)) => value.clone(),
            Some(Entry::Lazy { factory, cell }) => self.build_shared(key, factory, cell)?,
            None => return Err(RegistryError::Missing(key.to_string())),
        };

        shared
            .downcast::<T>()
            .map_err(|_| RegistryError::TypeMismatch {
                key: key.to_string(),
                expected: type_name::<T>(),
            })
    }

    /// Look up `key` and clone the value out.
    pub fn get_cloned<T>(&self, key: &str) -> Result<T, RegistryError>
    where
        T: Any + Send + Sync + Clone,
    {
        self.get::<T>(key).map(|value| (*value).clone())
    }

    /// Let a provider populate the registry.
    pub fn register<P: ServiceProvider + ?Sized>(&mut self, provider: &P) {
        provider.register(self);
    }

    fn build_shared(
        &self,
        key: &str,
        factory: &Factory,
        cell: &OnceLock<Shared>,
    ) -> Result<Shared, RegistryError> {
        if let Some(shared) = cell.get() {
            return Ok(shared.clone());
        }

        let built = {
            let _building = Building::enter(self, key)?;
            factory(self)?
        };
        tracing::debug!(key = %key, "Shared service built");
        // Another thread may have won the race; keep whichever landed first.
        Ok(cell.get_or_init(|| built).clone())
    }
}

/// A bundle of registrations, applied through [`Registry::register`].
pub trait ServiceProvider {
    fn register(&self, registry: &mut Registry);
}
