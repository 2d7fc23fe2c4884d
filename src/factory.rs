//! Scope-aware resource resolution
//!
//! [`ScopedResourceFactory`] fronts an external [`ResourceLocator`] with
//! scope semantics: names marked shareable behave as singletons (one
//! lookup, cached for the factory's lifetime), everything else behaves as
//! a prototype and hits the locator on every request.
//!
//! Instances cross the factory as [`ResourceHandle`]s, type-erased but
//! carrying enough type identity for checked downcasts and precise
//! mismatch errors.

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::debug;

use crate::error::{LookupError, ResolveError, ResolveResult};

/// Type identity of a resolved resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceType {
    pub id: TypeId,
    pub name: &'static str,
}

/// A shared, type-erased resource instance.
#[derive(Clone)]
pub struct ResourceHandle {
    value: Arc<dyn Any + Send + Sync>,
    type_id: TypeId,
    type_name: &'static str,
}

impl ResourceHandle {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self::from_arc(Arc::new(value))
    }

    pub fn from_arc<T: Any + Send + Sync>(value: Arc<T>) -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            value,
        }
    }

    pub fn is<T: Any>(&self) -> bool {
        self.type_id == TypeId::of::<T>()
    }

    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.value.clone().downcast::<T>().ok()
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Name of the concrete type, as captured at construction.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn resource_type(&self) -> ResourceType {
        ResourceType {
            id: self.type_id,
            name: self.type_name,
        }
    }
}

impl fmt::Debug for ResourceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceHandle")
            .field("type", &self.type_name)
            .finish()
    }
}

/// External service that produces instances by name.
///
/// Implementations must be callable from multiple threads; the factory
/// serializes lookups only for shareable names.
pub trait ResourceLocator: Send + Sync {
    fn lookup(&self, name: &str) -> Result<ResourceHandle, LookupError>;
}

/// Scope-aware cache in front of a [`ResourceLocator`].
pub struct ScopedResourceFactory {
    locator: Arc<dyn ResourceLocator>,
    /// Names resolved at most once and then shared.
    shareable: FxHashSet<String>,
    singletons: Mutex<FxHashMap<String, ResourceHandle>>,
    /// Type identities observed for prototype names; shareable names get
    /// their type from the singleton cache instead.
    resource_types: Mutex<FxHashMap<String, ResourceType>>,
}

impl ScopedResourceFactory {
    pub fn new(locator: Arc<dyn ResourceLocator>) -> Self {
        Self {
            locator,
            shareable: FxHashSet::default(),
            singletons: Mutex::new(FxHashMap::default()),
            resource_types: Mutex::new(FxHashMap::default()),
        }
    }

    pub fn with_shareable<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.shareable.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn add_shareable(&mut self, name: impl Into<String>) {
        self.shareable.insert(name.into());
    }

    pub fn is_shareable(&self, name: &str) -> bool {
        self.shareable.contains(name)
    }

    /// Resolve a name to an instance of the expected type.
    pub fn get<T: Any + Send + Sync>(&self, name: &str) -> ResolveResult<Arc<T>> {
        let handle = self.get_untyped(name)?;
        handle
            .downcast::<T>()
            .ok_or_else(|| ResolveError::TypeMismatch {
                name: name.to_string(),
                required: std::any::type_name::<T>(),
                actual: handle.type_name(),
            })
    }

    /// Resolve a name without committing to a type.
    pub fn get_untyped(&self, name: &str) -> ResolveResult<ResourceHandle> {
        if self.is_shareable(name) {
            self.shared(name)
        } else {
            self.lookup(name)
        }
    }

    /// Whether the name currently resolves. Probes the locator for
    /// uncached names and never populates any cache.
    pub fn contains(&self, name: &str) -> bool {
        if self.singletons.lock().contains_key(name) {
            return true;
        }
        self.locator.lookup(name).is_ok()
    }

    /// Shareable names are singletons; everything else is a prototype.
    pub fn is_singleton(&self, name: &str) -> bool {
        self.is_shareable(name)
    }

    pub fn is_prototype(&self, name: &str) -> bool {
        !self.is_shareable(name)
    }

    /// Type identity of the instance a name resolves to.
    ///
    /// For prototype names the observed type is cached and may go stale if
    /// the locator later starts returning a different type; resolving the
    /// name itself always reflects the live instance.
    pub fn resolved_type(&self, name: &str) -> ResolveResult<ResourceType> {
        if self.is_shareable(name) {
            return Ok(self.shared(name)?.resource_type());
        }
        if let Some(known) = self.resource_types.lock().get(name) {
            return Ok(*known);
        }
        let resolved = self.lookup(name)?.resource_type();
        self.resource_types.lock().insert(name.to_string(), resolved);
        Ok(resolved)
    }

    /// Drop every cached instance and observed type. Shareable names are
    /// looked up afresh on next use.
    pub fn clear_cache(&self) {
        self.singletons.lock().clear();
        self.resource_types.lock().clear();
        debug!("cleared resolution caches");
    }

    fn shared(&self, name: &str) -> ResolveResult<ResourceHandle> {
        // The lookup runs while the lock is held, so concurrent requests
        // for the same name resolve it exactly once.
        let mut singletons = self.singletons.lock();
        if let Some(handle) = singletons.get(name) {
            return Ok(handle.clone());
        }
        let handle = self.lookup(name)?;
        debug!(name, r#type = handle.type_name(), "caching shared resource");
        singletons.insert(name.to_string(), handle.clone());
        Ok(handle)
    }

    fn lookup(&self, name: &str) -> ResolveResult<ResourceHandle> {
        self.locator.lookup(name).map_err(|err| match err {
            LookupError::NotFound => ResolveError::NotFound {
                name: name.to_string(),
            },
            LookupError::Failed(reason) => ResolveError::LookupFailed {
                name: name.to_string(),
                reason,
            },
        })
    }
}

impl fmt::Debug for ScopedResourceFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopedResourceFactory")
            .field("shareable", &self.shareable)
            .field("cached", &self.singletons.lock().len())
            .finish()
    }
}
