//! Scoped service locator.
//!
//! Toolkits resolve services (themes, clipboards, platform shims) through a
//! locator. Each test runs inside a fresh scope so registrations made by one
//! test do not leak into the next; lookups fall through to outer scopes.

use std::any::{Any, TypeId};
use std::collections::HashMap;

type Scope = HashMap<TypeId, Box<dyn Any + Send>>;

/// Stack of type-keyed service scopes.
pub struct Locator {
    scopes: Vec<Scope>,
}

impl Default for Locator {
    fn default() -> Self {
        Self {
            scopes: vec![Scope::new()],
        }
    }
}

impl std::fmt::Debug for Locator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Locator")
            .field("depth", &self.depth())
            .field("services", &self.count())
            .finish()
    }
}

impl Locator {
    /// Create a locator holding only the root scope
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a fresh scope.
    pub fn enter_scope(&mut self) {
        self.scopes.push(Scope::new());
    }

    /// Pop the innermost scope. The root scope is never popped.
    ///
    /// Returns `false` when only the root scope remained.
    pub fn exit_scope(&mut self) -> bool {
        if self.scopes.len() > 1 {
            self.scopes.pop();
            true
        } else {
            false
        }
    }

    /// Number of scopes including the root
    #[must_use]
    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    /// Register a service in the innermost scope, replacing one of the
    /// same type in that scope.
    pub fn register<T: Any + Send>(&mut self, service: T) {
        if let Some(scope) = self.scopes.last_mut() {
            let _ = scope.insert(TypeId::of::<T>(), Box::new(service));
        }
    }

    /// Look a service up, innermost scope first.
    #[must_use]
    pub fn get<T: Any + Send>(&self) -> Option<&T> {
        let type_id = TypeId::of::<T>();
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(&type_id))
            .and_then(|service| service.downcast_ref::<T>())
    }

    /// Mutable lookup, innermost scope first.
    #[must_use]
    pub fn get_mut<T: Any + Send>(&mut self) -> Option<&mut T> {
        let type_id = TypeId::of::<T>();
        self.scopes
            .iter_mut()
            .rev()
            .find_map(|scope| scope.get_mut(&type_id))
            .and_then(|service| service.downcast_mut::<T>())
    }

    /// Whether a service of type `T` is visible
    #[must_use]
    pub fn contains<T: Any + Send>(&self) -> bool {
        self.get::<T>().is_some()
    }

    /// Total registrations across all scopes
    #[must_use]
    pub fn count(&self) -> usize {
        self.scopes.iter().map(HashMap::len).sum()
    }
}
