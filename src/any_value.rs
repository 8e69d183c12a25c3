use crate::dispose::isolate;
use std::any::{type_name, Any, TypeId};
use std::fmt;

type Teardown = Box<dyn FnOnce() + Send + Sync>;

/// A type-erased entry held by a [`Container`](crate::Container).
///
/// Containers only move these around; the typed sheets are the only place
/// that downcasts them back.
pub struct StoredValue {
    type_id: TypeId,
    type_name: &'static str,
    value: Box<dyn Any + Send + Sync>,
    teardown: Option<Teardown>,
}

impl StoredValue {
    /// Create a new StoredValue from a value of any type that implements Any, Send, and Sync
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: type_name::<T>(),
            value: Box::new(value),
            teardown: None,
        }
    }

    pub(crate) fn with_teardown<F>(mut self, hook: F) -> Self
    where
        F: FnOnce() + Send + Sync + 'static,
    {
        self.teardown = Some(Box::new(hook));
        self
    }

    /// Check if the contained value is of type T
    pub fn is_type<T: 'static>(&self) -> bool {
        self.type_id == TypeId::of::<T>()
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn has_teardown(&self) -> bool {
        self.teardown.is_some()
    }

    /// Get a reference to the contained value if it is of type T
    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.value.downcast_ref::<T>()
    }

    /// Unwrap the contained value if it is of type T
    pub fn downcast<T: 'static>(self) -> Result<T, Self> {
        if !self.is_type::<T>() {
            return Err(self);
        }
        let StoredValue {
            type_id,
            type_name,
            value,
            teardown,
        } = self;
        value.downcast::<T>().map(|b| *b).map_err(|value| StoredValue {
            type_id,
            type_name,
            value,
            teardown,
        })
    }

    /// Releases the entry, running its teardown hook if it has one.
    ///
    /// Returns false if the hook panicked; the panic is logged and swallowed.
    pub fn dispose(mut self) -> bool {
        match self.teardown.take() {
            Some(hook) => isolate("teardown hook", hook),
            None => true,
        }
    }
}

impl fmt::Debug for StoredValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoredValue")
            .field("type_name", &self.type_name)
            .field("has_teardown", &self.teardown.is_some())
            .finish()
    }
}
