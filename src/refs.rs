use crate::any_value::StoredValue;
use crate::container::{SheetKey, Slot};
use crate::dispose::Dispose;
use crate::error::Lookup;
use crate::factory::{ContainerFactory, DefaultFactory};
use crate::registry::Registry;
use crate::{Namespace, SheetError, TypeKey};
use std::fmt;
use std::sync::Arc;

/// Type-indexed store of shared references.
///
/// Entries are `Arc<R>` handles, where `R` may be a trait object. Unlike
/// [`ValueSheet`](crate::ValueSheet), reading something that was never set is
/// an error: there is no meaningful default object. Setting `None` removes the
/// entry.
///
/// # Examples
///
/// ```
/// use sovran_sheet::{RefSheet, SheetError};
/// use std::sync::Arc;
///
/// trait Greeter: Send + Sync {
///     fn greet(&self) -> String;
/// }
///
/// struct English;
///
/// impl Greeter for English {
///     fn greet(&self) -> String {
///         "Hello".to_string()
///     }
/// }
///
/// let sheet = RefSheet::new();
/// assert!(sheet.get::<dyn Greeter>().is_err());
///
/// sheet.set::<dyn Greeter>(Some(Arc::new(English)));
/// assert_eq!(sheet.get::<dyn Greeter>()?.greet(), "Hello");
///
/// sheet.set::<dyn Greeter>(None);
/// assert!(!sheet.has_ref::<dyn Greeter>());
/// # Ok::<(), SheetError>(())
/// ```
pub struct RefSheet {
    registry: Registry,
}

impl RefSheet {
    /// Creates an empty sheet using [`DefaultFactory`].
    pub fn new() -> Self {
        Self::with_factory(DefaultFactory)
    }

    /// Creates an empty sheet whose containers are built by `factory`.
    pub fn with_factory<F: ContainerFactory + 'static>(factory: F) -> Self {
        Self::with_shared_factory(Arc::new(factory))
    }

    pub fn with_shared_factory(factory: Arc<dyn ContainerFactory>) -> Self {
        Self {
            registry: Registry::new(Namespace::Reference, factory),
        }
    }

    /// Fetches the reference stored for `R`.
    ///
    /// # Errors
    ///
    /// - Returns `SheetError::ReferenceNotFound` if nothing is set for `R`
    /// - Returns `SheetError::TypeMismatch` if the container holds a foreign entry
    pub fn get<R>(&self) -> Result<Arc<R>, SheetError>
    where
        R: ?Sized + Send + Sync + 'static,
    {
        let type_key = TypeKey::of::<R>();
        self.registry.inspect(&type_key, Slot::Single, |entry| {
            resolve::<R>(entry, type_key, || Lookup::Global)
        })
    }

    /// Fetches the reference stored for `R`, or `None`.
    pub fn try_get<R>(&self) -> Option<Arc<R>>
    where
        R: ?Sized + Send + Sync + 'static,
    {
        self.get::<R>().ok()
    }

    /// Fetches the reference stored for `R`, or builds a fallback (which is
    /// not stored).
    pub fn get_or_else<R, F>(&self, fallback: F) -> Arc<R>
    where
        R: ?Sized + Send + Sync + 'static,
        F: FnOnce() -> Arc<R>,
    {
        self.try_get::<R>().unwrap_or_else(fallback)
    }

    /// Stores `reference` for `R`; `None` removes the current entry.
    pub fn set<R>(&self, reference: Option<Arc<R>>)
    where
        R: ?Sized + Send + Sync + 'static,
    {
        let type_key = TypeKey::of::<R>();
        match reference {
            Some(reference) => {
                self.registry
                    .insert(type_key, Slot::Single, StoredValue::new(reference));
            }
            None => {
                self.registry.remove(&type_key, Slot::Single);
            }
        }
    }

    /// Like [`set`](Self::set), and runs the referent's [`Dispose::dispose`]
    /// when this sheet is torn down.
    pub fn set_disposable<R>(&self, reference: Option<Arc<R>>)
    where
        R: ?Sized + Dispose + Send + Sync + 'static,
    {
        let type_key = TypeKey::of::<R>();
        match reference {
            Some(reference) => {
                self.registry
                    .insert(type_key, Slot::Single, disposable(reference));
            }
            None => {
                self.registry.remove(&type_key, Slot::Single);
            }
        }
    }

    /// Fetches the reference stored for `R` under `key`.
    ///
    /// # Errors
    ///
    /// - Returns `SheetError::ReferenceNotFound` if the key (or the whole
    ///   `(K, R)` container) is absent
    /// - Returns `SheetError::TypeMismatch` if the container holds a foreign entry
    pub fn get_keyed<K, R>(&self, key: &K) -> Result<Arc<R>, SheetError>
    where
        K: SheetKey,
        R: ?Sized + Send + Sync + 'static,
    {
        let type_key = TypeKey::keyed::<K, R>();
        self.registry.inspect(&type_key, Slot::Keyed(key), |entry| {
            resolve::<R>(entry, type_key, || Lookup::key(key))
        })
    }

    pub fn try_get_keyed<K, R>(&self, key: &K) -> Option<Arc<R>>
    where
        K: SheetKey,
        R: ?Sized + Send + Sync + 'static,
    {
        self.get_keyed::<K, R>(key).ok()
    }

    /// Stores `reference` for `R` under `key`; `None` removes that key.
    pub fn set_keyed<K, R>(&self, key: K, reference: Option<Arc<R>>)
    where
        K: SheetKey,
        R: ?Sized + Send + Sync + 'static,
    {
        let type_key = TypeKey::keyed::<K, R>();
        match reference {
            Some(reference) => {
                self.registry
                    .insert(type_key, Slot::Keyed(&key), StoredValue::new(reference));
            }
            None => {
                self.registry.remove(&type_key, Slot::Keyed(&key));
            }
        }
    }

    pub fn set_keyed_disposable<K, R>(&self, key: K, reference: Option<Arc<R>>)
    where
        K: SheetKey,
        R: ?Sized + Dispose + Send + Sync + 'static,
    {
        let type_key = TypeKey::keyed::<K, R>();
        match reference {
            Some(reference) => {
                self.registry
                    .insert(type_key, Slot::Keyed(&key), disposable(reference));
            }
            None => {
                self.registry.remove(&type_key, Slot::Keyed(&key));
            }
        }
    }

    /// True if a reference is set for `R`. Never allocates storage.
    pub fn has_ref<R>(&self) -> bool
    where
        R: ?Sized + Send + Sync + 'static,
    {
        self.registry.contains(&TypeKey::of::<R>(), Slot::Single)
    }

    pub fn has_keyed_ref<K, R>(&self, key: &K) -> bool
    where
        K: SheetKey,
        R: ?Sized + Send + Sync + 'static,
    {
        self.registry
            .contains(&TypeKey::keyed::<K, R>(), Slot::Keyed(key))
    }

    /// Keys currently holding an `R` in the `(K, R)` container.
    pub fn keys<K, R>(&self) -> Vec<K>
    where
        K: SheetKey,
        R: ?Sized + Send + Sync + 'static,
    {
        self.registry.keys::<K>(&TypeKey::keyed::<K, R>())
    }

    /// Number of containers allocated so far.
    pub fn container_count(&self) -> usize {
        self.registry.container_count()
    }

    pub fn is_empty(&self) -> bool {
        self.container_count() == 0
    }

    /// Releases every container, running the teardown hooks of entries stored
    /// with `set_disposable`. The sheet stays usable.
    pub fn dispose(&self) {
        self.registry.dispose();
    }
}

fn resolve<R>(
    entry: Option<&StoredValue>,
    type_key: TypeKey,
    lookup: impl FnOnce() -> Lookup,
) -> Result<Arc<R>, SheetError>
where
    R: ?Sized + Send + Sync + 'static,
{
    let entry = entry.ok_or_else(|| SheetError::ReferenceNotFound {
        type_key,
        lookup: lookup(),
    })?;
    entry
        .downcast_ref::<Arc<R>>()
        .cloned()
        .ok_or(SheetError::TypeMismatch { type_key })
}

fn disposable<R>(reference: Arc<R>) -> StoredValue
where
    R: ?Sized + Dispose + Send + Sync + 'static,
{
    let hook = Arc::clone(&reference);
    StoredValue::new(reference).with_teardown(move || hook.dispose())
}

impl Default for RefSheet {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RefSheet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefSheet")
            .field("containers", &self.container_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    trait Animal: Send + Sync {
        fn make_sound(&self) -> String;
    }

    struct Dog {
        name: String,
    }

    impl Animal for Dog {
        fn make_sound(&self) -> String {
            format!("{} says: Woof!", self.name)
        }
    }

    struct Connection {
        closed: AtomicBool,
    }

    impl Dispose for Connection {
        fn dispose(&self) {
            self.closed.store(true, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_trait_object_round_trip() -> Result<(), SheetError> {
        let sheet = RefSheet::new();
        let dog: Arc<dyn Animal> = Arc::new(Dog {
            name: "Rover".to_string(),
        });
        sheet.set::<dyn Animal>(Some(Arc::clone(&dog)));

        let fetched = sheet.get::<dyn Animal>()?;
        assert!(Arc::ptr_eq(&dog, &fetched));
        assert_eq!(fetched.make_sound(), "Rover says: Woof!");

        // A concrete type is a different key than the trait object
        assert!(sheet.get::<Dog>().is_err());
        Ok(())
    }

    #[test]
    fn test_not_found_reports_lookup() {
        let sheet = RefSheet::new();
        match sheet.get::<String>() {
            Err(SheetError::ReferenceNotFound { lookup, .. }) => {
                assert_eq!(lookup, Lookup::Global)
            }
            other => panic!("expected ReferenceNotFound, got {:?}", other),
        }

        sheet.set_keyed::<u32, String>(1, Some(Arc::new("one".to_string())));
        match sheet.get_keyed::<u32, String>(&2) {
            Err(SheetError::ReferenceNotFound { lookup, .. }) => {
                assert_eq!(lookup, Lookup::Key("2".to_string()))
            }
            other => panic!("expected ReferenceNotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_get_or_else_does_not_store() {
        let sheet = RefSheet::new();
        let fallback = sheet.get_or_else::<String, _>(|| Arc::new("fallback".to_string()));
        assert_eq!(fallback.as_str(), "fallback");
        assert!(!sheet.has_ref::<String>());
    }

    #[test]
    fn test_disposable_runs_on_teardown_only() {
        let sheet = RefSheet::new();
        let conn = Arc::new(Connection {
            closed: AtomicBool::new(false),
        });
        sheet.set_disposable(Some(Arc::clone(&conn)));
        assert!(!conn.closed.load(Ordering::SeqCst));

        sheet.dispose();
        assert!(conn.closed.load(Ordering::SeqCst));
        assert!(!sheet.has_ref::<Connection>());
    }

    #[test]
    fn test_clearing_does_not_dispose() {
        let sheet = RefSheet::new();
        let conn = Arc::new(Connection {
            closed: AtomicBool::new(false),
        });
        sheet.set_keyed_disposable("db", Some(Arc::clone(&conn)));
        sheet.set_keyed_disposable::<&str, Connection>("db", None);

        assert!(!sheet.has_keyed_ref::<&str, Connection>(&"db"));
        sheet.dispose();
        assert!(!conn.closed.load(Ordering::SeqCst));
    }
}
