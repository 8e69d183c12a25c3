use crate::any_value::StoredValue;
use crate::container::{SheetKey, Slot};
use crate::factory::{ContainerFactory, DefaultFactory};
use crate::registry::Registry;
use crate::{Namespace, TypeKey};
use std::fmt;
use std::sync::Arc;

/// Bounds for value records. Blanket-implemented.
///
/// `Default` supplies the value of anything never written; `Clone` lets reads
/// hand out copies without holding a lock.
pub trait Value: Clone + Default + Send + Sync + 'static {}

impl<T> Value for T where T: Clone + Default + Send + Sync + 'static {}

/// Type-indexed store of value records.
///
/// Each type `V` has one unkeyed slot, and each `(K, V)` pair has its own keyed
/// map; the two never overlap. Reading something that was never written gives
/// `V::default()`. Reads and existence checks never allocate storage.
///
/// # Examples
///
/// ```
/// use sovran_sheet::ValueSheet;
///
/// let sheet = ValueSheet::new();
///
/// assert_eq!(sheet.read::<i32>(), 0);
/// assert!(!sheet.has_value::<i32>());
///
/// sheet.write(42i32);
/// sheet.write_keyed("pi".to_string(), 3.14f64);
///
/// assert_eq!(sheet.read::<i32>(), 42);
/// assert_eq!(sheet.read_keyed::<String, f64>(&"pi".to_string()), 3.14);
/// assert_eq!(sheet.read_keyed::<String, f64>(&"e".to_string()), 0.0);
///
/// // The unkeyed f64 slot is independent from the keyed one
/// assert!(!sheet.has_value::<f64>());
/// ```
pub struct ValueSheet {
    registry: Registry,
}

impl ValueSheet {
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
            registry: Registry::new(Namespace::Value, factory),
        }
    }

    /// Reads the value of `V`, or `V::default()` if none was written.
    pub fn read<V: Value>(&self) -> V {
        self.try_read::<V>().unwrap_or_default()
    }

    /// Reads the value of `V` if one was written.
    pub fn try_read<V: Value>(&self) -> Option<V> {
        self.registry.inspect(&TypeKey::of::<V>(), Slot::Single, |entry| {
            entry.and_then(|e| e.downcast_ref::<V>()).cloned()
        })
    }

    /// Reads the value of `V` unless it is absent or equal to `V::default()`.
    pub fn read_non_default<V: Value + PartialEq>(&self) -> Option<V> {
        self.try_read::<V>().filter(|value| *value != V::default())
    }

    /// Stores `value` as the value of `V`, replacing any previous one.
    pub fn write<V: Value>(&self, value: V) {
        self.registry
            .insert(TypeKey::of::<V>(), Slot::Single, StoredValue::new(value));
    }

    pub fn read_keyed<K: SheetKey, V: Value>(&self, key: &K) -> V {
        self.try_read_keyed::<K, V>(key).unwrap_or_default()
    }

    pub fn try_read_keyed<K: SheetKey, V: Value>(&self, key: &K) -> Option<V> {
        self.registry.inspect(&TypeKey::keyed::<K, V>(), Slot::Keyed(key), |entry| {
                entry.and_then(|e| e.downcast_ref::<V>()).cloned()
            })
    }

    pub fn write_keyed<K: SheetKey, V: Value>(&self, key: K, value: V) {
        self.registry.insert(
            TypeKey::keyed::<K, V>(),
            Slot::Keyed(&key),
            StoredValue::new(value),
        );
    }

    /// True if a value of `V` was written. Never allocates storage.
    pub fn has_value<V: Value>(&self) -> bool {
        self.registry.contains(&TypeKey::of::<V>(), Slot::Single)
    }

    pub fn has_keyed_value<K: SheetKey, V: Value>(&self, key: &K) -> bool {
        self.registry
            .contains(&TypeKey::keyed::<K, V>(), Slot::Keyed(key))
    }

    /// Runs `f` on the stored value of `V` (or on `V::default()`) without
    /// cloning it.
    ///
    /// `f` runs while the sheet is locked for reading and must not write to it.
    ///
    /// ```
    /// use sovran_sheet::ValueSheet;
    ///
    /// let sheet = ValueSheet::new();
    /// sheet.write(vec![1, 2, 3]);
    /// assert_eq!(sheet.with(|v: &Vec<i32>| v.len()), 3);
    /// ```
    pub fn with<V: Value, F, R>(&self, f: F) -> R
    where
        F: FnOnce(&V) -> R,
    {
        self.registry.inspect(&TypeKey::of::<V>(), Slot::Single, |entry| {
            match entry.and_then(|e| e.downcast_ref::<V>()) {
                Some(value) => f(value),
                None => f(&V::default()),
            }
        })
    }

    /// Read-modify-write of the value of `V`. Returns the stored result.
    ///
    /// ```
    /// use sovran_sheet::ValueSheet;
    ///
    /// let sheet = ValueSheet::new();
    /// sheet.update(|count: &mut u32| *count += 1);
    /// assert_eq!(sheet.update(|count: &mut u32| *count += 1), 2);
    /// ```
    pub fn update<V: Value, F>(&self, f: F) -> V
    where
        F: FnOnce(&mut V),
    {
        let mut value = self.read::<V>();
        f(&mut value);
        self.write(value.clone());
        value
    }

    /// Removes the value of `V`, returning it.
    pub fn remove<V: Value>(&self) -> Option<V> {
        self.registry
            .remove(&TypeKey::of::<V>(), Slot::Single)
            .and_then(|entry| entry.downcast::<V>().ok())
    }

    pub fn remove_keyed<K: SheetKey, V: Value>(&self, key: &K) -> Option<V> {
        self.registry
            .remove(&TypeKey::keyed::<K, V>(), Slot::Keyed(key))
            .and_then(|entry| entry.downcast::<V>().ok())
    }

    /// Keys currently holding a `V` in the `(K, V)` container.
    pub fn keys<K: SheetKey, V: Value>(&self) -> Vec<K> {
        self.registry.keys::<K>(&TypeKey::keyed::<K, V>())
    }

    /// Number of containers allocated so far.
    pub fn container_count(&self) -> usize {
        self.registry.container_count()
    }

    pub fn is_empty(&self) -> bool {
        self.container_count() == 0
    }

    /// Releases every container and its entries. The sheet stays usable.
    pub fn dispose(&self) {
        self.registry.dispose();
    }
}

impl Default for ValueSheet {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ValueSheet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValueSheet")
            .field("containers", &self.container_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Debug, Default, PartialEq)]
    struct Position {
        x: f32,
        y: f32,
    }

    #[test]
    fn test_defaults_without_allocation() {
        let sheet = ValueSheet::new();
        assert_eq!(sheet.read::<Position>(), Position::default());
        assert_eq!(sheet.read_keyed::<u32, Position>(&1), Position::default());
        assert!(!sheet.has_value::<Position>());
        assert!(!sheet.has_keyed_value::<u32, Position>(&1));
        assert!(sheet.try_read::<Position>().is_none());
        assert!(sheet.is_empty());
    }

    #[test]
    fn test_read_non_default() {
        let sheet = ValueSheet::new();
        sheet.write(0u64);
        assert!(sheet.has_value::<u64>());
        assert_eq!(sheet.read_non_default::<u64>(), None);
        sheet.write(9u64);
        assert_eq!(sheet.read_non_default::<u64>(), Some(9));
    }

    #[test]
    fn test_with_and_update() {
        let sheet = ValueSheet::new();
        let x = sheet.with(|p: &Position| p.x);
        assert_eq!(x, 0.0);

        let moved = sheet.update(|p: &mut Position| p.x += 2.5);
        assert_eq!(moved.x, 2.5);
        assert_eq!(sheet.with(|p: &Position| p.x), 2.5);
    }

    #[test]
    fn test_remove_and_keys() {
        let sheet = ValueSheet::new();
        sheet.write_keyed(1u32, Position { x: 1.0, y: 1.0 });
        sheet.write_keyed(2u32, Position { x: 2.0, y: 2.0 });

        let mut keys = sheet.keys::<u32, Position>();
        keys.sort();
        assert_eq!(keys, vec![1, 2]);

        assert_eq!(
            sheet.remove_keyed::<u32, Position>(&1),
            Some(Position { x: 1.0, y: 1.0 })
        );
        assert!(!sheet.has_keyed_value::<u32, Position>(&1));
        assert_eq!(sheet.keys::<u32, Position>(), vec![2]);

        assert_eq!(sheet.remove::<Position>(), None);
    }

    #[test]
    fn test_dispose_clears_everything() {
        let sheet = ValueSheet::new();
        sheet.write(1i32);
        sheet.write_keyed("a", 2i32);
        assert_eq!(sheet.container_count(), 2);

        sheet.dispose();
        assert!(sheet.is_empty());
        assert!(!sheet.has_value::<i32>());
        assert_eq!(sheet.read_keyed::<&str, i32>(&"a"), 0);
    }
}
