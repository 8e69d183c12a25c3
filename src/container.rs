//! Container backends: the storage unit behind one [`TypeKey`](crate::TypeKey).

use crate::any_value::StoredValue;
use std::any::Any;
use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::{Hash, Hasher};

/// Bounds for keys of keyed containers. Blanket-implemented.
pub trait SheetKey: Clone + Eq + Hash + Debug + Send + Sync + 'static {}

impl<T> SheetKey for T where T: Clone + Eq + Hash + Debug + Send + Sync + 'static {}

/// A type-erased key with dynamic equality and hashing.
///
/// Every [`SheetKey`] is a `SlotKey`. Two slot keys of different concrete types
/// are never equal.
pub trait SlotKey: Any + Debug + Send + Sync {
    fn as_any(&self) -> &dyn Any;
    fn dyn_eq(&self, other: &dyn SlotKey) -> bool;
    fn dyn_hash(&self, state: &mut dyn Hasher);
    fn clone_key(&self) -> Box<dyn SlotKey>;
}

impl<K: SheetKey> SlotKey for K {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn dyn_eq(&self, other: &dyn SlotKey) -> bool {
        other
            .as_any()
            .downcast_ref::<K>()
            .is_some_and(|other| other == self)
    }

    fn dyn_hash(&self, mut state: &mut dyn Hasher) {
        self.hash(&mut state);
    }

    fn clone_key(&self) -> Box<dyn SlotKey> {
        Box::new(self.clone())
    }
}

impl PartialEq for dyn SlotKey {
    fn eq(&self, other: &Self) -> bool {
        self.dyn_eq(other)
    }
}

impl Eq for dyn SlotKey {}

impl Hash for dyn SlotKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.dyn_hash(state);
    }
}

/// Address of an entry inside a container.
#[derive(Clone, Copy, Debug)]
pub enum Slot<'a> {
    /// The only entry of an unkeyed container.
    Single,
    /// One entry of a keyed container.
    Keyed(&'a (dyn SlotKey + 'static)),
}

/// Storage for one type or one `(key, value)` type pair.
///
/// Registries own containers as `Box<dyn Container>` and never look at their
/// concrete type. Implementations decide the storage strategy; the default
/// ones are [`SingleContainer`] and [`MapContainer`].
pub trait Container: Send + Sync {
    fn read(&self, slot: Slot<'_>) -> Option<&StoredValue>;

    /// Stores `value`, returning the entry it replaced.
    fn write(&mut self, slot: Slot<'_>, value: StoredValue) -> Option<StoredValue>;

    fn remove(&mut self, slot: Slot<'_>) -> Option<StoredValue>;

    fn has_key(&self, slot: Slot<'_>) -> bool {
        self.read(slot).is_some()
    }

    /// Keys currently present. Empty for unkeyed containers.
    fn keys(&self) -> Vec<&(dyn SlotKey + 'static)>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Entries the container dropped on its own since the last call (for
    /// example on eviction). Their teardown hooks have not run yet; the
    /// registry disposes them once its lock is released.
    fn drain_evicted(&mut self) -> Vec<StoredValue> {
        Vec::new()
    }

    /// Releases every entry, running teardown hooks. Must leave the container
    /// empty and must tolerate being called again.
    fn dispose(&mut self);
}

/// Unkeyed container: a single optional slot.
#[derive(Debug, Default)]
pub struct SingleContainer {
    entry: Option<StoredValue>,
}

impl SingleContainer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Container for SingleContainer {
    fn read(&self, slot: Slot<'_>) -> Option<&StoredValue> {
        match slot {
            Slot::Single => self.entry.as_ref(),
            Slot::Keyed(_) => None,
        }
    }

    fn write(&mut self, slot: Slot<'_>, value: StoredValue) -> Option<StoredValue> {
        if let Slot::Keyed(key) = slot {
            tracing::warn!(?key, "keyed write to an unkeyed container ignored");
            return None;
        }
        self.entry.replace(value)
    }

    fn remove(&mut self, slot: Slot<'_>) -> Option<StoredValue> {
        match slot {
            Slot::Single => self.entry.take(),
            Slot::Keyed(_) => None,
        }
    }

    fn keys(&self) -> Vec<&(dyn SlotKey + 'static)> {
        Vec::new()
    }

    fn len(&self) -> usize {
        usize::from(self.entry.is_some())
    }

    fn dispose(&mut self) {
        if let Some(entry) = self.entry.take() {
            entry.dispose();
        }
    }
}

/// Keyed container backed by a `HashMap`.
#[derive(Debug, Default)]
pub struct MapContainer {
    entries: HashMap<Box<dyn SlotKey>, StoredValue>,
}

impl MapContainer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Container for MapContainer {
    fn read(&self, slot: Slot<'_>) -> Option<&StoredValue> {
        match slot {
            Slot::Keyed(key) => self.entries.get(key),
            Slot::Single => None,
        }
    }

    fn write(&mut self, slot: Slot<'_>, value: StoredValue) -> Option<StoredValue> {
        match slot {
            Slot::Keyed(key) => self.entries.insert(key.clone_key(), value),
            Slot::Single => {
                tracing::warn!("unkeyed write to a keyed container ignored");
                None
            }
        }
    }

    fn remove(&mut self, slot: Slot<'_>) -> Option<StoredValue> {
        match slot {
            Slot::Keyed(key) => self.entries.remove(key),
            Slot::Single => None,
        }
    }

    fn keys(&self) -> Vec<&(dyn SlotKey + 'static)> {
        self.entries.keys().map(|key| key.as_ref()).collect()
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn dispose(&mut self) {
        for (_, entry) in self.entries.drain() {
            entry.dispose();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_slot_key_equality() {
        let a: Box<dyn SlotKey> = Box::new("pi".to_string());
        let b: Box<dyn SlotKey> = Box::new("pi".to_string());
        let c: Box<dyn SlotKey> = Box::new(7u32);
        assert!(*a == *b);
        assert!(*a != *c);
    }

    #[test]
    fn test_single_container() {
        let mut container = SingleContainer::new();
        assert!(!container.has_key(Slot::Single));
        assert!(container.write(Slot::Single, StoredValue::new(1i32)).is_none());
        let previous = container.write(Slot::Single, StoredValue::new(2i32));
        assert_eq!(previous.and_then(|v| v.downcast::<i32>().ok()), Some(1));
        assert_eq!(
            container.read(Slot::Single).and_then(|v| v.downcast_ref::<i32>()),
            Some(&2)
        );
        assert_eq!(container.len(), 1);
        assert!(container.remove(Slot::Single).is_some());
        assert!(container.is_empty());
    }

    #[test]
    fn test_map_container_lookup_by_borrowed_key() {
        let mut container = MapContainer::new();
        let key = "pi".to_string();
        container.write(Slot::Keyed(&key), StoredValue::new(3.14f64));

        let lookup = "pi".to_string();
        assert!(container.has_key(Slot::Keyed(&lookup)));
        assert!(!container.has_key(Slot::Keyed(&"e".to_string())));
        assert!(!container.has_key(Slot::Single));
        assert_eq!(
            container
                .read(Slot::Keyed(&lookup))
                .and_then(|v| v.downcast_ref::<f64>()),
            Some(&3.14)
        );

        let keys = container.keys();
        assert_eq!(keys.len(), 1);
        assert_eq!(keys[0].as_any().downcast_ref::<String>(), Some(&key));
    }

    #[test]
    fn test_map_container_dispose_continues_past_panics() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut container = MapContainer::new();
        for i in 0..3u8 {
            let counter = Arc::clone(&calls);
            let entry = StoredValue::new(i).with_teardown(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                if i == 1 {
                    panic!("teardown {} failed", i);
                }
            });
            container.write(Slot::Keyed(&i), entry);
        }

        container.dispose();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(container.is_empty());

        // A second dispose has nothing left to release
        container.dispose();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
