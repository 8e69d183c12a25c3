//! Container factories: the strategy seam between registries and storage.

use crate::any_value::StoredValue;
use crate::container::{Container, MapContainer, SingleContainer, Slot, SlotKey};
use crate::{Namespace, SheetError, TypeKey};
use std::collections::{HashMap, VecDeque};
use std::num::NonZeroUsize;

/// What a registry asks a factory to build.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ContainerSpec {
    pub type_key: TypeKey,
    pub namespace: Namespace,
}

impl ContainerSpec {
    pub fn is_keyed(&self) -> bool {
        self.type_key.is_keyed()
    }
}

/// Builds a fresh [`Container`] for a type key.
///
/// Registries call the factory once per type key, on the first write. The
/// factory runs without any registry lock held but must not call back into
/// the sheet that is asking.
///
/// The container must match the spec: keyed ([`ContainerSpec::is_keyed`])
/// specs need a container that stores keyed slots, unkeyed specs one that
/// stores the single slot. Writes to the wrong kind are dropped and logged at
/// `error`.
///
/// Any `Fn(&ContainerSpec) -> Box<dyn Container>` is a factory:
///
/// ```
/// use sovran_sheet::{Container, ContainerSpec, MapContainer, SingleContainer, ValueSheet};
///
/// let sheet = ValueSheet::with_factory(|spec: &ContainerSpec| -> Box<dyn Container> {
///     if spec.is_keyed() {
///         Box::new(MapContainer::new())
///     } else {
///         Box::new(SingleContainer::new())
///     }
/// });
/// sheet.write(5u8);
/// assert_eq!(sheet.read::<u8>(), 5);
/// ```
pub trait ContainerFactory: Send + Sync {
    fn create(&self, spec: &ContainerSpec) -> Box<dyn Container>;
}

impl<F> ContainerFactory for F
where
    F: Fn(&ContainerSpec) -> Box<dyn Container> + Send + Sync,
{
    fn create(&self, spec: &ContainerSpec) -> Box<dyn Container> {
        self(spec)
    }
}

/// Plain in-memory containers: [`SingleContainer`] for unkeyed type keys and
/// [`MapContainer`] for keyed ones.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultFactory;

impl ContainerFactory for DefaultFactory {
    fn create(&self, spec: &ContainerSpec) -> Box<dyn Container> {
        if spec.is_keyed() {
            Box::new(MapContainer::new())
        } else {
            Box::new(SingleContainer::new())
        }
    }
}

/// Keyed containers that hold at most `capacity` entries.
///
/// When a write of a new key would exceed the capacity, the oldest key is
/// evicted; the registry disposes the entry after releasing its lock. Unkeyed
/// containers are unaffected.
#[derive(Clone, Copy, Debug)]
pub struct BoundedFactory {
    capacity: NonZeroUsize,
}

impl BoundedFactory {
    /// # Errors
    ///
    /// Returns `SheetError::InvalidArgument` if `capacity` is zero.
    pub fn new(capacity: usize) -> Result<Self, SheetError> {
        let capacity = NonZeroUsize::new(capacity)
            .ok_or(SheetError::InvalidArgument("bounded capacity must be non-zero"))?;
        Ok(Self { capacity })
    }

    pub fn capacity(&self) -> usize {
        self.capacity.get()
    }
}

impl ContainerFactory for BoundedFactory {
    fn create(&self, spec: &ContainerSpec) -> Box<dyn Container> {
        if spec.is_keyed() {
            Box::new(BoundedContainer::new(self.capacity))
        } else {
            Box::new(SingleContainer::new())
        }
    }
}

/// Keyed container with FIFO eviction.
#[derive(Debug)]
pub struct BoundedContainer {
    capacity: NonZeroUsize,
    order: VecDeque<Box<dyn SlotKey>>,
    entries: HashMap<Box<dyn SlotKey>, StoredValue>,
    evicted: Vec<StoredValue>,
}

impl BoundedContainer {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            capacity,
            order: VecDeque::new(),
            entries: HashMap::new(),
            evicted: Vec::new(),
        }
    }

    fn evict_oldest(&mut self) {
        let Some(oldest) = self.order.pop_front() else {
            return;
        };
        if let Some(entry) = self.entries.remove(oldest.as_ref()) {
            tracing::warn!(key = ?oldest, "evicting oldest entry from bounded container");
            self.evicted.push(entry);
        }
    }
}

impl Container for BoundedContainer {
    fn read(&self, slot: Slot<'_>) -> Option<&StoredValue> {
        match slot {
            Slot::Keyed(key) => self.entries.get(key),
            Slot::Single => None,
        }
    }

    fn write(&mut self, slot: Slot<'_>, value: StoredValue) -> Option<StoredValue> {
        let Slot::Keyed(key) = slot else {
            tracing::warn!("unkeyed write to a keyed container ignored");
            return None;
        };
        if let Some(existing) = self.entries.get_mut(key) {
            return Some(std::mem::replace(existing, value));
        }
        while self.entries.len() >= self.capacity.get() && !self.order.is_empty() {
            self.evict_oldest();
        }
        self.order.push_back(key.clone_key());
        self.entries.insert(key.clone_key(), value)
    }

    fn remove(&mut self, slot: Slot<'_>) -> Option<StoredValue> {
        let Slot::Keyed(key) = slot else {
            return None;
        };
        let removed = self.entries.remove(key)?;
        self.order.retain(|k| k.as_ref() != key);
        Some(removed)
    }

    fn keys(&self) -> Vec<&(dyn SlotKey + 'static)> {
        self.order.iter().map(|key| key.as_ref()).collect()
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn drain_evicted(&mut self) -> Vec<StoredValue> {
        std::mem::take(&mut self.evicted)
    }

    fn dispose(&mut self) {
        self.order.clear();
        for entry in self.evicted.drain(..) {
            entry.dispose();
        }
        for (_, entry) in self.entries.drain() {
            entry.dispose();
        }
    }
}
