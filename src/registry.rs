use crate::any_value::StoredValue;
use crate::container::{Container, Slot};
use crate::dispose::isolate;
use crate::factory::{ContainerFactory, ContainerSpec};
use crate::{Namespace, TypeKey};
use parking_lot::RwLock;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;

type ContainerMap = HashMap<TypeKey, Box<dyn Container>>;

/// Type key → container map shared by [`ValueSheet`](crate::ValueSheet) and
/// [`RefSheet`](crate::RefSheet).
///
/// Containers are created by the factory on the first write for their type key
/// and live until the registry is disposed. Reads and existence checks never
/// create containers.
pub(crate) struct Registry {
    namespace: Namespace,
    factory: Arc<dyn ContainerFactory>,
    containers: RwLock<ContainerMap>,
}

impl Registry {
    pub(crate) fn new(namespace: Namespace, factory: Arc<dyn ContainerFactory>) -> Self {
        Self {
            namespace,
            factory,
            containers: RwLock::new(HashMap::new()),
        }
    }

    /// Runs `f` on the entry at `slot` (or `None`) under the read lock.
    pub(crate) fn inspect<T, F>(&self, type_key: &TypeKey, slot: Slot<'_>, f: F) -> T
    where
        F: FnOnce(Option<&StoredValue>) -> T,
    {
        let containers = self.containers.read();
        f(containers
            .get(type_key)
            .and_then(|container| container.read(slot)))
    }

    pub(crate) fn contains(&self, type_key: &TypeKey, slot: Slot<'_>) -> bool {
        self.containers
            .read()
            .get(type_key)
            .is_some_and(|container| container.has_key(slot))
    }

    /// Stores `value`, creating the container first if needed. Returns the
    /// replaced entry.
    pub(crate) fn insert(
        &self,
        type_key: TypeKey,
        slot: Slot<'_>,
        value: StoredValue,
    ) -> Option<StoredValue> {
        let spec = ContainerSpec {
            type_key,
            namespace: self.namespace,
        };

        // Build outside the lock; only a concurrent dispose makes us build under it
        let mut fresh = None;
        if !self.containers.read().contains_key(&type_key) {
            fresh = Some(self.factory.create(&spec));
        }

        let (replaced, evicted) = {
            let mut containers = self.containers.write();
            let container = match containers.entry(type_key) {
                Entry::Occupied(entry) => entry.into_mut(),
                Entry::Vacant(entry) => {
                    tracing::debug!(?type_key, namespace = ?self.namespace, "container created");
                    entry.insert(fresh.take().unwrap_or_else(|| self.factory.create(&spec)))
                }
            };
            tracing::trace!(?type_key, ?slot, "write");
            let replaced = container.write(slot, value);
            if !container.has_key(slot) {
                tracing::error!(
                    ?type_key,
                    ?slot,
                    "write not stored; factory built the wrong kind of container"
                );
            }
            (replaced, container.drain_evicted())
        };

        // Teardown hooks may call back into this registry
        for entry in evicted {
            entry.dispose();
        }
        replaced
    }

    pub(crate) fn remove(&self, type_key: &TypeKey, slot: Slot<'_>) -> Option<StoredValue> {
        let removed = self.containers.write().get_mut(type_key)?.remove(slot);
        if removed.is_some() {
            tracing::trace!(?type_key, ?slot, "remove");
        }
        removed
    }

    /// Keys of the keyed container for `type_key` that downcast to `K`.
    pub(crate) fn keys<K: Clone + 'static>(&self, type_key: &TypeKey) -> Vec<K> {
        let containers = self.containers.read();
        let Some(container) = containers.get(type_key) else {
            return Vec::new();
        };
        container
            .keys()
            .into_iter()
            .filter_map(|key| key.as_any().downcast_ref::<K>().cloned())
            .collect()
    }

    pub(crate) fn container_count(&self) -> usize {
        self.containers.read().len()
    }

    /// Disposes every container and forgets it. Safe to call repeatedly; the
    /// registry can be written to again afterwards.
    pub(crate) fn dispose(&self) {
        let drained: Vec<(TypeKey, Box<dyn Container>)> =
            self.containers.write().drain().collect();
        if drained.is_empty() {
            return;
        }

        let count = drained.len();
        for (type_key, mut container) in drained {
            if !isolate("container dispose", || container.dispose()) {
                tracing::warn!(?type_key, "container failed to dispose cleanly");
            }
        }
        tracing::debug!(namespace = ?self.namespace, containers = count, "registry disposed");
    }
}

impl Drop for Registry {
    fn drop(&mut self) {
        self.dispose();
    }
}
