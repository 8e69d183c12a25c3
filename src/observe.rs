//! Read/write notifications layered over a [`ValueSheet`].

use crate::container::SheetKey;
use crate::dispose::isolate;
use crate::values::{Value, ValueSheet};
use crate::TypeKey;
use parking_lot::Mutex;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

/// The kind of access an observer listens to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Access {
    Read,
    Write,
}

type ObserverKey = (Access, TypeKey);
type ValueCallback<V> = Box<dyn Fn(&V) + Send + Sync>;
type KeyedCallback<K, V> = Box<dyn Fn(&K, &V) + Send + Sync>;

struct Observer {
    id: u64,
    active: AtomicBool,
    // ValueCallback<V> or KeyedCallback<K, V>, depending on the key
    callback: Box<dyn Any + Send + Sync>,
}

impl Observer {
    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}

#[derive(Default)]
struct ObserverTable {
    next_id: AtomicU64,
    lists: Mutex<HashMap<ObserverKey, Vec<Arc<Observer>>>>,
}

impl ObserverTable {
    fn add(
        self: &Arc<Self>,
        key: ObserverKey,
        callback: Box<dyn Any + Send + Sync>,
    ) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let observer = Arc::new(Observer {
            id,
            active: AtomicBool::new(true),
            callback,
        });
        self.lists
            .lock()
            .entry(key)
            .or_default()
            .push(Arc::clone(&observer));
        tracing::debug!(access = ?key.0, type_key = ?key.1, id, "observer added");

        Subscription {
            table: Arc::downgrade(self),
            key,
            observer: Arc::downgrade(&observer),
            id,
            detached: false,
        }
    }

    fn remove(&self, key: &ObserverKey, id: u64) {
        let removed = {
            let mut lists = self.lists.lock();
            let Some(list) = lists.get_mut(key) else {
                return;
            };
            let removed = list
                .iter()
                .position(|observer| observer.id == id)
                .map(|index| list.remove(index));
            if list.is_empty() {
                lists.remove(key);
            }
            removed
        };
        // Callbacks may own other subscriptions; drop them outside the lock
        if removed.is_some() {
            tracing::debug!(access = ?key.0, type_key = ?key.1, id, "observer removed");
        }
        drop(removed);
    }

    fn snapshot(&self, key: &ObserverKey) -> Vec<Arc<Observer>> {
        self.lists.lock().get(key).cloned().unwrap_or_default()
    }

    fn is_observed(&self, key: &ObserverKey) -> bool {
        self.lists.lock().contains_key(key)
    }

    fn count(&self) -> usize {
        self.lists.lock().values().map(Vec::len).sum()
    }

    fn clear(&self) {
        let drained: Vec<Vec<Arc<Observer>>> =
            self.lists.lock().drain().map(|(_, list)| list).collect();
        for observer in drained.iter().flatten() {
            observer.active.store(false, Ordering::SeqCst);
        }
    }

    fn notify<V: 'static>(&self, access: Access, type_key: TypeKey, value: &V) {
        for observer in self.snapshot(&(access, type_key)) {
            if !observer.is_active() {
                continue;
            }
            if let Some(callback) = observer.callback.downcast_ref::<ValueCallback<V>>() {
                isolate("observer", || callback(value));
            }
        }
    }

    fn notify_keyed<K: 'static, V: 'static>(
        &self,
        access: Access,
        type_key: TypeKey,
        key: &K,
        value: &V,
    ) {
        for observer in self.snapshot(&(access, type_key)) {
            if !observer.is_active() {
                continue;
            }
            if let Some(callback) = observer.callback.downcast_ref::<KeyedCallback<K, V>>() {
                isolate("observer", || callback(key, value));
            }
        }
    }
}

/// Handle to one observer registration.
///
/// Dropping the handle unsubscribes; call [`detach`](Subscription::detach) to
/// keep the observer until its sheet is torn down instead.
#[must_use = "dropping a Subscription unsubscribes its observer"]
pub struct Subscription {
    table: Weak<ObserverTable>,
    key: ObserverKey,
    observer: Weak<Observer>,
    id: u64,
    detached: bool,
}

impl Subscription {
    /// Removes the observer. Safe to call repeatedly, from inside a callback,
    /// or after the sheet is gone.
    pub fn dispose(&self) {
        let Some(observer) = self.observer.upgrade() else {
            return;
        };
        if observer.active.swap(false, Ordering::SeqCst) {
            if let Some(table) = self.table.upgrade() {
                table.remove(&self.key, self.id);
            }
        }
    }

    pub fn is_active(&self) -> bool {
        self.observer
            .upgrade()
            .is_some_and(|observer| observer.is_active())
    }

    /// Leaves the observer registered for the lifetime of its sheet.
    pub fn detach(mut self) {
        self.detached = true;
    }

    pub fn access(&self) -> Access {
        self.key.0
    }

    pub fn type_key(&self) -> TypeKey {
        self.key.1
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if !self.detached {
            self.dispose();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("access", &self.key.0)
            .field("type_key", &self.key.1)
            .field("active", &self.is_active())
            .finish()
    }
}

/// A [`ValueSheet`] that tells observers about reads and writes.
///
/// Every read or write is delegated first; observers for the matching type
/// key then run synchronously, in registration order, before the call
/// returns. Observers may read, write and subscribe from inside a callback,
/// and may dispose any subscription (their own included). A panicking
/// observer is logged and skipped; the others still run.
///
/// # Examples
///
/// ```
/// use sovran_sheet::ObservableSheet;
/// use std::sync::atomic::{AtomicI32, Ordering};
/// use std::sync::Arc;
///
/// let sheet = ObservableSheet::default();
/// let last = Arc::new(AtomicI32::new(0));
///
/// let seen = Arc::clone(&last);
/// let subscription = sheet.on_write(move |value: &i32| seen.store(*value, Ordering::SeqCst));
///
/// sheet.write(7i32);
/// assert_eq!(last.load(Ordering::SeqCst), 7);
///
/// subscription.dispose();
/// sheet.write(8i32);
/// assert_eq!(last.load(Ordering::SeqCst), 7);
/// ```
pub struct ObservableSheet {
    inner: ValueSheet,
    observers: Arc<ObserverTable>,
}

impl ObservableSheet {
    pub fn new(inner: ValueSheet) -> Self {
        Self {
            inner,
            observers: Arc::new(ObserverTable::default()),
        }
    }

    /// The wrapped sheet. Access through it is not observed.
    pub fn inner(&self) -> &ValueSheet {
        &self.inner
    }

    pub fn read<V: Value>(&self) -> V {
        let value = self.inner.read::<V>();
        self.observers
            .notify(Access::Read, TypeKey::of::<V>(), &value);
        value
    }

    /// Like [`read`](Self::read) but `None` when nothing was written; read
    /// observers only run when a value is present.
    pub fn try_read<V: Value>(&self) -> Option<V> {
        let value = self.inner.try_read::<V>()?;
        self.observers
            .notify(Access::Read, TypeKey::of::<V>(), &value);
        Some(value)
    }

    pub fn read_non_default<V: Value + PartialEq>(&self) -> Option<V> {
        let value = self.read::<V>();
        (value != V::default()).then_some(value)
    }

    /// Runs `f` on the value of `V` (or `V::default()`); read observers then
    /// see the same value `f` saw.
    ///
    /// With no read observer for `V` nothing is cloned and `f` runs under the
    /// sheet's read lock, as in [`ValueSheet::with`]. Otherwise the value is
    /// read first and `f` runs on that copy without any lock held.
    pub fn with<V: Value, F, R>(&self, f: F) -> R
    where
        F: FnOnce(&V) -> R,
    {
        let type_key = TypeKey::of::<V>();
        if !self.observers.is_observed(&(Access::Read, type_key)) {
            return self.inner.with(f);
        }
        let value = self.inner.read::<V>();
        let result = f(&value);
        self.observers.notify(Access::Read, type_key, &value);
        result
    }

    pub fn write<V: Value>(&self, value: V) {
        self.inner.write(value.clone());
        self.observers
            .notify(Access::Write, TypeKey::of::<V>(), &value);
    }

    pub fn read_keyed<K: SheetKey, V: Value>(&self, key: &K) -> V {
        let value = self.inner.read_keyed::<K, V>(key);
        self.observers
            .notify_keyed(Access::Read, TypeKey::keyed::<K, V>(), key, &value);
        value
    }

    pub fn try_read_keyed<K: SheetKey, V: Value>(&self, key: &K) -> Option<V> {
        let value = self.inner.try_read_keyed::<K, V>(key)?;
        self.observers
            .notify_keyed(Access::Read, TypeKey::keyed::<K, V>(), key, &value);
        Some(value)
    }

    pub fn write_keyed<K: SheetKey, V: Value>(&self, key: K, value: V) {
        self.inner.write_keyed(key.clone(), value.clone());
        self.observers
            .notify_keyed(Access::Write, TypeKey::keyed::<K, V>(), &key, &value);
    }

    pub fn has_value<V: Value>(&self) -> bool {
        self.inner.has_value::<V>()
    }

    pub fn has_keyed_value<K: SheetKey, V: Value>(&self, key: &K) -> bool {
        self.inner.has_keyed_value::<K, V>(key)
    }

    /// Read-modify-write of the value of `V`; write observers see the result.
    pub fn update<V: Value, F>(&self, f: F) -> V
    where
        F: FnOnce(&mut V),
    {
        let value = self.inner.update(f);
        self.observers
            .notify(Access::Write, TypeKey::of::<V>(), &value);
        value
    }

    /// Removes the value of `V` without notifying anyone.
    pub fn remove<V: Value>(&self) -> Option<V> {
        self.inner.remove::<V>()
    }

    pub fn remove_keyed<K: SheetKey, V: Value>(&self, key: &K) -> Option<V> {
        self.inner.remove_keyed::<K, V>(key)
    }

    pub fn keys<K: SheetKey, V: Value>(&self) -> Vec<K> {
        self.inner.keys::<K, V>()
    }

    /// Calls `callback` after every write of `V`.
    pub fn on_write<V, F>(&self, callback: F) -> Subscription
    where
        V: Value,
        F: Fn(&V) + Send + Sync + 'static,
    {
        self.subscribe(Access::Write, callback)
    }

    /// Calls `callback` after every read of `V`.
    pub fn on_read<V, F>(&self, callback: F) -> Subscription
    where
        V: Value,
        F: Fn(&V) + Send + Sync + 'static,
    {
        self.subscribe(Access::Read, callback)
    }

    /// Calls `callback` after every keyed write of `V` under any `K`.
    pub fn on_keyed_write<K, V, F>(&self, callback: F) -> Subscription
    where
        K: SheetKey,
        V: Value,
        F: Fn(&K, &V) + Send + Sync + 'static,
    {
        self.subscribe_keyed(Access::Write, callback)
    }

    pub fn on_keyed_read<K, V, F>(&self, callback: F) -> Subscription
    where
        K: SheetKey,
        V: Value,
        F: Fn(&K, &V) + Send + Sync + 'static,
    {
        self.subscribe_keyed(Access::Read, callback)
    }

    /// Calls `callback` after keyed writes of `V` under exactly `key`.
    pub fn on_key_write<K, V, F>(&self, key: K, callback: F) -> Subscription
    where
        K: SheetKey,
        V: Value,
        F: Fn(&K, &V) + Send + Sync + 'static,
    {
        self.subscribe_keyed(Access::Write, filter_key(key, callback))
    }

    pub fn on_key_read<K, V, F>(&self, key: K, callback: F) -> Subscription
    where
        K: SheetKey,
        V: Value,
        F: Fn(&K, &V) + Send + Sync + 'static,
    {
        self.subscribe_keyed(Access::Read, filter_key(key, callback))
    }

    /// Number of registered observers, across all types.
    pub fn observer_count(&self) -> usize {
        self.observers.count()
    }

    /// Disposes the wrapped sheet, then drops every observer. Outstanding
    /// subscriptions become inactive. The sheet stays usable.
    pub fn dispose(&self) {
        self.inner.dispose();
        self.observers.clear();
    }

    fn subscribe<V, F>(&self, access: Access, callback: F) -> Subscription
    where
        V: Value,
        F: Fn(&V) + Send + Sync + 'static,
    {
        let callback: ValueCallback<V> = Box::new(callback);
        self.observers
            .add((access, TypeKey::of::<V>()), Box::new(callback))
    }

    fn subscribe_keyed<K, V, F>(&self, access: Access, callback: F) -> Subscription
    where
        K: SheetKey,
        V: Value,
        F: Fn(&K, &V) + Send + Sync + 'static,
    {
        let callback: KeyedCallback<K, V> = Box::new(callback);
        self.observers
            .add((access, TypeKey::keyed::<K, V>()), Box::new(callback))
    }
}

fn filter_key<K, V, F>(key: K, callback: F) -> impl Fn(&K, &V) + Send + Sync + 'static
where
    K: SheetKey,
    V: Value,
    F: Fn(&K, &V) + Send + Sync + 'static,
{
    move |k: &K, v: &V| {
        if *k == key {
            callback(k, v);
        }
    }
}

impl Default for ObservableSheet {
    fn default() -> Self {
        Self::new(ValueSheet::new())
    }
}

impl Drop for ObservableSheet {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl fmt::Debug for ObservableSheet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObservableSheet")
            .field("inner", &self.inner)
            .field("observers", &self.observer_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_table_removes_empty_lists() {
        let sheet = ObservableSheet::default();
        let a = sheet.on_write(|_: &u8| {});
        let b = sheet.on_read(|_: &u8| {});
        assert_eq!(sheet.observer_count(), 2);

        a.dispose();
        assert_eq!(sheet.observer_count(), 1);
        assert!(sheet.observers.lists.lock().len() == 1);
        drop(b);
        assert_eq!(sheet.observer_count(), 0);
        assert!(sheet.observers.lists.lock().is_empty());
    }

    #[test]
    fn test_detached_observer_lives_until_dispose() {
        let calls = Arc::new(AtomicUsize::new(0));
        let sheet = ObservableSheet::default();

        let counter = Arc::clone(&calls);
        sheet
            .on_write(move |_: &u8| {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .detach();

        sheet.write(1u8);
        sheet.write(2u8);
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        sheet.dispose();
        sheet.write(3u8);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(sheet.observer_count(), 0);
    }

    #[test]
    fn test_subscription_outlives_sheet() {
        let sheet = ObservableSheet::default();
        let subscription = sheet.on_write(|_: &u8| {});
        assert!(subscription.is_active());
        assert_eq!(subscription.access(), Access::Write);
        assert_eq!(subscription.type_key(), TypeKey::of::<u8>());

        drop(sheet);
        assert!(!subscription.is_active());
        subscription.dispose();
    }

    #[test]
    fn test_keyed_callbacks_do_not_see_unkeyed_writes() {
        let calls = Arc::new(AtomicUsize::new(0));
        let sheet = ObservableSheet::default();

        let counter = Arc::clone(&calls);
        let _keyed = sheet.on_keyed_write(move |_: &String, _: &u8| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        sheet.write(1u8);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        sheet.write_keyed("a".to_string(), 1u8);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
