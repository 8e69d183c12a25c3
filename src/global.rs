//! Process-wide sheet with an explicit configure/reset lifecycle.
//!
//! Nothing exists until [`configure`] runs; every function here returns
//! [`SheetError::NotConfigured`] before that. [`reset`] disposes the owned
//! sheets and returns to the unconfigured state, after which `configure` can
//! run again.
//!
//! ```
//! use sovran_sheet::{global, GlobalConfig, SheetError};
//!
//! # fn main() -> Result<(), SheetError> {
//! global::configure(GlobalConfig::default())?;
//!
//! global::write_value(42i32)?;
//! assert_eq!(global::read_value::<i32>()?, 42);
//!
//! global::write_keyed_value("pi".to_string(), 3.14f64)?;
//! assert_eq!(global::read_keyed_value::<String, f64>(&"pi".to_string())?, 3.14);
//!
//! global::reset();
//! global::configure(GlobalConfig::default())?;
//! assert_eq!(global::read_value::<i32>()?, 0);
//! # global::reset();
//! # Ok(())
//! # }
//! ```

use crate::container::SheetKey;
use crate::observe::{ObservableSheet, Subscription};
use crate::refs::RefSheet;
use crate::values::Value;
use crate::SheetError;
use parking_lot::RwLock;
use std::sync::Arc;

struct GlobalState {
    refs: Arc<RefSheet>,
    values: Arc<ObservableSheet>,
}

static GLOBAL: RwLock<Option<GlobalState>> = RwLock::new(None);

/// What [`configure`] installs. Missing parts get default sheets.
#[derive(Debug, Default)]
pub struct GlobalConfig {
    refs: Option<RefSheet>,
    values: Option<ObservableSheet>,
}

impl GlobalConfig {
    pub fn with_refs(mut self, refs: RefSheet) -> Self {
        self.refs = Some(refs);
        self
    }

    pub fn with_values(mut self, values: ObservableSheet) -> Self {
        self.values = Some(values);
        self
    }
}

/// Installs the global sheets.
///
/// # Errors
///
/// Returns `SheetError::AlreadyConfigured` if called again without [`reset`].
/// The rejected config is dropped.
pub fn configure(config: GlobalConfig) -> Result<(), SheetError> {
    let mut global = GLOBAL.write();
    if global.is_some() {
        return Err(SheetError::AlreadyConfigured);
    }
    *global = Some(GlobalState {
        refs: Arc::new(config.refs.unwrap_or_default()),
        values: Arc::new(config.values.unwrap_or_default()),
    });
    tracing::debug!("global sheet configured");
    Ok(())
}

/// Disposes the global sheets and returns to the unconfigured state. Does
/// nothing when not configured.
pub fn reset() {
    // Take the state out first so teardown hooks can't reach it through here
    let Some(state) = GLOBAL.write().take() else {
        return;
    };
    state.values.dispose();
    state.refs.dispose();
    tracing::debug!("global sheet reset");
}

pub fn is_configured() -> bool {
    GLOBAL.read().is_some()
}

/// The global value sheet.
///
/// # Errors
///
/// Returns `SheetError::NotConfigured` before [`configure`].
pub fn values() -> Result<Arc<ObservableSheet>, SheetError> {
    GLOBAL
        .read()
        .as_ref()
        .map(|state| Arc::clone(&state.values))
        .ok_or(SheetError::NotConfigured)
}

/// The global reference sheet.
///
/// # Errors
///
/// Returns `SheetError::NotConfigured` before [`configure`].
pub fn refs() -> Result<Arc<RefSheet>, SheetError> {
    GLOBAL
        .read()
        .as_ref()
        .map(|state| Arc::clone(&state.refs))
        .ok_or(SheetError::NotConfigured)
}

pub fn read_value<V: Value>() -> Result<V, SheetError> {
    Ok(values()?.read::<V>())
}

pub fn write_value<V: Value>(value: V) -> Result<(), SheetError> {
    values()?.write(value);
    Ok(())
}

pub fn read_keyed_value<K: SheetKey, V: Value>(key: &K) -> Result<V, SheetError> {
    Ok(values()?.read_keyed::<K, V>(key))
}

pub fn write_keyed_value<K: SheetKey, V: Value>(key: K, value: V) -> Result<(), SheetError> {
    values()?.write_keyed(key, value);
    Ok(())
}

pub fn has_value<V: Value>() -> Result<bool, SheetError> {
    Ok(values()?.has_value::<V>())
}

pub fn has_keyed_value<K: SheetKey, V: Value>(key: &K) -> Result<bool, SheetError> {
    Ok(values()?.has_keyed_value::<K, V>(key))
}

/// # Errors
///
/// Returns `SheetError::NotConfigured` before [`configure`], otherwise the
/// result of [`RefSheet::get`].
pub fn get_ref<R>() -> Result<Arc<R>, SheetError>
where
    R: ?Sized + Send + Sync + 'static,
{
    refs()?.get::<R>()
}

pub fn set_ref<R>(reference: Option<Arc<R>>) -> Result<(), SheetError>
where
    R: ?Sized + Send + Sync + 'static,
{
    refs()?.set::<R>(reference);
    Ok(())
}

pub fn get_keyed_ref<K, R>(key: &K) -> Result<Arc<R>, SheetError>
where
    K: SheetKey,
    R: ?Sized + Send + Sync + 'static,
{
    refs()?.get_keyed::<K, R>(key)
}

pub fn set_keyed_ref<K, R>(key: K, reference: Option<Arc<R>>) -> Result<(), SheetError>
where
    K: SheetKey,
    R: ?Sized + Send + Sync + 'static,
{
    refs()?.set_keyed::<K, R>(key, reference);
    Ok(())
}

pub fn has_ref<R>() -> Result<bool, SheetError>
where
    R: ?Sized + Send + Sync + 'static,
{
    Ok(refs()?.has_ref::<R>())
}

pub fn has_keyed_ref<K, R>(key: &K) -> Result<bool, SheetError>
where
    K: SheetKey,
    R: ?Sized + Send + Sync + 'static,
{
    Ok(refs()?.has_keyed_ref::<K, R>(key))
}

pub fn on_write<V, F>(callback: F) -> Result<Subscription, SheetError>
where
    V: Value,
    F: Fn(&V) + Send + Sync + 'static,
{
    Ok(values()?.on_write(callback))
}

pub fn on_read<V, F>(callback: F) -> Result<Subscription, SheetError>
where
    V: Value,
    F: Fn(&V) + Send + Sync + 'static,
{
    Ok(values()?.on_read(callback))
}

pub fn on_keyed_write<K, V, F>(callback: F) -> Result<Subscription, SheetError>
where
    K: SheetKey,
    V: Value,
    F: Fn(&K, &V) + Send + Sync + 'static,
{
    Ok(values()?.on_keyed_write(callback))
}

pub fn on_keyed_read<K, V, F>(callback: F) -> Result<Subscription, SheetError>
where
    K: SheetKey,
    V: Value,
    F: Fn(&K, &V) + Send + Sync + 'static,
{
    Ok(values()?.on_keyed_read(callback))
}

pub fn on_key_write<K, V, F>(key: K, callback: F) -> Result<Subscription, SheetError>
where
    K: SheetKey,
    V: Value,
    F: Fn(&K, &V) + Send + Sync + 'static,
{
    Ok(values()?.on_key_write(key, callback))
}

pub fn on_key_read<K, V, F>(key: K, callback: F) -> Result<Subscription, SheetError>
where
    K: SheetKey,
    V: Value,
    F: Fn(&K, &V) + Send + Sync + 'static,
{
    Ok(values()?.on_key_read(key, callback))
}
