//! # sovran-sheet
//!
//! A type-indexed blackboard for values and shared references.
//!
//! `sovran-sheet` lets decoupled parts of a program publish and consume typed
//! data without agreeing on a schema up front. The type *is* the address: a
//! value of type `V` lives in the slot for `V`, optionally narrowed by a runtime
//! key of type `K`.
//!
//! ## Key Features
//!
//! - **Two namespaces**: [`ValueSheet`] holds clonable records that read as
//!   `Default` when absent; [`RefSheet`] holds `Arc` handles (trait objects
//!   included) that are an error when absent
//! - **Keyed and unkeyed slots**: `(K, V)` containers never overlap with the
//!   unkeyed `V` slot
//! - **Pluggable storage**: containers are built by a [`ContainerFactory`], so
//!   storage strategies can change without touching callers
//! - **Observers**: [`ObservableSheet`] notifies subscribers of reads and
//!   writes, tolerating unsubscribes and panics mid-dispatch
//! - **Explicit global lifecycle**: the [`global`] module has a
//!   configure/reset state machine instead of lazy statics
//!
//! ## Usage Examples
//!
//! ### Values
//!
//! ```rust
//! use sovran_sheet::ValueSheet;
//!
//! #[derive(Clone, Debug, Default, PartialEq)]
//! struct Score {
//!     points: u32,
//! }
//!
//! let sheet = ValueSheet::new();
//!
//! // Nothing written yet: the default comes back, and nothing is allocated
//! assert_eq!(sheet.read::<Score>(), Score::default());
//! assert!(!sheet.has_value::<Score>());
//!
//! sheet.write(Score { points: 10 });
//! sheet.write_keyed("alice".to_string(), Score { points: 7 });
//!
//! assert_eq!(sheet.read::<Score>().points, 10);
//! assert_eq!(sheet.read_keyed::<String, Score>(&"alice".to_string()).points, 7);
//! assert_eq!(sheet.read_keyed::<String, Score>(&"bob".to_string()).points, 0);
//! ```
//!
//! ### References
//!
//! ```rust
//! use sovran_sheet::{RefSheet, SheetError};
//! use std::sync::Arc;
//!
//! trait Clock: Send + Sync {
//!     fn now(&self) -> u64;
//! }
//!
//! struct FixedClock(u64);
//!
//! impl Clock for FixedClock {
//!     fn now(&self) -> u64 {
//!         self.0
//!     }
//! }
//!
//! fn main() -> Result<(), SheetError> {
//!     let sheet = RefSheet::new();
//!
//!     // Absent references are an error, not a default
//!     match sheet.get::<dyn Clock>() {
//!         Err(SheetError::ReferenceNotFound { .. }) => println!("no clock yet"),
//!         other => panic!("unexpected: {:?}", other.map(|c| c.now())),
//!     }
//!
//!     sheet.set::<dyn Clock>(Some(Arc::new(FixedClock(1_700_000_000))));
//!     assert_eq!(sheet.get::<dyn Clock>()?.now(), 1_700_000_000);
//!
//!     // Setting None removes the entry
//!     sheet.set::<dyn Clock>(None);
//!     assert!(!sheet.has_ref::<dyn Clock>());
//!
//!     Ok(())
//! }
//! ```
//!
//! ### Observing
//!
//! ```rust
//! use sovran_sheet::ObservableSheet;
//! use std::sync::{Arc, Mutex};
//!
//! let sheet = ObservableSheet::default();
//! let log = Arc::new(Mutex::new(Vec::new()));
//!
//! let sink = Arc::clone(&log);
//! let key = "temperature".to_string();
//! let _subscription = sheet.on_key_write(key, move |key: &String, value: &f32| {
//!     sink.lock().unwrap().push(format!("{} = {}", key, value));
//! });
//!
//! sheet.write_keyed("temperature".to_string(), 21.5f32);
//! sheet.write_keyed("humidity".to_string(), 40.0f32);
//!
//! assert_eq!(*log.lock().unwrap(), vec!["temperature = 21.5".to_string()]);
//! ```
//!
//! ### Error Handling
//!
//! ```rust
//! use sovran_sheet::{global, GlobalConfig, SheetError};
//!
//! // Using the global sheet before configuring it is a lifecycle error
//! match global::read_value::<i32>() {
//!     Err(SheetError::NotConfigured) => println!("configure first"),
//!     other => panic!("unexpected: {:?}", other),
//! }
//!
//! global::configure(GlobalConfig::default()).unwrap();
//! match global::configure(GlobalConfig::default()) {
//!     Err(e) if e.is_invalid_operation() => println!("already configured: {}", e),
//!     other => panic!("unexpected: {:?}", other),
//! }
//! global::reset();
//! ```

mod any_value;
mod container;
mod dispose;
mod error;
mod factory;
pub mod global;
mod observe;
mod refs;
mod registry;
mod type_key;
mod values;

pub use any_value::StoredValue;
pub use container::{Container, MapContainer, SheetKey, SingleContainer, Slot, SlotKey};
pub use dispose::Dispose;
pub use error::{Lookup, SheetError};
pub use factory::{
    BoundedContainer, BoundedFactory, ContainerFactory, ContainerSpec, DefaultFactory,
};
pub use global::GlobalConfig;
pub use observe::{Access, ObservableSheet, Subscription};
pub use refs::RefSheet;
pub use type_key::{Namespace, TypeKey};
pub use values::{Value, ValueSheet};
