use std::any::{type_name, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Runtime identity of a container: one type, or a `(key type, value type)` pair.
///
/// Equality and hashing only look at the [`TypeId`]s, so two keys are equal
/// exactly when they denote the same type (or the same pair of types). The type
/// names are kept for diagnostics.
///
/// An unkeyed key never equals a keyed one, even when the value types match:
///
/// ```
/// use sovran_sheet::TypeKey;
///
/// assert_eq!(TypeKey::of::<i32>(), TypeKey::of::<i32>());
/// assert_ne!(TypeKey::of::<i32>(), TypeKey::keyed::<String, i32>());
/// assert_ne!(TypeKey::keyed::<u8, i32>(), TypeKey::keyed::<u16, i32>());
/// ```
#[derive(Clone, Copy)]
pub struct TypeKey {
    key: Option<TypeId>,
    value: TypeId,
    key_name: Option<&'static str>,
    value_name: &'static str,
}

impl TypeKey {
    /// Key for the unkeyed container of `V`.
    #[inline]
    pub fn of<V: ?Sized + 'static>() -> Self {
        Self {
            key: None,
            value: TypeId::of::<V>(),
            key_name: None,
            value_name: type_name::<V>(),
        }
    }

    /// Key for the keyed container of `V` indexed by `K`.
    #[inline]
    pub fn keyed<K: 'static, V: ?Sized + 'static>() -> Self {
        Self {
            key: Some(TypeId::of::<K>()),
            value: TypeId::of::<V>(),
            key_name: Some(type_name::<K>()),
            value_name: type_name::<V>(),
        }
    }

    /// True for keys built with [`TypeKey::keyed`].
    #[inline]
    pub fn is_keyed(&self) -> bool {
        self.key.is_some()
    }

    pub fn value_type_id(&self) -> TypeId {
        self.value
    }

    pub fn key_type_id(&self) -> Option<TypeId> {
        self.key
    }

    pub fn value_type_name(&self) -> &'static str {
        self.value_name
    }

    pub fn key_type_name(&self) -> Option<&'static str> {
        self.key_name
    }
}

impl PartialEq for TypeKey {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key && self.value == other.value
    }
}

impl Eq for TypeKey {}

impl Hash for TypeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
        self.value.hash(state);
    }
}

impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.key_name {
            Some(key) => write!(f, "({}, {})", key, self.value_name),
            None => f.write_str(self.value_name),
        }
    }
}

/// Which registry a container belongs to.
///
/// Value and reference containers live in separate registries; the namespace
/// is passed to factories so they can pick a strategy per registry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Namespace {
    Value,
    Reference,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    trait Marker {}

    #[test]
    fn test_equality_ignores_names() {
        let a = TypeKey::keyed::<String, f64>();
        let b = TypeKey::keyed::<String, f64>();
        assert_eq!(a, b);

        let mut set = HashSet::new();
        set.insert(a);
        assert!(set.contains(&b));
    }

    #[test]
    fn test_keyed_and_unkeyed_are_distinct() {
        let mut set = HashSet::new();
        set.insert(TypeKey::of::<f64>());
        set.insert(TypeKey::keyed::<String, f64>());
        set.insert(TypeKey::keyed::<u32, f64>());
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn test_trait_objects_have_keys() {
        let key = TypeKey::of::<dyn Marker>();
        assert!(!key.is_keyed());
        assert!(format!("{:?}", key).contains("Marker"));
    }

    #[test]
    fn test_debug_shows_pair() {
        let key = TypeKey::keyed::<u8, bool>();
        assert_eq!(format!("{:?}", key), "(u8, bool)");
        assert_eq!(key.key_type_name(), Some("u8"));
    }
}
