use crate::TypeKey;
use std::fmt;

/// Where a reference lookup was addressed.
#[derive(Clone, PartialEq, Eq)]
pub enum Lookup {
    /// The unkeyed slot of the type.
    Global,
    /// A keyed slot; holds the `Debug` rendering of the key.
    Key(String),
}

impl Lookup {
    pub(crate) fn key<K: fmt::Debug>(key: &K) -> Self {
        Lookup::Key(format!("{:?}", key))
    }
}

impl fmt::Debug for Lookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lookup::Global => f.write_str("global"),
            Lookup::Key(key) => f.write_str(key),
        }
    }
}

impl fmt::Display for Lookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Errors that can occur when using a sheet
#[derive(Debug, thiserror::Error)]
pub enum SheetError {
    /// A reference was read that was never set, or was cleared
    #[error("reference not found: type={type_key:?}, key={lookup}")]
    ReferenceNotFound { type_key: TypeKey, lookup: Lookup },

    /// A stored entry did not hold the type its container is registered for
    #[error("type mismatch in sheet for type={type_key:?}")]
    TypeMismatch { type_key: TypeKey },

    /// The global sheet was used before `configure`
    #[error("global sheet is not configured")]
    NotConfigured,

    /// `configure` was called while the global sheet was already configured
    #[error("global sheet is already configured")]
    AlreadyConfigured,

    /// An argument was rejected at construction time
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
}

impl SheetError {
    /// True for [`SheetError::ReferenceNotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, SheetError::ReferenceNotFound { .. })
    }

    /// True for lifecycle misuse of the global sheet.
    pub fn is_invalid_operation(&self) -> bool {
        matches!(self, SheetError::NotConfigured | SheetError::AlreadyConfigured)
    }
}
