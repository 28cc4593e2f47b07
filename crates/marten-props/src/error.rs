//! Property policy errors.

use crate::key::PropertyKey;
use thiserror::Error;

/// Policy violations surfaced in strict contexts.
///
/// The attribute semantics live in the object model above this crate; the
/// storage engine only exposes the bits needed to decide. In non-strict
/// contexts the same violations are silent no-ops and no error is built.
#[derive(Debug, Error)]
pub enum PropertyError {
    /// Attempted write to a read-only property.
    #[error("cannot modify read-only property: {0}")]
    ReadOnly(PropertyKey),

    /// Attempted delete of a permanent property.
    #[error("cannot delete permanent property: {0}")]
    PermanentDelete(PropertyKey),
}

impl PropertyError {
    /// Create a read-only write error.
    pub fn read_only(key: &PropertyKey) -> Self {
        Self::ReadOnly(key.clone())
    }

    /// Create a permanent-delete error.
    pub fn permanent_delete(key: &PropertyKey) -> Self {
        Self::PermanentDelete(key.clone())
    }
}

/// Result type for policy-checked operations.
pub type PropertyResult<T> = std::result::Result<T, PropertyError>;
