//! Compact property values.
//!
//! The storage engine treats values as opaque payloads; this enum is just
//! enough for the runtime layers above to park primitives and handles in a
//! slot. Object references live behind the runtime's own handle type and
//! arrive here as opaque ids.

use std::sync::Arc;

/// A value stored in a property slot.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    /// The undefined value.
    Undefined,
    /// The null value.
    Null,
    /// A boolean.
    Boolean(bool),
    /// A 64-bit float.
    Number(f64),
    /// An immutable string.
    String(Arc<str>),
    /// An opaque handle into the runtime's object heap.
    Handle(u64),
}

impl Value {
    /// The undefined value.
    pub fn undefined() -> Self {
        Self::Undefined
    }

    /// Build a string value.
    pub fn string(s: &str) -> Self {
        Self::String(Arc::from(s))
    }

    /// Build a number value.
    pub fn number(n: f64) -> Self {
        Self::Number(n)
    }

    /// Whether this is the undefined value.
    pub fn is_undefined(&self) -> bool {
        matches!(self, Self::Undefined)
    }
}

impl Default for Value {
    fn default() -> Self {
        Self::Undefined
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Self::Number(n as f64)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Boolean(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::string(s)
    }
}
