//! Property slots.
//!
//! A [`Slot`] is one property record: key, attribute mask, value. Optional
//! behavior (lazily initialized values, accessor pairs) is a tagged
//! [`SlotKind`] rather than a subclass chain, with a single resolution
//! dispatch point. Slot maps replace slots in place to swap kinds without
//! disturbing the slot's position.

use crate::error::{PropertyError, PropertyResult};
use crate::key::PropertyKey;
use crate::value::Value;
use std::fmt;
use std::sync::Arc;

/// Property attribute bits.
///
/// The semantics of these bits belong to the object model; the storage
/// engine only reads them in two places (read-only writes, permanent
/// deletes).
pub mod attrs {
    /// No attributes set.
    pub const EMPTY: u8 = 0;
    /// Writes to the property are rejected.
    pub const READONLY: u8 = 0x1;
    /// The property is skipped during enumeration.
    pub const DONT_ENUM: u8 = 0x2;
    /// The property cannot be deleted.
    pub const PERMANENT: u8 = 0x4;
}

/// Initializer for a lazily computed slot value, run at most once.
pub type LazyInit = Arc<dyn Fn(&PropertyKey) -> Value + Send + Sync>;

/// Optional slot behavior.
#[derive(Clone, Default)]
pub enum SlotKind {
    /// An ordinary data property.
    #[default]
    Plain,
    /// A value computed on first access, then stored as plain.
    Lazy(LazyInit),
    /// An accessor property. The getter/setter handles are opaque here;
    /// dispatching through them is the object model's job.
    Accessor {
        /// Getter handle, if any.
        getter: Option<Value>,
        /// Setter handle, if any.
        setter: Option<Value>,
    },
}

impl fmt::Debug for SlotKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plain => write!(f, "Plain"),
            Self::Lazy(_) => write!(f, "Lazy"),
            Self::Accessor { getter, setter } => f
                .debug_struct("Accessor")
                .field("getter", &getter.is_some())
                .field("setter", &setter.is_some())
                .finish(),
        }
    }
}

/// One property record.
#[derive(Clone, Debug)]
pub struct Slot {
    key: PropertyKey,
    attributes: u8,
    value: Value,
    kind: SlotKind,
}

impl Slot {
    /// Create a plain slot holding undefined.
    pub fn new(key: PropertyKey, attributes: u8) -> Self {
        Self {
            key,
            attributes,
            value: Value::Undefined,
            kind: SlotKind::Plain,
        }
    }

    /// Create a plain slot with an initial value.
    pub fn with_value(key: PropertyKey, attributes: u8, value: Value) -> Self {
        Self {
            key,
            attributes,
            value,
            kind: SlotKind::Plain,
        }
    }

    /// Create a lazily initialized slot.
    pub fn lazy(key: PropertyKey, attributes: u8, init: LazyInit) -> Self {
        Self {
            key,
            attributes,
            value: Value::Undefined,
            kind: SlotKind::Lazy(init),
        }
    }

    /// Create an accessor slot.
    pub fn accessor(
        key: PropertyKey,
        attributes: u8,
        getter: Option<Value>,
        setter: Option<Value>,
    ) -> Self {
        Self {
            key,
            attributes,
            value: Value::Undefined,
            kind: SlotKind::Accessor { getter, setter },
        }
    }

    /// The slot's key.
    pub fn key(&self) -> &PropertyKey {
        &self.key
    }

    /// The raw attribute mask.
    pub fn attributes(&self) -> u8 {
        self.attributes
    }

    /// Replace the attribute mask.
    pub fn set_attributes(&mut self, attributes: u8) {
        self.attributes = attributes;
    }

    /// Whether the READONLY bit is set.
    pub fn is_readonly(&self) -> bool {
        self.attributes & attrs::READONLY != 0
    }

    /// Whether the PERMANENT bit is set.
    pub fn is_permanent(&self) -> bool {
        self.attributes & attrs::PERMANENT != 0
    }

    /// Whether the property shows up in enumeration.
    pub fn is_enumerable(&self) -> bool {
        self.attributes & attrs::DONT_ENUM == 0
    }

    /// The stored value. For unresolved lazy slots this is undefined.
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// The slot's behavior tag.
    pub fn kind(&self) -> &SlotKind {
        &self.kind
    }

    /// Whether this slot still has a pending lazy initializer.
    pub fn is_lazy(&self) -> bool {
        matches!(self.kind, SlotKind::Lazy(_))
    }

    /// Store a value, honoring the READONLY bit.
    ///
    /// A read-only violation is an error in strict mode and a silent no-op
    /// otherwise; either way the stored value is untouched.
    pub fn set_value(&mut self, value: Value, strict: bool) -> PropertyResult<()> {
        if self.is_readonly() {
            if strict {
                return Err(PropertyError::read_only(&self.key));
            }
            return Ok(());
        }
        self.value = value;
        Ok(())
    }

    /// Store a value without a policy check. Used by the object model once
    /// it has already made the attribute decision.
    pub fn set_value_unchecked(&mut self, value: Value) {
        self.value = value;
    }

    /// Run a pending lazy initializer, producing a plain slot in its place.
    /// Plain and accessor slots pass through unchanged.
    pub fn into_resolved(self) -> Self {
        match self.kind {
            SlotKind::Lazy(init) => {
                let value = init(&self.key);
                Self {
                    key: self.key,
                    attributes: self.attributes,
                    value,
                    kind: SlotKind::Plain,
                }
            }
            _ => self,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn readonly_write_strict_errors() {
        let mut slot = Slot::with_value(PropertyKey::name("ro"), attrs::READONLY, Value::from(1));
        let err = slot.set_value(Value::from(2), true).unwrap_err();
        assert!(matches!(err, PropertyError::ReadOnly(_)));
        assert_eq!(*slot.value(), Value::from(1));
    }

    #[test]
    fn readonly_write_sloppy_is_noop() {
        let mut slot = Slot::with_value(PropertyKey::name("ro"), attrs::READONLY, Value::from(1));
        slot.set_value(Value::from(2), false).unwrap();
        assert_eq!(*slot.value(), Value::from(1));
    }

    #[test]
    fn plain_write() {
        let mut slot = Slot::new(PropertyKey::name("x"), attrs::EMPTY);
        slot.set_value(Value::from(5), true).unwrap();
        assert_eq!(*slot.value(), Value::from(5));
    }

    #[test]
    fn lazy_resolution_runs_once() {
        let slot = Slot::lazy(
            PropertyKey::name("lz"),
            attrs::EMPTY,
            Arc::new(|key| Value::string(&format!("init:{key}"))),
        );
        assert!(slot.is_lazy());
        assert!(slot.value().is_undefined());

        let resolved = slot.into_resolved();
        assert!(!resolved.is_lazy());
        assert_eq!(*resolved.value(), Value::string("init:lz"));

        // Resolving again is the identity.
        let again = resolved.clone().into_resolved();
        assert_eq!(*again.value(), Value::string("init:lz"));
    }

    #[test]
    fn attribute_bits() {
        let slot = Slot::new(
            PropertyKey::name("a"),
            attrs::PERMANENT | attrs::DONT_ENUM,
        );
        assert!(slot.is_permanent());
        assert!(!slot.is_enumerable());
        assert!(!slot.is_readonly());
    }
}
