//! # Marten Property Storage
//!
//! Property-slot storage for a JavaScript-style object model.
//!
//! ## Design Principles
//!
//! - **Adaptive representation**: each object starts on a shape-indexed
//!   flat array and promotes, one way only, to an array-backed hash map
//!   and then to a general hash map as it grows
//! - **Hidden classes**: identical insertion histories share one shape
//!   node, so layout equality is a pointer comparison
//! - **Validated fast keys**: cached slot positions carry a layout
//!   discriminator and are re-checked before every positional access
//! - **Thread-safe option**: a locked wrapper with a version stamp for
//!   objects shared between threads

#![warn(clippy::all)]
#![warn(missing_docs)]

pub mod container;
pub mod embedded_map;
pub mod error;
pub mod fast_key;
pub mod hash_map;
pub mod key;
pub mod shape;
pub mod shaped_map;
pub mod slot;
pub mod slot_map;
pub mod thread_safe;
pub mod value;

pub use container::{Representation, SlotIter, SlotMapContainer};
pub use embedded_map::EmbeddedSlotMap;
pub use error::{PropertyError, PropertyResult};
pub use fast_key::FastKey;
pub use hash_map::HashSlotMap;
pub use key::{InternedName, PropertyKey, SymbolId};
pub use shape::{PutResult, Shape};
pub use shaped_map::ShapedSlotMap;
pub use slot::{LazyInit, Slot, SlotKind, attrs};
pub use slot_map::SlotMap;
pub use thread_safe::{StampedFastKey, ThreadSafeSlotMap, WriteGuard};
pub use value::Value;
