//! The slot-map contract.
//!
//! A slot map is an ordered, key-unique collection of [`Slot`]s — the data
//! structure backing one object's own properties. Several representations
//! implement the same contract with different internal strategies; the
//! container picks between them as the object grows.
//!
//! The interface is deliberately narrow and a little unusual: it has been
//! shaped by the access patterns of the interpreter above it, and prior
//! attempts to make it more elegant cost measurable performance in the
//! system this design descends from.

use crate::key::PropertyKey;
use crate::slot::Slot;

/// Common contract for all slot-map representations.
///
/// Invariants every implementation upholds:
///
/// - iteration yields live slots in insertion order, skipping deleted holes;
/// - `len`/`is_empty` are O(1) and count only live slots;
/// - `remove` is idempotent and never deletes a permanent slot;
/// - none of the operations fail under ordinary use — policy violations are
///   the object model's to raise.
pub trait SlotMap {
    /// Number of live slots.
    fn len(&self) -> usize;

    /// Whether the map holds no live slots.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Size including not-yet-compacted holes. Equal to `len` for
    /// representations that compact eagerly.
    fn dirty_len(&self) -> usize {
        self.len()
    }

    /// Look up a slot without side effects.
    fn query(&self, key: &PropertyKey) -> Option<&Slot>;

    /// Look up a slot for mutation without side effects.
    fn query_mut(&mut self, key: &PropertyKey) -> Option<&mut Slot>;

    /// Get-or-create: return the existing slot, or insert a plain slot with
    /// the given attributes. Attributes of an existing slot are untouched.
    fn modify(&mut self, key: &PropertyKey, attributes: u8) -> &mut Slot;

    /// Atomically insert, replace, or delete the slot for `key` in one step.
    ///
    /// The computer sees the current slot (or `None`) and returns the slot
    /// to store (or `None` to delete). A replacement keeps the original
    /// slot's position; this is how slot kinds are swapped without a
    /// lost-update window. The computer must keep the key unchanged.
    fn compute(
        &mut self,
        key: &PropertyKey,
        f: impl FnOnce(Option<Slot>) -> Option<Slot>,
    ) -> Option<&Slot>;

    /// Blind insert of a slot whose key is guaranteed absent. Used when
    /// copying maps during representation changes.
    fn add(&mut self, slot: Slot);

    /// Remove the slot for `key`, if present and not permanent.
    fn remove(&mut self, key: &PropertyKey);

    /// Iterate live slots in insertion order.
    fn iter(&self) -> impl Iterator<Item = &Slot>;
}
