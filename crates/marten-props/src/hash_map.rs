//! Collision-resistant representation for large objects.
//!
//! Once an object accumulates enough properties that a fixed-width bucket
//! table risks degenerate chains, the container switches to this variant:
//! an insertion-ordered general hash map with per-entry overhead but no
//! bucket cap. It issues no fast keys; outstanding tokens from the previous
//! representation stay permanently invalid.

use crate::key::PropertyKey;
use crate::slot::Slot;
use crate::slot_map::SlotMap;
use indexmap::IndexMap;
use rustc_hash::FxBuildHasher;

/// Insertion-ordered slot map backed by a general hash map.
pub struct HashSlotMap {
    map: IndexMap<PropertyKey, Slot, FxBuildHasher>,
}

impl HashSlotMap {
    /// Create an empty map.
    pub fn new() -> Self {
        Self {
            map: IndexMap::with_hasher(FxBuildHasher),
        }
    }

    /// Create a map with room for `capacity` slots.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            map: IndexMap::with_capacity_and_hasher(capacity, FxBuildHasher),
        }
    }

    /// Consume the map, yielding slots in insertion order.
    pub(crate) fn into_slots(self) -> impl Iterator<Item = Slot> {
        self.map.into_values()
    }

    pub(crate) fn iter_slots(&self) -> indexmap::map::Values<'_, PropertyKey, Slot> {
        self.map.values()
    }
}

impl Default for HashSlotMap {
    fn default() -> Self {
        Self::new()
    }
}

impl SlotMap for HashSlotMap {
    fn len(&self) -> usize {
        self.map.len()
    }

    fn query(&self, key: &PropertyKey) -> Option<&Slot> {
        self.map.get(key)
    }

    fn query_mut(&mut self, key: &PropertyKey) -> Option<&mut Slot> {
        self.map.get_mut(key)
    }

    fn modify(&mut self, key: &PropertyKey, attributes: u8) -> &mut Slot {
        self.map
            .entry(key.clone())
            .or_insert_with(|| Slot::new(key.clone(), attributes))
    }

    fn compute(
        &mut self,
        key: &PropertyKey,
        f: impl FnOnce(Option<Slot>) -> Option<Slot>,
    ) -> Option<&Slot> {
        let existing = self.map.get(key).cloned();
        let existed = existing.is_some();
        match f(existing) {
            Some(new_slot) => {
                debug_assert_eq!(new_slot.key(), key);
                if existed {
                    // Replace in place to preserve the insertion position.
                    *self.map.get_mut(key).expect("entry vanished") = new_slot;
                } else {
                    self.map.insert(key.clone(), new_slot);
                }
                self.map.get(key)
            }
            None => {
                if existed {
                    // Shifting preserves the relative order of the rest.
                    self.map.shift_remove(key);
                }
                None
            }
        }
    }

    fn add(&mut self, slot: Slot) {
        debug_assert!(!self.map.contains_key(slot.key()));
        self.map.insert(slot.key().clone(), slot);
    }

    fn remove(&mut self, key: &PropertyKey) {
        if let Some(slot) = self.map.get(key) {
            if slot.is_permanent() {
                return;
            }
            self.map.shift_remove(key);
        }
    }

    fn iter(&self) -> impl Iterator<Item = &Slot> {
        self.map.values()
    }
}
