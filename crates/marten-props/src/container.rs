//! The slot-map container and its promotion policy.
//!
//! A [`SlotMapContainer`] owns exactly one active representation and
//! delegates the whole slot-map contract to it. Before every mutating call
//! it checks the promotion thresholds and, when one has been crossed,
//! rebuilds the object's slots in the next representation — copying live
//! slots in iteration order, so relative order survives every switch.
//!
//! Promotion is one-directional: shaped → embedded → hash, never back.
//! Each switch permanently invalidates fast keys minted against the old
//! representation; their compatibility tests fail from then on.

use crate::embedded_map::EmbeddedSlotMap;
use crate::error::{PropertyError, PropertyResult};
use crate::fast_key::FastKey;
use crate::hash_map::HashSlotMap;
use crate::key::PropertyKey;
use crate::shape::Shape;
use crate::shaped_map::ShapedSlotMap;
use crate::slot::Slot;
use crate::slot_map::SlotMap;
use crate::value::Value;
use std::sync::Arc;

/// The active representation of a container.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Representation {
    /// Shape-indexed flat array (small objects).
    Shaped,
    /// Array-backed hash map.
    Embedded,
    /// Collision-resistant hash map (large objects).
    Hash,
}

pub(crate) enum Storage {
    Shaped(ShapedSlotMap),
    Embedded(EmbeddedSlotMap),
    Hash(HashSlotMap),
}

/// Owner of one object's property storage.
pub struct SlotMapContainer {
    storage: Storage,
}

impl SlotMapContainer {
    /// Entry count at which the embedded representation gives way to the
    /// collision-resistant hash map.
    pub const LARGE_THRESHOLD: usize = 2000;

    /// Create an empty container on the shaped representation, sharing the
    /// given root shape with every other container of the runtime.
    pub fn new(root: Arc<Shape>) -> Self {
        Self {
            storage: Storage::Shaped(ShapedSlotMap::new(root)),
        }
    }

    /// Create a container sized for a known number of properties. A
    /// capacity past the shaped cap starts on the embedded representation;
    /// past the large threshold, on the hash representation.
    pub fn with_capacity(root: Arc<Shape>, capacity: usize) -> Self {
        let storage = if capacity > Self::LARGE_THRESHOLD {
            Storage::Hash(HashSlotMap::with_capacity(capacity))
        } else if capacity > ShapedSlotMap::CAPACITY {
            Storage::Embedded(EmbeddedSlotMap::with_capacity(capacity))
        } else {
            Storage::Shaped(ShapedSlotMap::new(root))
        };
        Self { storage }
    }

    /// The active representation.
    pub fn representation(&self) -> Representation {
        match self.storage {
            Storage::Shaped(_) => Representation::Shaped,
            Storage::Embedded(_) => Representation::Embedded,
            Storage::Hash(_) => Representation::Hash,
        }
    }

    pub(crate) fn storage(&self) -> &Storage {
        &self.storage
    }

    /// Number of live slots.
    pub fn len(&self) -> usize {
        match &self.storage {
            Storage::Shaped(map) => map.len(),
            Storage::Embedded(map) => map.len(),
            Storage::Hash(map) => map.len(),
        }
    }

    /// Whether the container holds no live slots.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Size including not-yet-compacted holes.
    pub fn dirty_len(&self) -> usize {
        match &self.storage {
            Storage::Shaped(map) => map.len(),
            Storage::Embedded(map) => map.dirty_len(),
            Storage::Hash(map) => map.len(),
        }
    }

    /// Look up a slot without side effects.
    pub fn query(&self, key: &PropertyKey) -> Option<&Slot> {
        match &self.storage {
            Storage::Shaped(map) => map.query(key),
            Storage::Embedded(map) => map.query(key),
            Storage::Hash(map) => map.query(key),
        }
    }

    /// Look up a slot for mutation without side effects.
    pub fn query_mut(&mut self, key: &PropertyKey) -> Option<&mut Slot> {
        match &mut self.storage {
            Storage::Shaped(map) => map.query_mut(key),
            Storage::Embedded(map) => map.query_mut(key),
            Storage::Hash(map) => map.query_mut(key),
        }
    }

    /// Get-or-create a slot, promoting first if a threshold was crossed.
    pub fn modify(&mut self, key: &PropertyKey, attributes: u8) -> &mut Slot {
        self.check_limits(key);
        match &mut self.storage {
            Storage::Shaped(map) => map.modify(key, attributes),
            Storage::Embedded(map) => map.modify(key, attributes),
            Storage::Hash(map) => map.modify(key, attributes),
        }
    }

    /// Atomically insert, replace, or delete the slot for `key`.
    ///
    /// See [`SlotMap::compute`]. On the shaped representation a deletion
    /// outcome forces promotion to the embedded representation, which can
    /// hold holes.
    pub fn compute<F>(&mut self, key: &PropertyKey, f: F) -> Option<&Slot>
    where
        F: FnOnce(Option<Slot>) -> Option<Slot>,
    {
        self.check_limits(key);
        if matches!(self.storage, Storage::Shaped(_)) {
            return self.compute_shaped(key, f);
        }
        match &mut self.storage {
            Storage::Embedded(map) => map.compute(key, f),
            Storage::Hash(map) => map.compute(key, f),
            Storage::Shaped(_) => unreachable!("shaped handled above"),
        }
    }

    fn compute_shaped<F>(&mut self, key: &PropertyKey, f: F) -> Option<&Slot>
    where
        F: FnOnce(Option<Slot>) -> Option<Slot>,
    {
        // First pass decides and applies everything except deletion, which
        // shaped storage cannot represent. The borrow ends here so the
        // deletion path below can promote.
        let kept = {
            let Storage::Shaped(map) = &mut self.storage else {
                unreachable!("compute_shaped on a non-shaped container")
            };
            let position = map.shape().find(key);
            let existing = position.and_then(|p| map.slot_at(p)).cloned();
            let existed = existing.is_some();

            match f(existing) {
                Some(new_slot) => {
                    debug_assert_eq!(new_slot.key(), key);
                    if let Some(position) = position {
                        map.replace(position, new_slot);
                        Some(position)
                    } else {
                        map.add(new_slot);
                        Some(map.len() as u32 - 1)
                    }
                }
                None if existed => None,
                None => return None,
            }
        };

        match kept {
            Some(position) => {
                let Storage::Shaped(map) = &self.storage else {
                    unreachable!("shaped map changed under compute")
                };
                map.slot_at(position)
            }
            None => {
                // The computed decision is a delete. Promote, then apply
                // it unconditionally.
                self.promote_to_embedded();
                let Storage::Embedded(map) = &mut self.storage else {
                    unreachable!("promotion did not yield an embedded map")
                };
                map.compute(key, |_| None)
            }
        }
    }

    /// Blind insert of a slot whose key is guaranteed absent.
    pub fn add(&mut self, slot: Slot) {
        self.check_limits(slot.key());
        match &mut self.storage {
            Storage::Shaped(map) => map.add(slot),
            Storage::Embedded(map) => map.add(slot),
            Storage::Hash(map) => map.add(slot),
        }
    }

    /// Remove the slot for `key`, if present and not permanent. Idempotent.
    ///
    /// On the shaped representation an effective delete first promotes to
    /// the embedded representation.
    pub fn remove(&mut self, key: &PropertyKey) {
        if let Storage::Shaped(map) = &self.storage {
            let deletable = matches!(map.query(key), Some(slot) if !slot.is_permanent());
            if !deletable {
                return;
            }
            self.promote_to_embedded();
        }
        match &mut self.storage {
            Storage::Embedded(map) => map.remove(key),
            Storage::Hash(map) => map.remove(key),
            Storage::Shaped(_) => unreachable!("shaped map survived delete check"),
        }
    }

    /// Strict-context remove: deleting a permanent slot is an error rather
    /// than a silent no-op. Returns whether a slot was removed.
    pub fn remove_checked(&mut self, key: &PropertyKey) -> PropertyResult<bool> {
        match self.query(key) {
            None => Ok(false),
            Some(slot) if slot.is_permanent() => Err(PropertyError::permanent_delete(key)),
            Some(_) => {
                self.remove(key);
                Ok(true)
            }
        }
    }

    /// Resolve the value for `key`, running a pending lazy initializer
    /// through `compute` so the kind swap has no lost-update window.
    ///
    /// Accessor slots resolve to their stored value; dispatching through
    /// the getter handle is the object model's job.
    pub fn resolve(&mut self, key: &PropertyKey) -> Option<Value> {
        let lazy = self.query(key)?.is_lazy();
        if lazy {
            self.compute(key, |slot| slot.map(Slot::into_resolved));
        }
        self.query(key).map(|slot| slot.value().clone())
    }

    /// Iterate live slots in insertion order.
    pub fn iter(&self) -> SlotIter<'_> {
        match &self.storage {
            Storage::Shaped(map) => SlotIter::Shaped(map.iter()),
            Storage::Embedded(map) => SlotIter::Embedded(map.iter_slots()),
            Storage::Hash(map) => SlotIter::Hash(map.iter_slots()),
        }
    }

    /// The current shape, when on the shaped representation.
    pub fn shape(&self) -> Option<&Arc<Shape>> {
        match &self.storage {
            Storage::Shaped(map) => Some(map.shape()),
            _ => None,
        }
    }

    /// Mint a fast key for `key`, if the active representation supports it
    /// and the key is present. See the crate docs for the caller contract.
    pub fn fast_query_key(&self, key: &PropertyKey) -> Option<FastKey> {
        match &self.storage {
            Storage::Shaped(map) => {
                let position = map.shape().find(key)?;
                Some(FastKey::shaped(Arc::clone(map.shape()), position))
            }
            Storage::Embedded(map) => {
                let fingerprint = map.fingerprint()?;
                let position = map.position_of(key)?;
                if position as usize >= EmbeddedSlotMap::FINGERPRINT_PREFIX {
                    return None;
                }
                Some(FastKey::fingerprinted(fingerprint, position))
            }
            Storage::Hash(_) => None,
        }
    }

    /// Positional read, valid only immediately after a passing
    /// [`FastKey::is_compatible`] test on this container.
    pub fn query_fast(&self, position: u32) -> Option<&Slot> {
        match &self.storage {
            Storage::Shaped(map) => map.slot_at(position),
            Storage::Embedded(map) => map.slot_at(position),
            Storage::Hash(_) => None,
        }
    }

    /// Positional write access, under the same contract as
    /// [`query_fast`](Self::query_fast).
    pub fn modify_fast(&mut self, position: u32) -> Option<&mut Slot> {
        match &mut self.storage {
            Storage::Shaped(map) => map.slot_at_mut(position),
            Storage::Embedded(map) => map.slot_at_mut(position),
            Storage::Hash(_) => None,
        }
    }

    fn check_limits(&mut self, key: &PropertyKey) {
        match &self.storage {
            Storage::Shaped(map) => {
                if map.at_capacity() || key.is_index() {
                    self.promote_to_embedded();
                }
            }
            Storage::Embedded(map) => {
                if map.len() >= Self::LARGE_THRESHOLD {
                    self.promote_to_hash();
                }
            }
            Storage::Hash(_) => {}
        }
    }

    fn promote_to_embedded(&mut self) {
        let old = std::mem::replace(&mut self.storage, Storage::Embedded(EmbeddedSlotMap::new()));
        let Storage::Shaped(shaped) = old else {
            unreachable!("promote_to_embedded from a non-shaped container")
        };
        tracing::debug!(
            target: "marten::props",
            from = "shaped",
            to = "embedded",
            size = shaped.len(),
            "promoting slot map"
        );
        let mut map = EmbeddedSlotMap::with_capacity(shaped.len());
        for slot in shaped.into_slots() {
            map.add(slot);
        }
        self.storage = Storage::Embedded(map);
    }

    fn promote_to_hash(&mut self) {
        let old = std::mem::replace(&mut self.storage, Storage::Hash(HashSlotMap::new()));
        let Storage::Embedded(embedded) = old else {
            unreachable!("promote_to_hash from a non-embedded container")
        };
        tracing::debug!(
            target: "marten::props",
            from = "embedded",
            to = "hash",
            size = embedded.len(),
            "promoting slot map"
        );
        let mut map = HashSlotMap::with_capacity(embedded.len());
        for slot in embedded.into_slots() {
            map.add(slot);
        }
        self.storage = Storage::Hash(map);
    }
}

/// Ordered iterator over a container's live slots.
pub enum SlotIter<'a> {
    /// Iterating a shaped map.
    Shaped(std::slice::Iter<'a, Slot>),
    /// Iterating an embedded map.
    Embedded(crate::embedded_map::EmbeddedIter<'a>),
    /// Iterating a hash map.
    Hash(indexmap::map::Values<'a, PropertyKey, Slot>),
}

impl<'a> Iterator for SlotIter<'a> {
    type Item = &'a Slot;

    fn next(&mut self) -> Option<&'a Slot> {
        match self {
            Self::Shaped(iter) => iter.next(),
            Self::Embedded(iter) => iter.next(),
            Self::Hash(iter) => iter.next(),
        }
    }
}
