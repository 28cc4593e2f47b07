//! Shape-indexed representation for small objects.
//!
//! Under a small property-count cap this map skips hashing entirely:
//! positions come from the shape trie, and storage is a flat array indexed
//! by position. The trade is strict — no indexed keys and no deletes. The
//! container watches for both and promotes to the array-backed
//! representation instead, so this type only ever sees the operations it is
//! good at.

use crate::key::PropertyKey;
use crate::shape::Shape;
use crate::slot::Slot;
use smallvec::SmallVec;
use std::sync::Arc;

/// Flat slot array addressed through the shape trie.
pub struct ShapedSlotMap {
    shape: Arc<Shape>,
    slots: SmallVec<[Slot; 4]>,
}

impl ShapedSlotMap {
    /// Maximum number of slots before the container must promote.
    pub const CAPACITY: usize = 32;

    /// Create an empty map starting from the runtime's root shape.
    pub fn new(root: Arc<Shape>) -> Self {
        debug_assert_eq!(root.depth(), 0);
        Self {
            shape: root,
            slots: SmallVec::new(),
        }
    }

    /// Number of slots. There are never holes, so this is exact.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether the map is empty.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Whether another distinct key would exceed the cap.
    pub fn at_capacity(&self) -> bool {
        self.slots.len() >= Self::CAPACITY
    }

    /// The current shape. Encodes the full ordered insertion history.
    pub fn shape(&self) -> &Arc<Shape> {
        &self.shape
    }

    /// Look up a slot by key.
    pub fn query(&self, key: &PropertyKey) -> Option<&Slot> {
        let position = self.shape.find(key)?;
        debug_assert!((position as usize) < self.slots.len());
        self.slots.get(position as usize)
    }

    /// Look up a slot by key for mutation.
    pub fn query_mut(&mut self, key: &PropertyKey) -> Option<&mut Slot> {
        let position = self.shape.find(key)?;
        self.slots.get_mut(position as usize)
    }

    /// Get-or-create. A new key transitions the shape and appends a slot.
    ///
    /// The container guarantees the cap before calling; a fresh insert past
    /// [`CAPACITY`](Self::CAPACITY) is a caller bug.
    pub fn modify(&mut self, key: &PropertyKey, attributes: u8) -> &mut Slot {
        let result = self.shape.put_if_absent(key);
        match result.shape {
            Some(next_shape) => {
                debug_assert!(self.slots.len() < Self::CAPACITY);
                debug_assert_eq!(result.position as usize, self.slots.len());
                self.slots.push(Slot::new(key.clone(), attributes));
                self.shape = next_shape;
                self.slots.last_mut().expect("just pushed")
            }
            None => &mut self.slots[result.position as usize],
        }
    }

    /// Blind insert of a slot with a key known to be absent.
    pub fn add(&mut self, slot: Slot) {
        let result = self.shape.put_if_absent(slot.key());
        let next_shape = result.shape.expect("blind add of a key already in the shape");
        debug_assert_eq!(result.position as usize, self.slots.len());
        self.slots.push(slot);
        self.shape = next_shape;
    }

    /// Replace the slot at a position in place, keeping the shape intact.
    /// The replacement must carry the same key.
    pub fn replace(&mut self, position: u32, slot: Slot) {
        let current = &mut self.slots[position as usize];
        debug_assert_eq!(current.key(), slot.key());
        *current = slot;
    }

    /// The slot at a shape-assigned position.
    pub fn slot_at(&self, position: u32) -> Option<&Slot> {
        self.slots.get(position as usize)
    }

    /// Mutable access to the slot at a shape-assigned position.
    pub fn slot_at_mut(&mut self, position: u32) -> Option<&mut Slot> {
        self.slots.get_mut(position as usize)
    }

    /// Iterate slots in insertion order.
    pub fn iter(&self) -> std::slice::Iter<'_, Slot> {
        self.slots.iter()
    }

    /// Consume the map, yielding slots in insertion order.
    pub(crate) fn into_slots(self) -> impl Iterator<Item = Slot> {
        self.slots.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slot::attrs;
    use crate::value::Value;

    #[test]
    fn positions_follow_insertion_order() {
        let root = Shape::root();
        let mut map = ShapedSlotMap::new(root);
        for (i, name) in ["x", "y", "z"].iter().enumerate() {
            map.modify(&PropertyKey::name(name), attrs::EMPTY)
                .set_value(Value::from(i as i32), true)
                .unwrap();
        }
        assert_eq!(map.len(), 3);
        assert_eq!(*map.query(&PropertyKey::name("y")).unwrap().value(), Value::from(1));
        let order: Vec<_> = map.iter().map(|s| s.key().to_string()).collect();
        assert_eq!(order, ["x", "y", "z"]);
    }

    #[test]
    fn two_maps_same_history_share_a_shape() {
        let root = Shape::root();
        let mut a = ShapedSlotMap::new(Arc::clone(&root));
        let mut b = ShapedSlotMap::new(root);
        for name in ["p", "q"] {
            a.modify(&PropertyKey::name(name), attrs::EMPTY);
            b.modify(&PropertyKey::name(name), attrs::EMPTY);
        }
        assert!(Shape::same(a.shape(), b.shape()));
    }

    #[test]
    fn modify_existing_does_not_transition() {
        let root = Shape::root();
        let mut map = ShapedSlotMap::new(root);
        map.modify(&PropertyKey::name("only"), attrs::EMPTY);
        let shape = Arc::clone(map.shape());
        map.modify(&PropertyKey::name("only"), attrs::READONLY);
        assert!(Shape::same(&shape, map.shape()));
        assert_eq!(map.len(), 1);
        // Existing slot keeps its original attributes.
        assert_eq!(
            map.query(&PropertyKey::name("only")).unwrap().attributes(),
            attrs::EMPTY
        );
    }

    #[test]
    fn replace_keeps_shape_and_position() {
        let root = Shape::root();
        let mut map = ShapedSlotMap::new(root);
        let key = PropertyKey::name("swapme");
        map.modify(&key, attrs::EMPTY);
        let shape = Arc::clone(map.shape());

        map.replace(0, Slot::with_value(key.clone(), attrs::EMPTY, Value::from(7)));
        assert!(Shape::same(&shape, map.shape()));
        assert_eq!(*map.query(&key).unwrap().value(), Value::from(7));
    }
}
