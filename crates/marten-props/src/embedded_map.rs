//! Array-backed hash representation.
//!
//! This is the workhorse slot map: a power-of-two bucket table whose
//! collision chains link through indices into a separate insertion-ordered
//! entry array. The ordered array doubles as the positional store for the
//! fast-key protocol. Deletes null the ordered entry rather than shifting,
//! and a deletion counter triggers a compaction pass once enough holes
//! accumulate.
//!
//! The map keeps a rolling fingerprint over the first
//! [`FINGERPRINT_PREFIX`](EmbeddedSlotMap::FINGERPRINT_PREFIX) inserted keys
//! (identity and position). Two maps that inserted the same leading keys in
//! the same order carry the same fingerprint, which is what makes cached
//! positions transferable between them. Any delete invalidates the
//! fingerprint permanently.

use crate::key::PropertyKey;
use crate::slot::Slot;
use crate::slot_map::SlotMap;

/// Chain terminator / empty bucket marker.
const EMPTY: u32 = u32::MAX;

struct Entry {
    slot: Slot,
    hash: u32,
    next: u32,
}

/// Insertion-ordered hash map of slots with positional access.
pub struct EmbeddedSlotMap {
    /// Power-of-two bucket table; each bucket heads a chain of entry indices.
    buckets: Vec<u32>,
    /// Entries in insertion order. `None` is a deleted hole.
    entries: Vec<Option<Entry>>,
    count: usize,
    pending_deletes: usize,
    /// Set once the map has seen enough deletes to compact; positions are
    /// no longer stable across the map's history, so fast keys stay dead.
    many_deletes: bool,
    /// Rolling order-sensitive hash of the leading inserts. `None` once
    /// invalidated by a delete.
    fingerprint: Option<u64>,
}

impl EmbeddedSlotMap {
    /// Initial bucket count; must be a power of two.
    pub const INITIAL_BUCKETS: usize = 4;
    /// Deletes tolerated before a compaction pass.
    pub const DELETE_THRESHOLD: usize = 10;
    /// Number of leading inserts covered by the fingerprint.
    pub const FINGERPRINT_PREFIX: usize = 16;

    /// Create an empty map. The bucket table is allocated on first insert.
    pub fn new() -> Self {
        Self {
            buckets: Vec::new(),
            entries: Vec::new(),
            count: 0,
            pending_deletes: 0,
            many_deletes: false,
            fingerprint: Some(0),
        }
    }

    /// Create a map sized so that `capacity` inserts stay under 75% load.
    pub fn with_capacity(capacity: usize) -> Self {
        let min_buckets = capacity * 4 / 3;
        let mut buckets = Self::INITIAL_BUCKETS;
        while buckets < min_buckets {
            buckets <<= 1;
        }
        Self {
            buckets: vec![EMPTY; buckets],
            entries: Vec::with_capacity(capacity),
            count: 0,
            pending_deletes: 0,
            many_deletes: false,
            fingerprint: Some(0),
        }
    }

    /// The fingerprint discriminator, if still valid.
    pub fn fingerprint(&self) -> Option<u64> {
        if self.many_deletes {
            None
        } else {
            self.fingerprint
        }
    }

    /// Position of `key` in the ordered array.
    pub(crate) fn position_of(&self, key: &PropertyKey) -> Option<u32> {
        self.find(key).map(|idx| idx as u32)
    }

    /// The slot at an ordered position, if live.
    pub(crate) fn slot_at(&self, position: u32) -> Option<&Slot> {
        self.entries
            .get(position as usize)?
            .as_ref()
            .map(|e| &e.slot)
    }

    /// Mutable access to the slot at an ordered position, if live.
    pub(crate) fn slot_at_mut(&mut self, position: u32) -> Option<&mut Slot> {
        self.entries
            .get_mut(position as usize)?
            .as_mut()
            .map(|e| &mut e.slot)
    }

    /// Consume the map, yielding live slots in insertion order.
    pub(crate) fn into_slots(self) -> impl Iterator<Item = Slot> {
        self.entries.into_iter().flatten().map(|e| e.slot)
    }

    pub(crate) fn iter_slots(&self) -> EmbeddedIter<'_> {
        EmbeddedIter {
            entries: &self.entries,
            pos: 0,
        }
    }

    fn bucket_of(&self, hash: u32) -> usize {
        // Works because the bucket count is always a power of two.
        hash as usize & (self.buckets.len() - 1)
    }

    fn find(&self, key: &PropertyKey) -> Option<usize> {
        if self.buckets.is_empty() {
            return None;
        }
        let hash = key.hash_code();
        let mut cur = self.buckets[self.bucket_of(hash)];
        while cur != EMPTY {
            let entry = self.entries[cur as usize]
                .as_ref()
                .expect("bucket chain references a deleted entry");
            if entry.hash == hash && entry.slot.key() == key {
                return Some(cur as usize);
            }
            cur = entry.next;
        }
        None
    }

    fn insert_new(&mut self, slot: Slot) -> usize {
        if self.count == 0 && !self.entries.is_empty() {
            // Everything was deleted; start over with a clean ordered array.
            self.entries.clear();
            self.pending_deletes = 0;
        }
        if self.buckets.is_empty() {
            self.buckets = vec![EMPTY; Self::INITIAL_BUCKETS];
        } else if 4 * (self.count + 1) > 3 * self.buckets.len() {
            self.grow();
        }

        let hash = slot.key().hash_code();
        let idx = self.entries.len();
        if let Some(fp) = self.fingerprint
            && idx < Self::FINGERPRINT_PREFIX
        {
            self.fingerprint = Some(fp.wrapping_add(((idx as u64) << 32) | hash as u64));
        }

        let bucket = self.bucket_of(hash);
        let next = self.buckets[bucket];
        self.buckets[bucket] = idx as u32;
        self.entries.push(Some(Entry { slot, hash, next }));
        self.count += 1;
        idx
    }

    fn grow(&mut self) {
        let new_len = self.buckets.len() * 2;
        self.buckets = vec![EMPTY; new_len];
        for idx in 0..self.entries.len() {
            let Some(hash) = self.entries[idx].as_ref().map(|e| e.hash) else {
                continue;
            };
            let bucket = hash as usize & (new_len - 1);
            self.entries[idx].as_mut().expect("entry vanished").next = self.buckets[bucket];
            self.buckets[bucket] = idx as u32;
        }
    }

    fn unlink(&mut self, idx: usize) {
        let (hash, next) = {
            let entry = self.entries[idx].as_ref().expect("unlinking a hole");
            (entry.hash, entry.next)
        };
        let bucket = self.bucket_of(hash);
        let mut cur = self.buckets[bucket];
        if cur == idx as u32 {
            self.buckets[bucket] = next;
            return;
        }
        loop {
            let cur_next = self.entries[cur as usize]
                .as_ref()
                .expect("bucket chain references a deleted entry")
                .next;
            if cur_next == idx as u32 {
                self.entries[cur as usize].as_mut().expect("entry vanished").next = next;
                return;
            }
            cur = cur_next;
        }
    }

    fn delete_at(&mut self, idx: usize) {
        self.unlink(idx);
        self.entries[idx] = None;
        self.count -= 1;
        self.pending_deletes += 1;
        self.fingerprint = None;
        if self.pending_deletes > Self::DELETE_THRESHOLD {
            self.many_deletes = true;
            self.compact();
            self.pending_deletes = 0;
        }
    }

    /// Rebuild the ordered array without holes and rehash the chains.
    /// Positions shift, so this only runs once fast keys are already dead.
    fn compact(&mut self) {
        tracing::debug!(
            target: "marten::props",
            live = self.count,
            holes = self.entries.len() - self.count,
            "compacting embedded slot map"
        );
        let old = std::mem::take(&mut self.entries);
        self.entries = Vec::with_capacity(self.count);
        self.buckets.fill(EMPTY);
        for mut entry in old.into_iter().flatten() {
            let idx = self.entries.len();
            let bucket = entry.hash as usize & (self.buckets.len() - 1);
            entry.next = self.buckets[bucket];
            self.buckets[bucket] = idx as u32;
            self.entries.push(Some(entry));
        }
    }
}

impl Default for EmbeddedSlotMap {
    fn default() -> Self {
        Self::new()
    }
}

impl SlotMap for EmbeddedSlotMap {
    fn len(&self) -> usize {
        self.count
    }

    fn dirty_len(&self) -> usize {
        self.entries.len()
    }

    fn query(&self, key: &PropertyKey) -> Option<&Slot> {
        self.find(key)
            .and_then(|idx| self.entries[idx].as_ref())
            .map(|e| &e.slot)
    }

    fn query_mut(&mut self, key: &PropertyKey) -> Option<&mut Slot> {
        let idx = self.find(key)?;
        self.entries[idx].as_mut().map(|e| &mut e.slot)
    }

    fn modify(&mut self, key: &PropertyKey, attributes: u8) -> &mut Slot {
        let idx = match self.find(key) {
            Some(idx) => idx,
            None => self.insert_new(Slot::new(key.clone(), attributes)),
        };
        &mut self.entries[idx].as_mut().expect("entry vanished").slot
    }

    fn compute(
        &mut self,
        key: &PropertyKey,
        f: impl FnOnce(Option<Slot>) -> Option<Slot>,
    ) -> Option<&Slot> {
        if let Some(idx) = self.find(key) {
            let existing = self.entries[idx].as_ref().expect("entry vanished").slot.clone();
            return match f(Some(existing)) {
                Some(new_slot) => {
                    debug_assert_eq!(new_slot.key(), key);
                    let entry = self.entries[idx].as_mut().expect("entry vanished");
                    entry.slot = new_slot;
                    Some(&self.entries[idx].as_ref().expect("entry vanished").slot)
                }
                None => {
                    self.delete_at(idx);
                    None
                }
            };
        }

        match f(None) {
            Some(new_slot) => {
                debug_assert_eq!(new_slot.key(), key);
                let idx = self.insert_new(new_slot);
                Some(&self.entries[idx].as_ref().expect("entry vanished").slot)
            }
            None => None,
        }
    }

    fn add(&mut self, slot: Slot) {
        debug_assert!(self.query(slot.key()).is_none());
        self.insert_new(slot);
    }

    fn remove(&mut self, key: &PropertyKey) {
        if let Some(idx) = self.find(key) {
            if self.entries[idx].as_ref().expect("entry vanished").slot.is_permanent() {
                return;
            }
            self.delete_at(idx);
        }
    }

    fn iter(&self) -> impl Iterator<Item = &Slot> {
        self.iter_slots()
    }
}

/// Ordered iterator that skips deleted holes.
pub struct EmbeddedIter<'a> {
    entries: &'a [Option<Entry>],
    pos: usize,
}

impl<'a> Iterator for EmbeddedIter<'a> {
    type Item = &'a Slot;

    fn next(&mut self) -> Option<&'a Slot> {
        while self.pos < self.entries.len() {
            let entry = &self.entries[self.pos];
            self.pos += 1;
            if let Some(entry) = entry {
                return Some(&entry.slot);
            }
        }
        None
    }
}
