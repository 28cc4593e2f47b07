//! Locked wrapper for containers shared between threads.
//!
//! [`ThreadSafeSlotMap`] puts a [`SlotMapContainer`] behind a reader-writer
//! lock and pairs it with a monotonically increasing version stamp. The
//! stamp is bumped while the write lock is still held, so any reader that
//! observes an unchanged stamp under the read lock is looking at a
//! container no writer has touched since the stamp was taken. That is what
//! lets [`StampedFastKey`] skip even the compatibility probe on the hot
//! path: same stamp, same layout.

use crate::container::SlotMapContainer;
use crate::fast_key::FastKey;
use crate::key::PropertyKey;
use crate::shape::Shape;
use crate::slot::Slot;
use crate::value::Value;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// A slot-map container safe to share across threads.
pub struct ThreadSafeSlotMap {
    version: AtomicU64,
    inner: RwLock<SlotMapContainer>,
}

/// Write access to the wrapped container. Bumps the version stamp on drop,
/// before the lock is released.
pub struct WriteGuard<'a> {
    version: &'a AtomicU64,
    guard: RwLockWriteGuard<'a, SlotMapContainer>,
}

impl Deref for WriteGuard<'_> {
    type Target = SlotMapContainer;

    fn deref(&self) -> &SlotMapContainer {
        &self.guard
    }
}

impl DerefMut for WriteGuard<'_> {
    fn deref_mut(&mut self) -> &mut SlotMapContainer {
        &mut self.guard
    }
}

impl Drop for WriteGuard<'_> {
    fn drop(&mut self) {
        // Still holding the write lock here; readers acquiring after the
        // release are guaranteed to see the new stamp.
        self.version.fetch_add(1, Ordering::Release);
    }
}

/// A [`FastKey`] bound to the version stamp it was minted under.
#[derive(Clone, Debug)]
pub struct StampedFastKey {
    key: FastKey,
    stamp: u64,
}

impl StampedFastKey {
    /// The cached position.
    pub fn position(&self) -> u32 {
        self.key.position()
    }
}

impl ThreadSafeSlotMap {
    /// Create an empty map sharing `root` with the rest of the runtime.
    pub fn new(root: Arc<Shape>) -> Self {
        Self {
            version: AtomicU64::new(0),
            inner: RwLock::new(SlotMapContainer::new(root)),
        }
    }

    /// Create a map sized for a known number of properties.
    pub fn with_capacity(root: Arc<Shape>, capacity: usize) -> Self {
        Self {
            version: AtomicU64::new(0),
            inner: RwLock::new(SlotMapContainer::with_capacity(root, capacity)),
        }
    }

    /// Take the read lock for a batch of lookups or an ordered walk.
    ///
    /// Iteration through [`SlotMapContainer::iter`] is only coherent while
    /// a guard from here is held.
    pub fn read(&self) -> RwLockReadGuard<'_, SlotMapContainer> {
        self.inner.read()
    }

    /// Take the write lock. The version stamp is bumped when the guard
    /// drops, invalidating every outstanding [`StampedFastKey`].
    pub fn write(&self) -> WriteGuard<'_> {
        WriteGuard {
            version: &self.version,
            guard: self.inner.write(),
        }
    }

    /// The current version stamp.
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    /// Number of live slots.
    pub fn len(&self) -> usize {
        self.read_shared().len()
    }

    /// Whether the map holds no live slots.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Clone out the value for `key`, if present.
    pub fn query_value(&self, key: &PropertyKey) -> Option<Value> {
        self.read_shared()
            .query(key)
            .map(|slot| slot.value().clone())
    }

    /// Clone out the whole slot for `key`, if present.
    pub fn query_slot(&self, key: &PropertyKey) -> Option<Slot> {
        self.read_shared().query(key).cloned()
    }

    /// Get-or-create a slot and hand it to `f` under the write lock.
    pub fn modify<R>(&self, key: &PropertyKey, attributes: u8, f: impl FnOnce(&mut Slot) -> R) -> R {
        let mut guard = self.write();
        f(guard.modify(key, attributes))
    }

    /// Atomically insert, replace, or delete the slot for `key`. The
    /// closure runs under the write lock, so the decision cannot race
    /// another mutation.
    pub fn compute(
        &self,
        key: &PropertyKey,
        f: impl FnOnce(Option<Slot>) -> Option<Slot>,
    ) -> Option<Slot> {
        let mut guard = self.write();
        guard.compute(key, f).cloned()
    }

    /// Remove the slot for `key`. Idempotent; permanent slots survive.
    pub fn remove(&self, key: &PropertyKey) {
        self.write().remove(key);
    }

    /// Resolve the value for `key`, running a lazy initializer if pending.
    pub fn resolve(&self, key: &PropertyKey) -> Option<Value> {
        // Common case first: an already-resolved slot needs no write lock.
        {
            let guard = self.read_shared();
            if let Some(slot) = guard.query(key) {
                if !slot.is_lazy() {
                    return Some(slot.value().clone());
                }
            } else {
                return None;
            }
        }
        self.write().resolve(key)
    }

    /// Mint a stamped fast key for `key`, if the active representation
    /// supports one.
    pub fn fast_query_key(&self, key: &PropertyKey) -> Option<StampedFastKey> {
        let guard = self.read_shared();
        let token = guard.fast_query_key(key)?;
        // Reading the stamp under the read lock: no writer can be between
        // its bump and its release while we hold this guard.
        Some(StampedFastKey {
            key: token,
            stamp: self.version.load(Ordering::Acquire),
        })
    }

    /// Clone out the value at a stamped token's position, or `None` if the
    /// map has been written since the token was minted. A `None` means fall
    /// back to [`query_value`](Self::query_value) and re-mint.
    pub fn query_fast(&self, token: &StampedFastKey) -> Option<Value> {
        let guard = self.read_shared();
        if self.version.load(Ordering::Acquire) != token.stamp {
            return None;
        }
        // Unchanged stamp implies an unchanged layout; the compatibility
        // probe is a debug-only cross-check.
        debug_assert!(token.key.is_compatible(&guard));
        guard
            .query_fast(token.key.position())
            .map(|slot| slot.value().clone())
    }

    /// Run `f` on the slot at a stamped token's position under the write
    /// lock, re-validating the token first. Returns `None` without calling
    /// `f` when the token is stale.
    pub fn modify_fast<R>(&self, token: &StampedFastKey, f: impl FnOnce(&mut Slot) -> R) -> Option<R> {
        let mut guard = self.write();
        if self.version.load(Ordering::Acquire) != token.stamp {
            return None;
        }
        debug_assert!(token.key.is_compatible(&guard));
        guard.modify_fast(token.key.position()).map(f)
    }

    /// Snapshot the live slots in insertion order.
    pub fn snapshot(&self) -> Vec<Slot> {
        self.read_shared().iter().cloned().collect()
    }

    fn read_shared(&self) -> RwLockReadGuard<'_, SlotMapContainer> {
        // Uncontended reads take the fast path; under a writer we park.
        match self.inner.try_read() {
            Some(guard) => guard,
            None => self.inner.read(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slot::attrs;

    fn map() -> ThreadSafeSlotMap {
        ThreadSafeSlotMap::new(Shape::root())
    }

    #[test]
    fn modify_and_query_roundtrip() {
        let map = map();
        let key = PropertyKey::name("answer");
        map.modify(&key, attrs::EMPTY, |slot| {
            slot.set_value_unchecked(Value::from(42));
        });
        assert_eq!(map.query_value(&key), Some(Value::from(42)));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn writes_bump_the_version() {
        let map = map();
        let before = map.version();
        map.modify(&PropertyKey::name("a"), attrs::EMPTY, |_| {});
        assert!(map.version() > before);
    }

    #[test]
    fn stamped_token_survives_reads_but_not_writes() {
        let map = map();
        let key = PropertyKey::name("hot");
        map.modify(&key, attrs::EMPTY, |slot| {
            slot.set_value_unchecked(Value::from(1));
        });

        let token = map.fast_query_key(&key).unwrap();
        assert_eq!(map.query_fast(&token), Some(Value::from(1)));
        assert_eq!(map.query_fast(&token), Some(Value::from(1)));

        map.modify(&PropertyKey::name("other"), attrs::EMPTY, |_| {});
        assert_eq!(map.query_fast(&token), None);
        // Fallback path still works and a new token can be minted.
        assert_eq!(map.query_value(&key), Some(Value::from(1)));
        assert!(map.fast_query_key(&key).is_some());
    }

    #[test]
    fn modify_fast_rejects_stale_tokens() {
        let map = map();
        let key = PropertyKey::name("hot");
        map.modify(&key, attrs::EMPTY, |_| {});

        let token = map.fast_query_key(&key).unwrap();
        let hit = map.modify_fast(&token, |slot| {
            slot.set_value_unchecked(Value::from(5));
        });
        assert!(hit.is_some());
        // The fast write itself bumped the version.
        assert_eq!(map.modify_fast(&token, |_| ()), None);
        assert_eq!(map.query_value(&key), Some(Value::from(5)));
    }

    #[test]
    fn compute_runs_atomically_under_the_write_lock() {
        let map = map();
        let key = PropertyKey::name("counter");
        map.modify(&key, attrs::EMPTY, |slot| {
            slot.set_value_unchecked(Value::from(0));
        });

        std::thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| {
                    for _ in 0..250 {
                        map.compute(&key, |existing| {
                            let mut slot = existing.unwrap();
                            let next = match slot.value() {
                                Value::Number(n) => n + 1.0,
                                _ => unreachable!(),
                            };
                            slot.set_value_unchecked(Value::from(next));
                            Some(slot)
                        });
                    }
                });
            }
        });
        assert_eq!(map.query_value(&key), Some(Value::from(1000)));
    }

    #[test]
    fn readers_race_a_writer_without_tearing() {
        let map = map();
        let first = PropertyKey::name("first");
        let second = PropertyKey::name("second");
        map.modify(&first, attrs::EMPTY, |slot| {
            slot.set_value_unchecked(Value::from(0));
        });
        map.modify(&second, attrs::EMPTY, |slot| {
            slot.set_value_unchecked(Value::from(0));
        });

        std::thread::scope(|scope| {
            scope.spawn(|| {
                for i in 1..=500 {
                    let mut guard = map.write();
                    // Both slots change under one guard; readers must never
                    // observe them out of step.
                    guard
                        .query_mut(&first)
                        .unwrap()
                        .set_value_unchecked(Value::from(i));
                    guard
                        .query_mut(&second)
                        .unwrap()
                        .set_value_unchecked(Value::from(i));
                }
            });
            for _ in 0..3 {
                scope.spawn(|| {
                    for _ in 0..500 {
                        let guard = map.read();
                        let a = guard.query(&first).unwrap().value().clone();
                        let b = guard.query(&second).unwrap().value().clone();
                        assert_eq!(a, b);
                    }
                });
            }
        });
    }

    #[test]
    fn snapshot_is_ordered() {
        let map = map();
        for name in ["a", "b", "c"] {
            map.modify(&PropertyKey::name(name), attrs::EMPTY, |_| {});
        }
        let order: Vec<_> = map
            .snapshot()
            .iter()
            .map(|s| s.key().to_string())
            .collect();
        assert_eq!(order, ["a", "b", "c"]);
    }
}
