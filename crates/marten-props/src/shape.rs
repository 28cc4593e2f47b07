//! Shapes: the structural-sharing trie of property-insertion histories.
//!
//! A [`Shape`] is one node in a trie keyed by ordered property insertion.
//! Two objects that added the same distinct keys in the same order from the
//! empty shape end up holding the *same* `Arc<Shape>`, so shape reference
//! equality is a complete, O(1) statement about an object's property layout
//! — the "hidden class" discriminator the fast-key protocol relies on.
//!
//! Nodes are immutable once created. The only shared mutable state is the
//! per-node child cache, which supports race-safe get-or-create: child
//! links are weak, so branches no other map or token holds onto free
//! themselves.
//!
//! Root-proximate nodes carry an eagerly built key→position table (they are
//! the most shared, so the precompute pays for itself); deeper nodes walk
//! their ancestors instead to bound memory.

use crate::key::PropertyKey;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use rustc_hash::FxHashMap;
use std::fmt;
use std::sync::{Arc, Weak};

/// Shapes at or below this depth precompute their full ancestor index.
const EAGER_INDEX_DEPTH: u32 = 8;

/// A node in the shape trie.
pub struct Shape {
    /// The shape this one transitioned from. `None` only for the root.
    parent: Option<Arc<Shape>>,
    /// The key added at this node. `None` only for the root.
    key: Option<PropertyKey>,
    /// Number of keys on the path from the root; this node's own key sits
    /// at position `depth - 1`.
    depth: u32,
    /// Weakly held transitions to child shapes, keyed by the added key.
    children: DashMap<PropertyKey, Weak<Shape>>,
    /// Full key→position table, present iff `depth <= EAGER_INDEX_DEPTH`.
    index: Option<FxHashMap<PropertyKey, u32>>,
}

/// Result of [`Shape::put_if_absent`].
pub struct PutResult {
    /// Position assigned to the key.
    pub position: u32,
    /// The successor shape if the key extended the history; `None` when the
    /// key was already present and no transition happened.
    pub shape: Option<Arc<Shape>>,
}

impl Shape {
    /// Create a root (empty) shape.
    ///
    /// Each runtime owns one root; containers created from the same root
    /// share transitions, which is what makes shapes comparable across
    /// objects.
    pub fn root() -> Arc<Self> {
        Arc::new(Self {
            parent: None,
            key: None,
            depth: 0,
            children: DashMap::new(),
            index: Some(FxHashMap::default()),
        })
    }

    /// Number of keys in this shape's history.
    pub fn depth(&self) -> u32 {
        self.depth
    }

    /// Position of this node's own key, or `None` for the root.
    pub fn position(&self) -> Option<u32> {
        self.depth.checked_sub(1)
    }

    /// The key added at this node, or `None` for the root.
    pub fn key(&self) -> Option<&PropertyKey> {
        self.key.as_ref()
    }

    /// The parent shape.
    pub fn parent(&self) -> Option<&Arc<Shape>> {
        self.parent.as_ref()
    }

    /// Whether two shapes are the same node. Reference identity is the
    /// correct equality for shapes: identical histories share the node.
    pub fn same(a: &Arc<Shape>, b: &Arc<Shape>) -> bool {
        Arc::ptr_eq(a, b)
    }

    /// Find the position of `key` in this shape's history, if present.
    ///
    /// O(1) for root-proximate shapes via the eager index; O(depth) for
    /// deeper shapes, which walk ancestors until an indexed one is reached.
    pub fn find(&self, key: &PropertyKey) -> Option<u32> {
        let mut node = self;
        loop {
            if let Some(index) = &node.index {
                return index.get(key).copied();
            }
            if node.key.as_ref() == Some(key) {
                return Some(node.depth - 1);
            }
            // The root always carries an index, so this terminates.
            node = node.parent.as_deref().expect("unindexed shape without parent");
        }
    }

    /// Return the position for `key`, transitioning to a successor shape if
    /// the key is new to this history.
    ///
    /// Idempotent and referentially stable: for a fixed starting shape and
    /// key, the same successor node is returned every time (as long as
    /// something keeps it alive), which is what makes shape identity a
    /// valid cache discriminator.
    pub fn put_if_absent(self: &Arc<Self>, key: &PropertyKey) -> PutResult {
        if let Some(position) = self.find(key) {
            return PutResult {
                position,
                shape: None,
            };
        }
        let child = self.child(key);
        PutResult {
            position: child.depth - 1,
            shape: Some(child),
        }
    }

    /// Get or create the child shape for `key`. Safe against two threads
    /// racing on the same key: both observe one resulting node.
    fn child(self: &Arc<Self>, key: &PropertyKey) -> Arc<Shape> {
        match self.children.entry(key.clone()) {
            Entry::Occupied(mut occupied) => {
                if let Some(existing) = occupied.get().upgrade() {
                    return existing;
                }
                // The cached child was dropped; replace it.
                let fresh = self.new_child(key);
                occupied.insert(Arc::downgrade(&fresh));
                fresh
            }
            Entry::Vacant(vacant) => {
                let fresh = self.new_child(key);
                vacant.insert(Arc::downgrade(&fresh));
                fresh
            }
        }
    }

    fn new_child(self: &Arc<Self>, key: &PropertyKey) -> Arc<Shape> {
        let depth = self.depth + 1;
        let index = if depth <= EAGER_INDEX_DEPTH {
            let mut index = self
                .index
                .clone()
                .expect("shallow shape missing eager index");
            index.insert(key.clone(), self.depth);
            Some(index)
        } else {
            None
        };
        tracing::trace!(
            target: "marten::props",
            key = %key,
            position = self.depth,
            "shape transition"
        );
        Arc::new(Shape {
            parent: Some(Arc::clone(self)),
            key: Some(key.clone()),
            depth,
            children: DashMap::new(),
            index,
        })
    }
}

impl fmt::Debug for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Shape")
            .field("key", &self.key)
            .field("depth", &self.depth)
            .field("indexed", &self.index.is_some())
            .finish()
    }
}
