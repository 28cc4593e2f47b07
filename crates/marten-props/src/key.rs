//! Property keys: integer indices, interned names, and symbols.
//!
//! Names are interned for deduplication so that key equality is usually a
//! pointer comparison, and every name carries a precomputed hash. Both the
//! slot-map bucket tables and the shape fingerprint lean on that hash.

use dashmap::DashMap;
use rustc_hash::FxHasher;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::{Arc, LazyLock};

/// Global name intern table, keyed by content hash.
static NAME_TABLE: LazyLock<DashMap<u64, Arc<str>>> = LazyLock::new(DashMap::new);

/// Source of process-unique symbol ids.
static NEXT_SYMBOL_ID: AtomicU64 = AtomicU64::new(1);

fn content_hash(s: &str) -> u64 {
    let mut hasher = FxHasher::default();
    s.hash(&mut hasher);
    hasher.finish()
}

/// An interned property name with a precomputed hash.
#[derive(Clone)]
pub struct InternedName {
    data: Arc<str>,
    hash: u64,
}

impl InternedName {
    fn intern(s: &str) -> Self {
        let hash = content_hash(s);

        if let Some(existing) = NAME_TABLE.get(&hash)
            && existing.as_ref() == s
        {
            return Self {
                data: existing.clone(),
                hash,
            };
        }

        let data: Arc<str> = Arc::from(s);
        NAME_TABLE.insert(hash, data.clone());
        Self { data, hash }
    }

    /// The name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.data
    }

    /// The precomputed content hash.
    pub fn precomputed_hash(&self) -> u64 {
        self.hash
    }
}

impl PartialEq for InternedName {
    fn eq(&self, other: &Self) -> bool {
        // Interned names of equal content usually share the allocation.
        self.hash == other.hash
            && (Arc::ptr_eq(&self.data, &other.data) || self.data == other.data)
    }
}

impl Eq for InternedName {}

impl Hash for InternedName {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash);
    }
}

impl PartialOrd for InternedName {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for InternedName {
    fn cmp(&self, other: &Self) -> Ordering {
        self.data.as_ref().cmp(other.data.as_ref())
    }
}

impl fmt::Debug for InternedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.data)
    }
}

/// A process-unique symbol identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SymbolId(u64);

impl SymbolId {
    /// Allocate a fresh, never-before-seen symbol id.
    pub fn fresh() -> Self {
        Self(NEXT_SYMBOL_ID.fetch_add(1, AtomicOrdering::Relaxed))
    }

    /// The raw id.
    pub fn raw(self) -> u64 {
        self.0
    }
}

/// A property identifier: an integer index, an interned name, or a symbol.
///
/// Keys are immutable and totally ordered: indices sort before names, names
/// sort lexically, and symbols come last (in creation order). The variant
/// declaration order below is what the derived `Ord` relies on.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PropertyKey {
    /// Non-negative integer index, for element-style properties.
    Index(u32),
    /// Interned string name.
    Name(InternedName),
    /// Symbol key.
    Symbol(SymbolId),
}

impl PropertyKey {
    /// Create a name key, interning the string.
    pub fn name(s: &str) -> Self {
        Self::Name(InternedName::intern(s))
    }

    /// Create an index key.
    pub fn index(i: u32) -> Self {
        Self::Index(i)
    }

    /// Create a fresh symbol key.
    pub fn symbol() -> Self {
        Self::Symbol(SymbolId::fresh())
    }

    /// Whether this is an integer index.
    pub fn is_index(&self) -> bool {
        matches!(self, Self::Index(_))
    }

    /// A 32-bit hash used by the bucket tables and the fingerprint.
    ///
    /// Index keys hash to themselves, which keeps dense element access
    /// well distributed over power-of-two tables.
    pub fn hash_code(&self) -> u32 {
        match self {
            Self::Index(i) => *i,
            Self::Name(n) => {
                let h = n.precomputed_hash();
                h as u32 ^ (h >> 32) as u32
            }
            Self::Symbol(s) => {
                let h = s.raw();
                h as u32 ^ (h >> 32) as u32
            }
        }
    }
}

impl fmt::Display for PropertyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index(i) => write!(f, "{i}"),
            Self::Name(n) => write!(f, "{}", n.as_str()),
            Self::Symbol(s) => write!(f, "symbol(#{})", s.raw()),
        }
    }
}

impl From<&str> for PropertyKey {
    fn from(s: &str) -> Self {
        Self::name(s)
    }
}

impl From<u32> for PropertyKey {
    fn from(i: u32) -> Self {
        Self::Index(i)
    }
}
