//! Cached positional property lookups.
//!
//! A [`FastKey`] pairs a slot position with a discriminator describing the
//! layout the position was minted against. The caller contract is strict:
//! test [`FastKey::is_compatible`] against a container immediately before
//! *every* positional access, with no mutation of that container in
//! between. A token is never "refreshed"; when the layout changes the
//! compatibility test simply starts failing and the caller falls back to a
//! full [`query`](crate::SlotMapContainer::query), typically minting a new
//! token from the result.
//!
//! Shaped tokens are exact: shape identity covers the whole insertion
//! history, so a passing test guarantees the position is right. Fingerprint
//! tokens are approximate over the leading inserts, which is why they are
//! only minted for positions inside the fingerprinted prefix.

use crate::container::{SlotMapContainer, Storage};
use crate::shape::Shape;
use std::sync::Arc;

/// What a token's position was minted against.
#[derive(Clone, Debug)]
enum Discriminator {
    /// Exact: the shaped map's shape node at mint time.
    Shape(Arc<Shape>),
    /// Approximate: the embedded map's insertion fingerprint at mint time.
    Fingerprint(u64),
}

/// A cached, validatable slot position.
#[derive(Clone, Debug)]
pub struct FastKey {
    position: u32,
    discriminator: Discriminator,
}

impl FastKey {
    pub(crate) fn shaped(shape: Arc<Shape>, position: u32) -> Self {
        Self {
            position,
            discriminator: Discriminator::Shape(shape),
        }
    }

    pub(crate) fn fingerprinted(fingerprint: u64, position: u32) -> Self {
        Self {
            position,
            discriminator: Discriminator::Fingerprint(fingerprint),
        }
    }

    /// The cached position. Only meaningful against a container that just
    /// passed [`is_compatible`](Self::is_compatible).
    pub fn position(&self) -> u32 {
        self.position
    }

    /// Whether this token's position is valid for `container` right now.
    pub fn is_compatible(&self, container: &SlotMapContainer) -> bool {
        match (&self.discriminator, container.storage()) {
            (Discriminator::Shape(shape), Storage::Shaped(map)) => {
                Shape::same(shape, map.shape())
            }
            (Discriminator::Fingerprint(fp), Storage::Embedded(map)) => {
                map.fingerprint() == Some(*fp)
            }
            // Tokens never survive a representation switch.
            _ => false,
        }
    }
}
