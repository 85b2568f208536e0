//! Item descriptors supplied by the entity host.
//!
//! The placement engine never owns item lifetime. It sees an opaque id,
//! a footprint, a weight, a size class, and optional tags; everything
//! else about an item (sprite, prototype, container state) stays with
//! the host.

use serde::{Deserialize, Serialize};

use crate::grid::Rotation;

/// Opaque handle for a stored item, owned by the host entity layer.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct ItemId(pub u64);

impl ItemId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "item#{}", self.0)
    }
}

/// Size classification for single items, ordered smallest to largest.
///
/// A storage's size ceiling compares against this ordering; the class
/// also supplies a default weight for hosts that don't set one per item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ItemSize {
    Tiny,
    Small,
    Normal,
    Large,
    Huge,
}

impl ItemSize {
    pub fn all() -> &'static [ItemSize] {
        &[
            ItemSize::Tiny,
            ItemSize::Small,
            ItemSize::Normal,
            ItemSize::Large,
            ItemSize::Huge,
        ]
    }

    /// Default cumulative-weight contribution for this class.
    pub fn default_weight(&self) -> u32 {
        match self {
            ItemSize::Tiny => 1,
            ItemSize::Small => 2,
            ItemSize::Normal => 4,
            ItemSize::Large => 8,
            ItemSize::Huge => 16,
        }
    }
}

/// Host-supplied descriptor for an item being stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemSpec {
    /// Unrotated footprint in cells: (width, height).
    pub footprint: (u32, u32),
    /// Cumulative-weight contribution under a weight-limited policy.
    pub weight: u32,
    /// Size class checked against a storage's size ceiling.
    pub size: ItemSize,
    /// Free-form tags evaluated by storage whitelists and blacklists.
    pub tags: Vec<String>,
}

impl ItemSpec {
    pub fn new(width: u32, height: u32, weight: u32, size: ItemSize) -> Self {
        Self {
            footprint: (width, height),
            weight,
            size,
            tags: Vec::new(),
        }
    }

    /// Descriptor with the class-default weight and no tags.
    pub fn of_size(width: u32, height: u32, size: ItemSize) -> Self {
        Self::new(width, height, size.default_weight(), size)
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Footprint dimensions under the given rotation.
    pub fn footprint_for(&self, rotation: Rotation) -> (u32, u32) {
        rotation.apply(self.footprint.0, self.footprint.1)
    }

    /// Whether rotating changes the footprint at all.
    pub fn is_square(&self) -> bool {
        self.footprint.0 == self.footprint.1
    }
}
