//! The storage placement engine.
//!
//! A [`StorageGrid`] owns the placement state for one storage instance:
//! which cells exist, which items sit where, and the capacity policy.
//! All operations are synchronous, total, and all-or-nothing: a rejected
//! operation leaves the grid untouched and reports why. The caller
//! serializes access; there is no internal locking.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::grid::{Cell, CellRect, Rotation};
use crate::item::{ItemId, ItemSize, ItemSpec};
use crate::region::StorageRegion;

// ── Configuration ───────────────────────────────────────────────────────

/// Capacity policy for a storage grid.
///
/// Slot and weight limits are mutually exclusive by construction:
/// whichever variant is configured is the only capacity check that runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CapacityPolicy {
    /// No cumulative limit; space alone bounds the contents.
    #[default]
    Unlimited,
    /// Cap on the summed weight of stored items.
    WeightLimited(u32),
    /// Cap on the number of stored items, regardless of weight.
    SlotLimited(u32),
}

/// Construction-time configuration for a storage grid.
///
/// Region and limits are fixed once the grid is built; placement
/// operations never mutate them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Rectangles whose union forms the usable cells.
    pub region: Vec<CellRect>,
    pub policy: CapacityPolicy,
    /// Largest single item size accepted, if a ceiling applies.
    pub max_item_size: Option<ItemSize>,
    /// When set, an item must carry at least one of these tags.
    pub whitelist: Option<Vec<String>>,
    /// Items carrying any of these tags are always rejected.
    pub blacklist: Vec<String>,
}

impl StorageConfig {
    pub fn with_region(rects: Vec<CellRect>) -> Self {
        Self {
            region: rects,
            ..Self::default()
        }
    }

    pub fn with_policy(mut self, policy: CapacityPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_max_item_size(mut self, size: ItemSize) -> Self {
        self.max_item_size = Some(size);
        self
    }
}

// ── Results ─────────────────────────────────────────────────────────────

/// Why an insert was rejected. All variants are recoverable, caller-visible
/// outcomes; the host decides whether to retry elsewhere or give up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RejectReason {
    /// Part of the requested footprint lies outside the region.
    OutOfBounds,
    /// The footprint intersects an existing placement (or the item is
    /// already stored and conflicts with its own).
    Overlaps,
    /// A weight limit is configured and the item would exceed it.
    TooHeavy,
    /// A slot limit is configured and every slot is taken.
    TooManyItems,
    /// The item's size class exceeds this storage's ceiling.
    ItemTooLarge,
    /// The item's tags failed this storage's whitelist or blacklist.
    Filtered,
    /// Auto-placement scanned the whole region without finding room.
    NoSpace,
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let msg = match self {
            RejectReason::OutOfBounds => "outside the storage grid",
            RejectReason::Overlaps => "overlaps another item",
            RejectReason::TooHeavy => "too heavy",
            RejectReason::TooManyItems => "no free slot",
            RejectReason::ItemTooLarge => "item too large",
            RejectReason::Filtered => "not accepted here",
            RejectReason::NoSpace => "no space left",
        };
        f.write_str(msg)
    }
}

/// A committed placement: where an item sits and how it is turned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placement {
    pub rect: CellRect,
    pub rotation: Rotation,
}

/// Per-item bookkeeping. Weight is recorded at insert time so removal
/// never needs the spec again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
struct StoredEntry {
    placement: Placement,
    weight: u32,
}

// ── Engine ──────────────────────────────────────────────────────────────

/// Placement state for a single storage instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageGrid {
    region: StorageRegion,
    policy: CapacityPolicy,
    max_item_size: Option<ItemSize>,
    whitelist: Option<Vec<String>>,
    blacklist: Vec<String>,
    /// Items currently placed, keyed by host id. BTreeMap keeps
    /// iteration deterministic for replication and tests.
    items: BTreeMap<ItemId, StoredEntry>,
    /// Running sum of stored weights.
    total_weight: u64,
}

impl StorageGrid {
    /// Build an empty grid. The region membership mask is precomputed
    /// here; placement operations never rescan the rectangle list.
    pub fn new(config: StorageConfig) -> Self {
        Self {
            region: StorageRegion::new(config.region),
            policy: config.policy,
            max_item_size: config.max_item_size,
            whitelist: config.whitelist,
            blacklist: config.blacklist,
            items: BTreeMap::new(),
            total_weight: 0,
        }
    }

    // ── Operations ──────────────────────────────────────────────────────

    /// Try to place `spec` for `id` with its rotated footprint anchored at
    /// `at` (lowest-coordinate corner).
    ///
    /// Checks run in a fixed order, so a request violating several rules
    /// reports the first: Filtered, ItemTooLarge, TooHeavy or TooManyItems
    /// (per the active policy), OutOfBounds, Overlaps. An id that is
    /// already stored is rejected as Overlaps regardless of position. On
    /// success the placement is committed and returned.
    pub fn try_insert(
        &mut self,
        id: ItemId,
        spec: &ItemSpec,
        at: Cell,
        rotation: Rotation,
    ) -> Result<Placement, RejectReason> {
        self.check_admission(id, spec)?;
        let (w, h) = spec.footprint_for(rotation);
        let rect = CellRect::new(at.x, at.y, w, h);
        self.check_geometry(&rect)?;

        let placement = Placement { rect, rotation };
        self.commit(id, spec, placement);
        Ok(placement)
    }

    /// Scan for the first free spot and place there.
    ///
    /// The scan order is fixed: anchors run row-major over the region
    /// bounding box (y ascending, then x ascending), and each anchor tries
    /// Deg0 before Deg90; Deg90 is skipped for square footprints.
    /// Rejections no position can cure (Filtered, ItemTooLarge, TooHeavy,
    /// TooManyItems, already stored) are reported directly; a fruitless
    /// scan reports NoSpace.
    pub fn try_auto_place(
        &mut self,
        id: ItemId,
        spec: &ItemSpec,
    ) -> Result<Placement, RejectReason> {
        self.check_admission(id, spec)?;

        let rotations: &[Rotation] = if spec.is_square() {
            &[Rotation::Deg0]
        } else {
            &[Rotation::Deg0, Rotation::Deg90]
        };

        for anchor in self.region.bounds().cells() {
            for &rotation in rotations {
                let (w, h) = spec.footprint_for(rotation);
                let rect = CellRect::new(anchor.x, anchor.y, w, h);
                if self.fits(&rect) {
                    let placement = Placement { rect, rotation };
                    self.commit(id, spec, placement);
                    return Ok(placement);
                }
            }
        }
        Err(RejectReason::NoSpace)
    }

    /// Remove an item's placement. Returns the vacated placement, or None
    /// if the item was not stored; the grid is untouched in that case.
    pub fn remove(&mut self, id: ItemId) -> Option<Placement> {
        let entry = self.items.remove(&id)?;
        self.total_weight -= entry.weight as u64;
        Some(entry.placement)
    }

    // ── Queries ─────────────────────────────────────────────────────────

    pub fn contains(&self, id: ItemId) -> bool {
        self.items.contains_key(&id)
    }

    pub fn placement(&self, id: ItemId) -> Option<Placement> {
        self.items.get(&id).map(|e| e.placement)
    }

    /// All placements in ascending id order.
    pub fn placements(&self) -> impl Iterator<Item = (ItemId, Placement)> + '_ {
        self.items.iter().map(|(id, e)| (*id, e.placement))
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    pub fn cumulative_weight(&self) -> u64 {
        self.total_weight
    }

    pub fn region(&self) -> &StorageRegion {
        &self.region
    }

    pub fn policy(&self) -> CapacityPolicy {
        self.policy
    }

    /// Whether a cell is usable and not covered by any placement. Meant
    /// for hover feedback; O(items).
    pub fn is_cell_free(&self, cell: Cell) -> bool {
        self.region.contains_cell(cell)
            && self.items.values().all(|e| !e.placement.rect.contains_cell(cell))
    }

    /// (used, limit) under the active capacity policy, for fill bars.
    /// None when unlimited.
    pub fn capacity_usage(&self) -> Option<(u64, u64)> {
        match self.policy {
            CapacityPolicy::Unlimited => None,
            CapacityPolicy::WeightLimited(limit) => Some((self.total_weight, limit as u64)),
            CapacityPolicy::SlotLimited(limit) => Some((self.items.len() as u64, limit as u64)),
        }
    }

    // ── Internals ───────────────────────────────────────────────────────

    /// Position-independent checks: duplicate id, filter, size ceiling,
    /// capacity.
    fn check_admission(&self, id: ItemId, spec: &ItemSpec) -> Result<(), RejectReason> {
        if self.items.contains_key(&id) {
            return Err(RejectReason::Overlaps);
        }
        if !self.accepts_tags(&spec.tags) {
            return Err(RejectReason::Filtered);
        }
        if let Some(ceiling) = self.max_item_size {
            if spec.size > ceiling {
                return Err(RejectReason::ItemTooLarge);
            }
        }
        match self.policy {
            CapacityPolicy::Unlimited => {}
            CapacityPolicy::WeightLimited(limit) => {
                if self.total_weight + spec.weight as u64 > limit as u64 {
                    return Err(RejectReason::TooHeavy);
                }
            }
            CapacityPolicy::SlotLimited(limit) => {
                if self.items.len() as u64 >= limit as u64 {
                    return Err(RejectReason::TooManyItems);
                }
            }
        }
        Ok(())
    }

    /// Tag filter: an item carrying any blacklisted tag is rejected, and
    /// when a whitelist is configured the item must carry at least one of
    /// its tags. No filter configured accepts everything.
    fn accepts_tags(&self, tags: &[String]) -> bool {
        if tags.iter().any(|t| self.blacklist.contains(t)) {
            return false;
        }
        if let Some(whitelist) = &self.whitelist {
            if !tags.iter().any(|t| whitelist.contains(t)) {
                return false;
            }
        }
        true
    }

    /// Position checks, reported in order: containment, then overlap.
    fn check_geometry(&self, rect: &CellRect) -> Result<(), RejectReason> {
        if !self.region.contains_rect(rect) {
            return Err(RejectReason::OutOfBounds);
        }
        if self.overlaps_any(rect) {
            return Err(RejectReason::Overlaps);
        }
        Ok(())
    }

    /// Pairwise AABB test against every placement. Fine at the item
    /// counts a storage window holds; an occupancy index could replace it
    /// without changing the contract.
    fn overlaps_any(&self, rect: &CellRect) -> bool {
        self.items.values().any(|e| e.placement.rect.intersects(rect))
    }

    fn fits(&self, rect: &CellRect) -> bool {
        self.region.contains_rect(rect) && !self.overlaps_any(rect)
    }

    fn commit(&mut self, id: ItemId, spec: &ItemSpec, placement: Placement) {
        self.total_weight += spec.weight as u64;
        self.items.insert(
            id,
            StoredEntry {
                placement,
                weight: spec.weight,
            },
        );
    }
}
