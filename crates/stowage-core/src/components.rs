//! Component definitions for storage entities.
//!
//! Components are pure data attached to entities - they have no
//! behavior, that lives in the system functions.

use hecs::Entity;
use serde::{Deserialize, Serialize};

use stowage_logic::{ItemId, ItemSpec, StorageConfig, StorageGrid};

/// World position, used by the area-insert radius sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

impl Position {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance_squared(&self, other: &Self) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }
}

/// An entity that can be placed into storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stowable {
    /// Stable host-side id. Storage grids key on this, so it must
    /// survive save/load; entity ids do not.
    pub id: ItemId,
    pub spec: ItemSpec,
}

impl Stowable {
    pub fn new(id: ItemId, spec: ItemSpec) -> Self {
        Self { id, spec }
    }
}

/// A storage entity: the placement grid plus host-facing flags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Storage {
    pub grid: StorageGrid,
    /// Whether a storage window is open on some client. Replicated
    /// state; placement logic never reads it.
    pub is_open: bool,
    /// When set, area insert sweeps loose stowables within this radius
    /// of the storage's position.
    pub area_insert_radius: Option<f32>,
}

impl Storage {
    pub fn new(config: StorageConfig) -> Self {
        Self {
            grid: StorageGrid::new(config),
            is_open: false,
            area_insert_radius: None,
        }
    }

    pub fn with_area_insert(mut self, radius: f32) -> Self {
        self.area_insert_radius = Some(radius);
        self
    }
}

/// Link from a stored item entity back to its storage entity.
///
/// Derivable from grid contents; persistence rebuilds it after load
/// instead of saving it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoredIn {
    pub storage: Entity,
}
