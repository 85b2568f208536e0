//! Storage simulation driver - owns the world and the event log.
//!
//! `StorageSim` is the entry point hosts and headless tools use: spawn
//! storages and items, run operations, drain events for presentation,
//! and save or load the whole state.

use hecs::{Entity, World};

use stowage_logic::{Cell, ItemId, ItemSpec, Placement, Rotation, StorageConfig};

use crate::components::{Position, Storage, Stowable};
use crate::persistence::{self, SaveError};
use crate::systems::{self, StorageEvent, StorageOpError};

/// A world of storages and stowable items.
pub struct StorageSim {
    /// ECS world containing all entities
    pub world: World,
    events: Vec<StorageEvent>,
    /// Next stable id handed to a spawned item.
    next_item_id: u64,
}

impl StorageSim {
    /// Create an empty simulation.
    pub fn new() -> Self {
        Self {
            world: World::new(),
            events: Vec::new(),
            next_item_id: 1,
        }
    }

    // ── Spawning ────────────────────────────────────────────────────────

    /// Spawn a storage entity at a world position.
    pub fn spawn_storage(&mut self, config: StorageConfig, position: Position) -> Entity {
        self.world.spawn((Storage::new(config), position))
    }

    /// Spawn a preconfigured storage component (area insert, flags).
    pub fn spawn_storage_with(&mut self, storage: Storage, position: Position) -> Entity {
        self.world.spawn((storage, position))
    }

    /// Spawn a loose item entity, assigning it the next stable id.
    pub fn spawn_item(&mut self, spec: ItemSpec, position: Position) -> Entity {
        let id = ItemId::new(self.next_item_id);
        self.next_item_id += 1;
        self.world.spawn((Stowable::new(id, spec), position))
    }

    // ── Operations ──────────────────────────────────────────────────────

    pub fn insert(
        &mut self,
        storage: Entity,
        item: Entity,
        at: Cell,
        rotation: Rotation,
    ) -> Result<Placement, StorageOpError> {
        systems::insert_into_storage(&mut self.world, &mut self.events, storage, item, at, rotation)
    }

    pub fn auto_insert(&mut self, storage: Entity, item: Entity) -> Result<Placement, StorageOpError> {
        systems::auto_insert_into_storage(&mut self.world, &mut self.events, storage, item)
    }

    pub fn remove(&mut self, storage: Entity, item: Entity) -> Option<Placement> {
        systems::remove_from_storage(&mut self.world, &mut self.events, storage, item)
    }

    pub fn area_insert(&mut self, storage: Entity) -> usize {
        systems::area_insert(&mut self.world, &mut self.events, storage)
    }

    pub fn set_open(&mut self, storage: Entity, open: bool) -> bool {
        systems::set_ui_open(&mut self.world, &mut self.events, storage, open)
    }

    /// Drain accumulated events for the presentation layer.
    pub fn drain_events(&mut self) -> Vec<StorageEvent> {
        std::mem::take(&mut self.events)
    }

    // ── Queries ─────────────────────────────────────────────────────────

    /// Count storage entities.
    pub fn storage_count(&self) -> usize {
        self.world.query::<&Storage>().iter().count()
    }

    /// Count stowable item entities, stored or loose.
    pub fn item_count(&self) -> usize {
        self.world.query::<&Stowable>().iter().count()
    }

    /// Items currently stored in a given storage.
    pub fn stored_count(&self, storage: Entity) -> usize {
        self.world
            .get::<&Storage>(storage)
            .map(|s| s.grid.item_count())
            .unwrap_or(0)
    }

    // ── Persistence ─────────────────────────────────────────────────────

    /// Save the complete state to a writer.
    pub fn save<W: std::io::Write>(&self, writer: W) -> Result<(), SaveError> {
        persistence::save_world(writer, &self.world, self.next_item_id)
    }

    /// Load state from a reader, replacing the current world.
    pub fn load<R: std::io::Read>(&mut self, reader: R) -> Result<(), SaveError> {
        let loaded = persistence::load_world(reader)?;
        self.world = loaded.world;
        self.next_item_id = loaded.next_item_id;
        self.events.clear();
        Ok(())
    }
}

impl Default for StorageSim {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stowage_logic::{CellRect, ItemSize};

    fn locker_config() -> StorageConfig {
        StorageConfig::with_region(vec![CellRect::new(0, 0, 3, 3)])
    }

    #[test]
    fn test_sim_counts() {
        let mut sim = StorageSim::new();
        assert_eq!(sim.storage_count(), 0);

        let locker = sim.spawn_storage(locker_config(), Position::new(0.0, 0.0));
        let item = sim.spawn_item(ItemSpec::of_size(1, 1, ItemSize::Small), Position::new(1.0, 0.0));

        assert_eq!(sim.storage_count(), 1);
        assert_eq!(sim.item_count(), 1);
        assert_eq!(sim.stored_count(locker), 0);

        sim.auto_insert(locker, item).expect("room for one");
        assert_eq!(sim.stored_count(locker), 1);
    }

    #[test]
    fn test_item_ids_are_unique() {
        let mut sim = StorageSim::new();
        let a = sim.spawn_item(ItemSpec::of_size(1, 1, ItemSize::Small), Position::new(0.0, 0.0));
        let b = sim.spawn_item(ItemSpec::of_size(1, 1, ItemSize::Small), Position::new(0.0, 0.0));
        let id_a = sim.world.get::<&Stowable>(a).unwrap().id;
        let id_b = sim.world.get::<&Stowable>(b).unwrap().id;
        assert_ne!(id_a, id_b);
    }

    #[test]
    fn test_events_drain_once() {
        let mut sim = StorageSim::new();
        let locker = sim.spawn_storage(locker_config(), Position::new(0.0, 0.0));
        let item = sim.spawn_item(ItemSpec::of_size(1, 1, ItemSize::Small), Position::new(0.0, 0.0));
        sim.auto_insert(locker, item).unwrap();

        assert_eq!(sim.drain_events().len(), 1);
        assert!(sim.drain_events().is_empty());
    }
}
