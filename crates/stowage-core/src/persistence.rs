//! Save/load functionality for storage worlds.
//!
//! Uses bincode with a versioned envelope. Components are serialized per
//! entity and respawned on load. Entity ids are not stable across
//! save/load, which is why grids key on stable `ItemId`s; the `StoredIn`
//! link is derivable from grid contents and is rebuilt after respawn
//! instead of being saved.

use std::collections::HashMap;
use std::io::{Read, Write};

use hecs::World;
use serde::{Deserialize, Serialize};

use stowage_logic::ItemId;

use crate::components::{Position, Storage, StoredIn, Stowable};

/// Version number for the save format (increment when it changes)
const SAVE_VERSION: u32 = 1;

/// Serializable snapshot of a storage world.
#[derive(Serialize, Deserialize)]
pub struct SaveData {
    /// Save format version
    pub version: u32,
    /// Next stable item id to hand out
    pub next_item_id: u64,
    /// All entities with their components
    pub entities: Vec<SerializableEntity>,
}

/// All possible components for an entity, serialized as optionals.
#[derive(Serialize, Deserialize, Default)]
pub struct SerializableEntity {
    pub stowable: Option<Stowable>,
    pub storage: Option<Storage>,
    pub position: Option<Position>,
}

/// Extract all entities from a world into serializable form.
fn serialize_entities(world: &World) -> Vec<SerializableEntity> {
    let mut entities = Vec::new();

    for entity_ref in world.iter() {
        let mut se = SerializableEntity::default();

        if let Some(c) = entity_ref.get::<&Stowable>() {
            se.stowable = Some((*c).clone());
        }
        if let Some(c) = entity_ref.get::<&Storage>() {
            se.storage = Some((*c).clone());
        }
        if let Some(c) = entity_ref.get::<&Position>() {
            se.position = Some(*c);
        }

        entities.push(se);
    }

    entities
}

/// Spawn an entity with all its components.
fn spawn_entity(world: &mut World, se: SerializableEntity) {
    let entity = world.spawn(());

    if let Some(c) = se.stowable {
        let _ = world.insert_one(entity, c);
    }
    if let Some(c) = se.storage {
        let _ = world.insert_one(entity, c);
    }
    if let Some(c) = se.position {
        let _ = world.insert_one(entity, c);
    }
}

/// Relink stored items to their storage entities from grid contents.
fn rebuild_stored_in(world: &mut World) {
    let mut items_by_id: HashMap<ItemId, hecs::Entity> = HashMap::new();
    for (entity, stowable) in world.query::<&Stowable>().iter() {
        items_by_id.insert(stowable.id, entity);
    }

    let mut links = Vec::new();
    for (storage_entity, storage) in world.query::<&Storage>().iter() {
        for (id, _) in storage.grid.placements() {
            if let Some(&item_entity) = items_by_id.get(&id) {
                links.push((item_entity, storage_entity));
            }
        }
    }

    for (item, storage) in links {
        let _ = world.insert_one(item, StoredIn { storage });
    }
}

/// Save a complete storage world to a writer.
pub fn save_world<W: Write>(writer: W, world: &World, next_item_id: u64) -> Result<(), SaveError> {
    let save_data = SaveData {
        version: SAVE_VERSION,
        next_item_id,
        entities: serialize_entities(world),
    };

    bincode::serialize_into(writer, &save_data)?;
    Ok(())
}

/// Load a storage world from a reader.
pub fn load_world<R: Read>(reader: R) -> Result<LoadedWorld, SaveError> {
    let save_data: SaveData = bincode::deserialize_from(reader)?;

    if save_data.version != SAVE_VERSION {
        return Err(SaveError::VersionMismatch {
            expected: SAVE_VERSION,
            found: save_data.version,
        });
    }

    let mut world = World::new();
    for se in save_data.entities {
        spawn_entity(&mut world, se);
    }
    rebuild_stored_in(&mut world);

    Ok(LoadedWorld {
        world,
        next_item_id: save_data.next_item_id,
    })
}

/// Result of loading a storage world.
pub struct LoadedWorld {
    pub world: World,
    pub next_item_id: u64,
}

/// Errors that can occur during save/load.
#[derive(Debug)]
pub enum SaveError {
    Io(std::io::Error),
    Bincode(Box<bincode::ErrorKind>),
    VersionMismatch { expected: u32, found: u32 },
}

impl From<std::io::Error> for SaveError {
    fn from(e: std::io::Error) -> Self {
        SaveError::Io(e)
    }
}

impl From<Box<bincode::ErrorKind>> for SaveError {
    fn from(e: Box<bincode::ErrorKind>) -> Self {
        SaveError::Bincode(e)
    }
}

impl std::fmt::Display for SaveError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SaveError::Io(e) => write!(f, "IO error: {}", e),
            SaveError::Bincode(e) => write!(f, "Serialization error: {}", e),
            SaveError::VersionMismatch { expected, found } => {
                write!(
                    f,
                    "Save version mismatch: expected {}, found {}",
                    expected, found
                )
            }
        }
    }
}

impl std::error::Error for SaveError {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::StorageSim;
    use stowage_logic::{CellRect, ItemSize, ItemSpec, StorageConfig};

    fn populated_sim() -> (StorageSim, hecs::Entity) {
        let mut sim = StorageSim::new();
        let locker = sim.spawn_storage(
            StorageConfig::with_region(vec![CellRect::new(0, 0, 3, 2)]),
            Position::new(0.0, 0.0),
        );
        for i in 0..3 {
            let item = sim.spawn_item(
                ItemSpec::of_size(1, 1, ItemSize::Small),
                Position::new(i as f32, 0.0),
            );
            sim.auto_insert(locker, item).expect("room for three");
        }
        (sim, locker)
    }

    #[test]
    fn test_save_load_roundtrip() {
        let (sim, locker) = populated_sim();
        let original_placements: Vec<_> = sim
            .world
            .get::<&Storage>(locker)
            .unwrap()
            .grid
            .placements()
            .collect();

        let mut buffer = Vec::new();
        sim.save(&mut buffer).expect("save failed");

        let mut loaded = StorageSim::new();
        loaded.load(&buffer[..]).expect("load failed");

        assert_eq!(loaded.storage_count(), 1);
        assert_eq!(loaded.item_count(), 3);

        let (loaded_locker, _) = loaded
            .world
            .query::<&Storage>()
            .iter()
            .next()
            .map(|(e, s)| (e, s.grid.item_count()))
            .expect("storage survived");
        let loaded_placements: Vec<_> = loaded
            .world
            .get::<&Storage>(loaded_locker)
            .unwrap()
            .grid
            .placements()
            .collect();
        assert_eq!(loaded_placements, original_placements);
    }

    #[test]
    fn test_stored_in_rebuilt_after_load() {
        let (sim, _) = populated_sim();
        let mut buffer = Vec::new();
        sim.save(&mut buffer).unwrap();

        let mut loaded = StorageSim::new();
        loaded.load(&buffer[..]).unwrap();

        let mut linked = 0;
        for (_, (_, stored_in)) in loaded.world.query::<(&Stowable, &StoredIn)>().iter() {
            assert!(loaded.world.get::<&Storage>(stored_in.storage).is_ok());
            linked += 1;
        }
        assert_eq!(linked, 3, "every stored item relinks to its storage");
    }

    #[test]
    fn test_item_ids_continue_after_load() {
        let (sim, _) = populated_sim();
        let mut buffer = Vec::new();
        sim.save(&mut buffer).unwrap();

        let mut loaded = StorageSim::new();
        loaded.load(&buffer[..]).unwrap();

        let fresh = loaded.spawn_item(
            ItemSpec::of_size(1, 1, ItemSize::Tiny),
            Position::new(0.0, 0.0),
        );
        let fresh_id = loaded.world.get::<&Stowable>(fresh).unwrap().id;
        for (entity, stowable) in loaded.world.query::<&Stowable>().iter() {
            if entity != fresh {
                assert_ne!(stowable.id, fresh_id, "fresh ids must not collide");
            }
        }
    }

    #[test]
    fn test_version_mismatch_is_rejected() {
        let stale = SaveData {
            version: SAVE_VERSION + 1,
            next_item_id: 1,
            entities: Vec::new(),
        };
        let mut buffer = Vec::new();
        bincode::serialize_into(&mut buffer, &stale).unwrap();

        match load_world(&buffer[..]) {
            Err(SaveError::VersionMismatch { found, .. }) => {
                assert_eq!(found, SAVE_VERSION + 1);
            }
            other => panic!("expected version mismatch, got {:?}", other.map(|_| ())),
        }
    }
}
