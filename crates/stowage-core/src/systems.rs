//! Storage systems - insert, remove, and area-insert operations.
//!
//! Systems resolve components, delegate every placement decision to the
//! `stowage-logic` grid, keep the `StoredIn` link consistent, and record
//! an event per outcome for the presentation layer.

use hecs::{Entity, World};
use log::debug;

use stowage_logic::{Cell, ItemId, ItemSpec, Placement, RejectReason, Rotation};

use crate::components::{Position, Storage, StoredIn, Stowable};

/// Outcome record consumed by the presentation layer. Sounds, animation,
/// and UI feedback are keyed off these; the systems only classify.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StorageEvent {
    Inserted {
        storage: Entity,
        item: ItemId,
        placement: Placement,
    },
    Removed {
        storage: Entity,
        item: ItemId,
        placement: Placement,
    },
    Rejected {
        storage: Entity,
        item: ItemId,
        reason: RejectReason,
    },
    Opened {
        storage: Entity,
    },
    Closed {
        storage: Entity,
    },
}

/// Why a storage operation could not run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageOpError {
    /// The target entity has no Storage component.
    NotAStorage,
    /// The item entity has no Stowable component.
    NotStowable,
    /// The grid rejected the request.
    Rejected(RejectReason),
}

impl std::fmt::Display for StorageOpError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageOpError::NotAStorage => write!(f, "entity is not a storage"),
            StorageOpError::NotStowable => write!(f, "entity is not stowable"),
            StorageOpError::Rejected(reason) => write!(f, "rejected: {}", reason),
        }
    }
}

impl std::error::Error for StorageOpError {}

impl From<RejectReason> for StorageOpError {
    fn from(reason: RejectReason) -> Self {
        StorageOpError::Rejected(reason)
    }
}

// ── Operations ──────────────────────────────────────────────────────────

/// Place an item entity into a storage entity at a requested cell and
/// rotation. One event is recorded either way.
pub fn insert_into_storage(
    world: &mut World,
    events: &mut Vec<StorageEvent>,
    storage_entity: Entity,
    item_entity: Entity,
    at: Cell,
    rotation: Rotation,
) -> Result<Placement, StorageOpError> {
    let (item_id, spec) = stowable_of(world, item_entity)?;
    let outcome = {
        let mut storage = world
            .get::<&mut Storage>(storage_entity)
            .map_err(|_| StorageOpError::NotAStorage)?;
        storage.grid.try_insert(item_id, &spec, at, rotation)
    };
    finish_insert(world, events, storage_entity, item_entity, item_id, outcome)
}

/// Place an item entity at the first free spot in a storage entity.
pub fn auto_insert_into_storage(
    world: &mut World,
    events: &mut Vec<StorageEvent>,
    storage_entity: Entity,
    item_entity: Entity,
) -> Result<Placement, StorageOpError> {
    let (item_id, spec) = stowable_of(world, item_entity)?;
    let outcome = {
        let mut storage = world
            .get::<&mut Storage>(storage_entity)
            .map_err(|_| StorageOpError::NotAStorage)?;
        storage.grid.try_auto_place(item_id, &spec)
    };
    finish_insert(world, events, storage_entity, item_entity, item_id, outcome)
}

/// Take an item back out of a storage. Total: missing components, or an
/// item not stored there, return None with no side effects.
pub fn remove_from_storage(
    world: &mut World,
    events: &mut Vec<StorageEvent>,
    storage_entity: Entity,
    item_entity: Entity,
) -> Option<Placement> {
    let item_id = world.get::<&Stowable>(item_entity).ok()?.id;
    let placement = {
        let mut storage = world.get::<&mut Storage>(storage_entity).ok()?;
        storage.grid.remove(item_id)?
    };

    let _ = world.remove_one::<StoredIn>(item_entity);
    debug!("{} removed from {:?}", item_id, storage_entity);
    events.push(StorageEvent::Removed {
        storage: storage_entity,
        item: item_id,
        placement,
    });
    Some(placement)
}

/// Sweep loose stowables within the storage's area-insert radius and
/// auto-place each one. Items already stored anywhere are skipped, as is
/// the storage itself. Returns how many were inserted; every attempt
/// records its own event. Candidates are visited in item-id order so the
/// result does not depend on entity iteration order.
pub fn area_insert(
    world: &mut World,
    events: &mut Vec<StorageEvent>,
    storage_entity: Entity,
) -> usize {
    let (center, radius) = {
        let Ok(storage) = world.get::<&Storage>(storage_entity) else {
            return 0;
        };
        let Some(radius) = storage.area_insert_radius else {
            return 0;
        };
        drop(storage);
        let Ok(pos) = world.get::<&Position>(storage_entity) else {
            return 0;
        };
        (*pos, radius)
    };

    let mut candidates: Vec<(ItemId, Entity)> = Vec::new();
    for (entity, (stowable, pos)) in world
        .query::<(&Stowable, &Position)>()
        .without::<&StoredIn>()
        .iter()
    {
        if entity == storage_entity {
            continue;
        }
        if pos.distance_squared(&center) <= radius * radius {
            candidates.push((stowable.id, entity));
        }
    }
    candidates.sort_by_key(|(id, _)| *id);

    let mut inserted = 0;
    for (_, entity) in candidates {
        if auto_insert_into_storage(world, events, storage_entity, entity).is_ok() {
            inserted += 1;
        }
    }
    inserted
}

/// Flip the replicated UI-open flag, recording an event when it changes.
/// Returns false if the entity is not a storage.
pub fn set_ui_open(
    world: &mut World,
    events: &mut Vec<StorageEvent>,
    storage_entity: Entity,
    open: bool,
) -> bool {
    let Ok(mut storage) = world.get::<&mut Storage>(storage_entity) else {
        return false;
    };
    if storage.is_open != open {
        storage.is_open = open;
        events.push(if open {
            StorageEvent::Opened {
                storage: storage_entity,
            }
        } else {
            StorageEvent::Closed {
                storage: storage_entity,
            }
        });
    }
    true
}

// ── Internals ───────────────────────────────────────────────────────────

fn stowable_of(world: &World, entity: Entity) -> Result<(ItemId, ItemSpec), StorageOpError> {
    let stowable = world
        .get::<&Stowable>(entity)
        .map_err(|_| StorageOpError::NotStowable)?;
    Ok((stowable.id, stowable.spec.clone()))
}

fn finish_insert(
    world: &mut World,
    events: &mut Vec<StorageEvent>,
    storage_entity: Entity,
    item_entity: Entity,
    item_id: ItemId,
    outcome: Result<Placement, RejectReason>,
) -> Result<Placement, StorageOpError> {
    match outcome {
        Ok(placement) => {
            let _ = world.insert_one(
                item_entity,
                StoredIn {
                    storage: storage_entity,
                },
            );
            debug!(
                "{} stored in {:?} at ({}, {})",
                item_id, storage_entity, placement.rect.x, placement.rect.y
            );
            events.push(StorageEvent::Inserted {
                storage: storage_entity,
                item: item_id,
                placement,
            });
            Ok(placement)
        }
        Err(reason) => {
            debug!("{} rejected from {:?}: {}", item_id, storage_entity, reason);
            events.push(StorageEvent::Rejected {
                storage: storage_entity,
                item: item_id,
                reason,
            });
            Err(StorageOpError::Rejected(reason))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stowage_logic::{CapacityPolicy, CellRect, ItemSize, StorageConfig};

    fn spawn_locker(world: &mut World) -> Entity {
        world.spawn((
            Storage::new(StorageConfig::with_region(vec![CellRect::new(0, 0, 2, 2)])),
            Position::new(0.0, 0.0),
        ))
    }

    fn spawn_item(world: &mut World, id: u64, x: f32, y: f32) -> Entity {
        world.spawn((
            Stowable::new(ItemId(id), ItemSpec::of_size(1, 1, ItemSize::Small)),
            Position::new(x, y),
        ))
    }

    #[test]
    fn test_insert_links_and_reports() {
        let mut world = World::new();
        let mut events = Vec::new();
        let locker = spawn_locker(&mut world);
        let item = spawn_item(&mut world, 1, 0.0, 0.0);

        let placement =
            insert_into_storage(&mut world, &mut events, locker, item, Cell::ZERO, Rotation::Deg0)
                .expect("insert should succeed");

        assert_eq!(world.get::<&StoredIn>(item).unwrap().storage, locker);
        assert_eq!(
            events,
            vec![StorageEvent::Inserted {
                storage: locker,
                item: ItemId(1),
                placement,
            }]
        );
    }

    #[test]
    fn test_rejection_reports_without_linking() {
        let mut world = World::new();
        let mut events = Vec::new();
        let locker = spawn_locker(&mut world);
        let a = spawn_item(&mut world, 1, 0.0, 0.0);
        let b = spawn_item(&mut world, 2, 0.0, 0.0);

        insert_into_storage(&mut world, &mut events, locker, a, Cell::ZERO, Rotation::Deg0)
            .unwrap();
        let err =
            insert_into_storage(&mut world, &mut events, locker, b, Cell::ZERO, Rotation::Deg0)
                .unwrap_err();

        assert_eq!(err, StorageOpError::Rejected(RejectReason::Overlaps));
        assert!(world.get::<&StoredIn>(b).is_err(), "rejected item must stay loose");
        assert!(matches!(events[1], StorageEvent::Rejected { .. }));
    }

    #[test]
    fn test_non_storage_target() {
        let mut world = World::new();
        let mut events = Vec::new();
        let not_a_locker = world.spawn((Position::new(0.0, 0.0),));
        let item = spawn_item(&mut world, 1, 0.0, 0.0);

        let err = auto_insert_into_storage(&mut world, &mut events, not_a_locker, item)
            .unwrap_err();
        assert_eq!(err, StorageOpError::NotAStorage);
        assert!(events.is_empty());
    }

    #[test]
    fn test_remove_round_trip() {
        let mut world = World::new();
        let mut events = Vec::new();
        let locker = spawn_locker(&mut world);
        let item = spawn_item(&mut world, 1, 0.0, 0.0);

        auto_insert_into_storage(&mut world, &mut events, locker, item).unwrap();
        let placement = remove_from_storage(&mut world, &mut events, locker, item)
            .expect("item was stored");

        assert!(world.get::<&StoredIn>(item).is_err());
        assert!(remove_from_storage(&mut world, &mut events, locker, item).is_none());
        assert!(matches!(
            events.last(),
            Some(StorageEvent::Removed { placement: p, .. }) if *p == placement
        ));
    }

    #[test]
    fn test_area_insert_respects_radius_and_links() {
        let mut world = World::new();
        let mut events = Vec::new();
        let locker = world.spawn((
            Storage::new(StorageConfig::with_region(vec![CellRect::new(0, 0, 2, 2)]))
                .with_area_insert(2.0),
            Position::new(0.0, 0.0),
        ));
        let near_a = spawn_item(&mut world, 2, 1.0, 0.0);
        let near_b = spawn_item(&mut world, 1, 0.0, 1.0);
        let far = spawn_item(&mut world, 3, 10.0, 0.0);

        let inserted = area_insert(&mut world, &mut events, locker);
        assert_eq!(inserted, 2);
        assert!(world.get::<&StoredIn>(near_a).is_ok());
        assert!(world.get::<&StoredIn>(near_b).is_ok());
        assert!(world.get::<&StoredIn>(far).is_err());

        // Id order, not spawn order: item 1 was swept first.
        assert!(matches!(
            events[0],
            StorageEvent::Inserted { item: ItemId(1), .. }
        ));

        // A second sweep finds nothing loose in range.
        assert_eq!(area_insert(&mut world, &mut events, locker), 0);
    }

    #[test]
    fn test_area_insert_without_radius_is_inert() {
        let mut world = World::new();
        let mut events = Vec::new();
        let locker = spawn_locker(&mut world);
        spawn_item(&mut world, 1, 0.0, 0.0);
        assert_eq!(area_insert(&mut world, &mut events, locker), 0);
        assert!(events.is_empty());
    }

    #[test]
    fn test_capacity_rejections_flow_through() {
        let mut world = World::new();
        let mut events = Vec::new();
        let locker = world.spawn((
            Storage::new(
                StorageConfig::with_region(vec![CellRect::new(0, 0, 4, 4)])
                    .with_policy(CapacityPolicy::SlotLimited(1)),
            ),
            Position::new(0.0, 0.0),
        ));
        let a = spawn_item(&mut world, 1, 0.0, 0.0);
        let b = spawn_item(&mut world, 2, 0.0, 0.0);

        auto_insert_into_storage(&mut world, &mut events, locker, a).unwrap();
        let err = auto_insert_into_storage(&mut world, &mut events, locker, b).unwrap_err();
        assert_eq!(err, StorageOpError::Rejected(RejectReason::TooManyItems));
    }

    #[test]
    fn test_ui_open_events() {
        let mut world = World::new();
        let mut events = Vec::new();
        let locker = spawn_locker(&mut world);

        assert!(set_ui_open(&mut world, &mut events, locker, true));
        assert!(set_ui_open(&mut world, &mut events, locker, true), "no duplicate event");
        assert!(set_ui_open(&mut world, &mut events, locker, false));
        assert_eq!(
            events,
            vec![
                StorageEvent::Opened { storage: locker },
                StorageEvent::Closed { storage: locker },
            ]
        );
    }
}
