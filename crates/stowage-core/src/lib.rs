//! Storage integration for the game world.
//!
//! Bridges the pure placement logic in `stowage-logic` onto a `hecs`
//! world, the way the rest of the game's content sits on its entity
//! host: components carry data, free-function systems perform the
//! operations, and [`engine::StorageSim`] wraps a world for hosts and
//! headless tests.
//!
//! The world here is an integration seam, not a replacement for the
//! host runtime: replication, rendering, and audio all live outside
//! this crate and consume the event log.

pub mod components;
pub mod engine;
pub mod persistence;
pub mod systems;

/// Commonly used types for convenient importing
pub mod prelude {
    pub use crate::components::*;
    pub use crate::engine::StorageSim;
    pub use crate::systems::{StorageEvent, StorageOpError};
}
