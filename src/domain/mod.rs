//! Domain layer with core entities and port definitions.

/// Entity definitions.
pub mod entities;
/// Port definitions.
pub mod ports;

pub use entities::{ImageKey, ImageSlot, SlotId, SlotView};
pub use ports::{CacheError, CacheResult, DiskStorePort};
