//! Infrastructure layer with cache and loading adapters.

/// Image loading pipeline (caches, registry, workers, delivery).
pub mod image;

pub use image::{
    CacheStats, DiskFileCache, ImageLoader, LoaderConfig, MemoryImageCache, RequestRegistry,
    SlotUpdated, clip_and_round, resolve_key,
};
