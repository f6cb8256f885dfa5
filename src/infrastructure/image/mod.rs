//! Image loading infrastructure.
//!
//! This module provides:
//! - Byte-budget memory caching with LRU eviction
//! - Disk caching with fetch-on-miss
//! - A request binding registry for stale-result detection
//! - A fixed worker pool and serial result delivery

pub mod disk_cache;
pub mod loader;
pub mod memory_cache;
pub mod registry;
pub mod remote_url;
pub mod transform;

pub use disk_cache::DiskFileCache;
pub use loader::{ImageLoader, LoaderConfig, SlotUpdated};
pub use memory_cache::{CacheStats, MemoryImageCache};
pub use registry::RequestRegistry;
pub use remote_url::resolve_key;
pub use transform::clip_and_round;
