mod disk_store_port;

pub use disk_store_port::{CacheError, CacheResult, DiskStorePort};
