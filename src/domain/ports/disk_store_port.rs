//! Port definition for the on-disk image store.

use std::path::PathBuf;

use async_trait::async_trait;

use crate::domain::entities::ImageKey;

/// Result type for cache operations.
pub type CacheResult<T> = std::result::Result<T, CacheError>;

/// Errors that can occur during cache operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CacheError {
    /// Loader or cache configuration rejected at construction.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// Failed to decode image data.
    #[error("decode error: {0}")]
    DecodeError(String),
    /// I/O error during cache operation.
    #[error("IO error: {0}")]
    IoError(String),
    /// Network error during fetch.
    #[error("network error: {0}")]
    NetworkError(String),
}

/// Port for the durable key-to-file store backing the memory cache.
///
/// Implementations must be thread-safe. File naming, directory layout, and
/// on-disk eviction are the implementation's own concern.
#[async_trait]
pub trait DiskStorePort: Send + Sync {
    /// Returns the path of the cached file for `key`, if one exists.
    async fn cached_file(&self, key: &ImageKey) -> Option<PathBuf>;

    /// Fetches `key` from its origin and stores it.
    ///
    /// # Errors
    /// Returns an error when the fetch or store fails; a failure leaves no
    /// file behind, so a subsequent [`cached_file`](Self::cached_file) call
    /// still misses.
    async fn fetch_and_store(&self, key: &ImageKey) -> CacheResult<()>;
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Arc;

    use parking_lot::Mutex;
    use tokio::sync::Semaphore;

    /// Scripted disk store for testing the loading pipeline.
    ///
    /// Serves pre-arranged files per key, can stage a file that only appears
    /// after `fetch_and_store`, and can gate lookups for a key behind a
    /// semaphore so tests control completion order.
    #[derive(Default)]
    pub struct ScriptedDiskStore {
        files: Mutex<HashMap<ImageKey, PathBuf>>,
        staged: Mutex<HashMap<ImageKey, PathBuf>>,
        gates: Mutex<HashMap<ImageKey, Arc<Semaphore>>>,
        lookups: Mutex<Vec<ImageKey>>,
        fetches: Mutex<Vec<ImageKey>>,
    }

    impl ScriptedDiskStore {
        /// Creates an empty scripted store.
        pub fn new() -> Self {
            Self::default()
        }

        /// Serves `path` for `key` from the start.
        pub fn with_file(self, key: impl Into<ImageKey>, path: PathBuf) -> Self {
            self.files.lock().insert(key.into(), path);
            self
        }

        /// Makes `path` appear for `key` only after a fetch.
        pub fn stage_on_fetch(&self, key: impl Into<ImageKey>, path: PathBuf) {
            self.staged.lock().insert(key.into(), path);
        }

        /// Gates `cached_file` for `key`; release with `add_permits(1)`.
        pub fn gate(&self, key: impl Into<ImageKey>) -> Arc<Semaphore> {
            let gate = Arc::new(Semaphore::new(0));
            self.gates.lock().insert(key.into(), gate.clone());
            gate
        }

        /// Number of `cached_file` calls seen for `key`.
        pub fn lookup_count(&self, key: &ImageKey) -> usize {
            self.lookups.lock().iter().filter(|k| *k == key).count()
        }

        /// Number of `fetch_and_store` calls seen for `key`.
        pub fn fetch_count(&self, key: &ImageKey) -> usize {
            self.fetches.lock().iter().filter(|k| *k == key).count()
        }

        /// Total `cached_file` calls across all keys.
        pub fn total_lookups(&self) -> usize {
            self.lookups.lock().len()
        }
    }

    #[async_trait]
    impl DiskStorePort for ScriptedDiskStore {
        async fn cached_file(&self, key: &ImageKey) -> Option<PathBuf> {
            let gate = self.gates.lock().get(key).cloned();
            if let Some(gate) = gate {
                gate.acquire().await.expect("gate closed").forget();
            }
            self.lookups.lock().push(key.clone());
            self.files.lock().get(key).cloned()
        }

        async fn fetch_and_store(&self, key: &ImageKey) -> CacheResult<()> {
            self.fetches.lock().push(key.clone());
            if let Some(path) = self.staged.lock().remove(key) {
                self.files.lock().insert(key.clone(), path);
                Ok(())
            } else {
                Err(CacheError::NetworkError("scripted fetch miss".into()))
            }
        }
    }
}
