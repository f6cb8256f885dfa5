//! Disk-backed image store with fetch-on-miss.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use sha2::{Digest, Sha256};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, trace, warn};

use crate::domain::entities::ImageKey;
use crate::domain::ports::{CacheError, CacheResult, DiskStorePort};

/// Default byte budget for a cache directory (50 MB).
pub const DEFAULT_DISK_BUDGET: u64 = 50 * 1024 * 1024;

/// Default timeout for a single fetch.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// On-disk key-to-file store that fetches over HTTP on demand.
///
/// Each key is stored as one file named by a hash of the key. The directory
/// is trimmed oldest-accessed-first whenever a store pushes it over its byte
/// budget.
pub struct DiskFileCache {
    cache_dir: PathBuf,
    max_size: u64,
    current_size: AtomicU64,
    http: reqwest::Client,
}

fn file_name(key: &ImageKey) -> String {
    let digest = Sha256::digest(key.as_str().as_bytes());
    format!("{}.img", hex::encode(&digest[..16]))
}

impl DiskFileCache {
    /// Creates a store rooted at `cache_dir` with the given byte budget.
    ///
    /// # Errors
    /// Returns an error if the directory cannot be created or the HTTP
    /// client cannot be built.
    pub async fn new(cache_dir: PathBuf, max_size: u64) -> CacheResult<Self> {
        fs::create_dir_all(&cache_dir)
            .await
            .map_err(|e| CacheError::IoError(format!("failed to create cache dir: {e}")))?;

        let http = reqwest::Client::builder()
            .timeout(DEFAULT_FETCH_TIMEOUT)
            .build()
            .map_err(|e| CacheError::NetworkError(format!("failed to create HTTP client: {e}")))?;

        let mut total_size = 0u64;
        let mut entries = fs::read_dir(&cache_dir)
            .await
            .map_err(|e| CacheError::IoError(format!("failed to read cache dir: {e}")))?;
        while let Ok(Some(entry)) = entries.next_entry().await {
            if entry.path().extension().is_some_and(|ext| ext == "img")
                && let Ok(meta) = entry.metadata().await
            {
                total_size += meta.len();
            }
        }

        let cache = Self {
            cache_dir,
            max_size,
            current_size: AtomicU64::new(total_size),
            http,
        };
        cache.trim_if_needed().await;
        Ok(cache)
    }

    /// Creates the icon store in its default location.
    ///
    /// # Errors
    /// Returns an error if the directory cannot be created.
    pub async fn icon_store() -> CacheResult<Self> {
        Self::new(default_cache_dir("icons"), DEFAULT_DISK_BUDGET).await
    }

    /// Creates the thumbnail store in its default location.
    ///
    /// # Errors
    /// Returns an error if the directory cannot be created.
    pub async fn thumbnail_store() -> CacheResult<Self> {
        Self::new(default_cache_dir("thumbs"), DEFAULT_DISK_BUDGET).await
    }

    fn file_path(&self, key: &ImageKey) -> PathBuf {
        self.cache_dir.join(file_name(key))
    }

    /// Stores raw bytes for `key`, replacing any existing file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be written; a failed write is
    /// removed so the key still reads as a miss.
    pub async fn put_bytes(&self, key: &ImageKey, bytes: &[u8]) -> CacheResult<()> {
        let path = self.file_path(key);
        let old_size = fs::metadata(&path).await.map(|m| m.len()).ok();

        let write = async {
            let mut file = fs::File::create(&path)
                .await
                .map_err(|e| CacheError::IoError(format!("failed to create cache file: {e}")))?;
            file.write_all(bytes)
                .await
                .map_err(|e| CacheError::IoError(format!("failed to write cache file: {e}")))?;
            file.flush()
                .await
                .map_err(|e| CacheError::IoError(format!("failed to flush cache file: {e}")))
        };
        if let Err(error) = write.await {
            let _ = fs::remove_file(&path).await;
            if let Some(old) = old_size {
                self.current_size.fetch_sub(old, Ordering::Relaxed);
            }
            return Err(error);
        }

        let new_size = bytes.len() as u64;
        match old_size {
            Some(old) if new_size > old => {
                self.current_size.fetch_add(new_size - old, Ordering::Relaxed);
            }
            Some(old) => {
                self.current_size.fetch_sub(old - new_size, Ordering::Relaxed);
            }
            None => {
                self.current_size.fetch_add(new_size, Ordering::Relaxed);
            }
        }

        debug!(key = %key, path = %path.display(), size = bytes.len(), "stored image on disk");
        self.trim_if_needed().await;
        Ok(())
    }

    /// Bytes currently tracked in the cache directory.
    #[must_use]
    pub fn current_size(&self) -> u64 {
        self.current_size.load(Ordering::Relaxed)
    }

    /// Removes oldest-accessed files until the directory fits the budget
    /// again, with 10% headroom.
    async fn trim_if_needed(&self) {
        let current = self.current_size();
        if current <= self.max_size {
            return;
        }
        debug!(current, max = self.max_size, "disk cache over budget, trimming");

        let Ok(mut entries) = fs::read_dir(&self.cache_dir).await else {
            return;
        };
        let mut files: Vec<(PathBuf, std::time::SystemTime, u64)> = Vec::new();
        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            if path.extension().is_none_or(|ext| ext != "img") {
                continue;
            }
            if let Ok(meta) = entry.metadata().await {
                let accessed = meta.accessed().unwrap_or(std::time::SystemTime::UNIX_EPOCH);
                files.push((path, accessed, meta.len()));
            }
        }
        files.sort_by_key(|(_, accessed, _)| *accessed);

        let target = current - self.max_size + self.max_size / 10;
        let mut freed = 0u64;
        for (path, _, size) in files {
            if freed >= target {
                break;
            }
            if let Err(error) = fs::remove_file(&path).await {
                warn!(path = %path.display(), %error, "failed to remove old cache file");
            } else {
                trace!(path = %path.display(), "trimmed old cache file");
                freed += size;
            }
        }
        self.current_size.fetch_sub(freed, Ordering::Relaxed);
        debug!(freed, "disk cache trim complete");
    }
}

#[async_trait]
impl DiskStorePort for DiskFileCache {
    async fn cached_file(&self, key: &ImageKey) -> Option<PathBuf> {
        let path = self.file_path(key);
        if fs::try_exists(&path).await.unwrap_or(false) {
            trace!(key = %key, path = %path.display(), "disk cache hit");
            Some(path)
        } else {
            trace!(key = %key, "disk cache miss");
            None
        }
    }

    async fn fetch_and_store(&self, key: &ImageKey) -> CacheResult<()> {
        let response = self
            .http
            .get(key.as_str())
            .send()
            .await
            .map_err(|e| CacheError::NetworkError(format!("request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(CacheError::NetworkError(format!(
                "HTTP {}",
                response.status()
            )));
        }

        let body: Bytes = response
            .bytes()
            .await
            .map_err(|e| CacheError::NetworkError(format!("failed to read body: {e}")))?;

        self.put_bytes(key, &body).await
    }
}

/// Returns the default cache directory for a store profile.
fn default_cache_dir(profile: &str) -> PathBuf {
    directories::ProjectDirs::from("io", "pixload", "pixload").map_or_else(
        || std::env::temp_dir().join("pixload").join(profile),
        |dirs| dirs.cache_dir().join(profile),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn create_test_cache(max_size: u64) -> (DiskFileCache, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let cache = DiskFileCache::new(temp_dir.path().to_path_buf(), max_size)
            .await
            .unwrap();
        (cache, temp_dir)
    }

    #[test]
    fn file_names_are_stable_and_distinct() {
        let a = file_name(&ImageKey::new("https://host/a.png"));
        let b = file_name(&ImageKey::new("https://host/b.png"));

        assert_eq!(a, file_name(&ImageKey::new("https://host/a.png")));
        assert_ne!(a, b);
        assert!(a.ends_with(".img"));
    }

    #[tokio::test]
    async fn put_bytes_then_cached_file() {
        let (cache, _temp) = create_test_cache(1024 * 1024).await;
        let key = ImageKey::new("https://host/a.png");

        assert!(cache.cached_file(&key).await.is_none());

        cache.put_bytes(&key, b"image data").await.unwrap();
        let path = cache.cached_file(&key).await.expect("file cached");

        assert_eq!(fs::read(&path).await.unwrap(), b"image data");
        assert_eq!(cache.current_size(), 10);
    }

    #[tokio::test]
    async fn overwrite_adjusts_accounting() {
        let (cache, _temp) = create_test_cache(1024 * 1024).await;
        let key = ImageKey::new("k");

        cache.put_bytes(&key, b"123456").await.unwrap();
        cache.put_bytes(&key, b"123").await.unwrap();

        assert_eq!(cache.current_size(), 3);
    }

    #[tokio::test]
    async fn trim_removes_oldest_first() {
        let (cache, _temp) = create_test_cache(10).await;

        cache.put_bytes(&ImageKey::new("old"), b"123456").await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        cache.put_bytes(&ImageKey::new("new"), b"123456").await.unwrap();

        assert!(cache.cached_file(&ImageKey::new("old")).await.is_none());
        assert!(cache.cached_file(&ImageKey::new("new")).await.is_some());
        assert_eq!(cache.current_size(), 6);
    }

    #[tokio::test]
    async fn new_rescans_existing_files() {
        let temp_dir = TempDir::new().unwrap();
        {
            let cache = DiskFileCache::new(temp_dir.path().to_path_buf(), 1024)
                .await
                .unwrap();
            cache.put_bytes(&ImageKey::new("k"), b"12345").await.unwrap();
        }

        let cache = DiskFileCache::new(temp_dir.path().to_path_buf(), 1024)
            .await
            .unwrap();
        assert_eq!(cache.current_size(), 5);
    }

    #[tokio::test]
    async fn failed_fetch_leaves_no_file() {
        let (cache, _temp) = create_test_cache(1024).await;
        let key = ImageKey::new("not a url");

        assert!(cache.fetch_and_store(&key).await.is_err());
        assert!(cache.cached_file(&key).await.is_none());
        assert_eq!(cache.current_size(), 0);
    }
}
