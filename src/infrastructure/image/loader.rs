//! Image loading orchestration.
//!
//! `request` checks the memory cache and otherwise hands a job to a small
//! fixed pool of background workers (disk lookup, one fetch retry, decode,
//! memory-cache store). Every outcome funnels through a single serial
//! dispatcher that re-validates the request registry before touching the
//! slot, so results for superseded requests are silently discarded.

use std::path::Path;
use std::sync::{Arc, Weak};

use tokio::sync::mpsc;
use tracing::{error, trace, warn};

use crate::domain::entities::{ImageKey, ImageSlot, SlotId, SlotShared, SlotView};
use crate::domain::ports::{CacheError, CacheResult, DiskStorePort};

use super::disk_cache::DiskFileCache;
use super::memory_cache::{CacheStats, MemoryImageCache};
use super::registry::RequestRegistry;
use super::remote_url::resolve_key;
use super::transform::clip_and_round;

/// Number of background workers a loader runs by default. Deliberately
/// small: it bounds concurrent decode and fetch work at the cost of queuing
/// under load.
pub const DEFAULT_WORKER_COUNT: usize = 4;

/// Display options carried by a request.
#[derive(Debug, Clone, Copy)]
struct DisplayOptions {
    round_radius: f32,
    crop_square: bool,
}

/// Notification that the dispatcher changed a slot's visible state.
#[derive(Debug, Clone)]
pub struct SlotUpdated {
    /// The slot that changed.
    pub slot_id: SlotId,
    /// The key whose result was applied.
    pub key: ImageKey,
}

/// Configuration for an [`ImageLoader`], fixed at construction.
#[derive(Debug, Clone)]
pub struct LoaderConfig {
    /// Byte budget for the decoded-image memory cache.
    pub memory_budget: u64,
    /// Decoded images shorter than this count as missing for display.
    pub min_image_height: u32,
    /// On a missing result, hide the slot instead of showing the
    /// placeholder.
    pub hide_missing: bool,
    /// Placeholder asset identifier, shown while loading and, unless
    /// `hide_missing` is set, on failure.
    pub placeholder: String,
    /// Number of background workers.
    pub worker_count: usize,
    /// Base URL that root-relative request keys resolve against.
    pub base_url: String,
}

impl LoaderConfig {
    /// Profile for small icons: a twentieth of `total_memory`, tiny minimum
    /// height, placeholder on failure.
    #[must_use]
    pub fn icon(total_memory: u64) -> Self {
        Self {
            memory_budget: total_memory / 20,
            min_image_height: 2,
            hide_missing: false,
            placeholder: "image.placeholder".to_string(),
            worker_count: DEFAULT_WORKER_COUNT,
            base_url: String::new(),
        }
    }

    /// Profile for larger thumbnails: a fifth of `total_memory`, 32 pixel
    /// minimum height, hidden on failure.
    #[must_use]
    pub fn thumbnail(total_memory: u64) -> Self {
        Self {
            memory_budget: total_memory / 5,
            min_image_height: 32,
            hide_missing: true,
            placeholder: "image.transparent".to_string(),
            worker_count: DEFAULT_WORKER_COUNT,
            base_url: String::new(),
        }
    }

    fn validate(&self) -> CacheResult<()> {
        if self.memory_budget == 0 {
            return Err(CacheError::InvalidConfig(
                "memory budget must be positive".to_string(),
            ));
        }
        if self.worker_count == 0 {
            return Err(CacheError::InvalidConfig(
                "worker count must be positive".to_string(),
            ));
        }
        if self.placeholder.is_empty() {
            return Err(CacheError::InvalidConfig(
                "placeholder identifier must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Unit of background work. Immutable once created; the slot is held weakly
/// so an in-flight job never keeps a dropped slot alive.
struct LoadJob {
    key: ImageKey,
    slot: Weak<SlotShared>,
    slot_id: SlotId,
    options: DisplayOptions,
}

struct Delivery {
    image: Option<Arc<image::DynamicImage>>,
    job: LoadJob,
}

/// Loads remote-identified images into display slots.
///
/// Construction spawns `worker_count` persistent workers and one serial
/// dispatcher; dropping the loader closes the job channel, after which
/// workers drain and exit. In-flight deliveries racing teardown no-op
/// silently.
pub struct ImageLoader {
    memory: Arc<MemoryImageCache>,
    registry: Arc<RequestRegistry>,
    config: LoaderConfig,
    job_tx: mpsc::UnboundedSender<LoadJob>,
    delivery_tx: mpsc::UnboundedSender<Delivery>,
}

impl std::fmt::Debug for ImageLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageLoader")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ImageLoader {
    /// Creates a loader over the given disk store. Slot changes are
    /// announced on `event_tx`.
    ///
    /// Must be called within a tokio runtime.
    ///
    /// # Errors
    /// Returns [`CacheError::InvalidConfig`] when the configuration is
    /// rejected.
    pub fn new(
        config: LoaderConfig,
        event_tx: &mpsc::UnboundedSender<SlotUpdated>,
        disk: Arc<dyn DiskStorePort>,
    ) -> CacheResult<Self> {
        config.validate()?;

        let memory = Arc::new(MemoryImageCache::new(config.memory_budget));
        let registry = Arc::new(RequestRegistry::new());
        let (job_tx, job_rx) = mpsc::unbounded_channel();
        let (delivery_tx, delivery_rx) = mpsc::unbounded_channel();

        let job_rx = Arc::new(tokio::sync::Mutex::new(job_rx));
        for worker in 0..config.worker_count {
            tokio::spawn(run_worker(
                worker,
                job_rx.clone(),
                disk.clone(),
                memory.clone(),
                delivery_tx.clone(),
            ));
        }
        tokio::spawn(run_dispatcher(
            delivery_rx,
            registry.clone(),
            config.clone(),
            event_tx.clone(),
        ));

        Ok(Self {
            memory,
            registry,
            config,
            job_tx,
            delivery_tx,
        })
    }

    /// Creates the icon-profile loader over the default icon disk store.
    ///
    /// `total_memory` is the ambient memory figure the budget fraction is
    /// taken from; callers derive it from whatever system information is
    /// available to them.
    ///
    /// # Errors
    /// Returns an error if the disk store cannot be created or the derived
    /// configuration is invalid.
    pub async fn icon_loader(
        total_memory: u64,
        event_tx: &mpsc::UnboundedSender<SlotUpdated>,
    ) -> CacheResult<Self> {
        let disk = Arc::new(DiskFileCache::icon_store().await?);
        Self::new(LoaderConfig::icon(total_memory), event_tx, disk)
    }

    /// Creates the thumbnail-profile loader over the default thumbnail disk
    /// store.
    ///
    /// # Errors
    /// Returns an error if the disk store cannot be created or the derived
    /// configuration is invalid.
    pub async fn thumbnail_loader(
        total_memory: u64,
        event_tx: &mpsc::UnboundedSender<SlotUpdated>,
    ) -> CacheResult<Self> {
        let disk = Arc::new(DiskFileCache::thumbnail_store().await?);
        Self::new(LoaderConfig::thumbnail(total_memory), event_tx, disk)
    }

    /// Requests `key` for display in `slot`.
    ///
    /// Never blocks: this performs at most a cache lookup and a channel
    /// send. An absent or empty key shows the placeholder immediately. On a
    /// memory miss the slot shows the placeholder while a background job
    /// loads the image; whichever request for this slot was issued last
    /// wins, regardless of completion order.
    pub fn request(
        &self,
        key: Option<&str>,
        slot: &ImageSlot,
        round_radius: f32,
        crop_square: bool,
    ) {
        let Some(raw) = key.filter(|k| !k.is_empty()) else {
            slot.set_view(SlotView::Placeholder(self.config.placeholder.clone()));
            return;
        };

        let key = ImageKey::new(resolve_key(raw, &self.config.base_url));

        // Bind before the cache check: a racing job for this slot's previous
        // request is guaranteed to see the registry already pointing here.
        self.registry.bind(slot, key.clone());

        let job = LoadJob {
            key: key.clone(),
            slot: slot.downgrade(),
            slot_id: slot.id(),
            options: DisplayOptions {
                round_radius,
                crop_square,
            },
        };

        if let Some(image) = self.memory.get(&key) {
            // Same re-validated delivery path as background results.
            let _ = self.delivery_tx.send(Delivery {
                image: Some(image),
                job,
            });
        } else {
            slot.set_view(SlotView::Placeholder(self.config.placeholder.clone()));
            if self.job_tx.send(job).is_err() {
                warn!(key = %key, "worker pool unavailable, dropping load request");
            }
        }
    }

    /// Returns memory cache statistics.
    #[must_use]
    pub fn memory_stats(&self) -> CacheStats {
        self.memory.stats()
    }

    /// Drops every decoded image from the memory cache.
    pub fn clear_memory(&self) {
        self.memory.clear();
    }

    /// The configuration this loader was built with.
    #[must_use]
    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }
}

/// Persistent worker loop: pulls jobs off the shared queue until the loader
/// is dropped and the channel drains.
async fn run_worker(
    worker: usize,
    jobs: Arc<tokio::sync::Mutex<mpsc::UnboundedReceiver<LoadJob>>>,
    disk: Arc<dyn DiskStorePort>,
    memory: Arc<MemoryImageCache>,
    delivery_tx: mpsc::UnboundedSender<Delivery>,
) {
    loop {
        let job = jobs.lock().await.recv().await;
        let Some(job) = job else {
            break;
        };

        let image = load_and_cache(&job.key, disk.as_ref(), &memory).await;
        if delivery_tx.send(Delivery { image, job }).is_err() {
            break;
        }
    }
    trace!(worker, "image worker exiting");
}

/// The job procedure: disk lookup, at most one fetch retry, decode, store.
/// Every failure normalizes to an absent image.
async fn load_and_cache(
    key: &ImageKey,
    disk: &dyn DiskStorePort,
    memory: &MemoryImageCache,
) -> Option<Arc<image::DynamicImage>> {
    let mut image = match disk.cached_file(key).await {
        Some(path) => decode_file(&path).await,
        None => None,
    };

    if image.is_none() {
        if let Err(error) = disk.fetch_and_store(key).await {
            warn!(key = %key, %error, "fetch-and-store failed");
        }
        image = match disk.cached_file(key).await {
            Some(path) => decode_file(&path).await,
            None => None,
        };
    }

    if let Some(image) = &image {
        memory.put(key.clone(), image.clone());
    }
    image
}

/// Decodes an image file off the async runtime. Missing, unreadable, and
/// malformed files are all ordinary misses, not faults.
async fn decode_file(path: &Path) -> Option<Arc<image::DynamicImage>> {
    let bytes = tokio::fs::read(path).await.ok()?;
    match tokio::task::spawn_blocking(move || image::load_from_memory(&bytes)).await {
        Ok(Ok(image)) => Some(Arc::new(image)),
        Ok(Err(decode_error)) => {
            warn!(path = %path.display(), error = %decode_error, "failed to decode cached image");
            None
        }
        Err(join_error) => {
            error!(path = %path.display(), error = %join_error, "decode task panicked");
            None
        }
    }
}

/// The serial delivery context: the only place display-visible mutation
/// happens for background results.
async fn run_dispatcher(
    mut delivery_rx: mpsc::UnboundedReceiver<Delivery>,
    registry: Arc<RequestRegistry>,
    config: LoaderConfig,
    event_tx: mpsc::UnboundedSender<SlotUpdated>,
) {
    while let Some(Delivery { image, job }) = delivery_rx.recv().await {
        if !registry.is_current(job.slot_id, &job.key) {
            trace!(key = %job.key, slot_id = %job.slot_id, "discarding stale result");
            continue;
        }
        let Some(slot) = job.slot.upgrade() else {
            continue;
        };

        let view = displayable(image, &job.options, &config)
            .map_or_else(|| fallback_view(&config), SlotView::Image);
        slot.set_view(view);

        let _ = event_tx.send(SlotUpdated {
            slot_id: job.slot_id,
            key: job.key,
        });
    }
}

/// Applies the minimum-height gate and the display transforms. `None` means
/// the configured fallback applies.
fn displayable(
    image: Option<Arc<image::DynamicImage>>,
    options: &DisplayOptions,
    config: &LoaderConfig,
) -> Option<Arc<image::DynamicImage>> {
    let image = image?;
    if image.height() < config.min_image_height {
        return None;
    }
    if options.crop_square || options.round_radius > 0.0 {
        clip_and_round(&image, options.round_radius, options.crop_square).map(Arc::new)
    } else {
        Some(image)
    }
}

fn fallback_view(config: &LoaderConfig) -> SlotView {
    if config.hide_missing {
        SlotView::Hidden
    } else {
        SlotView::Placeholder(config.placeholder.clone())
    }
}
