//! Display slot the consuming UI renders from.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

static NEXT_SLOT_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identifier for a display slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotId(u64);

impl std::fmt::Display for SlotId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What a slot currently shows.
#[derive(Debug, Clone, Default)]
pub enum SlotView {
    /// Nothing has been requested for this slot yet.
    #[default]
    Empty,
    /// A named placeholder asset.
    Placeholder(String),
    /// The slot is withdrawn from layout.
    Hidden,
    /// A decoded, display-ready image.
    Image(Arc<image::DynamicImage>),
}

impl SlotView {
    /// Returns true if the slot shows a decoded image.
    #[must_use]
    pub const fn is_image(&self) -> bool {
        matches!(self, Self::Image(_))
    }

    /// Returns true if the slot shows a placeholder.
    #[must_use]
    pub const fn is_placeholder(&self) -> bool {
        matches!(self, Self::Placeholder(_))
    }

    /// Returns true if the slot is hidden.
    #[must_use]
    pub const fn is_hidden(&self) -> bool {
        matches!(self, Self::Hidden)
    }

    /// Returns the displayed image, if any.
    #[must_use]
    pub fn image(&self) -> Option<&Arc<image::DynamicImage>> {
        match self {
            Self::Image(image) => Some(image),
            _ => None,
        }
    }
}

/// Shared state behind an [`ImageSlot`] handle.
///
/// The loader holds only [`Weak`] references to this, so a slot dropped by
/// the UI is reclaimed regardless of any in-flight request naming it.
#[derive(Debug)]
pub(crate) struct SlotShared {
    id: SlotId,
    view: Mutex<SlotView>,
}

impl SlotShared {
    pub(crate) fn id(&self) -> SlotId {
        self.id
    }

    pub(crate) fn set_view(&self, view: SlotView) {
        *self.view.lock() = view;
    }
}

/// A consuming display slot that can show one piece of content at a time.
///
/// Slots are reused over their lifetime for unrelated content; the loader
/// tracks the most recent request per slot and discards results for anything
/// older. Cloning the handle shares the same underlying slot.
#[derive(Debug, Clone)]
pub struct ImageSlot {
    shared: Arc<SlotShared>,
}

impl ImageSlot {
    /// Creates a new, empty slot.
    #[must_use]
    pub fn new() -> Self {
        Self {
            shared: Arc::new(SlotShared {
                id: SlotId(NEXT_SLOT_ID.fetch_add(1, Ordering::Relaxed)),
                view: Mutex::new(SlotView::Empty),
            }),
        }
    }

    /// Returns this slot's identifier.
    #[must_use]
    pub fn id(&self) -> SlotId {
        self.shared.id
    }

    /// Returns a snapshot of what the slot currently shows.
    #[must_use]
    pub fn view(&self) -> SlotView {
        self.shared.view.lock().clone()
    }

    pub(crate) fn set_view(&self, view: SlotView) {
        self.shared.set_view(view);
    }

    pub(crate) fn downgrade(&self) -> Weak<SlotShared> {
        Arc::downgrade(&self.shared)
    }
}

impl Default for ImageSlot {
    fn default() -> Self {
        Self::new()
    }
}
