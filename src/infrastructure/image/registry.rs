//! Request binding registry for stale-result detection.

use std::collections::HashMap;
use std::sync::Weak;

use parking_lot::Mutex;
use tracing::trace;

use crate::domain::entities::{ImageKey, ImageSlot, SlotId, SlotShared};

struct Binding {
    slot: Weak<SlotShared>,
    key: ImageKey,
}

/// Tracks, per display slot, the key it most recently requested.
///
/// Slots get reused for unrelated content over their lifetime; a background
/// load finishing late must check here before touching its slot. Bindings
/// hold only weak slot references, so the registry never keeps a dropped
/// slot alive; dead bindings are removed on lookup and swept in bulk once
/// the map grows past a watermark.
pub struct RequestRegistry {
    bindings: Mutex<HashMap<SlotId, Binding>>,
}

const SWEEP_WATERMARK: usize = 64;

impl RequestRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            bindings: Mutex::new(HashMap::new()),
        }
    }

    /// Records `key` as the current request for `slot`, overwriting any
    /// prior binding.
    pub fn bind(&self, slot: &ImageSlot, key: ImageKey) {
        let mut bindings = self.bindings.lock();
        if bindings.len() >= SWEEP_WATERMARK {
            bindings.retain(|_, binding| binding.slot.strong_count() > 0);
        }
        bindings.insert(
            slot.id(),
            Binding {
                slot: slot.downgrade(),
                key,
            },
        );
    }

    /// Returns true iff the most recent `bind` for `slot_id` used exactly
    /// `key` and the slot is still alive.
    pub fn is_current(&self, slot_id: SlotId, key: &ImageKey) -> bool {
        let mut bindings = self.bindings.lock();
        match bindings.get(&slot_id) {
            Some(binding) if binding.slot.strong_count() == 0 => {
                trace!(slot_id = %slot_id, "binding for dropped slot");
                bindings.remove(&slot_id);
                false
            }
            Some(binding) => binding.key == *key,
            None => false,
        }
    }

    /// Number of bindings currently held, dead or alive.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bindings.lock().len()
    }

    /// Returns true if no bindings are held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for RequestRegistry {
    fn default() -> Self {
        Self::new()
    }
}
