//! Domain entity definitions.

mod image;
mod slot;

pub use image::ImageKey;
pub use slot::{ImageSlot, SlotId, SlotView};

pub(crate) use slot::SlotShared;
