//! Display-time image transforms: centered square crop and corner rounding.

use image::{DynamicImage, RgbaImage};

/// Applies the display options to a decoded image.
///
/// `crop_square` takes the centered square of side `min(width, height)`.
/// A positive `round_radius` converts to RGBA and clears the alpha of every
/// pixel outside the rounded rectangle, with the radius clamped to half the
/// short side. Pure; returns `None` for degenerate input.
#[must_use]
pub fn clip_and_round(
    image: &DynamicImage,
    round_radius: f32,
    crop_square: bool,
) -> Option<DynamicImage> {
    if image.width() == 0 || image.height() == 0 {
        return None;
    }

    let mut shaped = if crop_square {
        let side = image.width().min(image.height());
        let x = (image.width() - side) / 2;
        let y = (image.height() - side) / 2;
        image.crop_imm(x, y, side, side)
    } else {
        image.clone()
    };

    if round_radius > 0.0 {
        shaped = DynamicImage::ImageRgba8(round_corners(shaped.to_rgba8(), round_radius));
    }

    Some(shaped)
}

#[allow(clippy::cast_precision_loss)]
fn round_corners(mut rgba: RgbaImage, radius: f32) -> RgbaImage {
    let (width, height) = rgba.dimensions();
    let radius = radius.min(width.min(height) as f32 / 2.0);
    let radius_sq = radius * radius;
    let right = width as f32;
    let bottom = height as f32;

    for (x, y, pixel) in rgba.enumerate_pixels_mut() {
        let px = x as f32 + 0.5;
        let py = y as f32 + 0.5;
        // nearest corner-circle center; pixels along the straight edges
        // clamp onto themselves and keep full alpha
        let cx = px.clamp(radius, right - radius);
        let cy = py.clamp(radius, bottom - radius);
        let dx = px - cx;
        let dy = py - cy;
        if dx * dx + dy * dy > radius_sq {
            pixel.0[3] = 0;
        }
    }

    rgba
}
