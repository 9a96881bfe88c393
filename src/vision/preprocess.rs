//! Image preprocessing for recognition
//!
//! Whole-image normalization (grayscale, contrast, inversion) and
//! per-character glyph extraction. Glyphs are cropped out of the normalized
//! image and fitted onto a fixed-size canvas matching the classifier input.

use image::{imageops, DynamicImage, GrayImage, Luma};
use tracing::debug;

use super::{CharBox, VisionError};
use crate::config::PreprocessSettings;

/// Side length of the square canvas classifiers receive
pub const GLYPH_SIZE: u32 = 28;

/// Fill value for canvas padding around a fitted glyph
const CANVAS_FILL: u8 = 255;

/// Normalize a picked image for detection: luminance grayscale, optional
/// contrast adjustment around the midpoint, optional inversion for light
/// text on dark backgrounds.
pub fn prepare_image(image: &DynamicImage, settings: &PreprocessSettings) -> GrayImage {
    let mut gray = image.to_luma8();

    if (settings.contrast - 1.0).abs() > 0.01 {
        debug!("Adjusting contrast by factor {}", settings.contrast);
        apply_contrast(&mut gray, settings.contrast);
    }

    if settings.invert {
        for pixel in gray.pixels_mut() {
            pixel.0[0] = 255 - pixel.0[0];
        }
    }

    gray
}

/// Contrast adjustment around the midpoint (128).
/// Factor > 1.0 increases contrast, < 1.0 decreases.
fn apply_contrast(image: &mut GrayImage, factor: f32) {
    for pixel in image.pixels_mut() {
        let val = pixel.0[0] as f32;
        pixel.0[0] = ((val - 128.0) * factor + 128.0).clamp(0.0, 255.0) as u8;
    }
}

/// Crop one character box out of the normalized image and fit it onto the
/// classifier canvas. A degenerate or out-of-bounds box is a per-character
/// failure; the caller skips the character and continues with its siblings.
pub fn extract_glyph(image: &GrayImage, bx: &CharBox) -> Result<GrayImage, VisionError> {
    let (img_w, img_h) = image.dimensions();

    if bx.width == 0 || bx.height == 0 {
        return Err(VisionError::Preprocess(format!(
            "empty character box {}x{}",
            bx.width, bx.height
        )));
    }
    if bx.x + bx.width > img_w || bx.y + bx.height > img_h {
        return Err(VisionError::Preprocess(format!(
            "character box ({}, {}) {}x{} outside image {}x{}",
            bx.x, bx.y, bx.width, bx.height, img_w, img_h
        )));
    }

    let crop = imageops::crop_imm(image, bx.x, bx.y, bx.width, bx.height).to_image();
    Ok(fit_to_canvas(&crop))
}

/// Fit a glyph crop onto the square classifier canvas, preserving aspect
/// ratio and centering the scaled glyph. Template images are normalized
/// through the same path so correlation compares like with like.
pub fn fit_to_canvas(glyph: &GrayImage) -> GrayImage {
    let (w, h) = glyph.dimensions();
    if (w, h) == (GLYPH_SIZE, GLYPH_SIZE) {
        return glyph.clone();
    }

    // Scale the longer side to the canvas, keep aspect
    let scale = GLYPH_SIZE as f32 / w.max(h) as f32;
    let new_w = ((w as f32 * scale).round() as u32).clamp(1, GLYPH_SIZE);
    let new_h = ((h as f32 * scale).round() as u32).clamp(1, GLYPH_SIZE);

    let resized = imageops::resize(glyph, new_w, new_h, imageops::FilterType::Triangle);

    let mut canvas = GrayImage::from_pixel(GLYPH_SIZE, GLYPH_SIZE, Luma([CANVAS_FILL]));
    let off_x = (GLYPH_SIZE - new_w) / 2;
    let off_y = (GLYPH_SIZE - new_h) / 2;
    imageops::replace(&mut canvas, &resized, off_x.into(), off_y.into());

    canvas
}
