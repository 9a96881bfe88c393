//! Built-in text region detector
//!
//! Projection-profile detection: Otsu binarization with automatic polarity,
//! horizontal ink projection into line bands, per-band column projection into
//! character runs, and gap clustering of runs into words. Output is in
//! reading order: bands top to bottom, words and characters left to right.

use image::GrayImage;
use imageproc::contrast::otsu_level;
use tracing::debug;

use super::{CharBox, RegionDetector, VisionError, WordRegion};
use crate::config::DetectionSettings;

/// Projection-profile region detector
pub struct ProjectionDetector {
    settings: DetectionSettings,
}

/// A horizontal band of rows containing ink (one text line)
#[derive(Debug, Clone, Copy)]
struct LineBand {
    top: u32,
    bottom: u32,
}

impl LineBand {
    fn height(&self) -> u32 {
        self.bottom - self.top + 1
    }
}

/// A run of consecutive ink columns within a band (one character candidate)
#[derive(Debug, Clone, Copy)]
struct ColumnRun {
    left: u32,
    right: u32,
}

impl ColumnRun {
    fn width(&self) -> u32 {
        self.right - self.left + 1
    }
}

impl ProjectionDetector {
    /// Create a detector with the given settings
    pub fn new(settings: DetectionSettings) -> Self {
        Self { settings }
    }

    /// Binarize into an ink mask, treating the minority side of the Otsu
    /// threshold as ink so light-on-dark text works without configuration.
    fn ink_mask(&self, image: &GrayImage) -> Vec<bool> {
        let threshold = otsu_level(image);
        let dark: usize = image.pixels().filter(|p| p.0[0] < threshold).count();
        let total = (image.width() * image.height()) as usize;
        let dark_is_ink = dark * 2 <= total;

        image
            .pixels()
            .map(|p| {
                if dark_is_ink {
                    p.0[0] < threshold
                } else {
                    p.0[0] > threshold
                }
            })
            .collect()
    }

    /// Group inked rows into line bands, bridging blank gaps up to `line_gap`
    fn find_bands(&self, mask: &[bool], width: u32, height: u32) -> Vec<LineBand> {
        let row_has_ink = |y: u32| {
            let start = (y * width) as usize;
            mask[start..start + width as usize].iter().any(|&p| p)
        };

        let mut bands = Vec::new();
        let mut current: Option<LineBand> = None;
        let mut blank_run = 0u32;

        for y in 0..height {
            if row_has_ink(y) {
                match current.as_mut() {
                    Some(band) => band.bottom = y,
                    None => current = Some(LineBand { top: y, bottom: y }),
                }
                blank_run = 0;
            } else if let Some(band) = current {
                blank_run += 1;
                if blank_run > self.settings.line_gap {
                    bands.push(band);
                    current = None;
                }
            }
        }
        if let Some(band) = current {
            bands.push(band);
        }

        bands.retain(|b| b.height() >= self.settings.min_line_height);
        bands
    }

    /// Column runs of ink within a band, left to right
    fn find_runs(&self, mask: &[bool], width: u32, band: &LineBand) -> Vec<ColumnRun> {
        let col_has_ink = |x: u32| {
            (band.top..=band.bottom).any(|y| mask[(y * width + x) as usize])
        };

        let mut runs = Vec::new();
        let mut current: Option<ColumnRun> = None;

        for x in 0..width {
            if col_has_ink(x) {
                match current.as_mut() {
                    Some(run) => run.right = x,
                    None => current = Some(ColumnRun { left: x, right: x }),
                }
            } else if let Some(run) = current.take() {
                runs.push(run);
            }
        }
        if let Some(run) = current {
            runs.push(run);
        }

        runs.retain(|r| r.width() >= self.settings.min_char_width);
        runs
    }

    /// Tighten a character run vertically to its inked rows
    fn tighten(&self, mask: &[bool], width: u32, band: &LineBand, run: &ColumnRun) -> CharBox {
        let mut top = band.bottom;
        let mut bottom = band.top;

        for y in band.top..=band.bottom {
            let inked =
                (run.left..=run.right).any(|x| mask[(y * width + x) as usize]);
            if inked {
                top = top.min(y);
                bottom = bottom.max(y);
            }
        }

        CharBox::new(run.left, top, run.width(), bottom - top + 1)
    }
}

impl RegionDetector for ProjectionDetector {
    fn detect(&self, image: &GrayImage) -> Result<Vec<WordRegion>, VisionError> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(VisionError::Detection(format!(
                "degenerate image {width}x{height}"
            )));
        }

        let mask = self.ink_mask(image);
        let bands = self.find_bands(&mask, width, height);

        let mut words = Vec::new();
        for band in &bands {
            let runs = self.find_runs(&mask, width, band);
            if runs.is_empty() {
                continue;
            }

            // Inter-run gaps wider than a fraction of the band height
            // separate words; narrower gaps separate characters
            let word_gap = (band.height() as f32 * self.settings.word_gap_ratio).max(1.0) as u32;

            let mut word = WordRegion::default();
            let mut prev_right: Option<u32> = None;
            for run in &runs {
                if let Some(right) = prev_right {
                    if run.left - right - 1 > word_gap {
                        words.push(std::mem::take(&mut word));
                    }
                }
                word.boxes.push(self.tighten(&mask, width, band, run));
                prev_right = Some(run.right);
            }
            if !word.boxes.is_empty() {
                words.push(word);
            }
        }

        debug!(
            "Detected {} words across {} lines",
            words.len(),
            bands.len()
        );
        Ok(words)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn detector() -> ProjectionDetector {
        ProjectionDetector::new(DetectionSettings::default())
    }

    /// White canvas with black rectangles at the given (x, y, w, h) spots
    fn canvas(width: u32, height: u32, blobs: &[(u32, u32, u32, u32)]) -> GrayImage {
        let mut img = GrayImage::from_pixel(width, height, Luma([255]));
        for &(x, y, w, h) in blobs {
            for yy in y..y + h {
                for xx in x..x + w {
                    img.put_pixel(xx, yy, Luma([0]));
                }
            }
        }
        img
    }

    #[test]
    fn test_blank_image_yields_no_words() {
        let img = GrayImage::from_pixel(60, 30, Luma([255]));
        let words = detector().detect(&img).unwrap();
        assert!(words.is_empty());
    }

    #[test]
    fn test_degenerate_image_is_detection_error() {
        let img = GrayImage::new(0, 0);
        assert!(matches!(
            detector().detect(&img),
            Err(VisionError::Detection(_))
        ));
    }

    #[test]
    fn test_close_blobs_form_one_word() {
        // Two 6x12 blobs, 3px apart: gap below 0.4 * band height (12)
        let img = canvas(80, 30, &[(10, 8, 6, 12), (19, 8, 6, 12)]);
        let words = detector().detect(&img).unwrap();

        assert_eq!(words.len(), 1);
        assert_eq!(words[0].boxes.len(), 2);
        assert_eq!(words[0].boxes[0].x, 10);
        assert_eq!(words[0].boxes[1].x, 19);
    }

    #[test]
    fn test_wide_gap_splits_words() {
        // Second blob 20px away: well past the word gap
        let img = canvas(80, 30, &[(10, 8, 6, 12), (36, 8, 6, 12)]);
        let words = detector().detect(&img).unwrap();

        assert_eq!(words.len(), 2);
        assert_eq!(words[0].boxes.len(), 1);
        assert_eq!(words[1].boxes.len(), 1);
    }

    #[test]
    fn test_lines_read_top_to_bottom() {
        let img = canvas(80, 60, &[(40, 34, 6, 12), (10, 8, 6, 12)]);
        let words = detector().detect(&img).unwrap();

        assert_eq!(words.len(), 2);
        assert_eq!(words[0].boxes[0].y, 8);
        assert_eq!(words[1].boxes[0].y, 34);
    }

    #[test]
    fn test_light_on_dark_polarity() {
        // Dark canvas, light blob: ink side flips automatically
        let mut img = GrayImage::from_pixel(60, 30, Luma([20]));
        for y in 8..20 {
            for x in 10..16 {
                img.put_pixel(x, y, Luma([240]));
            }
        }

        let words = detector().detect(&img).unwrap();
        assert_eq!(words.len(), 1);
        assert_eq!(words[0].boxes.len(), 1);
        assert_eq!(words[0].boxes[0], CharBox::new(10, 8, 6, 12));
    }

    #[test]
    fn test_boxes_are_tightened_vertically() {
        // Short blob inside a band established by a taller sibling
        let img = canvas(80, 30, &[(10, 8, 6, 12), (19, 12, 6, 4)]);
        let words = detector().detect(&img).unwrap();

        assert_eq!(words.len(), 1);
        let short = &words[0].boxes[1];
        assert_eq!(short.y, 12);
        assert_eq!(short.height, 4);
    }
}
