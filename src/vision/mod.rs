//! Vision Layer
//!
//! The image-facing boundary of the recognition pipeline: region detection,
//! per-character preprocessing, and single-character classification.
//! The pipeline only talks to this layer through the `RegionDetector` and
//! `CharacterClassifier` traits, so backends can be swapped out.

pub mod classify;
pub mod detect;
pub mod preprocess;

use image::GrayImage;
use thiserror::Error;

pub use classify::TemplateClassifier;
pub use detect::ProjectionDetector;
pub use preprocess::{extract_glyph, prepare_image, GLYPH_SIZE};

/// Errors produced at the vision boundary.
///
/// Only `Detection` retires a run (surfaced as "no text found"). `Preprocess`
/// and `Classification` are per-character: the affected character is skipped
/// and its siblings continue.
#[derive(Debug, Error)]
pub enum VisionError {
    /// The detector itself failed on the image
    #[error("text detection failed: {0}")]
    Detection(String),
    /// A single character box could not be cropped/normalized
    #[error("character preprocessing failed: {0}")]
    Preprocess(String),
    /// A single character could not be classified
    #[error("character classification failed: {0}")]
    Classification(String),
}

/// Bounding box of a single character within the image coordinate space
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CharBox {
    /// Left edge in pixels
    pub x: u32,
    /// Top edge in pixels
    pub y: u32,
    /// Box width in pixels
    pub width: u32,
    /// Box height in pixels
    pub height: u32,
}

impl CharBox {
    /// Create a new character box
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }
}

/// A detected word: ordered character boxes in reading order
#[derive(Debug, Clone, Default)]
pub struct WordRegion {
    /// Character boxes, left to right
    pub boxes: Vec<CharBox>,
}

/// Locates text in a normalized grayscale image.
///
/// Words are returned in reading order (top to bottom, left to right) and the
/// character boxes within each word are ordered left to right. Word and
/// character indices handed to the pipeline are assigned from these orders.
/// An empty list is a valid, expected result.
pub trait RegionDetector: Send + Sync {
    /// Detect words and their character boxes
    fn detect(&self, image: &GrayImage) -> Result<Vec<WordRegion>, VisionError>;
}

/// Maps a normalized single-character glyph to a label token.
pub trait CharacterClassifier: Send + Sync {
    /// Classify one glyph; failure means "no result for this character"
    fn classify(&self, glyph: &GrayImage) -> Result<String, VisionError>;
}
