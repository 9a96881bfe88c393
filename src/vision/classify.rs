//! Built-in character classifier
//!
//! Matches a normalized glyph against a labeled template set using zero-mean
//! normalized cross-correlation. Templates are loaded from a directory of
//! glyph images whose file stem is the label ("A.png" classifies as "A").

use std::path::Path;

use anyhow::{bail, Context, Result};
use image::GrayImage;
use tracing::{debug, info};

use super::preprocess::{fit_to_canvas, GLYPH_SIZE};
use super::{CharacterClassifier, VisionError};

/// A labeled glyph template on the classifier canvas
#[derive(Debug, Clone)]
struct GlyphTemplate {
    label: String,
    image: GrayImage,
}

/// Template-matching character classifier
pub struct TemplateClassifier {
    templates: Vec<GlyphTemplate>,
    /// Minimum correlation score for a match (0.0 - 1.0)
    min_score: f32,
}

impl TemplateClassifier {
    /// Build a classifier from in-memory labeled glyphs
    pub fn from_templates(
        templates: impl IntoIterator<Item = (String, GrayImage)>,
        min_score: f32,
    ) -> Self {
        let templates = templates
            .into_iter()
            .map(|(label, image)| GlyphTemplate {
                label,
                image: fit_to_canvas(&image),
            })
            .collect();
        Self { templates, min_score }
    }

    /// Load glyph templates from a directory. Every readable image file
    /// becomes one template labeled by its file stem.
    pub fn load_dir(dir: &Path, min_score: f32) -> Result<Self> {
        let mut templates = Vec::new();

        let entries = std::fs::read_dir(dir)
            .with_context(|| format!("Failed to read glyph directory {dir:?}"))?;
        for entry in entries {
            let path = entry?.path();
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let Ok(img) = image::open(&path) else {
                debug!("Skipping non-image file {:?}", path);
                continue;
            };
            templates.push(GlyphTemplate {
                label: stem.to_string(),
                image: fit_to_canvas(&img.to_luma8()),
            });
        }

        if templates.is_empty() {
            bail!("No glyph templates found in {dir:?}");
        }

        info!("Loaded {} glyph templates from {:?}", templates.len(), dir);
        Ok(Self { templates, min_score })
    }

    /// Number of loaded templates
    pub fn template_count(&self) -> usize {
        self.templates.len()
    }
}

impl CharacterClassifier for TemplateClassifier {
    fn classify(&self, glyph: &GrayImage) -> Result<String, VisionError> {
        if glyph.dimensions() != (GLYPH_SIZE, GLYPH_SIZE) {
            return Err(VisionError::Classification(format!(
                "glyph is {}x{}, expected {GLYPH_SIZE}x{GLYPH_SIZE}",
                glyph.width(),
                glyph.height()
            )));
        }

        let mut best: Option<(&str, f32)> = None;
        for template in &self.templates {
            let score = correlation(glyph, &template.image);
            if best.map_or(true, |(_, s)| score > s) {
                best = Some((template.label.as_str(), score));
            }
        }

        match best {
            Some((label, score)) if score >= self.min_score => Ok(label.to_string()),
            Some((label, score)) => Err(VisionError::Classification(format!(
                "best candidate '{label}' scored {score:.2}, below {:.2}",
                self.min_score
            ))),
            None => Err(VisionError::Classification("no templates loaded".into())),
        }
    }
}

/// Zero-mean normalized cross-correlation between two same-size glyphs
fn correlation(a: &GrayImage, b: &GrayImage) -> f32 {
    let mut sum_ab = 0.0f64;
    let mut sum_a2 = 0.0f64;
    let mut sum_b2 = 0.0f64;
    let mut sum_a = 0.0f64;
    let mut sum_b = 0.0f64;
    let count = (a.width() * a.height()) as f64;

    for (pa, pb) in a.pixels().zip(b.pixels()) {
        let va = pa.0[0] as f64;
        let vb = pb.0[0] as f64;
        sum_ab += va * vb;
        sum_a2 += va * va;
        sum_b2 += vb * vb;
        sum_a += va;
        sum_b += vb;
    }

    let mean_a = sum_a / count;
    let mean_b = sum_b / count;

    let numerator = sum_ab - count * mean_a * mean_b;
    let denom_a = (sum_a2 - count * mean_a * mean_a).sqrt();
    let denom_b = (sum_b2 - count * mean_b * mean_b).sqrt();
    let denominator = denom_a * denom_b;

    if denominator < 1e-10 {
        return 0.0;
    }

    (numerator / denominator).clamp(0.0, 1.0) as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    /// Vertical bar glyph, roughly an "I"
    fn bar_glyph() -> GrayImage {
        let mut img = GrayImage::from_pixel(GLYPH_SIZE, GLYPH_SIZE, Luma([255]));
        for y in 2..26 {
            for x in 12..16 {
                img.put_pixel(x, y, Luma([0]));
            }
        }
        img
    }

    /// Horizontal bar glyph, roughly a "-"
    fn dash_glyph() -> GrayImage {
        let mut img = GrayImage::from_pixel(GLYPH_SIZE, GLYPH_SIZE, Luma([255]));
        for y in 12..16 {
            for x in 2..26 {
                img.put_pixel(x, y, Luma([0]));
            }
        }
        img
    }

    fn classifier() -> TemplateClassifier {
        TemplateClassifier::from_templates(
            [
                ("I".to_string(), bar_glyph()),
                ("-".to_string(), dash_glyph()),
            ],
            0.5,
        )
    }

    #[test]
    fn test_exact_match_wins() {
        let clf = classifier();
        assert_eq!(clf.classify(&bar_glyph()).unwrap(), "I");
        assert_eq!(clf.classify(&dash_glyph()).unwrap(), "-");
    }

    #[test]
    fn test_flat_glyph_fails() {
        // Constant image has zero variance: no correlation with anything
        let clf = classifier();
        let flat = GrayImage::from_pixel(GLYPH_SIZE, GLYPH_SIZE, Luma([128]));
        assert!(matches!(
            clf.classify(&flat),
            Err(VisionError::Classification(_))
        ));
    }

    #[test]
    fn test_wrong_size_glyph_fails() {
        let clf = classifier();
        let small = GrayImage::from_pixel(10, 10, Luma([0]));
        assert!(matches!(
            clf.classify(&small),
            Err(VisionError::Classification(_))
        ));
    }

    #[test]
    fn test_threshold_rejects_weak_match() {
        let strict = TemplateClassifier::from_templates(
            [("I".to_string(), bar_glyph())],
            0.99,
        );
        // A dash correlates poorly with the bar template
        assert!(strict.classify(&dash_glyph()).is_err());
    }

    #[test]
    fn test_load_dir_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        bar_glyph().save(dir.path().join("X.png")).unwrap();
        dash_glyph().save(dir.path().join("dash.png")).unwrap();

        let clf = TemplateClassifier::load_dir(dir.path(), 0.5).unwrap();
        assert_eq!(clf.template_count(), 2);
        assert_eq!(clf.classify(&bar_glyph()).unwrap(), "X");
    }

    #[test]
    fn test_load_dir_empty_is_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(TemplateClassifier::load_dir(dir.path(), 0.5).is_err());
    }
}
