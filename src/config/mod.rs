//! Application Configuration
//!
//! User settings and preferences stored in TOML format.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Image preprocessing settings
    pub preprocess: PreprocessSettings,
    /// Text detection settings
    pub detection: DetectionSettings,
    /// Character recognition settings
    pub recognition: RecognitionSettings,
}

/// Whole-image normalization applied before detection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreprocessSettings {
    /// Contrast factor around the midpoint (1.0 = unchanged)
    pub contrast: f32,
    /// Invert luminance (for light text on dark backgrounds)
    pub invert: bool,
}

impl Default for PreprocessSettings {
    fn default() -> Self {
        Self {
            contrast: 1.0,
            invert: false,
        }
    }
}

/// Projection detector tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionSettings {
    /// Blank rows tolerated inside one text line
    pub line_gap: u32,
    /// Minimum height of a text line in pixels
    pub min_line_height: u32,
    /// Minimum width of a character run in pixels
    pub min_char_width: u32,
    /// Fraction of line height an inter-character gap must exceed
    /// to start a new word
    pub word_gap_ratio: f32,
}

impl Default for DetectionSettings {
    fn default() -> Self {
        Self {
            line_gap: 1,
            min_line_height: 4,
            min_char_width: 2,
            word_gap_ratio: 0.4,
        }
    }
}

/// Template classifier tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecognitionSettings {
    /// Directory of labeled glyph templates (file stem = label)
    pub glyph_dir: Option<PathBuf>,
    /// Minimum correlation score for a classification (0.0 - 1.0)
    pub min_score: f32,
}

impl Default for RecognitionSettings {
    fn default() -> Self {
        Self {
            glyph_dir: None,
            min_score: 0.45,
        }
    }
}

/// Get the configuration directory
pub fn get_config_dir() -> Result<PathBuf> {
    let proj_dirs = directories::ProjectDirs::from("io", "textlens", "textlens")
        .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;

    let config_dir = proj_dirs.config_dir().to_path_buf();
    std::fs::create_dir_all(&config_dir)?;

    Ok(config_dir)
}

/// Load configuration from file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: AppConfig = toml::from_str(&content)?;
    Ok(config)
}

/// Save configuration to file
pub fn save_config(config: &AppConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_app_config() {
        let config = AppConfig::default();

        assert!((config.preprocess.contrast - 1.0).abs() < 0.01);
        assert!(!config.preprocess.invert);

        assert_eq!(config.detection.line_gap, 1);
        assert_eq!(config.detection.min_line_height, 4);
        assert_eq!(config.detection.min_char_width, 2);
        assert!((config.detection.word_gap_ratio - 0.4).abs() < 0.01);

        assert!(config.recognition.glyph_dir.is_none());
        assert!((config.recognition.min_score - 0.45).abs() < 0.01);
    }

    #[test]
    fn test_config_serialization_roundtrip() {
        let config = AppConfig::default();

        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();

        assert_eq!(config.preprocess.invert, parsed.preprocess.invert);
        assert_eq!(config.detection.min_char_width, parsed.detection.min_char_width);
        assert_eq!(config.recognition.glyph_dir, parsed.recognition.glyph_dir);
    }

    #[test]
    fn test_config_with_custom_values() {
        let mut config = AppConfig::default();
        config.preprocess.contrast = 1.6;
        config.recognition.glyph_dir = Some(PathBuf::from("/srv/glyphs"));
        config.recognition.min_score = 0.7;

        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();

        assert!((parsed.preprocess.contrast - 1.6).abs() < 0.01);
        assert_eq!(parsed.recognition.glyph_dir, Some(PathBuf::from("/srv/glyphs")));
        assert!((parsed.recognition.min_score - 0.7).abs() < 0.01);
    }

    #[test]
    fn test_save_and_load_config() {
        let config = AppConfig::default();
        let temp_file = NamedTempFile::new().unwrap();

        save_config(&config, temp_file.path()).unwrap();
        let loaded = load_config(temp_file.path()).unwrap();

        assert_eq!(config.detection.line_gap, loaded.detection.line_gap);
        assert_eq!(config.preprocess.invert, loaded.preprocess.invert);
    }

    #[test]
    fn test_load_config_file_not_found() {
        let result = load_config(Path::new("/nonexistent/path/config.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_config_invalid_toml() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "this is not valid toml {{{{").unwrap();

        let result = load_config(temp_file.path());
        assert!(result.is_err());
    }
}
