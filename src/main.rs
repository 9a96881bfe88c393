//! textlens - photo-to-text recognition
//!
//! Detects text regions in a picked image, classifies every character
//! concurrently, and reassembles the completions into reading-order text,
//! improving the printed result as classifications arrive.

mod config;
mod pipeline;
mod vision;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use crate::config::AppConfig;
use crate::pipeline::{PipelineEvent, RecognitionPipeline, NO_TEXT_MESSAGE};
use crate::vision::{ProjectionDetector, TemplateClassifier};

/// textlens - recognize text in an image
#[derive(Parser, Debug)]
#[command(name = "textlens")]
#[command(about = "Recognize text in an image via per-character classification")]
struct Args {
    /// Image file to recognize
    image: PathBuf,

    /// Directory of glyph templates (file stem = label)
    #[arg(short, long)]
    glyphs: Option<PathBuf>,

    /// Configuration file (defaults to the platform config directory)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Invert luminance for light text on dark backgrounds
    #[arg(long)]
    invert: bool,
}

fn main() -> Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();

    let mut config = load_or_create_config(args.config.as_deref());
    if args.invert {
        config.preprocess.invert = true;
    }

    let Some(glyph_dir) = args.glyphs.or_else(|| config.recognition.glyph_dir.clone()) else {
        bail!("No glyph template directory: pass --glyphs or set recognition.glyph_dir");
    };

    let detector = ProjectionDetector::new(config.detection.clone());
    let classifier = TemplateClassifier::load_dir(&glyph_dir, config.recognition.min_score)?;
    let pipeline = RecognitionPipeline::new(
        Arc::new(detector),
        Arc::new(classifier),
        config.preprocess.clone(),
    )?;

    let image = image::open(&args.image)
        .with_context(|| format!("Failed to load image {:?}", args.image))?;

    let events = pipeline.events();
    let run = pipeline.submit(image);

    loop {
        let event = events.recv()?;
        if event.run() != run {
            continue;
        }
        match event {
            PipelineEvent::TextUpdated { text, .. } => {
                info!("Current best text: \"{text}\"");
            }
            PipelineEvent::RunCompleted { text, .. } => {
                println!("{text}");
                break;
            }
            PipelineEvent::NoTextFound { .. } => {
                println!("{NO_TEXT_MESSAGE}");
                break;
            }
        }
    }

    Ok(())
}

/// Load configuration from the given path, the platform config directory,
/// or fall back to defaults
fn load_or_create_config(path: Option<&std::path::Path>) -> AppConfig {
    if let Some(path) = path {
        match config::load_config(path) {
            Ok(config) => {
                info!("Loaded configuration from {:?}", path);
                return config;
            }
            Err(err) => {
                tracing::warn!("Failed to load {:?}: {err}; using defaults", path);
                return AppConfig::default();
            }
        }
    }

    if let Ok(config_dir) = config::get_config_dir() {
        let config_path = config_dir.join("config.toml");
        if config_path.exists() {
            if let Ok(config) = config::load_config(&config_path) {
                info!("Loaded configuration from {:?}", config_path);
                return config;
            }
        }
    }
    info!("Using default configuration");
    AppConfig::default()
}
