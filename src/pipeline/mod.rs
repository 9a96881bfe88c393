//! Recognition Pipeline
//!
//! Orchestrates one recognition run per submitted image: detection on a
//! blocking task, one independent classification task per surviving character
//! glyph, aggregation of out-of-order completions, and a full re-render of
//! the current best text after every completion.
//!
//! Submitting a new image cancels the previous run's token; tasks of a
//! superseded run drop their results instead of writing into the new run's
//! aggregate. A task that never completes only leaves its character slot
//! empty, it never blocks the run.

pub mod aggregate;
pub mod assemble;
pub mod events;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use crossbeam_channel::{unbounded, Receiver, Sender};
use image::{DynamicImage, GrayImage};
use parking_lot::{Mutex, RwLock};
use tokio::runtime::Runtime;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::PreprocessSettings;
use crate::vision::{self, CharacterClassifier, RegionDetector, VisionError};

use aggregate::{Aggregator, CharIndex, WordIndex};
pub use assemble::NO_TEXT_MESSAGE;
pub use events::{PipelineEvent, RunId};

/// One character glyph staged for classification
type GlyphJob = (WordIndex, CharIndex, GrayImage);

/// Per-run context: owns the aggregate for the run's lifetime
struct RunState {
    id: RunId,
    /// Cancelled when a newer submission supersedes this run
    token: CancellationToken,
    aggregator: Aggregator,
    /// Latest rendering; the snapshot is taken under this lock so the
    /// stored text never regresses
    rendered: Mutex<String>,
    /// Classification tasks submitted for this run
    dispatched: AtomicUsize,
    /// Classification tasks that have finished, successfully or not
    completed: AtomicUsize,
}

impl RunState {
    fn new() -> Self {
        Self {
            id: RunId::new(),
            token: CancellationToken::new(),
            aggregator: Aggregator::new(),
            rendered: Mutex::new(String::new()),
            dispatched: AtomicUsize::new(0),
            completed: AtomicUsize::new(0),
        }
    }
}

/// The detection-classification-assembly pipeline
pub struct RecognitionPipeline {
    detector: Arc<dyn RegionDetector>,
    classifier: Arc<dyn CharacterClassifier>,
    preprocess: PreprocessSettings,
    runtime: Runtime,
    current: RwLock<Option<Arc<RunState>>>,
    events_tx: Sender<PipelineEvent>,
    events_rx: Receiver<PipelineEvent>,
}

impl RecognitionPipeline {
    /// Create a pipeline around a detector and classifier
    pub fn new(
        detector: Arc<dyn RegionDetector>,
        classifier: Arc<dyn CharacterClassifier>,
        preprocess: PreprocessSettings,
    ) -> Result<Self> {
        let runtime = Runtime::new().context("Failed to create tokio runtime")?;
        let (events_tx, events_rx) = unbounded();

        Ok(Self {
            detector,
            classifier,
            preprocess,
            runtime,
            current: RwLock::new(None),
            events_tx,
            events_rx,
        })
    }

    /// Start a recognition run, superseding any run in flight
    pub fn submit(&self, image: DynamicImage) -> RunId {
        let run = Arc::new(RunState::new());

        if let Some(prev) = self.current.write().replace(run.clone()) {
            debug!(run = %prev.id, "Cancelling superseded run");
            prev.token.cancel();
        }

        info!(run = %run.id, "Starting recognition run");
        self.runtime.spawn(run_recognition(
            run.clone(),
            self.detector.clone(),
            self.classifier.clone(),
            self.preprocess.clone(),
            self.events_tx.clone(),
            image,
        ));
        run.id
    }

    /// Most recent rendering of the current run (empty before the first run)
    pub fn current_text(&self) -> String {
        self.current
            .read()
            .as_ref()
            .map(|run| run.rendered.lock().clone())
            .unwrap_or_default()
    }

    /// Receiver for pipeline notifications
    pub fn events(&self) -> Receiver<PipelineEvent> {
        self.events_rx.clone()
    }
}

/// Drive one run: detect, stage glyphs, fan out classification
async fn run_recognition(
    run: Arc<RunState>,
    detector: Arc<dyn RegionDetector>,
    classifier: Arc<dyn CharacterClassifier>,
    preprocess: PreprocessSettings,
    events: Sender<PipelineEvent>,
    image: DynamicImage,
) {
    let staged = {
        let run = run.clone();
        tokio::task::spawn_blocking(move || {
            stage_characters(&run, detector.as_ref(), &preprocess, &image)
        })
        .await
    };

    let jobs = match staged {
        Ok(Ok(Some(jobs))) => jobs,
        Ok(Ok(None)) => {
            info!(run = %run.id, "No text regions detected");
            finish_empty(&run, &events);
            return;
        }
        Ok(Err(err)) => {
            warn!(run = %run.id, "Detection failed: {err}");
            finish_empty(&run, &events);
            return;
        }
        Err(err) => {
            error!(run = %run.id, "Detection task died: {err}");
            finish_empty(&run, &events);
            return;
        }
    };

    if run.token.is_cancelled() {
        return;
    }

    run.dispatched.store(jobs.len(), Ordering::SeqCst);
    if jobs.is_empty() {
        // Words were detected but no character survived preprocessing:
        // the result is empty word slots, not the no-text sentinel
        let text = store_rendering(&run);
        let _ = events.send(PipelineEvent::RunCompleted { run: run.id, text });
        return;
    }

    info!(run = %run.id, tasks = jobs.len(), "Dispatching classification tasks");
    for (word, ch, glyph) in jobs {
        let run = run.clone();
        let classifier = classifier.clone();
        let events = events.clone();
        tokio::task::spawn_blocking(move || {
            classify_one(run, classifier.as_ref(), &events, word, ch, glyph)
        });
    }
}

/// Detect words and extract one normalized glyph per usable character box.
/// Returns `None` when the detector finds nothing. A character whose crop
/// fails is skipped; its index stays assigned and its slot stays empty.
fn stage_characters(
    run: &RunState,
    detector: &dyn RegionDetector,
    preprocess: &PreprocessSettings,
    image: &DynamicImage,
) -> Result<Option<Vec<GlyphJob>>, VisionError> {
    let gray = vision::prepare_image(image, preprocess);
    let words = detector.detect(&gray)?;
    if words.is_empty() {
        return Ok(None);
    }

    run.aggregator.seed_words(words.len() as u32);

    let mut jobs = Vec::new();
    for (w, word) in words.iter().enumerate() {
        for (c, bx) in word.boxes.iter().enumerate() {
            match vision::extract_glyph(&gray, bx) {
                Ok(glyph) => jobs.push((w as WordIndex, c as CharIndex, glyph)),
                Err(err) => warn!(word = w, character = c, "Skipping character: {err}"),
            }
        }
    }
    Ok(Some(jobs))
}

/// One classification task: classify, record, re-render, notify
fn classify_one(
    run: Arc<RunState>,
    classifier: &dyn CharacterClassifier,
    events: &Sender<PipelineEvent>,
    word: WordIndex,
    ch: CharIndex,
    glyph: GrayImage,
) {
    if run.token.is_cancelled() {
        return;
    }

    match classifier.classify(&glyph) {
        Ok(label) => {
            // A late result of a superseded run stays out of the aggregate
            if run.token.is_cancelled() {
                return;
            }
            run.aggregator.record(word, ch, label);
        }
        // Task-local failure: the slot stays empty, siblings are unaffected
        Err(err) => debug!(word, character = ch, "No result for character: {err}"),
    }

    // Failures count as completions too, or the run would never finish.
    // The final completer renders after its increment, so it observes every
    // sibling's record and the final text is arrival-order independent.
    let done = run.completed.fetch_add(1, Ordering::SeqCst) + 1;
    let text = store_rendering(&run);

    if run.token.is_cancelled() {
        return;
    }
    if done == run.dispatched.load(Ordering::SeqCst) {
        info!(run = %run.id, "Run complete: \"{text}\"");
        let _ = events.send(PipelineEvent::RunCompleted { run: run.id, text });
    } else {
        let _ = events.send(PipelineEvent::TextUpdated { run: run.id, text });
    }
}

/// Render the current snapshot and store it as the run's latest text
fn store_rendering(run: &RunState) -> String {
    let mut rendered = run.rendered.lock();
    let text = assemble::render(&run.aggregator.snapshot());
    *rendered = text.clone();
    text
}

/// Terminal state for detector failure or zero regions
fn finish_empty(run: &RunState, events: &Sender<PipelineEvent>) {
    *run.rendered.lock() = NO_TEXT_MESSAGE.to_string();
    if !run.token.is_cancelled() {
        let _ = events.send(PipelineEvent::NoTextFound { run: run.id });
    }
}
