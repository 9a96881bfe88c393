//! Pipeline notifications
//!
//! Events emitted toward the caller (CLI, UI shell) over a crossbeam channel.
//! Every event carries the id of the run that produced it so stale events
//! from a superseded run can be ignored.

use std::fmt;

use uuid::Uuid;

/// Identifier of one recognition run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RunId(Uuid);

impl RunId {
    /// Allocate a fresh run id
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Messages sent from the pipeline to its caller
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    /// A classification completed and the current best text changed
    TextUpdated {
        /// Run that produced the update
        run: RunId,
        /// Current best rendering
        text: String,
    },
    /// All dispatched classifications for the run have completed
    RunCompleted {
        /// Run that finished
        run: RunId,
        /// Final rendering
        text: String,
    },
    /// The detector found no text, or failed outright
    NoTextFound {
        /// Run that terminated empty
        run: RunId,
    },
}

impl PipelineEvent {
    /// Id of the run this event belongs to
    pub fn run(&self) -> RunId {
        match self {
            Self::TextUpdated { run, .. }
            | Self::RunCompleted { run, .. }
            | Self::NoTextFound { run } => *run,
        }
    }
}
