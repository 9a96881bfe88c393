//! Classification result aggregation
//!
//! The one piece of shared mutable state in the pipeline. Classification
//! tasks complete in arbitrary order; the aggregator records each label under
//! its (word, character) key behind a mutex, and hands out consistent copies
//! for rendering. Ordered keys come for free from the BTreeMap levels.

use std::collections::BTreeMap;

use parking_lot::Mutex;

/// Position of a word in reading order, 0-based
pub type WordIndex = u32;
/// Position of a character within its word, 0-based
pub type CharIndex = u32;

/// Point-in-time copy of the aggregate, safe to read without any lock.
/// Iteration is in ascending key order at both levels.
pub type Snapshot = BTreeMap<WordIndex, BTreeMap<CharIndex, String>>;

/// Thread-safe sink for out-of-order classification results.
///
/// `record` is the sole write path and is serialized; `snapshot` may run
/// concurrently with writes and always observes whole records, never a
/// partially-applied one. One aggregator lives exactly as long as its run.
#[derive(Debug, Default)]
pub struct Aggregator {
    state: Mutex<Snapshot>,
}

impl Aggregator {
    /// Create an empty aggregator for a new run
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-register `count` words as empty slots. A word whose every
    /// character fails classification still renders as an empty slot
    /// instead of collapsing the whole result to the no-text sentinel.
    pub fn seed_words(&self, count: u32) {
        let mut state = self.state.lock();
        for w in 0..count {
            state.entry(w).or_default();
        }
    }

    /// Record one classified character. Recording the same (word, character)
    /// pair twice overwrites, which is tolerated but never expected within
    /// a run.
    pub fn record(&self, word: WordIndex, ch: CharIndex, label: String) {
        let mut state = self.state.lock();
        state.entry(word).or_default().insert(ch, label);
    }

    /// Consistent copy of the current aggregate
    pub fn snapshot(&self) -> Snapshot {
        self.state.lock().clone()
    }
}
