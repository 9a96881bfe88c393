//! Text assembly
//!
//! Deterministic reduction of an aggregate snapshot into the reading-order
//! string. Pure and idempotent: the pipeline re-renders the whole string on
//! every completion, and a growing snapshot only ever extends the output.

use super::aggregate::Snapshot;

/// Rendered in place of text when nothing was detected
pub const NO_TEXT_MESSAGE: &str = "The image does not contain any text.";

/// Render a snapshot into the current best text.
///
/// Words in ascending word order, characters concatenated in ascending
/// character order, words joined by single spaces. A character slot that has
/// no label yet is silently closed over rather than shown as a placeholder.
/// An empty snapshot renders the no-text sentinel.
pub fn render(snapshot: &Snapshot) -> String {
    if snapshot.is_empty() {
        return NO_TEXT_MESSAGE.to_string();
    }

    snapshot
        .values()
        .map(|chars| chars.values().map(String::as_str).collect::<String>())
        .collect::<Vec<_>>()
        .join(" ")
}
