//! Engine error surface.
//!
//! Almost everything in this engine fails soft (skipped restores, degraded
//! paste content, no-op undo); [`EngineError`] covers the few operations
//! where the *caller* holds up their end of a contract — a link cannot be
//! applied without a saved selection, a handle must still be live.

use thiserror::Error;

/// Errors surfaced to the embedding owner.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("no saved selection to operate on")]
    /// The operation needs a selection and none was saved or available.
    NoSelection,

    #[error("selection is collapsed")]
    /// The operation needs a non-collapsed range.
    CollapsedSelection,

    #[error("no enclosing link at the caret")]
    /// Link removal was requested outside any link node.
    NoEnclosingLink,

    #[error("stale node handle")]
    /// A handle addressed a node that no longer exists.
    StaleNode,
}
