#![warn(missing_docs)]
//! Rich Text Core - Headless Rich-Text Editing Engine
//!
//! # Overview
//!
//! `richtext-core` is the editing engine behind structured-document
//! authoring surfaces: titles, descriptions, table cells, table names. It
//! owns a live formatted-text tree and keeps it in one canonical shape
//! while the user types, pastes, formats, links, and undoes. It does not
//! render and it does not persist; the embedding owner receives committed
//! snapshots (plain text + serialized markup) and decides what to do with
//! them.
//!
//! # Core Features
//!
//! - **Arena Tree**: generational handles, stale-detectable across edits
//! - **Canonicalization**: legacy tag conversion, wrapper merge/flatten,
//!   idempotent normalization after every structural mutation
//! - **Selection Bookmarks**: cursor survives restructuring, fails soft
//! - **Bounded History**: 50 snapshots, dedup, redo invalidation
//! - **Paste Sanitizer**: foreign clipboard content arrives canonical
//! - **Hyperlinks**: redundant target encoding, owner-driven navigation
//! - **Commit Pipeline**: debounced typing commits, synchronous explicit
//!   commits, blur grace, pointer settle
//!
//! # Architecture Layers
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │  EditorSurface (commit pipeline)            │  ← Public API
//! ├─────────────────────────────────────────────┤
//! │  Format / Link / Sanitize operations        │  ← Explicit edits
//! ├─────────────────────────────────────────────┤
//! │  History & Selection Bookmarks              │  ← Undo + cursor
//! ├─────────────────────────────────────────────┤
//! │  Normalizer & Style Canonicalizer           │  ← Canonical shape
//! ├─────────────────────────────────────────────┤
//! │  Arena Tree & Markup                        │  ← Storage + wire form
//! └─────────────────────────────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```rust
//! use richtext_core::{EditorSurface, HeadlessHost, ManualScheduler};
//!
//! let mut surface = EditorSurface::from_markup(
//!     "<b>Opening</b> lead",
//!     HeadlessHost::new(),
//!     ManualScheduler::new(),
//! );
//!
//! // Legacy markup was canonicalized on load.
//! assert_eq!(
//!     surface.markup(),
//!     "<span style=\"font-weight: bold\">Opening</span> lead"
//! );
//! assert_eq!(surface.plain_text(), "Opening lead");
//!
//! // The owner hears about every committed mutation.
//! surface.subscribe(|event| {
//!     println!("committed: {event:?}");
//! });
//! ```
//!
//! # Ownership Model
//!
//! One [`EditorSurface`] exclusively owns one tree and one [`EditHost`]
//! for the lifetime of one editable surface. Everything is
//! single-threaded and event-driven; the only delays are three
//! cancellable single-shot timers ([`scheduler`]). Ambient platform state
//! (the current selection, native list/indent primitives) is injected
//! through [`EditHost`], never read from a global, so independent
//! surfaces coexist without cross-talk.
//!
//! # Module Description
//!
//! - [`arena`] - arena-backed node tree and caret addressing
//! - [`style`] - style record canonicalization
//! - [`normalize`] - tree canonicalization
//! - [`bookmark`] - selection bookmarks across structural edits
//! - [`history`] - bounded undo/redo snapshots
//! - [`markup`] - serialization and tolerant parsing
//! - [`sanitize`] - paste sanitization
//! - [`format`] - formatting intents and range wrapping
//! - [`link`] - hyperlink lifecycle
//! - [`scheduler`] - cancellable single-shot timers
//! - [`host`] - injected platform capabilities
//! - [`pipeline`] - the commit pipeline state machine

pub mod arena;
pub mod bookmark;
mod error;
pub mod format;
pub mod history;
pub mod host;
pub mod link;
pub mod markup;
pub mod normalize;
pub mod pipeline;
pub mod sanitize;
pub mod scheduler;
pub mod style;

pub use arena::{
    Caret, LegacyTag, ListKind, MarkerId, Node, NodeId, NodeKind, SelectionRange, Tree,
};
pub use bookmark::Bookmark;
pub use error::EngineError;
pub use format::{BlockAlignment, FormatIntent, IndentDirection};
pub use history::{History, HistoryEntry, MAX_UNDO_ENTRIES};
pub use host::{EditHost, HeadlessHost};
pub use link::{ClickPoint, LinkMode, LinkTarget, Navigation};
pub use pipeline::{
    EditorSurface, Key, KeyInput, PipelineState, SurfaceCallback, SurfaceEvent, SurfaceOptions,
};
pub use scheduler::{ManualScheduler, Scheduler, TimerId, TimerKind};
pub use style::{StyleRecord, styles_equal};
