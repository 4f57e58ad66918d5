//! The commit pipeline.
//!
//! One [`EditorSurface`] binds one live tree to one host for the lifetime
//! of one editable surface. It is the only component that talks to all the
//! others: raw input is debounced into plain commits; explicit operations
//! (formatting, links, paste, undo/redo) commit synchronously through the
//! bookmark-normalize-restore sequence; every commit lands in history and
//! is reported to the owner as plain text plus serialized markup.
//!
//! # States
//!
//! - **Idle** — no uncommitted local mutation.
//! - **Editing** — raw input arrived; the debounce timer is pending. Every
//!   further input cancels and restarts it.
//! - **Committing** — transient, while a commit is being finalized.
//!
//! Undo and redo are honored only from Idle: a pending debounced edit is
//! *flushed* into history first, so the edit the user can see on screen is
//! the edit an undo reverts.
//!
//! # Snapshot discipline
//!
//! Debounced typing commits record the post-burst snapshot (the platform
//! already mutated the tree; there is nothing earlier to capture); the
//! pre-burst state is recorded at the Idle → Editing transition, where
//! push deduplication makes it free for consecutive bursts. Structural
//! commits record the pre-mutation snapshot with the selection bookmark
//! embedded, then the post-mutation snapshot.
//! [`History::undo`] skips a popped entry identical to the live document,
//! which makes one undo visibly revert exactly one step under both
//! disciplines.

use crate::arena::{Caret, NodeId, NodeKind, SelectionRange, Tree};
use crate::bookmark;
use crate::error::EngineError;
use crate::format::{self, FormatIntent};
use crate::history::{History, HistoryEntry};
use crate::host::EditHost;
use crate::link::{self, ClickPoint, LinkTarget, Navigation};
use crate::markup;
use crate::normalize::normalize;
use crate::sanitize;
use crate::scheduler::{Scheduler, TimerId, TimerKind};
use std::time::Duration;

/// Per-surface configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SurfaceOptions {
    /// Quiet period after the last raw input before a typing commit.
    pub debounce: Duration,
    /// Delay after pointer-up before the host selection is read.
    pub settle: Duration,
    /// Grace window after blur during which an external formatting control
    /// can cancel finalization.
    pub blur_grace: Duration,
    /// Suppress paragraph-break input entirely (titles, table names).
    pub single_line: bool,
}

impl Default for SurfaceOptions {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(300),
            settle: Duration::from_millis(10),
            blur_grace: Duration::from_millis(200),
            single_line: false,
        }
    }
}

impl SurfaceOptions {
    /// A single-line surface with default timings.
    pub fn single_line() -> Self {
        Self {
            single_line: true,
            ..Self::default()
        }
    }
}

/// Pipeline state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    /// No uncommitted mutation.
    Idle,
    /// A raw-input burst is pending its debounced commit.
    Editing,
    /// A commit is being finalized (transient).
    Committing,
}

/// Events raised to the owner.
#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceEvent {
    /// A mutation was committed (debounced or explicit).
    Committed {
        /// Document content as plain text.
        plain_text: String,
        /// Document content as canonical markup.
        markup: String,
    },
    /// A link was activated; the owner decides how to navigate.
    Navigate(Navigation),
}

/// Owner callback type.
pub type SurfaceCallback = Box<dyn FnMut(&SurfaceEvent) + Send>;

/// Keys the pipeline recognizes beyond ordinary input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    /// A character key.
    Char(char),
    /// The paragraph-break key.
    Enter,
}

/// One keyboard event as reported by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyInput {
    /// The key itself.
    pub key: Key,
    /// Control (or platform command) modifier held.
    pub ctrl: bool,
    /// Shift modifier held.
    pub shift: bool,
}

impl KeyInput {
    /// A Ctrl+key chord.
    pub fn ctrl(key: char) -> Self {
        Self {
            key: Key::Char(key),
            ctrl: true,
            shift: false,
        }
    }

    /// A Ctrl+Shift+key chord.
    pub fn ctrl_shift(key: char) -> Self {
        Self {
            key: Key::Char(key),
            ctrl: true,
            shift: true,
        }
    }
}

/// One editable surface: the state machine gluing tree, history,
/// bookmarks, sanitizer, and host together.
pub struct EditorSurface<H: EditHost, S: Scheduler> {
    tree: Tree,
    history: History,
    host: H,
    scheduler: S,
    options: SurfaceOptions,
    state: PipelineState,
    debounce_timer: Option<TimerId>,
    settle_timer: Option<TimerId>,
    blur_timer: Option<TimerId>,
    saved_selection: Option<SelectionRange>,
    settled_selection: Option<SelectionRange>,
    callbacks: Vec<SurfaceCallback>,
    targets: Vec<LinkTarget>,
    version: u64,
    focused: bool,
    /// Serialized state as of the last commit (or load). Seeds history at
    /// the Idle → Editing transition: by the time raw input is reported,
    /// the host has already mutated the tree, so the pre-burst state must
    /// come from here, not from a fresh serialization.
    last_committed: String,
}

impl<H: EditHost, S: Scheduler> EditorSurface<H, S> {
    /// Create an empty surface.
    pub fn new(host: H, scheduler: S) -> Self {
        Self {
            tree: Tree::new(),
            history: History::new(),
            host,
            scheduler,
            options: SurfaceOptions::default(),
            state: PipelineState::Idle,
            debounce_timer: None,
            settle_timer: None,
            blur_timer: None,
            saved_selection: None,
            settled_selection: None,
            callbacks: Vec::new(),
            targets: Vec::new(),
            version: 0,
            focused: false,
            last_committed: String::new(),
        }
    }

    /// Create a surface over existing content. The content is normalized
    /// on load; no history entry and no owner notification is produced.
    pub fn from_markup(content: &str, host: H, scheduler: S) -> Self {
        let mut surface = Self::new(host, scheduler);
        let root = surface.tree.root();
        markup::parse_into(&mut surface.tree, root, content);
        normalize(&mut surface.tree, root);
        surface.last_committed = markup::serialize(&surface.tree);
        surface
    }

    /// Replace the surface options.
    pub fn set_options(&mut self, options: SurfaceOptions) {
        self.options = options;
    }

    /// Current options.
    pub fn options(&self) -> &SurfaceOptions {
        &self.options
    }

    /// Subscribe to owner events. All subscribers see every event.
    pub fn subscribe(&mut self, callback: impl FnMut(&SurfaceEvent) + Send + 'static) {
        self.callbacks.push(Box::new(callback));
    }

    /// Supply the link targets shown by the link picker. The engine only
    /// displays these; it validates nothing about them.
    pub fn set_targets(&mut self, targets: Vec<LinkTarget>) {
        self.targets = targets;
    }

    /// The owner-supplied link targets.
    pub fn targets(&self) -> &[LinkTarget] {
        &self.targets
    }

    /// The live tree.
    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    /// Mutable access to the live tree for the host's own text edits
    /// (typing, deletion). Callers must follow mutations with
    /// [`EditorSurface::notify_input`] so the commit machinery runs.
    pub fn tree_mut(&mut self) -> &mut Tree {
        &mut self.tree
    }

    /// The host capability object.
    pub fn host(&self) -> &H {
        &self.host
    }

    /// Mutable host access.
    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    /// Mutable scheduler access (hosts drive time through this).
    pub fn scheduler_mut(&mut self) -> &mut S {
        &mut self.scheduler
    }

    /// Serialized canonical markup of the current document.
    pub fn markup(&self) -> String {
        markup::serialize(&self.tree)
    }

    /// Plain text of the current document.
    pub fn plain_text(&self) -> String {
        self.tree.plain_text()
    }

    /// Current pipeline state.
    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Number of commits since creation.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// True when at least one undo step is available.
    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    /// True when at least one redo step is available.
    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    /// Whether the surface currently holds focus.
    pub fn is_focused(&self) -> bool {
        self.focused
    }

    // ------------------------------------------------------------------
    // Raw input and timers
    // ------------------------------------------------------------------

    /// Report a raw input event (the host already mutated the tree). Moves
    /// Idle → Editing and (re)starts the debounce timer.
    pub fn notify_input(&mut self) {
        if self.state == PipelineState::Idle {
            // Record the pre-burst state so this burst is undoable; the
            // dedup in `History::push` makes this free when the state is
            // already on top of the stack.
            self.history.push(self.last_committed.clone(), None);
        }
        self.state = PipelineState::Editing;
        if let Some(timer) = self.debounce_timer.take() {
            self.scheduler.cancel(timer);
        }
        self.debounce_timer = Some(
            self.scheduler
                .schedule(TimerKind::CommitDebounce, self.options.debounce),
        );
    }

    /// Deliver a timer expiry. Stale identifiers are ignored.
    pub fn timer_fired(&mut self, id: TimerId) {
        if self.debounce_timer == Some(id) {
            self.debounce_timer = None;
            if self.state == PipelineState::Editing {
                self.commit_plain();
            }
        } else if self.settle_timer == Some(id) {
            self.settle_timer = None;
            self.settled_selection = self.host.selection(&self.tree);
        } else if self.blur_timer == Some(id) {
            self.blur_timer = None;
            self.finalize_blur();
        }
    }

    /// Report pointer-up. The host selection is read only after a short
    /// settle delay, once the platform's own selection state is stable.
    pub fn pointer_up(&mut self) {
        if let Some(timer) = self.settle_timer.take() {
            self.scheduler.cancel(timer);
        }
        self.settle_timer = Some(
            self.scheduler
                .schedule(TimerKind::PointerSettle, self.options.settle),
        );
    }

    /// Report focus gained.
    pub fn focus_gained(&mut self) {
        self.focused = true;
        if let Some(timer) = self.blur_timer.take() {
            self.scheduler.cancel(timer);
        }
    }

    /// Report focus lost. Finalization is deferred by a grace window so a
    /// click on an external formatting control can cancel it.
    pub fn blur(&mut self) {
        self.saved_selection = self.active_selection();
        if let Some(timer) = self.blur_timer.take() {
            self.scheduler.cancel(timer);
        }
        self.blur_timer = Some(
            self.scheduler
                .schedule(TimerKind::BlurGrace, self.options.blur_grace),
        );
    }

    /// Report a pointer interaction with an external editing control
    /// during the blur grace window: focus and the saved selection are
    /// restored instead of finalizing the blur.
    pub fn external_control_interaction(&mut self) {
        let Some(timer) = self.blur_timer.take() else {
            return;
        };
        self.scheduler.cancel(timer);
        self.host.focus();
        self.focused = true;
        if let Some(range) = self.saved_selection
            && self.tree.contains(range.anchor.node)
            && self.tree.contains(range.focus.node)
        {
            self.host.set_selection(&self.tree, range);
        }
    }

    fn finalize_blur(&mut self) {
        self.flush_pending();
        self.focused = false;
    }

    // ------------------------------------------------------------------
    // Keyboard surface
    // ------------------------------------------------------------------

    /// Recognize editor shortcuts. Returns whether the event was consumed
    /// (the host must then suppress its default effect).
    pub fn key_input(&mut self, input: &KeyInput) -> bool {
        if input.key == Key::Enter {
            // Single-line surfaces accept no paragraph breaks at all.
            return self.options.single_line;
        }
        if !input.ctrl {
            return false;
        }
        let Key::Char(ch) = input.key else {
            return false;
        };
        match ch.to_ascii_lowercase() {
            'z' if input.shift => self.redo(),
            'z' => self.undo(),
            'y' => self.redo(),
            'b' => self.apply_format(&FormatIntent::bold()),
            'i' => self.apply_format(&FormatIntent::italic()),
            'u' => self.apply_format(&FormatIntent::underline()),
            _ => return false,
        }
        true
    }

    // ------------------------------------------------------------------
    // Explicit operations
    // ------------------------------------------------------------------

    /// Apply a formatting intent.
    ///
    /// Block alignment commits without normalization (nothing was
    /// restructured). List/indent intents run the host's native primitive
    /// and commit with bookmark-preserving normalization. Inline intents
    /// require a non-collapsed selection; with a collapsed one they are a
    /// no-op, not an error.
    pub fn apply_format(&mut self, intent: &FormatIntent) {
        if intent.is_empty() {
            return;
        }
        self.flush_pending();

        if let Some(alignment) = intent.alignment
            && let Some(range) = self.active_selection()
        {
            format::apply_alignment(&mut self.tree, range.anchor.node, alignment);
            self.commit_plain();
        }

        if (intent.list.is_some() || intent.indent.is_some())
            && let Some(range) = self.active_selection()
        {
            let list = intent.list;
            let indent = intent.indent;
            self.commit_structural(range, false, move |tree, host, _first, _last| {
                let mut changed = false;
                if let Some(kind) = list {
                    changed |= host.apply_list(tree, range, kind);
                }
                if let Some(direction) = indent {
                    changed |= host.change_indent(tree, range, direction);
                }
                if !changed {
                    log::debug!("format: host list/indent primitive changed nothing");
                }
            });
        }

        if intent.has_inline() {
            let Some(range) = self.active_selection() else {
                return;
            };
            if range.is_collapsed() {
                return;
            }
            let (Some(a), Some(b)) = (
                self.tree.caret_to_text_offset(range.anchor),
                self.tree.caret_to_text_offset(range.focus),
            ) else {
                return;
            };
            let (start, end) = (a.min(b), a.max(b));
            let record = format::resolve_inline_style(&self.tree, intent, start, end);
            if record.is_empty() {
                return;
            }
            self.commit_structural(range, false, move |tree, _host, first, last| {
                let wrapper = tree.alloc(NodeKind::Span);
                tree.node_mut(wrapper).style = record;
                format::wrap_range(tree, first, last, wrapper);
            });
        }
    }

    /// Capture the selection for a link operation and return the targets
    /// for the picker. Called when the link affordance opens, because the
    /// affordance itself may steal the active selection.
    pub fn open_link_picker(&mut self) -> &[LinkTarget] {
        self.saved_selection = self
            .active_selection()
            .filter(|range| !range.is_collapsed());
        &self.targets
    }

    /// Wrap the saved selection in a link to `target`.
    pub fn apply_link(&mut self, target: &LinkTarget) -> Result<(), EngineError> {
        self.flush_pending();
        let range = self
            .saved_selection
            .take()
            .or_else(|| self.active_selection())
            .ok_or(EngineError::NoSelection)?;
        if !self.tree.contains(range.anchor.node) || !self.tree.contains(range.focus.node) {
            return Err(EngineError::StaleNode);
        }
        if range.is_collapsed() {
            return Err(EngineError::CollapsedSelection);
        }
        let target = target.clone();
        self.commit_structural(range, false, move |tree, _host, first, last| {
            let node = link::make_link_node(tree, &target);
            format::wrap_range(tree, first, last, node);
        });
        Ok(())
    }

    /// Remove the link enclosing the current caret, promoting its children
    /// in place.
    pub fn remove_link(&mut self) -> Result<(), EngineError> {
        self.flush_pending();
        let range = self.active_selection().ok_or(EngineError::NoSelection)?;
        let link_node = link::find_enclosing_link(&self.tree, range.anchor.node)
            .ok_or(EngineError::NoEnclosingLink)?;
        self.commit_structural(range, false, move |tree, _host, _first, _last| {
            if tree.contains(link_node) {
                link::unwrap_link(tree, link_node);
            }
        });
        Ok(())
    }

    /// Handle a pointer click that landed on or inside `at`. When a link
    /// encloses the position, a [`SurfaceEvent::Navigate`] is raised and
    /// `true` is returned — the host must then suppress its default
    /// navigation.
    pub fn link_click(&mut self, at: NodeId, point: ClickPoint) -> bool {
        match link::resolve_click(&self.tree, at, point) {
            Some(navigation) => {
                let event = SurfaceEvent::Navigate(navigation);
                for callback in &mut self.callbacks {
                    callback(&event);
                }
                true
            }
            None => false,
        }
    }

    /// Insert external clipboard content at the selection (replacing it
    /// when non-collapsed), sanitized per the paste policy.
    pub fn paste(&mut self, rich: Option<&str>, plain: &str) {
        self.flush_pending();
        let range = self.active_selection().unwrap_or_else(|| self.end_caret());
        let mut fragment = sanitize::sanitize(rich, plain);
        if self.options.single_line {
            sanitize::flatten_to_single_line(&mut fragment);
        }
        self.commit_structural(range, true, move |tree, _host, first, last| {
            if first != last {
                delete_between(tree, first, last);
            }
            let Some(parent) = tree.parent(last) else {
                return;
            };
            let mut index = tree.index_in_parent(last).expect("indexed child");
            let roots: Vec<NodeId> = fragment.children(fragment.root()).to_vec();
            for node in roots {
                if let Some(copy) = tree.adopt_from(&fragment, node) {
                    tree.insert_child(parent, index, copy);
                    index += 1;
                }
            }
        });
    }

    /// Undo one step. A pending debounced edit is flushed first; an empty
    /// stack is a no-op.
    pub fn undo(&mut self) {
        self.flush_pending();
        let live = markup::serialize(&self.tree);
        let Some(entry) = self.history.undo(live) else {
            return;
        };
        self.apply_history_entry(entry);
    }

    /// Redo one step; mirror of [`EditorSurface::undo`].
    pub fn redo(&mut self) {
        self.flush_pending();
        let live = markup::serialize(&self.tree);
        let Some(entry) = self.history.redo(live) else {
            return;
        };
        self.apply_history_entry(entry);
    }

    /// Drop all history. Called around destructive owner-side operations
    /// that must not be undoable through this engine.
    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    // ------------------------------------------------------------------
    // Commit internals
    // ------------------------------------------------------------------

    /// The selection to operate on: the live host selection, else the last
    /// settled one if its handles survived.
    fn active_selection(&self) -> Option<SelectionRange> {
        self.host.selection(&self.tree).or_else(|| {
            self.settled_selection.filter(|range| {
                self.tree.contains(range.anchor.node) && self.tree.contains(range.focus.node)
            })
        })
    }

    fn end_caret(&self) -> SelectionRange {
        let root = self.tree.root();
        SelectionRange::caret(Caret::new(root, self.tree.children(root).len()))
    }

    /// Flush a pending debounced edit into history, resolving the Editing
    /// state before an explicit operation proceeds.
    fn flush_pending(&mut self) {
        if let Some(timer) = self.debounce_timer.take() {
            self.scheduler.cancel(timer);
        }
        if self.state == PipelineState::Editing {
            self.commit_plain();
        }
    }

    /// Commit without normalization: plain typing (and block alignment)
    /// does not restructure nodes, so no cursor preservation is needed.
    fn commit_plain(&mut self) {
        self.state = PipelineState::Committing;
        let markup = markup::serialize(&self.tree);
        self.history.push(markup.clone(), None);
        self.last_committed = markup.clone();
        self.emit_committed(markup);
        self.state = PipelineState::Idle;
    }

    /// Commit a structural mutation: bookmark the selection, mutate,
    /// normalize, record pre- and post-state, restore the selection.
    fn commit_structural<F>(&mut self, range: SelectionRange, collapse_to_end: bool, mutate: F)
    where
        F: FnOnce(&mut Tree, &mut H, NodeId, NodeId),
    {
        self.state = PipelineState::Committing;
        let saved = bookmark::save(&mut self.tree, range);
        let pre = markup::serialize(&self.tree);

        let anchor_node = self
            .tree
            .find_marker(saved.anchor)
            .expect("marker just inserted");
        let (first, last) = match saved.focus.and_then(|id| self.tree.find_marker(id)) {
            Some(focus_node) => {
                if bookmark::node_path(&self.tree, anchor_node)
                    <= bookmark::node_path(&self.tree, focus_node)
                {
                    (anchor_node, focus_node)
                } else {
                    (focus_node, anchor_node)
                }
            }
            None => (anchor_node, anchor_node),
        };

        mutate(&mut self.tree, &mut self.host, first, last);

        let root = self.tree.root();
        normalize(&mut self.tree, root);
        self.history.push(pre, Some(saved));

        match bookmark::restore(&mut self.tree, &saved) {
            Some(mut selection) => {
                if collapse_to_end {
                    let anchor_at = self.tree.caret_to_text_offset(selection.anchor);
                    let focus_at = self.tree.caret_to_text_offset(selection.focus);
                    let end = if anchor_at > focus_at {
                        selection.anchor
                    } else {
                        selection.focus
                    };
                    selection = SelectionRange::caret(end);
                }
                self.host.set_selection(&self.tree, selection);
            }
            None => log::warn!("commit: bookmark restore skipped; cursor left as-is"),
        }

        let post = markup::serialize(&self.tree);
        self.history.push(post.clone(), None);
        self.last_committed = post.clone();
        self.emit_committed(post);
        self.state = PipelineState::Idle;
    }

    fn apply_history_entry(&mut self, entry: HistoryEntry) {
        self.state = PipelineState::Committing;
        let root = self.tree.root();
        self.tree.clear_children(root);
        markup::parse_into(&mut self.tree, root, &entry.markup);
        if let Some(saved) = entry.bookmark
            && let Some(selection) = bookmark::restore(&mut self.tree, &saved)
        {
            self.host.set_selection(&self.tree, selection);
        }
        strip_markers(&mut self.tree);
        let markup = markup::serialize(&self.tree);
        self.last_committed = markup.clone();
        self.emit_committed(markup);
        self.state = PipelineState::Idle;
    }

    fn emit_committed(&mut self, markup: String) {
        self.version += 1;
        let plain_text = self.tree.plain_text();
        log::debug!(
            "commit v{}: {} chars, {} markup bytes",
            self.version,
            plain_text.chars().count(),
            markup.len()
        );
        let event = SurfaceEvent::Committed { plain_text, markup };
        for callback in &mut self.callbacks {
            callback(&event);
        }
    }
}

/// Remove the content strictly between two adjacent-to-be markers,
/// leaving the markers themselves in place.
fn delete_between(tree: &mut Tree, first: NodeId, last: NodeId) {
    let holder = tree.alloc(NodeKind::Span);
    if !format::wrap_range(tree, first, last, holder) {
        return;
    }
    let children: Vec<NodeId> = tree.children(holder).to_vec();
    for child in children {
        if child != first && child != last {
            tree.remove(child);
        }
    }
    tree.unwrap_node(holder);
}

fn strip_markers(tree: &mut Tree) {
    let markers: Vec<NodeId> = tree
        .descendants(tree.root())
        .into_iter()
        .filter(|&id| tree.node(id).is_marker())
        .collect();
    for marker in markers {
        tree.remove(marker);
    }
}
