//! Formatting intents and range wrapping.
//!
//! A [`FormatIntent`] is a sparse bundle of formatting requests: any subset
//! of the inline toggles and values, a block alignment, a list kind, an
//! indent direction. The commit pipeline orchestrates bookmarking and
//! history; this module supplies the tree surgery.
//!
//! Inline formatting wraps the selected content in a new style wrapper.
//! Whether a range can be wrapped atomically is an explicit capability
//! query ([`wrap_shape`]): a range whose ends share a parent wraps in
//! place; a range straddling sibling subtrees is recovered by splitting the
//! boundary ancestors up to the common ancestor and wrapping the then-
//! contiguous children. The recovery is an ordinary branch, never an error
//! and never user-visible.

use crate::arena::{ListKind, NodeId, NodeKind, Tree};
use crate::style::StyleRecord;

/// Paragraph alignment choices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockAlignment {
    /// Default left alignment.
    Left,
    /// Centered.
    Center,
    /// Right-aligned.
    Right,
    /// Justified.
    Justify,
}

impl BlockAlignment {
    /// Canonical style value.
    pub fn as_css(self) -> &'static str {
        match self {
            BlockAlignment::Left => "left",
            BlockAlignment::Center => "center",
            BlockAlignment::Right => "right",
            BlockAlignment::Justify => "justify",
        }
    }
}

/// Direction for an indent intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndentDirection {
    /// Indent one level deeper.
    Increase,
    /// Outdent one level.
    Decrease,
}

/// A sparse formatting request. Defaults to "change nothing"; set the
/// fields that apply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormatIntent {
    /// Toggle bold weight across the selection.
    pub toggle_bold: bool,
    /// Toggle italic slant across the selection.
    pub toggle_italic: bool,
    /// Toggle underline across the selection.
    pub toggle_underline: bool,
    /// Toggle strike-through across the selection.
    pub toggle_strike: bool,
    /// Set the text color.
    pub color: Option<String>,
    /// Set the highlight/background color.
    pub background: Option<String>,
    /// Set the font family.
    pub font_family: Option<String>,
    /// Set the font size in pixels.
    pub font_size_px: Option<u32>,
    /// Set the enclosing block's alignment.
    pub alignment: Option<BlockAlignment>,
    /// Turn the selection into (or out of) a list of this kind.
    pub list: Option<ListKind>,
    /// Change the indent level.
    pub indent: Option<IndentDirection>,
}

impl FormatIntent {
    /// Bold toggle only.
    pub fn bold() -> Self {
        Self {
            toggle_bold: true,
            ..Self::default()
        }
    }

    /// Italic toggle only.
    pub fn italic() -> Self {
        Self {
            toggle_italic: true,
            ..Self::default()
        }
    }

    /// Underline toggle only.
    pub fn underline() -> Self {
        Self {
            toggle_underline: true,
            ..Self::default()
        }
    }

    /// True when no field is set.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// True when any inline (selection-wrapping) request is present.
    pub fn has_inline(&self) -> bool {
        self.toggle_bold
            || self.toggle_italic
            || self.toggle_underline
            || self.toggle_strike
            || self.color.is_some()
            || self.background.is_some()
            || self.font_family.is_some()
            || self.font_size_px.is_some()
    }
}

/// How a node range can be enclosed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WrapShape {
    /// Both ends share a parent; the range is a contiguous child slice.
    Atomic {
        parent: NodeId,
        start: usize,
        end: usize,
    },
    /// The ends live in different sibling subtrees of `ancestor`.
    Straddles { ancestor: NodeId },
}

/// Classify the inclusive node range `first..=last` for wrapping.
pub(crate) fn wrap_shape(tree: &Tree, first: NodeId, last: NodeId) -> Option<WrapShape> {
    let first_parent = tree.parent(first)?;
    let last_parent = tree.parent(last)?;
    if first_parent == last_parent {
        return Some(WrapShape::Atomic {
            parent: first_parent,
            start: tree.index_in_parent(first)?,
            end: tree.index_in_parent(last)?,
        });
    }
    Some(WrapShape::Straddles {
        ancestor: tree.common_ancestor(first_parent, last_parent)?,
    })
}

/// Enclose the inclusive node range `first..=last` in `wrapper` (a
/// detached node). `first` must precede `last` in document order.
///
/// Straddling ranges are recovered by splitting the ancestors at both
/// boundaries and wrapping the resulting contiguous children of the common
/// ancestor. Returns `false` (leaving `wrapper` detached and the tree
/// unchanged) only when a handle went stale underneath the caller.
pub(crate) fn wrap_range(tree: &mut Tree, first: NodeId, last: NodeId, wrapper: NodeId) -> bool {
    match wrap_shape(tree, first, last) {
        Some(WrapShape::Atomic { parent, start, end }) => {
            wrap_children(tree, parent, start, end, wrapper);
            true
        }
        Some(WrapShape::Straddles { ancestor }) => {
            let left = hoist_left(tree, first, ancestor);
            let right = hoist_right(tree, last, ancestor);
            let start = tree.index_in_parent(left).expect("child of ancestor");
            let end = tree.index_in_parent(right).expect("child of ancestor");
            wrap_children(tree, ancestor, start, end, wrapper);
            true
        }
        None => false,
    }
}

fn wrap_children(tree: &mut Tree, parent: NodeId, start: usize, end: usize, wrapper: NodeId) {
    let enclosed: Vec<NodeId> = tree.children(parent)[start..=end].to_vec();
    tree.insert_child(parent, start, wrapper);
    for node in enclosed {
        tree.append_child(wrapper, node);
    }
}

/// Split ancestors so that the subtree starting at `node` becomes a direct
/// child of `ancestor`; everything split off stays inside the range.
fn hoist_left(tree: &mut Tree, node: NodeId, ancestor: NodeId) -> NodeId {
    let mut current = node;
    while tree.parent(current) != Some(ancestor) {
        let parent = tree.parent(current).expect("below ancestor");
        let index = tree.index_in_parent(current).expect("indexed child");
        if index == 0 {
            current = parent;
            continue;
        }
        let tail_holder = tree.alloc_shallow_clone(parent);
        let grandparent = tree.parent(parent).expect("below ancestor");
        let parent_index = tree.index_in_parent(parent).expect("indexed child");
        tree.insert_child(grandparent, parent_index + 1, tail_holder);
        let tail: Vec<NodeId> = tree.children(parent)[index..].to_vec();
        for moved in tail {
            tree.append_child(tail_holder, moved);
        }
        current = tail_holder;
    }
    current
}

/// Mirror of [`hoist_left`] for the range's trailing boundary.
fn hoist_right(tree: &mut Tree, node: NodeId, ancestor: NodeId) -> NodeId {
    let mut current = node;
    while tree.parent(current) != Some(ancestor) {
        let parent = tree.parent(current).expect("below ancestor");
        let index = tree.index_in_parent(current).expect("indexed child");
        if index + 1 < tree.children(parent).len() {
            let tail_holder = tree.alloc_shallow_clone(parent);
            let grandparent = tree.parent(parent).expect("below ancestor");
            let parent_index = tree.index_in_parent(parent).expect("indexed child");
            tree.insert_child(grandparent, parent_index + 1, tail_holder);
            let tail: Vec<NodeId> = tree.children(parent)[index + 1..].to_vec();
            for moved in tail {
                tree.append_child(tail_holder, moved);
            }
        }
        current = parent;
    }
    current
}

/// Resolve the inline parts of an intent into the style record the new
/// wrapper should carry, reading the current effective formatting of the
/// text runs in the plain-text range `[start, end)`.
pub(crate) fn resolve_inline_style(
    tree: &Tree,
    intent: &FormatIntent,
    start: usize,
    end: usize,
) -> StyleRecord {
    let runs = tree.text_runs_in_range(start, end);
    let mut record = StyleRecord::new();

    if intent.toggle_bold {
        let all_bold = all_runs_have(tree, &runs, "font-weight", "bold");
        record.set("font-weight", if all_bold { "normal" } else { "bold" });
    }
    if intent.toggle_italic {
        let all_italic = all_runs_have(tree, &runs, "font-style", "italic");
        record.set("font-style", if all_italic { "normal" } else { "italic" });
    }
    if intent.toggle_underline || intent.toggle_strike {
        let mut tokens = common_decoration_tokens(tree, &runs);
        for (requested, token) in [
            (intent.toggle_underline, "underline"),
            (intent.toggle_strike, "line-through"),
        ] {
            if !requested {
                continue;
            }
            if tokens.iter().any(|t| t == token) {
                tokens.retain(|t| t != token);
            } else {
                tokens.push(token.to_string());
            }
        }
        if tokens.is_empty() {
            record.set("text-decoration-line", "none");
        } else {
            record.set("text-decoration-line", &tokens.join(" "));
        }
    }
    if let Some(color) = &intent.color {
        record.set("color", color);
    }
    if let Some(background) = &intent.background {
        record.set("background-color", background);
    }
    if let Some(family) = &intent.font_family {
        record.set("font-family", family);
    }
    if let Some(px) = intent.font_size_px {
        record.set("font-size", &format!("{px}px"));
    }
    record
}

fn all_runs_have(tree: &Tree, runs: &[NodeId], prop: &str, value: &str) -> bool {
    !runs.is_empty()
        && runs
            .iter()
            .all(|&run| tree.effective_style(run, prop).as_deref() == Some(value))
}

/// Decoration tokens in effect on every run of the selection.
fn common_decoration_tokens(tree: &Tree, runs: &[NodeId]) -> Vec<String> {
    let mut common: Option<Vec<String>> = None;
    for &run in runs {
        let tokens: Vec<String> = tree
            .effective_style(run, "text-decoration-line")
            .map(|v| {
                v.split_whitespace()
                    .filter(|t| *t != "none")
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        common = Some(match common {
            None => tokens,
            Some(existing) => existing.into_iter().filter(|t| tokens.contains(t)).collect(),
        });
    }
    common.unwrap_or_default()
}

/// Set the alignment of the block enclosing `node`. A document with no
/// block structure first gains one block around its whole content, so the
/// alignment survives serialization.
pub(crate) fn apply_alignment(tree: &mut Tree, node: NodeId, alignment: BlockAlignment) {
    let mut current = Some(node);
    while let Some(id) = current {
        if matches!(tree.node(id).kind, NodeKind::Block | NodeKind::ListItem) {
            tree.node_mut(id).style.set("text-align", alignment.as_css());
            return;
        }
        current = tree.parent(id);
    }
    let root = tree.root();
    let block = tree.alloc(NodeKind::Block);
    let content: Vec<NodeId> = tree.children(root).to_vec();
    for child in content {
        tree.append_child(block, child);
    }
    tree.append_child(root, block);
    tree.node_mut(block)
        .style
        .set("text-align", alignment.as_css());
}
