//! Selection bookmarks.
//!
//! A structural mutation (formatting, link insertion, paste, undo/redo) can
//! strand a selection that is expressed in node handles: the nodes it
//! anchored into may be split, merged, or rebuilt. A bookmark protects the
//! selection across such a mutation by embedding transient, zero-width
//! marker nodes at the logical boundaries; the markers ride through the
//! mutation (the normalizer leaves them alone), serialize into history
//! snapshots, and are consumed immediately afterwards to re-derive an
//! equivalent selection.
//!
//! Restoration fails soft: when an intervening edit destroyed a marker, the
//! selection simply does not move.

use crate::arena::{Caret, MarkerId, NodeId, NodeKind, SelectionRange, Tree};

/// Marker identities protecting one selection: one for a collapsed caret,
/// two for a range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bookmark {
    /// Marker at the selection anchor.
    pub anchor: MarkerId,
    /// Marker at the selection focus; `None` for a collapsed selection.
    pub focus: Option<MarkerId>,
}

/// Embed marker nodes at the boundaries of `range`.
///
/// Boundaries inside a text run split the run (grapheme-safe); the deeper/
/// later boundary is inserted first so the earlier one is not displaced by
/// the split.
pub fn save(tree: &mut Tree, range: SelectionRange) -> Bookmark {
    if range.is_collapsed() {
        let anchor = tree.new_marker_id();
        insert_marker(tree, range.anchor, anchor);
        return Bookmark {
            anchor,
            focus: None,
        };
    }

    let anchor = tree.new_marker_id();
    let focus = tree.new_marker_id();
    if caret_path(tree, range.anchor) <= caret_path(tree, range.focus) {
        insert_marker(tree, range.focus, focus);
        insert_marker(tree, range.anchor, anchor);
    } else {
        insert_marker(tree, range.anchor, anchor);
        insert_marker(tree, range.focus, focus);
    }
    Bookmark {
        anchor,
        focus: Some(focus),
    }
}

/// Consume the bookmark's markers and return the selection they protected.
///
/// Returns `None` when no marker survived. When exactly one marker of a
/// range survived, the result collapses to it rather than failing.
pub fn restore(tree: &mut Tree, bookmark: &Bookmark) -> Option<SelectionRange> {
    let anchor_node = tree.find_marker(bookmark.anchor);
    let focus_node = bookmark.focus.and_then(|id| tree.find_marker(id));

    match (anchor_node, focus_node) {
        (Some(anchor), Some(focus)) => {
            // Consume in descending document order so the first removal
            // cannot displace the position captured for the second.
            let (first, second, anchor_is_first) =
                if node_path(tree, anchor) <= node_path(tree, focus) {
                    (focus, anchor, false)
                } else {
                    (anchor, focus, true)
                };
            let mut first_pos = consume_marker(tree, first)?;
            let second_pos = consume_marker(tree, second)?;
            // A removal below the first position in the same parent shifts
            // its boundary left by one.
            if second_pos.0 == first_pos.0 && second_pos.1 < first_pos.1 {
                first_pos.1 -= 1;
            }
            let first_caret = settle_caret(tree, first_pos);
            let second_caret = settle_caret(tree, second_pos);
            let (anchor_caret, focus_caret) = if anchor_is_first {
                (first_caret, second_caret)
            } else {
                (second_caret, first_caret)
            };
            Some(SelectionRange::new(anchor_caret, focus_caret))
        }
        (Some(survivor), None) | (None, Some(survivor)) => {
            if bookmark.focus.is_some() {
                log::warn!("bookmark: one range marker lost; collapsing to the survivor");
            }
            let pos = consume_marker(tree, survivor)?;
            Some(SelectionRange::caret(settle_caret(tree, pos)))
        }
        (None, None) => {
            log::warn!("bookmark: markers not found; selection left unchanged");
            None
        }
    }
}

fn insert_marker(tree: &mut Tree, caret: Caret, id: MarkerId) {
    let (parent, index) = tree.split_point(caret);
    let marker = tree.alloc(NodeKind::Marker(id));
    tree.insert_child(parent, index, marker);
}

/// Remove a marker node, reporting the `(parent, index)` boundary it
/// occupied.
fn consume_marker(tree: &mut Tree, marker: NodeId) -> Option<(NodeId, usize)> {
    let parent = tree.parent(marker)?;
    let index = tree.index_in_parent(marker)?;
    tree.remove(marker);
    Some((parent, index))
}

/// Prefer anchoring a boundary into an adjacent text run over an element
/// child index; text positions survive sibling-list churn better.
fn settle_caret(tree: &Tree, (parent, index): (NodeId, usize)) -> Caret {
    if index > 0 {
        let before = tree.children(parent)[index - 1];
        if let Some(text) = tree.node(before).text() {
            return Caret::new(before, text.chars().count());
        }
    }
    if let Some(&after) = tree.children(parent).get(index)
        && tree.node(after).text().is_some()
    {
        return Caret::new(after, 0);
    }
    Caret::new(parent, index)
}

fn caret_path(tree: &Tree, caret: Caret) -> Vec<usize> {
    let mut path = node_path(tree, caret.node);
    path.push(caret.offset);
    path
}

/// Child-index path from the root to `node`; lexicographic order is
/// document order.
pub(crate) fn node_path(tree: &Tree, node: NodeId) -> Vec<usize> {
    let mut path = Vec::new();
    let mut current = node;
    while let Some(index) = tree.index_in_parent(current) {
        path.push(index);
        current = tree.parent(current).expect("indexed child has a parent");
    }
    path.reverse();
    path
}
