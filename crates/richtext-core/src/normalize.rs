//! Tree canonicalization.
//!
//! Every meaningful mutation leaves the tree in *some* shape; this module
//! folds it back into the one canonical shape the rest of the engine (and
//! the serialized form) relies on:
//!
//! 1. legacy presentational tags become style wrappers (font sizes mapped
//!    through the seven-step ladder, explicit style winning over derived)
//! 2. wrappers with empty records lose the record entirely
//! 3. children are processed before their ancestors (bottom-up)
//! 4. whitespace-only text runs are removed
//! 5. directly nested wrappers that add no style are unwrapped; a styleless
//!    wrapper around a single styled wrapper absorbs the child's style
//! 6. adjacent sibling wrappers with equal records and equal attributes are
//!    merged, children concatenated in order (adjacent text runs join too)
//! 7. consecutive line breaks collapse to one
//! 8. wrappers emptied by the above are removed
//!
//! Bookmark markers are exempt everywhere: a node carrying a marker in its
//! subtree is never merged, flattened, or removed. The sibling-level passes
//! run to a fixpoint at each node, so removing an empty wrapper between two
//! equal wrappers still ends in a single merged wrapper.
//!
//! Normalization is idempotent and never fails; nodes with missing or
//! partial style information are treated as carrying an empty record.

use crate::arena::{LegacyTag, NodeId, NodeKind, Tree};
use crate::style::{StyleRecord, legacy_font_size};

/// Canonicalize the subtree rooted at `id` in place.
pub fn normalize(tree: &mut Tree, id: NodeId) {
    convert_legacy(tree, id);

    let children: Vec<NodeId> = tree.children(id).to_vec();
    for child in children {
        normalize(tree, child);
    }

    loop {
        let mut changed = false;
        changed |= strip_whitespace_runs(tree, id);
        changed |= flatten_nested_wrappers(tree, id);
        changed |= unwrap_pointless_wrappers(tree, id);
        changed |= merge_adjacent_siblings(tree, id);
        changed |= collapse_line_breaks(tree, id);
        changed |= drop_empty_wrappers(tree, id);
        if !changed {
            break;
        }
    }
}

/// Rewrite a legacy presentational node into a style wrapper.
fn convert_legacy(tree: &mut Tree, id: NodeId) {
    let NodeKind::Legacy(tag) = tree.node(id).kind else {
        return;
    };
    let mut derived = StyleRecord::new();
    match tag {
        LegacyTag::Bold => derived.set("font-weight", "bold"),
        LegacyTag::Italic => derived.set("font-style", "italic"),
        LegacyTag::Underline => derived.add_decoration("underline"),
        LegacyTag::Strike => derived.add_decoration("line-through"),
        LegacyTag::Font => {
            let node = tree.node(id);
            if let Some(color) = node.attr("color") {
                derived.set("color", color);
            }
            if let Some(face) = node.attr("face") {
                derived.set("font-family", face);
            }
            if let Some(size) = node.attr("size")
                && let Some(px) = legacy_font_size(size)
            {
                derived.set("font-size", &format!("{px}px"));
            }
        }
    }
    let node = tree.node_mut(id);
    node.kind = NodeKind::Span;
    node.remove_attr("color");
    node.remove_attr("face");
    node.remove_attr("size");
    node.style.merge_defaults(&derived);
}

fn strip_whitespace_runs(tree: &mut Tree, id: NodeId) -> bool {
    let doomed: Vec<NodeId> = tree
        .children(id)
        .iter()
        .copied()
        .filter(|&child| {
            tree.node(child)
                .text()
                .is_some_and(|text| text.chars().all(char::is_whitespace))
        })
        .collect();
    for child in &doomed {
        tree.remove(*child);
    }
    !doomed.is_empty()
}

/// Invariant: no wrapper nests directly inside another unless it adds
/// style. Only meaningful when `id` is itself a wrapper.
fn flatten_nested_wrappers(tree: &mut Tree, id: NodeId) -> bool {
    if !matches!(tree.node(id).kind, NodeKind::Span) {
        return false;
    }
    let mut changed = false;

    // A styleless wrapper around exactly one styled wrapper absorbs the
    // child's record.
    if tree.node(id).style.is_empty()
        && tree.children(id).len() == 1
    {
        let only = tree.children(id)[0];
        if matches!(tree.node(only).kind, NodeKind::Span)
            && tree.node(only).attrs().is_empty()
            && !tree.node(only).style.is_empty()
            && !tree.carries_marker(only)
        {
            let style = tree.node(only).style.clone();
            tree.node_mut(id).style = style;
            tree.unwrap_node(only);
            changed = true;
        }
    }

    // Child wrappers whose every property already holds on the parent add
    // nothing; unwrap them.
    loop {
        let redundant = tree.children(id).iter().copied().find(|&child| {
            matches!(tree.node(child).kind, NodeKind::Span)
                && tree.node(child).attrs().is_empty()
                && !tree.carries_marker(child)
                && tree
                    .node(child)
                    .style
                    .iter()
                    .all(|(prop, value)| tree.node(id).style.get(prop) == Some(value))
        });
        match redundant {
            Some(child) => {
                tree.unwrap_node(child);
                changed = true;
            }
            None => break,
        }
    }
    changed
}

/// A wrapper with no style and no attributes changes nothing for its
/// children; unwrap it wherever it sits.
fn unwrap_pointless_wrappers(tree: &mut Tree, id: NodeId) -> bool {
    let mut changed = false;
    loop {
        let pointless = tree.children(id).iter().copied().find(|&child| {
            matches!(tree.node(child).kind, NodeKind::Span)
                && tree.node(child).style.is_empty()
                && tree.node(child).attrs().is_empty()
                && !tree.children(child).is_empty()
                && !tree.carries_marker(child)
        });
        match pointless {
            Some(child) => {
                tree.unwrap_node(child);
                changed = true;
            }
            None => break,
        }
    }
    changed
}

/// Invariant: no two adjacent sibling wrappers with equal records and equal
/// ordered attributes. Adjacent text runs join as well.
fn merge_adjacent_siblings(tree: &mut Tree, id: NodeId) -> bool {
    let mut changed = false;
    let mut index = 0;
    while index + 1 < tree.children(id).len() {
        let left = tree.children(id)[index];
        let right = tree.children(id)[index + 1];

        let both_text =
            tree.node(left).text().is_some() && tree.node(right).text().is_some();
        if both_text {
            if tree.join_text_at(id, index + 1).is_some() {
                changed = true;
                continue;
            }
            index += 1;
            continue;
        }

        let mergeable_wrappers = matches!(tree.node(left).kind, NodeKind::Span)
            && matches!(tree.node(right).kind, NodeKind::Span)
            && tree.node(left).style == tree.node(right).style
            && tree.node(left).attrs() == tree.node(right).attrs()
            && !tree.carries_marker(left)
            && !tree.carries_marker(right);
        if mergeable_wrappers {
            let grafts: Vec<NodeId> = tree.children(right).to_vec();
            for graft in grafts {
                tree.append_child(left, graft);
            }
            tree.remove(right);
            changed = true;
            continue;
        }
        index += 1;
    }
    changed
}

/// Invariant: no two consecutive line breaks. Markers are zero-width and
/// transparent for adjacency, but are themselves never touched.
fn collapse_line_breaks(tree: &mut Tree, id: NodeId) -> bool {
    let mut doomed = Vec::new();
    let mut previous_was_break = false;
    for &child in tree.children(id) {
        match tree.node(child).kind {
            NodeKind::LineBreak => {
                if previous_was_break {
                    doomed.push(child);
                } else {
                    previous_was_break = true;
                }
            }
            NodeKind::Marker(_) => {}
            _ => previous_was_break = false,
        }
    }
    for child in &doomed {
        tree.remove(*child);
    }
    !doomed.is_empty()
}

fn drop_empty_wrappers(tree: &mut Tree, id: NodeId) -> bool {
    let doomed: Vec<NodeId> = tree
        .children(id)
        .iter()
        .copied()
        .filter(|&child| {
            matches!(tree.node(child).kind, NodeKind::Span)
                && tree.children(child).is_empty()
        })
        .collect();
    for child in &doomed {
        tree.remove(*child);
    }
    !doomed.is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::{Caret, SelectionRange};

    fn span_with_style(tree: &mut Tree, parent: NodeId, decls: &str) -> NodeId {
        let span = tree.alloc(NodeKind::Span);
        tree.node_mut(span).style = StyleRecord::parse(decls);
        tree.append_child(parent, span);
        span
    }

    #[test]
    fn test_legacy_bold_becomes_wrapper() {
        let mut tree = Tree::new();
        let legacy = tree.alloc(NodeKind::Legacy(LegacyTag::Bold));
        tree.append_child(tree.root(), legacy);
        let text = tree.alloc_text("Win");
        tree.append_child(legacy, text);

        let root = tree.root();
        normalize(&mut tree, root);

        let child = tree.children(tree.root())[0];
        assert!(matches!(tree.node(child).kind, NodeKind::Span));
        assert_eq!(tree.node(child).style.get("font-weight"), Some("bold"));
    }

    #[test]
    fn test_legacy_font_maps_through_size_ladder() {
        let mut tree = Tree::new();
        let legacy = tree.alloc(NodeKind::Legacy(LegacyTag::Font));
        tree.node_mut(legacy).set_attr("color", "red");
        tree.node_mut(legacy).set_attr("size", "5");
        tree.append_child(tree.root(), legacy);
        let text = tree.alloc_text("x");
        tree.append_child(legacy, text);

        let root = tree.root();
        normalize(&mut tree, root);

        let child = tree.children(tree.root())[0];
        let node = tree.node(child);
        assert_eq!(node.style.get("color"), Some("red"));
        assert_eq!(node.style.get("font-size"), Some("24px"));
        assert!(node.attr("size").is_none());
    }

    #[test]
    fn test_adjacent_equal_wrappers_merge_in_order() {
        let mut tree = Tree::new();
        let root = tree.root();
        let a = span_with_style(&mut tree, root, "font-weight: bold");
        let text_a = tree.alloc_text("Win");
        tree.append_child(a, text_a);
        let b = span_with_style(&mut tree, root, "font-weight: bold");
        let text_b = tree.alloc_text("win");
        tree.append_child(b, text_b);

        normalize(&mut tree, root);

        assert_eq!(tree.children(tree.root()).len(), 1);
        let merged = tree.children(tree.root())[0];
        assert_eq!(tree.children(merged).len(), 1);
        assert_eq!(
            tree.node(tree.children(merged)[0]).text(),
            Some("Winwin")
        );
    }

    #[test]
    fn test_different_attrs_prevent_merge() {
        let mut tree = Tree::new();
        let root = tree.root();
        let a = span_with_style(&mut tree, root, "color: red");
        tree.node_mut(a).set_attr("data-kind", "one");
        let text_a = tree.alloc_text("a");
        tree.append_child(a, text_a);
        let b = span_with_style(&mut tree, root, "color: red");
        let text_b = tree.alloc_text("b");
        tree.append_child(b, text_b);

        normalize(&mut tree, root);
        assert_eq!(tree.children(tree.root()).len(), 2);
    }

    #[test]
    fn test_nested_wrapper_without_added_style_unwraps() {
        let mut tree = Tree::new();
        let root = tree.root();
        let outer = span_with_style(&mut tree, root, "color: red; font-weight: bold");
        let inner = tree.alloc(NodeKind::Span);
        tree.node_mut(inner).style = StyleRecord::parse("color: red");
        tree.append_child(outer, inner);
        let text = tree.alloc_text("x");
        tree.append_child(inner, text);

        let root = tree.root();
        normalize(&mut tree, root);

        assert_eq!(tree.children(outer), &[text]);
    }

    #[test]
    fn test_styleless_parent_lifts_single_child_style() {
        let mut tree = Tree::new();
        let outer = tree.alloc(NodeKind::Span);
        tree.append_child(tree.root(), outer);
        let inner = span_with_style(&mut tree, outer, "font-style: italic");
        let text = tree.alloc_text("x");
        tree.append_child(inner, text);

        let root = tree.root();
        normalize(&mut tree, root);

        assert_eq!(tree.children(tree.root()).len(), 1);
        let kept = tree.children(tree.root())[0];
        assert_eq!(tree.node(kept).style.get("font-style"), Some("italic"));
        assert_eq!(tree.children(kept), &[text]);
    }

    #[test]
    fn test_consecutive_breaks_collapse() {
        let mut tree = Tree::new();
        for _ in 0..3 {
            let br = tree.alloc(NodeKind::LineBreak);
            tree.append_child(tree.root(), br);
        }
        let root = tree.root();
        normalize(&mut tree, root);
        assert_eq!(tree.children(tree.root()).len(), 1);
    }

    #[test]
    fn test_whitespace_runs_removed_and_empty_wrappers_dropped() {
        let mut tree = Tree::new();
        let root = tree.root();
        let ws = tree.alloc_text("  \n\t ");
        tree.append_child(root, ws);
        let span = span_with_style(&mut tree, root, "color: red");
        let inner_ws = tree.alloc_text(" ");
        tree.append_child(span, inner_ws);

        let root = tree.root();
        normalize(&mut tree, root);
        assert!(tree.children(tree.root()).is_empty());
    }

    #[test]
    fn test_marker_carrying_nodes_are_exempt() {
        let mut tree = Tree::new();
        let root = tree.root();
        let a = span_with_style(&mut tree, root, "font-weight: bold");
        let bookmark = {
            let text = tree.alloc_text("x");
            tree.append_child(a, text);
            crate::bookmark::save(
                &mut tree,
                SelectionRange::caret(Caret::new(text, 1)),
            )
        };
        let b = span_with_style(&mut tree, root, "font-weight: bold");
        let text_b = tree.alloc_text("y");
        tree.append_child(b, text_b);

        let root = tree.root();
        normalize(&mut tree, root);

        // `a` carries a marker: the equal sibling wrappers must not merge.
        assert_eq!(tree.children(tree.root()).len(), 2);
        assert!(tree.find_marker(bookmark.anchor).is_some());
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let mut tree = Tree::new();
        let root = tree.root();
        let legacy = tree.alloc(NodeKind::Legacy(LegacyTag::Bold));
        tree.append_child(root, legacy);
        let t1 = tree.alloc_text("a");
        tree.append_child(legacy, t1);
        span_with_style(&mut tree, root, "");
        let b = span_with_style(&mut tree, root, "font-weight: bold");
        let t2 = tree.alloc_text("b");
        tree.append_child(b, t2);

        normalize(&mut tree, root);
        let once: Vec<NodeId> = tree.descendants(tree.root());
        normalize(&mut tree, root);
        let twice: Vec<NodeId> = tree.descendants(tree.root());
        assert_eq!(once, twice);
        // The empty wrapper vanished and the two bold runs merged.
        assert_eq!(tree.children(tree.root()).len(), 1);
        assert_eq!(tree.plain_text(), "ab");
    }
}
