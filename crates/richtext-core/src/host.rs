//! Injected platform capabilities.
//!
//! The engine never reaches for a global selection or a global document:
//! each editable surface owns an [`EditHost`], so independent surfaces
//! coexist without cross-talk. The host supplies the current selection,
//! applies one, and implements the native list/indent primitives the
//! format applier delegates to.
//!
//! [`HeadlessHost`] is the reference implementation used by tests and
//! headless integrations; UI adapters implement the trait against their
//! platform.

use crate::arena::{ListKind, NodeId, NodeKind, SelectionRange, Tree};
use crate::format::IndentDirection;

/// Platform capabilities one editable surface depends on.
pub trait EditHost {
    /// The current selection, if one exists inside this surface's tree.
    fn selection(&self, tree: &Tree) -> Option<SelectionRange>;

    /// Apply a selection.
    fn set_selection(&mut self, tree: &Tree, range: SelectionRange);

    /// Native list primitive: turn the blocks under `range` into (or out
    /// of) a list of `kind`. Returns whether anything changed. The default
    /// reports the primitive as unavailable.
    fn apply_list(&mut self, _tree: &mut Tree, _range: SelectionRange, _kind: ListKind) -> bool {
        false
    }

    /// Native indent primitive. Returns whether anything changed.
    fn change_indent(
        &mut self,
        _tree: &mut Tree,
        _range: SelectionRange,
        _direction: IndentDirection,
    ) -> bool {
        false
    }

    /// Re-acquire input focus (after a cancelled blur).
    fn focus(&mut self) {}
}

/// Indent step applied by the headless indent primitive, in pixels.
const INDENT_STEP_PX: u32 = 24;

/// In-memory host: holds a selection, implements the list/indent
/// primitives structurally.
#[derive(Debug, Default)]
pub struct HeadlessHost {
    selection: Option<SelectionRange>,
    focused: bool,
}

impl HeadlessHost {
    /// Create a host with no selection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Place a selection directly (what a platform would do on user input).
    pub fn select(&mut self, range: SelectionRange) {
        self.selection = Some(range);
    }

    /// True after [`EditHost::focus`] was called.
    pub fn is_focused(&self) -> bool {
        self.focused
    }
}

impl EditHost for HeadlessHost {
    fn selection(&self, tree: &Tree) -> Option<SelectionRange> {
        self.selection
            .filter(|range| tree.contains(range.anchor.node) && tree.contains(range.focus.node))
    }

    fn set_selection(&mut self, _tree: &Tree, range: SelectionRange) {
        self.selection = Some(range);
    }

    fn apply_list(&mut self, tree: &mut Tree, range: SelectionRange, kind: ListKind) -> bool {
        let Some(block) = enclosing_paragraph(tree, range.anchor.node) else {
            return false;
        };
        match tree.node(block).kind {
            // Toggling the same kind off turns the item back into a block;
            // a different kind re-flavors the containing list.
            NodeKind::ListItem => {
                let list = tree.parent(block).expect("item inside a list");
                let NodeKind::List(current) = tree.node(list).kind else {
                    return false;
                };
                if current == kind {
                    let replacement = tree.alloc(NodeKind::Block);
                    let grafts: Vec<NodeId> = tree.children(block).to_vec();
                    for graft in grafts {
                        tree.append_child(replacement, graft);
                    }
                    let list_parent = tree.parent(list).expect("list has a parent");
                    let list_index = tree.index_in_parent(list).expect("indexed child");
                    if tree.children(list).len() == 1 {
                        tree.insert_child(list_parent, list_index, replacement);
                        tree.remove(list);
                    } else {
                        tree.insert_child(list_parent, list_index + 1, replacement);
                        tree.remove(block);
                    }
                } else {
                    tree.node_mut(list).kind = NodeKind::List(kind);
                }
                true
            }
            NodeKind::Block => {
                let parent = tree.parent(block).expect("block has a parent");
                let index = tree.index_in_parent(block).expect("indexed child");
                let list = tree.alloc(NodeKind::List(kind));
                let item = tree.alloc(NodeKind::ListItem);
                let grafts: Vec<NodeId> = tree.children(block).to_vec();
                for graft in grafts {
                    tree.append_child(item, graft);
                }
                tree.append_child(list, item);
                tree.insert_child(parent, index, list);
                tree.remove(block);
                true
            }
            _ => false,
        }
    }

    fn change_indent(
        &mut self,
        tree: &mut Tree,
        range: SelectionRange,
        direction: IndentDirection,
    ) -> bool {
        let Some(block) = enclosing_paragraph(tree, range.anchor.node) else {
            return false;
        };
        let current = parse_px(tree.node(block).style.get("padding-left"));
        let next = match direction {
            IndentDirection::Increase => current + INDENT_STEP_PX,
            IndentDirection::Decrease => current.saturating_sub(INDENT_STEP_PX),
        };
        let style = &mut tree.node_mut(block).style;
        if next == 0 {
            style.remove("padding-left");
        } else {
            style.set("padding-left", &format!("{next}px"));
        }
        true
    }

    fn focus(&mut self) {
        self.focused = true;
    }
}

/// Nearest block-level ancestor (or self) of `node`.
fn enclosing_paragraph(tree: &Tree, node: NodeId) -> Option<NodeId> {
    let mut current = Some(node);
    while let Some(id) = current {
        if matches!(tree.node(id).kind, NodeKind::Block | NodeKind::ListItem) {
            return Some(id);
        }
        current = tree.parent(id);
    }
    None
}

fn parse_px(value: Option<&str>) -> u32 {
    value
        .and_then(|v| v.strip_suffix("px"))
        .and_then(|v| v.parse::<f64>().ok())
        .map(|v| v.max(0.0) as u32)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::Caret;
    use crate::markup::{parse, serialize};

    #[test]
    fn test_apply_list_wraps_block() {
        let mut tree = parse("<div>item</div>");
        let block = tree.children(tree.root())[0];
        let text = tree.children(block)[0];
        let mut host = HeadlessHost::new();
        let range = SelectionRange::caret(Caret::new(text, 0));
        assert!(host.apply_list(&mut tree, range, ListKind::Bulleted));
        assert_eq!(serialize(&tree), "<ul><li>item</li></ul>");
    }

    #[test]
    fn test_apply_same_list_kind_toggles_off() {
        let mut tree = parse("<ul><li>item</li></ul>");
        let list = tree.children(tree.root())[0];
        let item = tree.children(list)[0];
        let text = tree.children(item)[0];
        let mut host = HeadlessHost::new();
        let range = SelectionRange::caret(Caret::new(text, 0));
        assert!(host.apply_list(&mut tree, range, ListKind::Bulleted));
        assert_eq!(serialize(&tree), "<div>item</div>");
    }

    #[test]
    fn test_change_indent_adjusts_padding() {
        let mut tree = parse("<div>x</div>");
        let block = tree.children(tree.root())[0];
        let text = tree.children(block)[0];
        let mut host = HeadlessHost::new();
        let range = SelectionRange::caret(Caret::new(text, 0));
        assert!(host.change_indent(&mut tree, range, IndentDirection::Increase));
        assert!(host.change_indent(&mut tree, range, IndentDirection::Increase));
        assert_eq!(
            tree.node(block).style.get("padding-left"),
            Some("48px")
        );
        assert!(host.change_indent(&mut tree, range, IndentDirection::Decrease));
        assert_eq!(
            tree.node(block).style.get("padding-left"),
            Some("24px")
        );
    }

    #[test]
    fn test_selection_rejects_stale_handles() {
        let mut tree = parse("gone");
        let text = tree.children(tree.root())[0];
        let mut host = HeadlessHost::new();
        host.select(SelectionRange::caret(Caret::new(text, 1)));
        assert!(host.selection(&tree).is_some());
        tree.remove(text);
        assert!(host.selection(&tree).is_none());
    }
}
