//! Hyperlink lifecycle.
//!
//! A link node carries its destination twice: as explicit attributes
//! (`data-target-id`, `data-target-name`, `data-mode`) and as a single
//! resolvable reference string in `href`. A clipboard round trip through a
//! foreign application may shed one encoding; either alone still resolves.
//!
//! Clicks never navigate by themselves: the engine resolves the target and
//! raises a [`Navigation`] for the owner to act on.

use crate::arena::{NodeId, NodeKind, Tree};

/// How the owner should open a followed link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LinkMode {
    /// Open in a popup overlay.
    #[default]
    Popup,
    /// Open in a split view beside the current document.
    Split,
    /// Open as a full page navigation.
    NewPage,
}

impl LinkMode {
    /// Canonical wire form.
    pub fn as_str(self) -> &'static str {
        match self {
            LinkMode::Popup => "popup",
            LinkMode::Split => "split",
            LinkMode::NewPage => "newpage",
        }
    }

    /// Parse the wire form.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "popup" => Some(LinkMode::Popup),
            "split" => Some(LinkMode::Split),
            "newpage" => Some(LinkMode::NewPage),
            _ => None,
        }
    }
}

/// A link destination: another document the owner knows how to open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkTarget {
    /// Opaque document id, owner-defined.
    pub id: String,
    /// Display name of the destination.
    pub name: String,
    /// Requested open mode.
    pub mode: LinkMode,
}

/// Where a pointer click landed, in host viewport coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClickPoint {
    /// Horizontal coordinate.
    pub x: f64,
    /// Vertical coordinate.
    pub y: f64,
}

/// Raised to the owner when a link is activated. The engine performs no
/// navigation itself.
#[derive(Debug, Clone, PartialEq)]
pub struct Navigation {
    /// Destination document id.
    pub target_id: String,
    /// Destination display name.
    pub target_name: String,
    /// Requested open mode.
    pub mode: LinkMode,
    /// Click position, for popup placement.
    pub position: ClickPoint,
}

/// Fixed visual treatment applied to link nodes.
const LINK_COLOR: &str = "#0645ad";

const ATTR_ID: &str = "data-target-id";
const ATTR_NAME: &str = "data-target-name";
const ATTR_MODE: &str = "data-mode";
const ATTR_REF: &str = "href";

/// Encode a target as the single resolvable reference string.
///
/// The name goes last so a name containing the separator still parses.
pub fn reference_string(target: &LinkTarget) -> String {
    format!("doc:{}:{}:{}", target.mode.as_str(), target.id, target.name)
}

/// Parse a reference string produced by [`reference_string`].
pub fn parse_reference(reference: &str) -> Option<LinkTarget> {
    let mut parts = reference.splitn(4, ':');
    if parts.next()? != "doc" {
        return None;
    }
    let mode = LinkMode::parse(parts.next()?)?;
    let id = parts.next()?.to_string();
    if id.is_empty() {
        return None;
    }
    let name = parts.next().unwrap_or_default().to_string();
    Some(LinkTarget { id, name, mode })
}

/// Allocate a detached link node carrying both encodings and the fixed
/// visual treatment.
pub(crate) fn make_link_node(tree: &mut Tree, target: &LinkTarget) -> NodeId {
    let id = tree.alloc(NodeKind::Link);
    let node = tree.node_mut(id);
    node.set_attr(ATTR_REF, &reference_string(target));
    node.set_attr(ATTR_ID, &target.id);
    node.set_attr(ATTR_NAME, &target.name);
    node.set_attr(ATTR_MODE, target.mode.as_str());
    node.style.set("color", LINK_COLOR);
    node.style.add_decoration("underline");
    node.style.set("cursor", "pointer");
    id
}

/// Walk ancestors from `from` (inclusive) to the root, returning the first
/// link node. No intermediate structure is assumed.
pub(crate) fn find_enclosing_link(tree: &Tree, from: NodeId) -> Option<NodeId> {
    let mut current = Some(from);
    while let Some(id) = current {
        if matches!(tree.node(id).kind, NodeKind::Link) {
            return Some(id);
        }
        current = tree.parent(id);
    }
    None
}

/// Promote the link's children to its parent in order, then remove the
/// emptied node.
pub(crate) fn unwrap_link(tree: &mut Tree, link: NodeId) {
    tree.unwrap_node(link);
}

/// Resolve a link node's destination, preferring the explicit attributes
/// and falling back to the reference string for anything missing.
pub(crate) fn resolve_target(tree: &Tree, link: NodeId) -> Option<LinkTarget> {
    let node = tree.node(link);
    let from_reference = node.attr(ATTR_REF).and_then(parse_reference);
    let id = node
        .attr(ATTR_ID)
        .map(str::to_string)
        .or_else(|| from_reference.as_ref().map(|t| t.id.clone()))?;
    let name = node
        .attr(ATTR_NAME)
        .map(str::to_string)
        .or_else(|| from_reference.as_ref().map(|t| t.name.clone()))
        .unwrap_or_default();
    let mode = node
        .attr(ATTR_MODE)
        .and_then(LinkMode::parse)
        .or(from_reference.map(|t| t.mode))
        .unwrap_or_default();
    Some(LinkTarget { id, name, mode })
}

/// Resolve a click at `point` on (or inside) `node` into a navigation
/// event, if a link encloses that position.
pub(crate) fn resolve_click(tree: &Tree, node: NodeId, point: ClickPoint) -> Option<Navigation> {
    let link = find_enclosing_link(tree, node)?;
    let target = resolve_target(tree, link)?;
    Some(Navigation {
        target_id: target.id,
        target_name: target.name,
        mode: target.mode,
        position: point,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_round_trip_with_colon_in_name() {
        let target = LinkTarget {
            id: "p42".to_string(),
            name: "Part 2: Responses".to_string(),
            mode: LinkMode::Split,
        };
        let reference = reference_string(&target);
        assert_eq!(reference, "doc:split:p42:Part 2: Responses");
        assert_eq!(parse_reference(&reference), Some(target));
    }

    #[test]
    fn test_parse_reference_rejects_foreign_schemes() {
        assert_eq!(parse_reference("https://example.com"), None);
        assert_eq!(parse_reference("doc:sideways:p1:x"), None);
        assert_eq!(parse_reference("doc:popup::unnamed"), None);
    }

    #[test]
    fn test_resolve_prefers_attributes_then_reference() {
        let mut tree = Tree::new();
        let target = LinkTarget {
            id: "p42".to_string(),
            name: "Chapter 2".to_string(),
            mode: LinkMode::Split,
        };
        let link = make_link_node(&mut tree, &target);
        tree.append_child(tree.root(), link);

        assert_eq!(resolve_target(&tree, link), Some(target.clone()));

        // Attribute encoding lost (foreign clipboard): the reference string
        // still resolves the destination.
        tree.node_mut(link).remove_attr("data-target-id");
        tree.node_mut(link).remove_attr("data-mode");
        let resolved = resolve_target(&tree, link).unwrap();
        assert_eq!(resolved.id, "p42");
        assert_eq!(resolved.mode, LinkMode::Split);
    }

    #[test]
    fn test_click_resolves_through_nesting() {
        let mut tree = Tree::new();
        let target = LinkTarget {
            id: "p7".to_string(),
            name: "Defense".to_string(),
            mode: LinkMode::Popup,
        };
        let link = make_link_node(&mut tree, &target);
        tree.append_child(tree.root(), link);
        let inner = tree.alloc(NodeKind::Span);
        tree.append_child(link, inner);
        let text = tree.alloc_text("click me");
        tree.append_child(inner, text);

        let nav = resolve_click(
            &tree,
            text,
            ClickPoint { x: 10.0, y: 20.0 },
        )
        .unwrap();
        assert_eq!(nav.target_id, "p7");
        assert_eq!(nav.mode, LinkMode::Popup);

        // A click outside any link resolves to nothing.
        let stray = tree.alloc_text("plain");
        tree.append_child(tree.root(), stray);
        assert!(resolve_click(&tree, stray, ClickPoint { x: 0.0, y: 0.0 }).is_none());
    }
}
