//! Paste sanitization.
//!
//! Clipboard payloads arrive from arbitrary applications: word processors,
//! other browsers, terminal emulators. The sanitizer turns whatever shows
//! up into a fragment that is canonical on arrival:
//!
//! - executable and style-sheet content is dropped with its text; unknown
//!   tags unwrap to their content (the parser's standing policy)
//! - class, language, and every other unknown attribute is stripped; only
//!   the link attributes survive on link nodes
//! - legacy inline and font tags convert exactly as the normalizer does,
//!   and point/inch/centimeter lengths become pixels
//! - word-processor list paragraphs are recognized (symbol-font bullet
//!   glyphs, `mso-list` markers) and rebuilt as canonical bullet glyphs
//!   with a hanging indent
//! - no rich payload, or one that sanitizes to nothing, falls back to the
//!   plain text split into one paragraph per line
//!
//! Sanitization never fails; the worst unrecognized construct degrades to
//! "unwrap the tag, keep the text".

use crate::arena::{NodeId, NodeKind, Tree};
use crate::markup;
use crate::normalize::normalize;
use regex::Regex;
use std::sync::OnceLock;

/// Fixed remap from glyphs typed in symbol/dingbat fonts to canonical
/// bullet characters. Covers both the cp1252-visible forms and the F0xx
/// private-use points word processors actually emit.
const BULLET_GLYPHS: &[(char, char)] = &[
    ('\u{00B7}', '\u{2022}'), // middle dot -> bullet
    ('\u{F0B7}', '\u{2022}'),
    ('o', '\u{25E6}'), // lowercase o -> white bullet
    ('\u{F06F}', '\u{25E6}'),
    ('\u{00A7}', '\u{25AA}'), // section sign -> small square
    ('\u{F0A7}', '\u{25AA}'),
    ('v', '\u{2756}'), // v -> diamond minus x
    ('\u{F076}', '\u{2756}'),
    ('\u{00D8}', '\u{27A2}'), // O-slash -> arrowhead
    ('\u{F0D8}', '\u{27A2}'),
];

/// Fonts whose glyphs are presentation symbols, not letters.
const SYMBOL_FONTS: &[&str] = &["symbol", "wingdings", "webdings", "zapf dingbats"];

/// Indent per list level, in pixels.
const LIST_INDENT_PX: u32 = 24;

/// Attributes allowed to survive on link nodes.
const LINK_ATTRS: &[&str] = &["href", "data-target-id", "data-target-name", "data-mode"];

/// Sanitize externally supplied content into an insertable fragment.
///
/// `rich` is the markup payload when one exists; `plain` is the plain-text
/// fallback. The returned tree's root children are the content to insert.
pub fn sanitize(rich: Option<&str>, plain: &str) -> Tree {
    if let Some(rich) = rich {
        let mut fragment = markup::parse(rich);
        let root = fragment.root();
        remove_foreign_markers(&mut fragment);
        normalize(&mut fragment, root);
        reconstruct_list_paragraphs(&mut fragment);
        scrub_attributes(&mut fragment);
        normalize(&mut fragment, root);
        if !fragment.children(root).is_empty() {
            return fragment;
        }
        log::debug!("paste: rich payload sanitized to nothing; using plain text");
    }
    plain_fragment(plain)
}

/// Split plain text on line boundaries into one paragraph per line. A
/// single line has no boundary and inserts inline, without inventing a
/// paragraph around it.
fn plain_fragment(plain: &str) -> Tree {
    let mut tree = Tree::new();
    let root = tree.root();
    if !plain.contains('\n') {
        if !plain.is_empty() {
            let text = tree.alloc_text(plain.trim_end_matches('\r'));
            tree.append_child(root, text);
        }
        return tree;
    }
    for line in plain.split('\n') {
        let line = line.trim_end_matches('\r');
        let block = tree.alloc(NodeKind::Block);
        tree.append_child(root, block);
        if line.is_empty() {
            let brk = tree.alloc(NodeKind::LineBreak);
            tree.append_child(block, brk);
        } else {
            let text = tree.alloc_text(line);
            tree.append_child(block, text);
        }
    }
    tree
}

/// Markers are transient engine state; ones arriving from a foreign
/// clipboard are junk.
fn remove_foreign_markers(tree: &mut Tree) {
    let markers: Vec<NodeId> = tree
        .descendants(tree.root())
        .into_iter()
        .filter(|&id| tree.node(id).is_marker())
        .collect();
    for marker in markers {
        tree.remove(marker);
    }
}

fn scrub_attributes(tree: &mut Tree) {
    for id in tree.descendants(tree.root()) {
        let node = tree.node_mut(id);
        if matches!(node.kind, NodeKind::Link) {
            let kept: Vec<(String, String)> = node
                .attrs()
                .iter()
                .filter(|(name, _)| LINK_ATTRS.contains(&name.as_str()))
                .cloned()
                .collect();
            node.clear_attrs();
            for (name, value) in kept {
                node.set_attr(&name, &value);
            }
        } else {
            node.clear_attrs();
        }
        node.style.retain_sanitized();
    }
}

fn mso_level_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"level([0-9]+)").expect("valid level pattern"))
}

/// Recognize word-processor list paragraphs and rebuild them canonically.
fn reconstruct_list_paragraphs(tree: &mut Tree) {
    let blocks: Vec<NodeId> = tree
        .descendants(tree.root())
        .into_iter()
        .filter(|&id| matches!(tree.node(id).kind, NodeKind::Block))
        .collect();

    for block in blocks {
        let level = tree
            .node(block)
            .style
            .get("mso-list")
            .and_then(|marker| {
                mso_level_re()
                    .captures(marker)
                    .and_then(|caps| caps[1].parse::<u32>().ok())
            });

        let remapped = remap_bullet_glyph(tree, block);
        if !remapped && level.is_none() {
            continue;
        }

        let depth = level.unwrap_or(1).max(1);
        let padding = LIST_INDENT_PX * depth;
        let style = &mut tree.node_mut(block).style;
        style.set("padding-left", &format!("{padding}px"));
        // The first line hangs back by one indent unit so wrapped text
        // aligns under the first character rather than under the bullet.
        style.set("text-indent", &format!("-{LIST_INDENT_PX}px"));
    }
}

/// Remap a leading symbol-font glyph in `block` to a canonical bullet.
/// Returns whether a remap happened.
fn remap_bullet_glyph(tree: &mut Tree, block: NodeId) -> bool {
    let Some(text_id) = first_text_descendant(tree, block) else {
        return false;
    };
    let family = tree
        .effective_style(text_id, "font-family")
        .unwrap_or_default()
        .to_ascii_lowercase();
    if !SYMBOL_FONTS.iter().any(|font| family.contains(font)) {
        return false;
    }
    let first_char = tree
        .node(text_id)
        .text()
        .and_then(|text| text.chars().next());
    let Some(first_char) = first_char else {
        return false;
    };
    let Some(&(_, bullet)) = BULLET_GLYPHS.iter().find(|(from, _)| *from == first_char) else {
        return false;
    };

    if let NodeKind::Text(text) = &mut tree.node_mut(text_id).kind {
        let mut replaced = String::with_capacity(text.len());
        replaced.push(bullet);
        replaced.extend(text.chars().skip(1));
        *text = replaced;
    }
    clear_symbol_font(tree, text_id, block);
    true
}

fn first_text_descendant(tree: &Tree, block: NodeId) -> Option<NodeId> {
    tree.descendants(block).into_iter().find(|&id| {
        tree.node(id)
            .text()
            .is_some_and(|text| !text.chars().all(char::is_whitespace))
    })
}

/// Remove the symbol font declaration that made the glyph render as a
/// bullet, wherever it sits between the run and its paragraph.
fn clear_symbol_font(tree: &mut Tree, from: NodeId, block: NodeId) {
    let mut current = Some(from);
    while let Some(id) = current {
        let family = tree
            .node(id)
            .style
            .get("font-family")
            .map(str::to_ascii_lowercase);
        if let Some(family) = family
            && SYMBOL_FONTS.iter().any(|font| family.contains(font))
        {
            tree.node_mut(id).style.remove("font-family");
            return;
        }
        if id == block {
            return;
        }
        current = tree.parent(id);
    }
}

/// Collapse paragraph structure into a single line: breaks become spaces,
/// block containers unwrap with a space at each former boundary. Used by
/// single-line surfaces, where paragraph-break input is suppressed
/// entirely.
pub(crate) fn flatten_to_single_line(tree: &mut Tree) {
    loop {
        let brk = tree
            .descendants(tree.root())
            .into_iter()
            .find(|&id| matches!(tree.node(id).kind, NodeKind::LineBreak));
        match brk {
            Some(id) => {
                let parent = tree.parent(id).expect("descendant has a parent");
                let index = tree.index_in_parent(id).expect("indexed child");
                let space = tree.alloc_text(" ");
                tree.insert_child(parent, index, space);
                tree.remove(id);
            }
            None => break,
        }
    }
    loop {
        let container = tree.descendants(tree.root()).into_iter().find(|&id| {
            matches!(
                tree.node(id).kind,
                NodeKind::Block | NodeKind::List(_) | NodeKind::ListItem
            )
        });
        match container {
            Some(id) => {
                let parent = tree.parent(id).expect("descendant has a parent");
                let is_last = tree.index_in_parent(id) == Some(tree.children(parent).len() - 1);
                if !is_last {
                    let space = tree.alloc_text(" ");
                    tree.append_child(id, space);
                }
                tree.unwrap_node(id);
            }
            None => break,
        }
    }
    // Join the inserted separator spaces into their neighbors before
    // normalizing, so they are not stripped as whitespace-only runs.
    join_adjacent_text(tree);
    let root = tree.root();
    normalize(tree, root);
}

fn join_adjacent_text(tree: &mut Tree) {
    let mut parents = vec![tree.root()];
    parents.extend(tree.descendants(tree.root()));
    for parent in parents {
        if !tree.contains(parent) {
            continue;
        }
        let mut index = 1;
        while index < tree.children(parent).len() {
            if tree.join_text_at(parent, index).is_none() {
                index += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markup::serialize;

    #[test]
    fn test_script_and_unknown_tags() {
        let fragment = sanitize(
            Some("<article>keep</article><script>alert(1)</script>"),
            "keep",
        );
        assert_eq!(serialize(&fragment), "keep");
    }

    #[test]
    fn test_class_and_unknown_attributes_stripped() {
        let fragment = sanitize(
            Some("<span class=\"MsoNormal\" lang=\"EN-US\" data-x=\"1\" style=\"color: red\">x</span>"),
            "x",
        );
        assert_eq!(serialize(&fragment), "<span style=\"color: red\">x</span>");
    }

    #[test]
    fn test_legacy_tags_arrive_canonical() {
        let fragment = sanitize(Some("<b>Win</b><b>win</b>"), "Winwin");
        assert_eq!(
            serialize(&fragment),
            "<span style=\"font-weight: bold\">Winwin</span>"
        );
    }

    #[test]
    fn test_point_lengths_convert_to_px() {
        let fragment = sanitize(
            Some("<div style=\"padding-left: 36pt\">indented</div>"),
            "indented",
        );
        assert_eq!(
            serialize(&fragment),
            "<div style=\"padding-left: 48px\">indented</div>"
        );
    }

    #[test]
    fn test_word_bullet_paragraph_reconstructed() {
        let rich = "<p style=\"mso-list: l0 level1 lfo1\">\
                    <span style=\"font-family: Symbol\">\u{00B7}</span>\
                    <span>\u{a0}\u{a0}</span>First point</p>";
        let fragment = sanitize(Some(rich), "First point");
        let block = fragment.children(fragment.root())[0];
        let style = &fragment.node(block).style;
        assert_eq!(style.get("padding-left"), Some("24px"));
        assert_eq!(style.get("text-indent"), Some("-24px"));
        assert!(style.get("mso-list").is_none());
        assert!(fragment.plain_text().starts_with('\u{2022}'));
    }

    #[test]
    fn test_deeper_mso_level_widens_padding() {
        let rich = "<p style=\"mso-list: l0 level3 lfo1\">\
                    <span style=\"font-family: Wingdings\">\u{F0A7}</span>deep</p>";
        let fragment = sanitize(Some(rich), "deep");
        let block = fragment.children(fragment.root())[0];
        assert_eq!(fragment.node(block).style.get("padding-left"), Some("72px"));
    }

    #[test]
    fn test_plain_fallback_splits_lines() {
        let fragment = sanitize(None, "one\r\ntwo\n\nfour");
        assert_eq!(
            serialize(&fragment),
            "<div>one</div><div>two</div><div><br></div><div>four</div>"
        );
        assert_eq!(fragment.plain_text(), "one\ntwo\n\nfour");
    }

    #[test]
    fn test_empty_rich_payload_falls_back() {
        let fragment = sanitize(Some("<style>p{color:red}</style>  "), "text");
        assert_eq!(serialize(&fragment), "text");
    }

    #[test]
    fn test_single_line_plain_text_inserts_inline() {
        let fragment = sanitize(None, "just words");
        assert_eq!(serialize(&fragment), "just words");
    }

    #[test]
    fn test_flatten_to_single_line() {
        let mut fragment = sanitize(None, "one\ntwo");
        flatten_to_single_line(&mut fragment);
        assert_eq!(serialize(&fragment), "one two");
    }
}
