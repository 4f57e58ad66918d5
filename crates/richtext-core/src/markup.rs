//! Markup serialization and tolerant parsing.
//!
//! The canonical tree serializes to a compact markup string; parsing that
//! string back and normalizing reproduces an equivalent tree. The parser is
//! deliberately forgiving, because it also fronts the paste sanitizer:
//! unknown tags unwrap to their content, mismatched closers close to the
//! nearest open match, executable and style-sheet content is dropped with
//! its text, and a stray `<` is ordinary text. Parsing never fails.
//!
//! Canonical output uses `span`, `div`, `br`, `a`, `ul`/`ol`, `li`, and the
//! transient marker form `<bm id="N">`. The legacy input tags (`b`,
//! `strong`, `i`, `em`, `u`, `s`, `strike`, `font`) parse into legacy node
//! kinds for the normalizer to convert; the serializer emits them only when
//! asked to render a not-yet-normalized tree.

use crate::arena::{LegacyTag, ListKind, MarkerId, NodeId, NodeKind, Tree};
use crate::style::StyleRecord;

/// Serialize the whole document (children of the root).
pub fn serialize(tree: &Tree) -> String {
    let mut out = String::new();
    for &child in tree.children(tree.root()) {
        serialize_node(tree, child, &mut out);
    }
    out
}

fn serialize_node(tree: &Tree, id: NodeId, out: &mut String) {
    let node = tree.node(id);
    match &node.kind {
        NodeKind::Root => {
            for &child in tree.children(id) {
                serialize_node(tree, child, out);
            }
        }
        NodeKind::Text(text) => escape_text(text, out),
        NodeKind::LineBreak => out.push_str("<br>"),
        NodeKind::Marker(marker) => {
            out.push_str("<bm id=\"");
            out.push_str(&marker.raw().to_string());
            out.push_str("\">");
        }
        _ => {
            let name = tag_name(&node.kind);
            out.push('<');
            out.push_str(name);
            if !node.style.is_empty() {
                out.push_str(" style=\"");
                escape_attr(&node.style.to_declarations(), out);
                out.push('"');
            }
            for (attr_name, attr_value) in node.attrs() {
                out.push(' ');
                out.push_str(attr_name);
                out.push_str("=\"");
                escape_attr(attr_value, out);
                out.push('"');
            }
            out.push('>');
            for &child in tree.children(id) {
                serialize_node(tree, child, out);
            }
            out.push_str("</");
            out.push_str(name);
            out.push('>');
        }
    }
}

fn tag_name(kind: &NodeKind) -> &'static str {
    match kind {
        NodeKind::Span => "span",
        NodeKind::Block => "div",
        NodeKind::Link => "a",
        NodeKind::List(ListKind::Bulleted) => "ul",
        NodeKind::List(ListKind::Numbered) => "ol",
        NodeKind::ListItem => "li",
        NodeKind::Legacy(LegacyTag::Bold) => "b",
        NodeKind::Legacy(LegacyTag::Italic) => "i",
        NodeKind::Legacy(LegacyTag::Underline) => "u",
        NodeKind::Legacy(LegacyTag::Strike) => "s",
        NodeKind::Legacy(LegacyTag::Font) => "font",
        NodeKind::Root | NodeKind::Text(_) | NodeKind::LineBreak | NodeKind::Marker(_) => {
            unreachable!("serialized inline")
        }
    }
}

fn escape_text(text: &str, out: &mut String) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            _ => out.push(ch),
        }
    }
}

fn escape_attr(value: &str, out: &mut String) {
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
}

/// Parse markup into a fresh tree.
pub fn parse(markup: &str) -> Tree {
    let mut tree = Tree::new();
    let root = tree.root();
    parse_into(&mut tree, root, markup);
    tree
}

/// Parse markup as children of `parent` in an existing tree. Marker
/// identities found in the input are registered with the tree so future
/// allocations stay unique.
pub fn parse_into(tree: &mut Tree, parent: NodeId, markup: &str) {
    let mut parser = Parser {
        input: markup,
        pos: 0,
    };
    let mut stack: Vec<Frame> = Vec::new();

    loop {
        let Some(piece) = parser.next_piece() else {
            break;
        };
        match piece {
            Piece::Text(text) => {
                if text.is_empty() {
                    continue;
                }
                let target = current_parent(&stack, parent);
                let node = tree.alloc_text(text);
                tree.append_child(target, node);
            }
            Piece::Open {
                name,
                attrs,
                self_closing,
            } => match element_for(&name) {
                Element::Node(kind) => {
                    let void = matches!(kind, NodeKind::LineBreak | NodeKind::Marker(_));
                    let kind = match kind {
                        NodeKind::Marker(_) => NodeKind::Marker(marker_identity(tree, &attrs)),
                        other => other,
                    };
                    let target = current_parent(&stack, parent);
                    let node = tree.alloc(kind);
                    for (attr_name, attr_value) in attrs {
                        if attr_name == "style" {
                            tree.node_mut(node).style = StyleRecord::parse(&attr_value);
                        } else if attr_name != "id" || !tree.node(node).is_marker() {
                            tree.node_mut(node).set_attr(&attr_name, &attr_value);
                        }
                    }
                    tree.append_child(target, node);
                    if !void && !self_closing {
                        stack.push(Frame {
                            name,
                            node: Some(node),
                        });
                    }
                }
                Element::Transparent => {
                    if !self_closing {
                        stack.push(Frame { name, node: None });
                    }
                }
                Element::Dropped => parser.skip_dropped(&name),
            },
            Piece::Close(name) => {
                if let Some(depth) = stack.iter().rposition(|frame| frame.name == name) {
                    stack.truncate(depth);
                }
            }
        }
    }
}

struct Frame {
    name: String,
    node: Option<NodeId>,
}

fn current_parent(stack: &[Frame], fallback: NodeId) -> NodeId {
    stack
        .iter()
        .rev()
        .find_map(|frame| frame.node)
        .unwrap_or(fallback)
}

enum Element {
    Node(NodeKind),
    Transparent,
    Dropped,
}

fn element_for(name: &str) -> Element {
    match name {
        "span" => Element::Node(NodeKind::Span),
        "div" | "p" => Element::Node(NodeKind::Block),
        "br" => Element::Node(NodeKind::LineBreak),
        "a" => Element::Node(NodeKind::Link),
        "ul" => Element::Node(NodeKind::List(ListKind::Bulleted)),
        "ol" => Element::Node(NodeKind::List(ListKind::Numbered)),
        "li" => Element::Node(NodeKind::ListItem),
        "bm" => Element::Node(NodeKind::Marker(MarkerId(0))),
        "b" | "strong" => Element::Node(NodeKind::Legacy(LegacyTag::Bold)),
        "i" | "em" => Element::Node(NodeKind::Legacy(LegacyTag::Italic)),
        "u" => Element::Node(NodeKind::Legacy(LegacyTag::Underline)),
        "s" | "strike" => Element::Node(NodeKind::Legacy(LegacyTag::Strike)),
        "font" => Element::Node(NodeKind::Legacy(LegacyTag::Font)),
        "script" | "style" | "head" | "title" => Element::Dropped,
        _ => Element::Transparent,
    }
}

fn marker_identity(tree: &mut Tree, attrs: &[(String, String)]) -> MarkerId {
    let parsed = attrs
        .iter()
        .find(|(name, _)| name == "id")
        .and_then(|(_, value)| value.trim().parse::<u64>().ok());
    match parsed {
        Some(raw) => {
            let id = MarkerId(raw);
            tree.note_marker_id(id);
            id
        }
        None => tree.new_marker_id(),
    }
}

enum Piece {
    Text(String),
    Open {
        name: String,
        attrs: Vec<(String, String)>,
        self_closing: bool,
    },
    Close(String),
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl Parser<'_> {
    fn next_piece(&mut self) -> Option<Piece> {
        let rest = &self.input[self.pos..];
        if rest.is_empty() {
            return None;
        }
        if let Some(stripped) = rest.strip_prefix('<') {
            if stripped.starts_with("!--") {
                // Comment: skip to the terminator, or swallow the rest.
                match rest.find("-->") {
                    Some(end) => self.pos += end + 3,
                    None => self.pos = self.input.len(),
                }
                return Some(Piece::Text(String::new()));
            }
            if stripped.starts_with('!') || stripped.starts_with('?') {
                match rest.find('>') {
                    Some(end) => self.pos += end + 1,
                    None => self.pos = self.input.len(),
                }
                return Some(Piece::Text(String::new()));
            }
            if let Some(piece) = self.try_parse_tag() {
                return Some(piece);
            }
            // Not a tag after all: a literal '<'.
            self.pos += 1;
            return Some(Piece::Text("<".to_string()));
        }
        let end = rest.find('<').unwrap_or(rest.len());
        self.pos += end;
        Some(Piece::Text(decode_entities(&rest[..end])))
    }

    /// Parse a tag starting at `pos` (which points at `<`), or `None` when
    /// the input is not actually a tag.
    fn try_parse_tag(&mut self) -> Option<Piece> {
        let rest = &self.input[self.pos..];
        let bytes = rest.as_bytes();
        let mut cursor = 1;
        let closing = bytes.get(cursor) == Some(&b'/');
        if closing {
            cursor += 1;
        }
        let name_start = cursor;
        while cursor < bytes.len() && bytes[cursor].is_ascii_alphanumeric() {
            cursor += 1;
        }
        if cursor == name_start {
            return None;
        }
        let name = rest[name_start..cursor].to_ascii_lowercase();

        let mut attrs = Vec::new();
        let mut self_closing = false;
        loop {
            while cursor < bytes.len() && bytes[cursor].is_ascii_whitespace() {
                cursor += 1;
            }
            match bytes.get(cursor) {
                None => return None,
                Some(b'>') => {
                    cursor += 1;
                    break;
                }
                Some(b'/') => {
                    self_closing = true;
                    cursor += 1;
                }
                Some(_) => {
                    let attr_start = cursor;
                    while cursor < bytes.len()
                        && !bytes[cursor].is_ascii_whitespace()
                        && !matches!(bytes[cursor], b'=' | b'>' | b'/')
                    {
                        cursor += 1;
                    }
                    if cursor == attr_start {
                        // Unparsable garbage; skip a byte to make progress.
                        cursor += 1;
                        continue;
                    }
                    let attr_name = rest[attr_start..cursor].to_ascii_lowercase();
                    let mut attr_value = String::new();
                    if bytes.get(cursor) == Some(&b'=') {
                        cursor += 1;
                        match bytes.get(cursor) {
                            Some(&(quote @ (b'"' | b'\''))) => {
                                cursor += 1;
                                let value_start = cursor;
                                while cursor < bytes.len() && bytes[cursor] != quote {
                                    cursor += 1;
                                }
                                attr_value = decode_entities(&rest[value_start..cursor]);
                                if cursor < bytes.len() {
                                    cursor += 1;
                                }
                            }
                            _ => {
                                let value_start = cursor;
                                while cursor < bytes.len()
                                    && !bytes[cursor].is_ascii_whitespace()
                                    && bytes[cursor] != b'>'
                                {
                                    cursor += 1;
                                }
                                attr_value = decode_entities(&rest[value_start..cursor]);
                            }
                        }
                    }
                    attrs.push((attr_name, attr_value));
                }
            }
        }

        self.pos += cursor;
        if closing {
            Some(Piece::Close(name))
        } else {
            Some(Piece::Open {
                name,
                attrs,
                self_closing,
            })
        }
    }

    /// Skip the content of a dropped element (`script`, `style`, ...)
    /// including its close tag.
    fn skip_dropped(&mut self, name: &str) {
        let rest = &self.input[self.pos..];
        let lower = rest.to_ascii_lowercase();
        let needle = format!("</{name}");
        match lower.find(&needle) {
            Some(at) => {
                let after = at + needle.len();
                let close = lower[after..].find('>').map(|i| after + i + 1);
                self.pos += close.unwrap_or(lower.len());
            }
            None => self.pos = self.input.len(),
        }
    }
}

fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(at) = rest.find('&') {
        out.push_str(&rest[..at]);
        rest = &rest[at..];
        let semicolon = rest.find(';').filter(|&at| at <= 10);
        let Some(semicolon) = semicolon else {
            out.push('&');
            rest = &rest[1..];
            continue;
        };
        let entity = &rest[1..semicolon];
        let decoded = match entity {
            "amp" => Some('&'),
            "lt" => Some('<'),
            "gt" => Some('>'),
            "quot" => Some('"'),
            "apos" => Some('\''),
            "nbsp" => Some('\u{a0}'),
            _ => entity
                .strip_prefix('#')
                .and_then(|num| {
                    if let Some(hex) = num.strip_prefix('x').or_else(|| num.strip_prefix('X')) {
                        u32::from_str_radix(hex, 16).ok()
                    } else {
                        num.parse::<u32>().ok()
                    }
                })
                .and_then(char::from_u32),
        };
        match decoded {
            Some(ch) => {
                out.push(ch);
                rest = &rest[semicolon + 1..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_serialize_basic_shapes() {
        let mut tree = Tree::new();
        let span = tree.alloc(NodeKind::Span);
        tree.node_mut(span).style = StyleRecord::parse("font-weight: bold");
        tree.append_child(tree.root(), span);
        let text = tree.alloc_text("a & b");
        tree.append_child(span, text);
        let br = tree.alloc(NodeKind::LineBreak);
        tree.append_child(tree.root(), br);

        assert_eq!(
            serialize(&tree),
            "<span style=\"font-weight: bold\">a &amp; b</span><br>"
        );
    }

    #[test]
    fn test_parse_round_trips_canonical_markup() {
        let markup = "<div style=\"text-align: center\">hello <span style=\"color: red\">world</span></div>";
        let tree = parse(markup);
        assert_eq!(serialize(&tree), markup);
    }

    #[test]
    fn test_parse_unknown_tags_unwrap() {
        let tree = parse("<article><widget>kept</widget></article>");
        assert_eq!(serialize(&tree), "kept");
    }

    #[test]
    fn test_parse_drops_script_and_style_content() {
        let tree = parse("a<script>alert('x')</script>b<style>p{}</style>c");
        assert_eq!(serialize(&tree), "abc");
    }

    #[test]
    fn test_parse_tolerates_mismatched_closers() {
        let tree = parse("<span>a<b>bold</span>tail");
        assert_eq!(tree.plain_text(), "aboldtail");
    }

    #[test]
    fn test_parse_literal_angle_bracket() {
        let tree = parse("1 < 2");
        assert_eq!(tree.plain_text(), "1 < 2");
    }

    #[test]
    fn test_entities_decode_and_reencode() {
        let tree = parse("x &amp; y&nbsp;&#65;&#x42;");
        assert_eq!(tree.plain_text(), "x & y\u{a0}AB");
        assert_eq!(serialize(&tree), "x &amp; y&nbsp;AB");
    }

    #[test]
    fn test_marker_round_trip_preserves_identity() {
        let mut tree = Tree::new();
        let marker_id = tree.new_marker_id();
        let marker = tree.alloc(NodeKind::Marker(marker_id));
        tree.append_child(tree.root(), marker);

        let markup = serialize(&tree);
        let reparsed = parse(&markup);
        assert!(reparsed.find_marker(marker_id).is_some());
    }

    #[test]
    fn test_parse_legacy_tags() {
        let tree = parse("<b>Win</b><font color=\"red\" size=\"5\">x</font>");
        let children = tree.children(tree.root());
        assert!(matches!(
            tree.node(children[0]).kind,
            NodeKind::Legacy(LegacyTag::Bold)
        ));
        assert!(matches!(
            tree.node(children[1]).kind,
            NodeKind::Legacy(LegacyTag::Font)
        ));
        assert_eq!(tree.node(children[1]).attr("color"), Some("red"));
    }
}
