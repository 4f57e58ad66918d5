use pretty_assertions::assert_eq;
use richtext_core::{
    BlockAlignment, Caret, EditHost, EditorSurface, FormatIntent, HeadlessHost, IndentDirection,
    ListKind, ManualScheduler, SelectionRange,
};

type Surface = EditorSurface<HeadlessHost, ManualScheduler>;

fn surface(content: &str) -> Surface {
    EditorSurface::from_markup(content, HeadlessHost::new(), ManualScheduler::new())
}

fn select_chars(surface: &mut Surface, node: richtext_core::NodeId, from: usize, to: usize) {
    surface
        .host_mut()
        .select(SelectionRange::new(Caret::new(node, from), Caret::new(node, to)));
}

#[test]
fn test_bold_selection_then_undo_restores_text_and_cursor() {
    // Scenario: "foobar", select "foo", apply bold.
    let mut surface = surface("foobar");
    let text = surface.tree().children(surface.tree().root())[0];
    select_chars(&mut surface, text, 0, 3);

    surface.apply_format(&FormatIntent::bold());
    assert_eq!(
        surface.markup(),
        "<span style=\"font-weight: bold\">foo</span>bar"
    );

    // The restored selection still covers "foo" inside the new wrapper.
    let selection = surface
        .host()
        .selection(surface.tree())
        .expect("selection restored after formatting");
    let tree = surface.tree();
    assert_eq!(tree.caret_to_text_offset(selection.anchor), Some(0));
    assert_eq!(tree.caret_to_text_offset(selection.focus), Some(3));

    surface.undo();
    assert_eq!(surface.markup(), "foobar");
    assert_eq!(surface.plain_text(), "foobar");

    // The cursor is back at its pre-bold position.
    let selection = surface
        .host()
        .selection(surface.tree())
        .expect("selection restored after undo");
    let tree = surface.tree();
    assert_eq!(tree.caret_to_text_offset(selection.anchor), Some(0));
    assert_eq!(tree.caret_to_text_offset(selection.focus), Some(3));

    surface.redo();
    assert_eq!(
        surface.markup(),
        "<span style=\"font-weight: bold\">foo</span>bar"
    );
}

#[test]
fn test_bold_toggles_off_when_everything_is_bold() {
    let mut surface = surface("<span style=\"font-weight: bold\">loud</span>");
    let span = surface.tree().children(surface.tree().root())[0];
    let text = surface.tree().children(span)[0];
    select_chars(&mut surface, text, 0, 4);

    surface.apply_format(&FormatIntent::bold());
    assert_eq!(
        surface.markup(),
        "<span style=\"font-weight: bold\"><span style=\"font-weight: normal\">loud</span></span>"
    );
}

#[test]
fn test_collapsed_selection_inline_intent_is_noop() {
    let mut surface = surface("quiet");
    let text = surface.tree().children(surface.tree().root())[0];
    surface
        .host_mut()
        .select(SelectionRange::caret(Caret::new(text, 2)));

    let before = surface.version();
    surface.apply_format(&FormatIntent::bold());
    assert_eq!(surface.markup(), "quiet");
    assert_eq!(surface.version(), before);
}

#[test]
fn test_font_size_wrap_across_straddling_selection() {
    // The selection starts inside a styled run and ends in the plain
    // tail: the wrap cannot enclose it atomically and must recover by
    // extract-and-reinsert, never surfacing an error.
    let mut surface = surface("<span style=\"color: red\">redrun</span>tail");
    let root = surface.tree().root();
    let span = surface.tree().children(root)[0];
    let styled = surface.tree().children(span)[0];
    let tail = surface.tree().children(root)[1];
    surface.host_mut().select(SelectionRange::new(
        Caret::new(styled, 3),
        Caret::new(tail, 2),
    ));

    surface.apply_format(&FormatIntent {
        font_size_px: Some(24),
        ..FormatIntent::default()
    });

    assert_eq!(
        surface.markup(),
        "<span style=\"color: red\">red</span>\
         <span style=\"font-size: 24px\"><span style=\"color: red\">run</span>ta</span>il"
    );
    assert_eq!(surface.plain_text(), "redruntail");

    // One undo reverts the whole recovery.
    surface.undo();
    assert_eq!(
        surface.markup(),
        "<span style=\"color: red\">redrun</span>tail"
    );
}

#[test]
fn test_block_alignment_applies_without_selection_range() {
    let mut surface = surface("<div>line</div>");
    let block = surface.tree().children(surface.tree().root())[0];
    let text = surface.tree().children(block)[0];
    surface
        .host_mut()
        .select(SelectionRange::caret(Caret::new(text, 0)));

    surface.apply_format(&FormatIntent {
        alignment: Some(BlockAlignment::Center),
        ..FormatIntent::default()
    });
    assert_eq!(
        surface.markup(),
        "<div style=\"text-align: center\">line</div>"
    );
}

#[test]
fn test_list_intent_delegates_to_host_primitive() {
    let mut surface = surface("<div>item</div>");
    let block = surface.tree().children(surface.tree().root())[0];
    let text = surface.tree().children(block)[0];
    surface
        .host_mut()
        .select(SelectionRange::caret(Caret::new(text, 2)));

    surface.apply_format(&FormatIntent {
        list: Some(ListKind::Bulleted),
        ..FormatIntent::default()
    });
    assert_eq!(surface.markup(), "<ul><li>item</li></ul>");

    // The caret survived the restructuring.
    let selection = surface
        .host()
        .selection(surface.tree())
        .expect("selection restored");
    assert_eq!(surface.tree().caret_to_text_offset(selection.anchor), Some(2));

    surface.undo();
    assert_eq!(surface.markup(), "<div>item</div>");
}

#[test]
fn test_indent_intent_adjusts_enclosing_block() {
    let mut surface = surface("<div>deep</div>");
    let block = surface.tree().children(surface.tree().root())[0];
    let text = surface.tree().children(block)[0];
    surface
        .host_mut()
        .select(SelectionRange::caret(Caret::new(text, 0)));

    surface.apply_format(&FormatIntent {
        indent: Some(IndentDirection::Increase),
        ..FormatIntent::default()
    });
    assert_eq!(
        surface.markup(),
        "<div style=\"padding-left: 24px\">deep</div>"
    );
}

#[test]
fn test_color_and_family_apply_together() {
    let mut surface = surface("words");
    let text = surface.tree().children(surface.tree().root())[0];
    select_chars(&mut surface, text, 0, 5);

    surface.apply_format(&FormatIntent {
        color: Some("#AA0000".to_string()),
        font_family: Some("Georgia".to_string()),
        ..FormatIntent::default()
    });
    assert_eq!(
        surface.markup(),
        "<span style=\"color: #aa0000; font-family: Georgia\">words</span>"
    );
}
