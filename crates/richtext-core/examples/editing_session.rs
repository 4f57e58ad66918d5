//! Editing session example
//!
//! Walks one editable surface through typing, formatting, linking, and
//! undo, printing what the owner would receive at each step.

use richtext_core::{
    Caret, ClickPoint, EditorSurface, HeadlessHost, KeyInput, LinkMode, LinkTarget,
    ManualScheduler, SelectionRange, SurfaceEvent,
};
use std::time::Duration;

fn main() {
    println!("=== Editing session ===\n");

    let mut surface =
        EditorSurface::from_markup("Respond 2NT with both minors", HeadlessHost::new(), ManualScheduler::new());
    surface.subscribe(|event| match event {
        SurfaceEvent::Committed { plain_text, markup } => {
            println!("  committed: {plain_text:?}");
            println!("  markup:    {markup}");
        }
        SurfaceEvent::Navigate(navigation) => {
            println!(
                "  navigate:  {} ({:?})",
                navigation.target_id, navigation.mode
            );
        }
    });

    println!("1. Typing (debounced commit):");
    let root = surface.tree().root();
    let typed = surface.tree_mut().alloc_text(" only");
    surface.tree_mut().append_child(root, typed);
    surface.notify_input();
    run_timers(&mut surface, Duration::from_millis(300));

    println!("\n2. Bold via the keyboard surface:");
    let text = surface.tree().children(surface.tree().root())[0];
    surface
        .host_mut()
        .select(SelectionRange::new(Caret::new(text, 8), Caret::new(text, 11)));
    surface.key_input(&KeyInput::ctrl('b'));

    println!("\n3. Linking the selection:");
    surface.set_targets(vec![LinkTarget {
        id: "p42".to_string(),
        name: "Minor-suit responses".to_string(),
        mode: LinkMode::Split,
    }]);
    let target = surface.open_link_picker()[0].clone();
    surface.apply_link(&target).expect("selection was saved");

    println!("\n4. Clicking the link:");
    let tree = surface.tree();
    let link = tree
        .descendants(tree.root())
        .into_iter()
        .find(|&id| matches!(tree.node(id).kind, richtext_core::NodeKind::Link))
        .expect("link exists");
    surface.link_click(link, ClickPoint { x: 12.0, y: 30.0 });

    println!("\n5. Undoing the link:");
    surface.undo();

    println!("\nFinal markup: {}", surface.markup());
}

fn run_timers(
    surface: &mut EditorSurface<HeadlessHost, ManualScheduler>,
    by: Duration,
) {
    let fired = surface.scheduler_mut().advance(by);
    for (id, _kind) in fired {
        surface.timer_fired(id);
    }
}
