use plate_table::table::schema::table_fragment;
use plate_table::table::locator::resolve_cell;
use plate_table::{
    BorderState, CommandOptions, CommandOutcome, Document, Editor, Node, NodeId, PluginRegistry,
    Selection, TableError,
};
use pretty_assertions::assert_eq;
use serde_json::json;

fn editor_with(table: Node) -> Editor {
    let doc = Document {
        children: vec![table],
    };
    Editor::from_document(&doc, PluginRegistry::table())
}

fn leaf(editor: &Editor, text: &str) -> NodeId {
    let tree = editor.tree();
    tree.descendants(tree.root())
        .into_iter()
        .find(|&id| tree.text(id) == Some(text))
        .unwrap()
}

fn border(editor: &Editor, text: &str) -> BorderState {
    let cell = resolve_cell(editor.tree(), leaf(editor, text)).unwrap();
    BorderState::read(editor.tree(), cell)
}

fn set_border(editor: &mut Editor, text: &str, args: serde_json::Value) -> CommandOutcome {
    let target = leaf(editor, text);
    editor
        .run_command_with(
            "table.set_border",
            CommandOptions::new().target(target).args(args),
        )
        .unwrap()
}

#[test]
fn top_on_then_off_restores_the_cell_and_leaves_other_sides_alone() {
    let mut editor = editor_with(table_fragment(&[["a", "b"]]));
    set_border(&mut editor, "a", json!({ "side": "right", "value": true }));
    let original = border(&editor, "a");

    set_border(&mut editor, "a", json!({ "side": "top", "value": true }));
    let on = border(&editor, "a");
    assert!(on.top);
    assert_eq!((on.right, on.bottom, on.left), (original.right, original.bottom, original.left));

    set_border(&mut editor, "a", json!({ "side": "top", "value": false }));
    assert_eq!(border(&editor, "a"), original);
    assert_eq!(border(&editor, "b"), BorderState::default());
}

#[test]
fn all_and_none_write_four_explicit_sides() {
    let mut editor = editor_with(table_fragment(&[["a"]]));

    set_border(&mut editor, "a", json!({ "side": "all" }));
    assert_eq!(
        border(&editor, "a"),
        BorderState {
            top: true,
            right: true,
            bottom: true,
            left: true,
        }
    );

    set_border(&mut editor, "a", json!({ "side": "none", "value": true }));
    let cell = resolve_cell(editor.tree(), leaf(&editor, "a")).unwrap();
    for key in ["border_top", "border_right", "border_bottom", "border_left"] {
        assert_eq!(editor.tree().attr(cell, key), Some(&json!(false)));
    }
}

#[test]
fn omitted_value_toggles_the_side() {
    let mut editor = editor_with(table_fragment(&[["a"]]));

    set_border(&mut editor, "a", json!({ "side": "bottom" }));
    assert!(border(&editor, "a").bottom);
    set_border(&mut editor, "a", json!({ "side": "bottom" }));
    assert!(!border(&editor, "a").bottom);
}

#[test]
fn a_span_selection_sets_every_cell_in_its_rectangle() {
    let mut editor = editor_with(table_fragment(&[["a", "b", "c"], ["d", "e", "f"]]));
    let anchor = leaf(&editor, "a");
    let focus = leaf(&editor, "e");
    editor.set_selection(Selection::span(anchor, focus));

    editor
        .run_command("table.set_border", Some(json!({ "side": "left", "value": true })))
        .unwrap();

    for text in ["a", "b", "d", "e"] {
        assert!(border(&editor, text).left, "{text} should have a left border");
    }
    for text in ["c", "f"] {
        assert!(!border(&editor, text).left, "{text} is outside the selection");
    }
}

#[test]
fn bad_border_arguments_are_rejected_without_changes() {
    let mut editor = editor_with(table_fragment(&[["a"]]));
    let before = editor.to_document();

    let outcome = set_border(&mut editor, "a", json!({ "side": "diagonal" }));
    assert!(matches!(
        outcome,
        CommandOutcome::Aborted(TableError::InvalidArguments(_))
    ));
    let outcome = set_border(&mut editor, "a", json!({ "side": "top", "value": "yes" }));
    assert!(matches!(
        outcome,
        CommandOutcome::Aborted(TableError::InvalidArguments(_))
    ));
    assert_eq!(editor.to_document(), before);
}

#[test]
fn border_query_reports_the_focused_cell() {
    let mut editor = editor_with(table_fragment(&[["a"]]));
    set_border(&mut editor, "a", json!({ "side": "left", "value": true }));
    let a = leaf(&editor, "a");
    editor.set_selection(Selection::collapsed(a));

    let state: BorderState = editor.run_query("table.border", None).unwrap();
    assert!(state.left);
    assert!(!state.top);
}
