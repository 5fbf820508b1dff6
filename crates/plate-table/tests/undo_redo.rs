use plate_table::table::schema::{table_fragment, table_fragment_with_header};
use plate_table::table::tables;
use plate_table::{
    CommandOutcome, Document, Editor, EditorConfig, Node, NodeId, PluginRegistry, Selection,
};
use pretty_assertions::assert_eq;
use serde_json::json;

fn editor_with(table: Node) -> Editor {
    let doc = Document {
        children: vec![Node::paragraph("before"), table],
    };
    Editor::from_document(&doc, PluginRegistry::table())
}

fn select(editor: &mut Editor, text: &str) {
    let tree = editor.tree();
    let node: NodeId = tree
        .descendants(tree.root())
        .into_iter()
        .find(|&id| tree.text(id) == Some(text))
        .unwrap();
    editor.set_selection(Selection::collapsed(node));
}

#[test]
fn every_structural_edit_undoes_to_the_previous_document() {
    let commands = [
        ("table.insert_row_above", None),
        ("table.insert_row_below", None),
        ("table.insert_col_left", None),
        ("table.insert_col_right", None),
        ("table.delete_row", None),
        ("table.delete_col", None),
        ("table.remove_header", None),
        ("table.delete_table", None),
        ("table.set_border", Some(json!({ "side": "all" }))),
        ("table.resize", Some(json!({ "rows": 1, "cols": 4 }))),
    ];

    for (id, args) in commands {
        let mut editor = editor_with(table_fragment_with_header(
            &["h1", "h2"],
            &[["a", "b"], ["c", "d"]],
        ));
        select(&mut editor, "c");
        let before = editor.to_document();

        let outcome = editor.run_command(id, args).unwrap();
        assert_eq!(outcome, CommandOutcome::Applied, "{id}");
        let after = editor.to_document();
        assert_ne!(after, before, "{id}");

        assert!(editor.undo(), "{id}");
        assert_eq!(editor.to_document(), before, "{id}");
        assert!(editor.redo(), "{id}");
        assert_eq!(editor.to_document(), after, "{id}");
    }
}

#[test]
fn cascade_delete_is_a_single_undo_step() {
    let mut editor = editor_with(table_fragment(&[["only"]]));
    let before = editor.to_document();
    select(&mut editor, "only");

    editor.run_command("table.delete_row", None).unwrap();
    assert!(tables(editor.tree()).is_empty());

    assert!(editor.undo());
    assert_eq!(editor.to_document(), before);
    assert!(!editor.can_undo());
}

#[test]
fn undo_restores_the_selection_from_before_the_command() {
    let mut editor = editor_with(table_fragment(&[["a", "b"]]));
    select(&mut editor, "b");
    let selection = *editor.selection();

    editor.run_command("table.insert_col_right", None).unwrap();
    assert_ne!(*editor.selection(), selection);

    editor.undo();
    assert_eq!(*editor.selection(), selection);
}

#[test]
fn aborted_and_unchanged_commands_record_nothing() {
    let mut editor = editor_with(table_fragment(&[["a"]]));
    select(&mut editor, "before");

    let outcome = editor.run_command("table.delete_col", None).unwrap();
    assert!(matches!(outcome, CommandOutcome::Aborted(_)));

    select(&mut editor, "a");
    let outcome = editor.run_command("table.remove_header", None).unwrap();
    assert_eq!(outcome, CommandOutcome::Unchanged);
    assert!(!editor.can_undo());
}

#[test]
fn undo_history_is_bounded() {
    let mut editor = editor_with(table_fragment(&[["a"]])).with_config(EditorConfig {
        max_undo: 2,
        ..EditorConfig::default()
    });
    select(&mut editor, "a");
    for _ in 0..4 {
        editor.run_command("table.insert_row_below", None).unwrap();
    }

    assert!(editor.undo());
    assert!(editor.undo());
    assert!(!editor.undo());
    assert_eq!(
        editor
            .run_query_json("table.dimensions", None)
            .unwrap()["rows"],
        3
    );
}

#[test]
fn a_new_edit_clears_redo() {
    let mut editor = editor_with(table_fragment(&[["a", "b"]]));
    select(&mut editor, "a");

    editor.run_command("table.insert_col_left", None).unwrap();
    assert!(editor.undo());
    assert!(editor.can_redo());

    editor.run_command("table.insert_row_below", None).unwrap();
    assert!(!editor.can_redo());
}
