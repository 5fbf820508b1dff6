use plate_table::table::schema::{table_fragment, table_fragment_with_header};
use plate_table::table::tables;
use plate_table::{
    BorderState, CommandOptions, CommandOutcome, Document, Editor, EditorConfig, Node, NodeId,
    PluginRegistry, Selection, SelectionContext, TableError, TableModel,
};
use pretty_assertions::assert_eq;
use serde_json::json;

fn editor_with(table: Node) -> Editor {
    let doc = Document {
        children: vec![Node::paragraph("before"), table, Node::paragraph("after")],
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

fn select(editor: &mut Editor, text: &str) {
    let node = leaf(editor, text);
    editor.set_selection(Selection::collapsed(node));
}

fn grid(editor: &Editor) -> Vec<Vec<String>> {
    let tree = editor.tree();
    let model = TableModel::resolve(tree, tables(tree)[0]).unwrap();
    model
        .rows()
        .into_iter()
        .map(|row| {
            model
                .cells(row)
                .into_iter()
                .map(|cell| tree.text_content(cell))
                .collect()
        })
        .collect()
}

#[test]
fn insert_row_below_adds_an_empty_row_and_selects_it() {
    let mut editor = editor_with(table_fragment(&[["a", "b"], ["c", "d"]]));
    select(&mut editor, "a");

    let outcome = editor.run_command("table.insert_row_below", None).unwrap();
    assert_eq!(outcome, CommandOutcome::Applied);
    assert_eq!(
        grid(&editor),
        vec![
            vec!["a", "b"],
            vec!["", ""],
            vec!["c", "d"],
        ]
    );

    let tree = editor.tree();
    let model = TableModel::resolve(tree, tables(tree)[0]).unwrap();
    let new_row = model.body_rows()[1];
    let cells = model.cells(new_row);
    let selection = editor.selection();
    assert!(tree.is_ancestor_of(cells[0], selection.anchor));
    assert!(tree.is_ancestor_of(cells[1], selection.focus));
    assert_eq!(editor.toolbar().context(), SelectionContext::Row);
}

#[test]
fn insert_row_above_then_delete_row_restores_the_table() {
    let mut editor = editor_with(table_fragment(&[["a", "b"], ["c", "d"]]));
    let before = grid(&editor);
    select(&mut editor, "c");

    editor.run_command("table.insert_row_above", None).unwrap();
    assert_eq!(grid(&editor)[1], vec!["", ""]);
    assert_eq!(grid(&editor).len(), 3);

    editor.run_command("table.delete_row", None).unwrap();
    assert_eq!(grid(&editor), before);
}

#[test]
fn new_row_cells_mirror_their_column_borders() {
    let mut editor = editor_with(table_fragment(&[["a", "b"], ["c", "d"]]));
    let b = leaf(&editor, "b");
    editor
        .run_command_with(
            "table.set_border",
            CommandOptions::new()
                .target(b)
                .args(json!({ "side": "left", "value": true })),
        )
        .unwrap();

    select(&mut editor, "a");
    editor.run_command("table.insert_row_below", None).unwrap();

    let tree = editor.tree();
    let model = TableModel::resolve(tree, tables(tree)[0]).unwrap();
    let cells = model.cells(model.body_rows()[1]);
    assert_eq!(BorderState::read(tree, cells[0]), BorderState::default());
    assert!(BorderState::read(tree, cells[1]).left);
    assert_eq!(tree.attr(cells[0], "border_left"), None);
}

#[test]
fn rows_inserted_from_the_header_go_to_the_top_of_the_body() {
    let mut editor = editor_with(table_fragment_with_header(&["h1", "h2"], &[["a", "b"]]));
    select(&mut editor, "h1");

    editor.run_command("table.insert_row_below", None).unwrap();
    assert_eq!(
        grid(&editor),
        vec![vec!["h1", "h2"], vec!["", ""], vec!["a", "b"]]
    );
}

#[test]
fn new_row_width_follows_the_header() {
    // The header is wider than the body; new rows take the header's width.
    let mut editor = editor_with(table_fragment_with_header(
        &["h1", "h2", "h3"],
        &[["a", "b"]],
    ));
    select(&mut editor, "a");

    editor.run_command("table.insert_row_below", None).unwrap();
    assert_eq!(grid(&editor)[2].len(), 3);
}

#[test]
fn deleting_the_only_row_removes_the_whole_table() {
    let mut editor = editor_with(table_fragment(&[["a", "b"]]));
    select(&mut editor, "b");

    let outcome = editor.run_command("table.delete_row", None).unwrap();
    assert_eq!(outcome, CommandOutcome::Applied);
    assert!(tables(editor.tree()).is_empty());
    assert_eq!(
        editor.to_document(),
        Document {
            children: vec![Node::paragraph("before"), Node::paragraph("after")],
        }
    );
    assert_eq!(editor.tree().text(editor.selection().anchor), Some("before"));
    assert_eq!(editor.toolbar().context(), SelectionContext::Other);
}

#[test]
fn deleting_the_only_row_is_refused_when_empty_tables_are_kept() {
    let mut editor = editor_with(table_fragment(&[["a", "b"]])).with_config(EditorConfig {
        delete_empty_tables: false,
        ..EditorConfig::default()
    });
    let before = editor.to_document();
    select(&mut editor, "a");

    let outcome = editor.run_command("table.delete_row", None).unwrap();
    assert!(matches!(
        outcome,
        CommandOutcome::Aborted(TableError::StructuralGuardViolation(_))
    ));
    assert_eq!(editor.to_document(), before);
    assert!(!editor.can_undo());
}

#[test]
fn the_header_row_cannot_be_deleted_as_a_row() {
    let mut editor = editor_with(table_fragment_with_header(
        &["h1", "h2"],
        &[["a", "b"], ["c", "d"]],
    ));
    let before = editor.to_document();
    select(&mut editor, "h2");

    let outcome = editor.run_command("table.delete_row", None).unwrap();
    assert!(matches!(
        outcome,
        CommandOutcome::Aborted(TableError::StructuralGuardViolation(_))
    ));
    assert_eq!(editor.to_document(), before);
}

#[test]
fn row_commands_outside_a_table_report_the_missing_row() {
    let mut editor = editor_with(table_fragment(&[["a"]]));
    let before = editor.to_document();
    select(&mut editor, "before");

    let outcome = editor.run_command("table.insert_row_below", None).unwrap();
    assert_eq!(
        outcome,
        CommandOutcome::Aborted(TableError::TargetNotFound { expected: "row" })
    );
    assert_eq!(editor.to_document(), before);
    assert!(!editor.can_undo());
}
