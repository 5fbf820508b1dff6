use plate_table::table::schema::{WRAPPER, table_fragment};
use plate_table::table::tables;
use plate_table::{
    AttrPatch, CommandOptions, CommandOutcome, CommandSpec, Document, DocumentTree, Editor, Node,
    NodeId, Op, PluginRegistry, Renderer, Selection, TableError, Transaction,
};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};

fn editor() -> Editor {
    let doc = Document {
        children: vec![
            Node::paragraph("intro"),
            table_fragment(&[["a", "b"], ["c", "d"]]),
        ],
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

#[derive(Default)]
struct RecordingRenderer {
    painted: Vec<(NodeId, String)>,
}

impl Renderer for RecordingRenderer {
    fn render(&mut self, tree: &DocumentTree, node: NodeId) {
        let kind = tree.kind(node).unwrap_or_default().to_string();
        self.painted.push((node, kind));
    }
}

#[test]
fn unknown_commands_are_errors() {
    let mut editor = editor();
    let err = editor.run_command("table.explode", None).unwrap_err();
    assert_eq!(err.message(), "Unknown command: table.explode");
}

#[test]
fn target_overrides_the_live_selection() {
    let mut editor = editor();
    let intro = leaf(&editor, "intro");
    editor.set_selection(Selection::collapsed(intro));

    let c = leaf(&editor, "c");
    let outcome = editor
        .run_command_with("table.insert_row_below", CommandOptions::new().target(c))
        .unwrap();
    assert_eq!(outcome, CommandOutcome::Applied);
    assert_eq!(
        editor.run_query_json("table.dimensions", Some(json!({ "target": c }))).unwrap(),
        json!({ "rows": 3, "cols": 2, "has_header": false })
    );
}

#[test]
fn commands_outside_a_table_abort_without_touching_the_document() {
    let mut editor = editor();
    let before = editor.to_document();
    let intro = leaf(&editor, "intro");
    editor.set_selection(Selection::collapsed(intro));

    for (id, expected) in [
        ("table.insert_row_above", TableError::TargetNotFound { expected: "row" }),
        ("table.delete_col", TableError::TargetNotFound { expected: "cell" }),
        ("table.add_header", TableError::NotATable),
        ("table.delete_table", TableError::NotATable),
    ] {
        let outcome = editor.run_command(id, None).unwrap();
        assert_eq!(outcome, CommandOutcome::Aborted(expected), "{id}");
    }
    assert_eq!(editor.to_document(), before);
    assert!(!editor.can_undo());
    assert!(editor.pending_repaints().is_empty());
}

#[test]
fn detached_targets_are_rejected() {
    let mut editor = editor();
    let c = leaf(&editor, "c");
    editor.set_selection(Selection::collapsed(c));
    editor.run_command("table.delete_table", None).unwrap();
    assert!(!editor.tree().is_attached(c));

    let outcome = editor
        .run_command_with("table.insert_row_below", CommandOptions::new().target(c))
        .unwrap();
    assert!(matches!(
        outcome,
        CommandOutcome::Aborted(TableError::TargetNotFound { .. })
    ));
}

#[test]
fn host_commands_run_through_the_same_pipeline() -> anyhow::Result<()> {
    let mut editor = editor();
    editor.register_command(CommandSpec::new(
        "host.mark_cell",
        "Mark cell",
        |editor, anchor, _options| {
            let cell = plate_table::table::locator::resolve_cell(editor.tree(), anchor)?;
            Ok(Transaction::new(vec![Op::SetNodeAttrs {
                node: cell,
                patch: AttrPatch::set("marked", true),
            }]))
        },
    ))?;
    assert!(editor
        .register_command(CommandSpec::new("host.mark_cell", "Again", |_, _, _| {
            Ok(Transaction::empty())
        }))
        .is_err());

    let b = leaf(&editor, "b");
    editor.set_selection(Selection::collapsed(b));
    assert_eq!(editor.run_command("host.mark_cell", None)?, CommandOutcome::Applied);

    let cell = plate_table::table::locator::resolve_cell(editor.tree(), b)?;
    assert_eq!(editor.tree().attr(cell, "marked"), Some(&json!(true)));

    assert!(editor.undo());
    assert_eq!(editor.tree().attr(cell, "marked"), None);
    Ok(())
}

#[test]
fn repaint_is_queued_once_per_surface_and_drained_by_the_host() {
    let mut editor = editor();
    let a = leaf(&editor, "a");
    editor.set_selection(Selection::collapsed(a));

    editor.run_command("table.insert_col_right", None).unwrap();
    let wrapper = editor.tree().parent(tables(editor.tree())[0]).unwrap();
    assert_eq!(editor.pending_repaints(), &[wrapper]);

    let mut renderer = RecordingRenderer::default();
    assert_eq!(editor.flush_repaints(&mut renderer), 1);
    assert_eq!(renderer.painted, vec![(wrapper, WRAPPER.to_string())]);
    assert_eq!(editor.flush_repaints(&mut renderer), 0);
}

#[test]
fn deleted_tables_repaint_their_parent() {
    let mut editor = editor();
    let a = leaf(&editor, "a");
    editor.set_selection(Selection::collapsed(a));

    editor.run_command("table.delete_table", None).unwrap();
    let root = editor.tree().root();
    assert_eq!(editor.pending_repaints(), &[root]);
}

#[test]
fn queries_answer_for_the_selection_or_a_target() {
    let mut editor = editor();
    let intro = leaf(&editor, "intro");
    editor.set_selection(Selection::collapsed(intro));
    assert_eq!(editor.run_query::<bool>("table.is_active", None).unwrap(), false);
    assert_eq!(
        editor.run_query_json("table.dimensions", None).unwrap(),
        Value::Null
    );

    let d = leaf(&editor, "d");
    editor.set_selection(Selection::collapsed(d));
    assert_eq!(editor.run_query::<bool>("table.is_active", None).unwrap(), true);

    let err = editor
        .run_query_json("table.dimensions", Some(json!({ "target": "nope" })))
        .unwrap_err();
    assert!(err.message().starts_with("Invalid target"));
    assert!(editor.run_query_json("table.unknown", None).is_err());
}
