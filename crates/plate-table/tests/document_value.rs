use plate_table::table::schema::{BODY, CELL, ROW, TABLE, WRAPPER, table_fragment};
use plate_table::table::tables;
use plate_table::{
    DOCUMENT_VERSION, Document, DocumentValue, Editor, Node, PluginRegistry, TableModel,
    ValueError,
};
use pretty_assertions::assert_eq;
use serde_json::json;

fn editor() -> Editor {
    let doc = Document {
        children: vec![
            Node::paragraph("intro"),
            table_fragment(&[["a", "b"], ["c", "d"]]),
        ],
    };
    Editor::from_document(&doc, PluginRegistry::table())
}

#[test]
fn saved_documents_reload_into_an_equal_editor() -> anyhow::Result<()> {
    let editor = editor();
    let text = DocumentValue::from_editor(&editor).to_json_pretty()?;

    let loaded = DocumentValue::from_json_str(&text)?;
    assert_eq!(loaded.schema, "plate-table");
    assert_eq!(loaded.version, DOCUMENT_VERSION);

    let reloaded = loaded.into_editor(PluginRegistry::table());
    assert_eq!(reloaded.to_document(), editor.to_document());
    Ok(())
}

#[test]
fn foreign_schemas_are_refused() {
    let text = json!({
        "schema": "spreadsheet",
        "version": 1,
        "document": { "children": [] },
    })
    .to_string();
    let err = DocumentValue::from_json_str(&text).unwrap_err();
    assert!(matches!(err, ValueError::Schema(schema) if schema == "spreadsheet"));
}

#[test]
fn newer_versions_are_refused() {
    let text = json!({
        "schema": "plate-table",
        "version": DOCUMENT_VERSION + 1,
        "document": { "children": [] },
    })
    .to_string();
    let err = DocumentValue::from_json_str(&text).unwrap_err();
    assert!(matches!(
        err,
        ValueError::Version { found, supported } if found == DOCUMENT_VERSION + 1 && supported == DOCUMENT_VERSION
    ));
}

#[test]
fn malformed_input_is_a_json_error() {
    let err = DocumentValue::from_json_str("{ \"schema\": ").unwrap_err();
    assert!(matches!(err, ValueError::Json(_)));

    // The envelope fields are required.
    let err = DocumentValue::from_json_str(r#"{ "document": { "children": [] } }"#).unwrap_err();
    assert!(matches!(err, ValueError::Json(_)));
}

#[test]
fn loading_repairs_hand_written_tables() -> anyhow::Result<()> {
    let cell = |text: &str| Node::element(CELL, vec![Node::paragraph(text)]);
    let value = DocumentValue {
        schema: "plate-table".to_string(),
        version: DOCUMENT_VERSION,
        document: Document {
            children: vec![Node::element(
                TABLE,
                vec![
                    Node::element(ROW, vec![cell("a"), cell("b")]),
                    Node::element(ROW, vec![cell("c")]),
                ],
            )],
        },
    };
    let text = serde_json::to_string(&value)?;

    let editor = DocumentValue::from_json_str(&text)?.into_editor(PluginRegistry::table());
    let tree = editor.tree();
    let wrapper = tree.children(tree.root())[0];
    assert!(tree.is_kind(wrapper, WRAPPER));

    let model = TableModel::resolve(tree, tables(tree)[0])?;
    assert!(tree.is_kind(model.body, BODY));
    assert_eq!(model.row_count(), 2);
    let widths: Vec<usize> = model
        .body_rows()
        .into_iter()
        .map(|row| model.cells(row).len())
        .collect();
    assert_eq!(widths, vec![2, 2]);
    Ok(())
}
