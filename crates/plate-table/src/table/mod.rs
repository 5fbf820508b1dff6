pub mod edit;
pub mod lifecycle;
pub mod locator;
pub mod model;
mod normalize;
pub mod schema;

use serde_json::{Value, json};

use crate::core::Editor;
use crate::error::{QueryError, TableError};
use crate::ops::Transaction;
use crate::plugin::{CommandOptions, CommandSpec, NormalizePass, PlatePlugin, QuerySpec};
use crate::table::edit::{ColumnSide, RowSide};
use crate::table::lifecycle::{TableConfiguration, table_state};
use crate::table::locator::{resolve_cell, resolve_table, selected_cells};
use crate::table::model::TableModel;
use crate::table::normalize::NormalizeTableStructure;
use crate::table::schema::{BorderState, BorderTarget, TABLE};
use crate::tree::{DocumentTree, NodeId};

/// Every attached `table` node in document order.
pub fn tables(tree: &DocumentTree) -> Vec<NodeId> {
    tree.descendants(tree.root())
        .into_iter()
        .filter(|&id| tree.is_kind(id, TABLE))
        .collect()
}

pub struct TablePlugin;

impl PlatePlugin for TablePlugin {
    fn id(&self) -> &'static str {
        "table"
    }

    fn normalize_passes(&self) -> Vec<Box<dyn NormalizePass>> {
        vec![Box::new(NormalizeTableStructure)]
    }

    fn commands(&self) -> Vec<CommandSpec> {
        vec![
            CommandSpec::new("table.insert", "Insert table", |editor, anchor, options| {
                let configuration = TableConfiguration::from_options(options, editor.config())?;
                lifecycle::insert_table(editor, anchor, configuration)
            })
            .description("Insert a populated table after the current block.")
            .keywords(["table", "grid"])
            .args_example(json!({ "rows": 2, "cols": 3, "header": true })),
            CommandSpec::new(
                "table.insert_placeholder",
                "Insert table placeholder",
                |editor, anchor, _options| lifecycle::insert_placeholder(editor, anchor),
            )
            .description("Insert a pending table that waits for its dimensions.")
            .keywords(["table", "grid"])
            .hidden(true),
            CommandSpec::new("table.confirm", "Create table", |editor, anchor, options| {
                let configuration = TableConfiguration::from_options(options, editor.config())?;
                lifecycle::confirm_table(editor, anchor, configuration)
            })
            .description("Replace a pending table with a table of the given size.")
            .args_example(json!({ "rows": 3, "cols": 3, "header": false }))
            .hidden(true),
            CommandSpec::new("table.cancel", "Cancel table", |editor, anchor, _options| {
                lifecycle::cancel_table(editor, anchor)
            })
            .description("Discard a pending table.")
            .hidden(true),
            CommandSpec::new("table.resize", "Resize table", |editor, anchor, options| {
                let model = TableModel::resolve(editor.tree(), anchor)?;
                let rows = count_arg(options, "rows")?.unwrap_or(model.row_count());
                let cols = count_arg(options, "cols")?.unwrap_or(model.column_count());
                edit::resize(editor, anchor, rows, cols)
            })
            .description("Change the number of body rows and columns in place.")
            .keywords(["table", "size", "dimensions"])
            .args_example(json!({ "rows": 4, "cols": 2 })),
            CommandSpec::new(
                "table.insert_row_above",
                "Insert row above",
                |editor, anchor, _options| edit::insert_row(editor, anchor, RowSide::Above),
            )
            .description("Insert a new row above the current row.")
            .keywords(["table", "row", "insert"]),
            CommandSpec::new(
                "table.insert_row_below",
                "Insert row below",
                |editor, anchor, _options| edit::insert_row(editor, anchor, RowSide::Below),
            )
            .description("Insert a new row below the current row.")
            .keywords(["table", "row", "insert"]),
            CommandSpec::new(
                "table.insert_col_left",
                "Insert column left",
                |editor, anchor, _options| edit::insert_column(editor, anchor, ColumnSide::Left),
            )
            .description("Insert a new column to the left of the current column.")
            .keywords(["table", "column", "insert"]),
            CommandSpec::new(
                "table.insert_col_right",
                "Insert column right",
                |editor, anchor, _options| edit::insert_column(editor, anchor, ColumnSide::Right),
            )
            .description("Insert a new column to the right of the current column.")
            .keywords(["table", "column", "insert"]),
            CommandSpec::new("table.delete_row", "Delete row", |editor, anchor, _options| {
                edit::remove_row(editor, anchor)
            })
            .description("Delete the current body row.")
            .keywords(["table", "row", "delete", "remove"]),
            CommandSpec::new("table.delete_col", "Delete column", |editor, anchor, _options| {
                edit::remove_column(editor, anchor)
            })
            .description("Delete the current column, header cell included.")
            .keywords(["table", "column", "delete", "remove"]),
            CommandSpec::new(
                "table.delete_table",
                "Delete table",
                |editor, anchor, _options| edit::delete_table(editor, anchor),
            )
            .description("Delete the current table.")
            .keywords(["table", "delete", "remove"]),
            CommandSpec::new("table.add_header", "Add header", |editor, anchor, _options| {
                edit::add_header(editor, anchor)
            })
            .description("Add a header row, or pad a short one.")
            .keywords(["table", "header"]),
            CommandSpec::new(
                "table.remove_header",
                "Remove header",
                |editor, anchor, _options| edit::remove_header(editor, anchor),
            )
            .description("Remove the header row.")
            .keywords(["table", "header"]),
            CommandSpec::new("table.set_border", "Border", set_border_command)
                .description("Show or hide cell borders on the selected cells.")
                .keywords(["table", "border", "cell"])
                .args_example(json!({ "side": "top", "value": true })),
        ]
    }

    fn queries(&self) -> Vec<QuerySpec> {
        vec![
            QuerySpec::new("table.is_active", |editor, _args| {
                let anchor = editor.selection().anchor;
                Ok(Value::Bool(resolve_table(editor.tree(), anchor).is_ok()))
            }),
            QuerySpec::new("table.dimensions", |editor, args| {
                let anchor = query_target(editor, args.as_ref())?;
                Ok(match TableModel::resolve(editor.tree(), anchor) {
                    Ok(model) => json!({
                        "rows": model.row_count(),
                        "cols": model.column_count(),
                        "has_header": model.has_header(),
                    }),
                    Err(_) => Value::Null,
                })
            }),
            QuerySpec::new("table.selection_context", |editor, _args| {
                to_query_value(editor.toolbar().context())
            }),
            QuerySpec::new("table.border", |editor, args| {
                let anchor = query_target(editor, args.as_ref())?;
                match resolve_cell(editor.tree(), anchor) {
                    Ok(cell) => to_query_value(BorderState::read(editor.tree(), cell)),
                    Err(_) => Ok(Value::Null),
                }
            }),
            QuerySpec::new("table.state", |editor, args| {
                let anchor = query_target(editor, args.as_ref())?;
                to_query_value(table_state(editor.tree(), anchor))
            }),
        ]
    }
}

fn set_border_command(
    editor: &mut Editor,
    anchor: NodeId,
    options: &CommandOptions,
) -> Result<Transaction, TableError> {
    let side = options
        .arg_str("side")
        .ok_or_else(|| TableError::InvalidArguments("`side` is required".into()))?;
    let target = BorderTarget::parse(side)
        .ok_or_else(|| TableError::InvalidArguments(format!("unknown border side `{side}`")))?;
    let value = match options.arg("value") {
        None | Some(Value::Null) => None,
        Some(value) => Some(
            value
                .as_bool()
                .ok_or_else(|| TableError::InvalidArguments("`value` must be a boolean".into()))?,
        ),
    };

    let tree = editor.tree();
    let cells = if options.target.is_some() {
        vec![resolve_cell(tree, anchor)?]
    } else {
        selected_cells(tree, editor.selection())?
    };
    Ok(edit::set_border(tree, &cells, target, value))
}

fn count_arg(options: &CommandOptions, key: &str) -> Result<Option<usize>, TableError> {
    match options.arg(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_u64()
            .map(|n| Some(usize::try_from(n).unwrap_or(usize::MAX)))
            .ok_or_else(|| TableError::InvalidArguments(format!("`{key}` must be a positive integer"))),
    }
}

/// Node named by `{"target": <node id>}`, or the selection's anchor.
fn query_target(editor: &Editor, args: Option<&Value>) -> Result<NodeId, QueryError> {
    match args.and_then(|args| args.get("target")) {
        None | Some(Value::Null) => Ok(editor.selection().anchor),
        Some(target) => serde_json::from_value(target.clone())
            .map_err(|err| QueryError::new(format!("Invalid target: {err}"))),
    }
}

fn to_query_value(value: impl serde::Serialize) -> Result<Value, QueryError> {
    serde_json::to_value(value)
        .map_err(|err| QueryError::new(format!("Failed to encode query result: {err}")))
}
