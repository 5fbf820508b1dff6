use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::core::Selection;
use crate::plugin::PluginRegistry;
use crate::table::locator::{cell_rect, closest_of_kind, resolve_cell};
use crate::table::model::TableModel;
use crate::table::schema::{BODY, BorderTarget, CELL, HEAD, HEADER_CELL, ROW, TABLE, WRAPPER};
use crate::tree::DocumentTree;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionContext {
    Cell,
    HeaderCell,
    Row,
    Table,
    #[default]
    Other,
}

/// Classifies a selection. A span across cells is judged by the rectangle it
/// covers; anything else by the anchor's nearest structural ancestor.
pub fn classify(tree: &DocumentTree, selection: &Selection) -> SelectionContext {
    if let Some(context) = classify_span(tree, selection) {
        return context;
    }
    let structural = [CELL, HEADER_CELL, ROW, HEAD, BODY, TABLE, WRAPPER];
    match closest_of_kind(tree, selection.anchor, &structural).and_then(|id| tree.kind(id)) {
        Some(CELL) => SelectionContext::Cell,
        Some(HEADER_CELL) => SelectionContext::HeaderCell,
        Some(ROW) => SelectionContext::Row,
        Some(_) => SelectionContext::Table,
        None => SelectionContext::Other,
    }
}

fn classify_span(tree: &DocumentTree, selection: &Selection) -> Option<SelectionContext> {
    if selection.is_collapsed() {
        return None;
    }
    let anchor = resolve_cell(tree, selection.anchor).ok()?;
    let focus = resolve_cell(tree, selection.focus).ok()?;
    if anchor == focus {
        return None;
    }
    let rect = cell_rect(tree, selection).ok()?;
    let model = TableModel::from_table(tree, rect.table).ok()?;
    let rows = model.rows();
    let row_width = |r: usize| rows.get(r).map(|&row| model.cells(row).len()).unwrap_or(0);
    let spans_columns =
        |r: usize| *rect.cols.start() == 0 && *rect.cols.end() + 1 >= row_width(r);

    let all_rows = *rect.rows.start() == 0 && *rect.rows.end() + 1 == rows.len();
    if all_rows && rect.rows.clone().all(spans_columns) {
        return Some(SelectionContext::Table);
    }
    let start = *rect.rows.start();
    if start == *rect.rows.end() && spans_columns(start) {
        return Some(SelectionContext::Row);
    }
    None
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolbarAction {
    pub command: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<Value>,
}

/// The contextual action set for one selection. It is always rebuilt whole
/// and swapped in, never patched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Toolbar {
    context: SelectionContext,
    actions: Vec<ToolbarAction>,
}

const ROW_ACTIONS: &[&str] = &[
    "table.insert_row_above",
    "table.insert_row_below",
    "table.delete_row",
];
const COLUMN_ACTIONS: &[&str] = &[
    "table.insert_col_left",
    "table.insert_col_right",
    "table.delete_col",
];

impl Toolbar {
    pub fn compute(
        tree: &DocumentTree,
        selection: &Selection,
        registry: &PluginRegistry,
    ) -> Self {
        let context = classify(tree, selection);
        let has_header = TableModel::resolve(tree, selection.anchor)
            .map(|model| model.has_header())
            .unwrap_or(false);
        let header_toggle = if has_header {
            "table.remove_header"
        } else {
            "table.add_header"
        };

        let mut commands: Vec<&str> = Vec::new();
        match context {
            SelectionContext::Other => {}
            SelectionContext::Cell => {
                commands.extend(ROW_ACTIONS);
                commands.extend(COLUMN_ACTIONS);
                commands.push(header_toggle);
            }
            SelectionContext::HeaderCell => {
                commands.push("table.insert_row_below");
                commands.extend(COLUMN_ACTIONS);
                commands.push("table.remove_header");
            }
            SelectionContext::Row => commands.extend(ROW_ACTIONS),
            SelectionContext::Table => {
                commands.push(header_toggle);
                commands.push("table.resize");
            }
        }

        let mut actions: Vec<ToolbarAction> = commands
            .into_iter()
            .filter_map(|id| {
                let spec = registry.command(id)?;
                Some(ToolbarAction {
                    command: spec.id,
                    label: spec.label,
                    args: None,
                })
            })
            .collect();

        if context != SelectionContext::Other {
            if let Some(spec) = registry.command("table.set_border") {
                for side in [
                    BorderTarget::Top,
                    BorderTarget::Right,
                    BorderTarget::Bottom,
                    BorderTarget::Left,
                    BorderTarget::All,
                    BorderTarget::None,
                ] {
                    actions.push(ToolbarAction {
                        command: spec.id.clone(),
                        label: format!("{}: {}", spec.label, side.as_str()),
                        args: Some(json!({ "side": side.as_str() })),
                    });
                }
            }
            if let Some(spec) = registry.command("table.delete_table") {
                actions.push(ToolbarAction {
                    command: spec.id,
                    label: spec.label,
                    args: None,
                });
            }
        }

        Self { context, actions }
    }

    pub fn context(&self) -> SelectionContext {
        self.context
    }

    pub fn actions(&self) -> &[ToolbarAction] {
        &self.actions
    }

    pub fn contains(&self, command: &str) -> bool {
        self.actions.iter().any(|action| action.command == command)
    }
}
