//! Table existence states and the two-phase creation flow: a placeholder is
//! inserted, the host collects dimensions through a [`Dialog`], and only then
//! does the confirming command build the table.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::core::{Editor, EditorConfig, Selection};
use crate::error::{CommandError, TableError};
use crate::ops::{Op, Transaction};
use crate::plugin::{CommandOptions, CommandOutcome};
use crate::table::edit::caret_in;
use crate::table::locator::{closest_of_kind, resolve_table};
use crate::table::schema::{CELL, PLACEHOLDER, table_node};
use crate::tree::{DocumentTree, Node, NodeId, TEXT};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableState {
    Absent,
    Configuring,
    Populated,
}

pub fn table_state(tree: &DocumentTree, node: NodeId) -> TableState {
    if closest_of_kind(tree, node, &[PLACEHOLDER]).is_some() {
        TableState::Configuring
    } else if resolve_table(tree, node).is_ok() {
        TableState::Populated
    } else {
        TableState::Absent
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableConfiguration {
    pub rows: usize,
    pub cols: usize,
    #[serde(default = "default_header")]
    pub header: bool,
}

fn default_header() -> bool {
    true
}

impl TableConfiguration {
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            header: true,
        }
    }

    pub fn header(mut self, header: bool) -> Self {
        self.header = header;
        self
    }

    /// Reads `rows`, `cols` and `header` from command args, falling back to
    /// the configured defaults for missing keys. A present key of the wrong
    /// type is rejected rather than defaulted.
    pub fn from_options(options: &CommandOptions, config: &EditorConfig) -> Result<Self, TableError> {
        let count = |key: &str, default: usize| match options.arg(key) {
            None | Some(Value::Null) => Ok(default),
            Some(value) => value
                .as_u64()
                .map(|n| usize::try_from(n).unwrap_or(usize::MAX))
                .ok_or_else(|| TableError::InvalidArguments(format!("`{key}` must be a positive integer"))),
        };
        let header = match options.arg("header") {
            None | Some(Value::Null) => true,
            Some(value) => value
                .as_bool()
                .ok_or_else(|| TableError::InvalidArguments("`header` must be a boolean".into()))?,
        };
        Ok(Self {
            rows: count("rows", config.default_rows)?,
            cols: count("cols", config.default_cols)?,
            header,
        })
    }

    fn clamped(self, config: &EditorConfig) -> Self {
        Self {
            rows: self.rows.clamp(1, config.max_dimension),
            cols: self.cols.clamp(1, config.max_dimension),
            header: self.header,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DialogField {
    pub key: String,
    pub label: String,
    pub default: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<u64>,
}

/// What the host has to ask the user before a pending table can be built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigurationRequest {
    pub placeholder: NodeId,
    pub fields: Vec<DialogField>,
}

impl ConfigurationRequest {
    fn new(placeholder: NodeId, config: &EditorConfig) -> Self {
        let max = Some(config.max_dimension as u64);
        Self {
            placeholder,
            fields: vec![
                DialogField {
                    key: "rows".into(),
                    label: "Rows".into(),
                    default: json!(config.default_rows),
                    min: Some(1),
                    max,
                },
                DialogField {
                    key: "cols".into(),
                    label: "Columns".into(),
                    default: json!(config.default_cols),
                    min: Some(1),
                    max,
                },
                DialogField {
                    key: "header".into(),
                    label: "Header row".into(),
                    default: json!(true),
                    min: None,
                    max: None,
                },
            ],
        }
    }

    /// Field defaults as a submission value.
    pub fn defaults(&self) -> Value {
        Value::Object(
            self.fields
                .iter()
                .map(|field| (field.key.clone(), field.default.clone()))
                .collect(),
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DialogResult {
    Submitted(Value),
    Cancelled,
}

/// Host collaborator that shows a configuration dialog and blocks until the
/// user answers.
pub trait Dialog {
    fn open(&mut self, request: &ConfigurationRequest) -> DialogResult;
}

const PLACEHOLDER_SOURCE: &str = "command:table.insert_placeholder";

/// Root-level block containing `anchor`, and the index just after it.
fn after_top_level_block(tree: &DocumentTree, anchor: NodeId) -> (NodeId, usize) {
    let root = tree.root();
    tree.self_and_ancestors(anchor)
        .find(|&id| tree.parent(id) == Some(root))
        .and_then(|block| tree.index_in_parent(block))
        .map(|index| (root, index + 1))
        .unwrap_or((root, tree.children(root).len()))
}

fn first_cell_caret(tree: &DocumentTree, wrapper: NodeId) -> NodeId {
    tree.descendants(wrapper)
        .into_iter()
        .find(|&id| tree.is_kind(id, CELL))
        .map(|cell| caret_in(tree, cell))
        .unwrap_or(wrapper)
}

fn placeholder_at(tree: &DocumentTree, node: NodeId) -> Result<NodeId, TableError> {
    closest_of_kind(tree, node, &[PLACEHOLDER]).ok_or(TableError::target("placeholder"))
}

/// Absent → Configuring.
pub fn insert_placeholder(editor: &mut Editor, anchor: NodeId) -> Result<Transaction, TableError> {
    let (parent, index) = after_top_level_block(editor.tree(), anchor);
    let config = editor.config();
    let node = Node::element(PLACEHOLDER, Vec::new())
        .with_attr("rows", config.default_rows)
        .with_attr("cols", config.default_cols);
    let placeholder = editor.build(&node);
    Ok(Transaction::new(vec![Op::InsertNode {
        parent,
        index,
        node: placeholder,
    }])
    .selection_after(Selection::collapsed(placeholder)))
}

/// Configuring → Populated: the placeholder is replaced by the table.
pub fn confirm_table(
    editor: &mut Editor,
    anchor: NodeId,
    configuration: TableConfiguration,
) -> Result<Transaction, TableError> {
    let tree = editor.tree();
    let placeholder = placeholder_at(tree, anchor)?;
    let parent = tree.parent(placeholder).ok_or(TableError::target("placeholder"))?;
    let index = tree
        .index_in_parent(placeholder)
        .ok_or(TableError::target("placeholder"))?;

    let configuration = configuration.clamped(editor.config());
    let label = configuration
        .header
        .then(|| editor.config().header_label.clone());
    let wrapper = editor.build(&table_node(
        configuration.rows,
        configuration.cols,
        label.as_deref(),
    ));
    let caret = first_cell_caret(editor.tree(), wrapper);

    tracing::debug!(
        rows = configuration.rows,
        cols = configuration.cols,
        header = configuration.header,
        "table confirmed"
    );
    Ok(Transaction::new(vec![
        Op::RemoveNode { node: placeholder },
        Op::InsertNode {
            parent,
            index,
            node: wrapper,
        },
    ])
    .selection_after(Selection::collapsed(caret)))
}

/// Configuring → Absent: the placeholder is discarded and no table is created.
pub fn cancel_table(editor: &mut Editor, anchor: NodeId) -> Result<Transaction, TableError> {
    let tree = editor.tree();
    let placeholder = placeholder_at(tree, anchor)?;
    let tx = Transaction::new(vec![Op::RemoveNode { node: placeholder }]);
    let previous = tree
        .parent(placeholder)
        .zip(tree.index_in_parent(placeholder))
        .and_then(|(parent, index)| {
            index
                .checked_sub(1)
                .and_then(|prev| tree.children(parent).get(prev).copied())
        })
        .map(|block| caret_in(tree, block))
        .filter(|&caret| tree.is_kind(caret, TEXT));
    Ok(match previous {
        Some(caret) => tx.selection_after(Selection::collapsed(caret)),
        None => tx,
    })
}

/// Absent → Populated in one step, for hosts that already know the dimensions.
pub fn insert_table(
    editor: &mut Editor,
    anchor: NodeId,
    configuration: TableConfiguration,
) -> Result<Transaction, TableError> {
    let (parent, index) = after_top_level_block(editor.tree(), anchor);
    let configuration = configuration.clamped(editor.config());
    let label = configuration
        .header
        .then(|| editor.config().header_label.clone());
    let wrapper = editor.build(&table_node(
        configuration.rows,
        configuration.cols,
        label.as_deref(),
    ));
    let caret = first_cell_caret(editor.tree(), wrapper);
    Ok(Transaction::new(vec![Op::InsertNode {
        parent,
        index,
        node: wrapper,
    }])
    .selection_after(Selection::collapsed(caret)))
}

impl Editor {
    /// First phase of table creation: inserts a placeholder after the block
    /// holding `anchor` (or the selection) and describes what to ask the user.
    pub fn begin_table(
        &mut self,
        anchor: Option<NodeId>,
    ) -> Result<ConfigurationRequest, CommandError> {
        let mut options = CommandOptions::new();
        options.target = anchor;
        match self.run_command_with("table.insert_placeholder", options)? {
            CommandOutcome::Applied => {}
            CommandOutcome::Unchanged => {
                return Err(CommandError::new("No placeholder was inserted"));
            }
            CommandOutcome::Aborted(err) => return Err(CommandError::new(err.to_string())),
        }
        let placeholder = placeholder_at(self.tree(), self.selection().anchor)
            .map_err(|err| CommandError::new(err.to_string()))?;
        Ok(ConfigurationRequest::new(placeholder, self.config()))
    }

    /// Second phase: builds the table from the submitted values or drops the
    /// placeholder when the dialog was cancelled.
    ///
    /// The placeholder never gets an undo step of its own. A confirmed table
    /// undoes straight back to Absent, and a cancelled flow leaves no history.
    pub fn finish_table(
        &mut self,
        request: &ConfigurationRequest,
        result: DialogResult,
    ) -> Result<CommandOutcome, CommandError> {
        let options = CommandOptions::new().target(request.placeholder);
        match result {
            DialogResult::Submitted(values) => {
                let outcome = self.run_command_with("table.confirm", options.args(values))?;
                if outcome.is_applied() {
                    self.fold_undo_into(PLACEHOLDER_SOURCE);
                }
                Ok(outcome)
            }
            DialogResult::Cancelled => self.cancel_placeholder(request.placeholder),
        }
    }

    fn cancel_placeholder(&mut self, placeholder: NodeId) -> Result<CommandOutcome, CommandError> {
        let outcome =
            self.run_command_with("table.cancel", CommandOptions::new().target(placeholder))?;
        if outcome.is_applied() && self.fold_undo_into(PLACEHOLDER_SOURCE) {
            self.forget_undo_step();
        }
        Ok(outcome)
    }

    /// Runs the whole creation flow against `dialog`. The dialog resolves
    /// before the confirming command starts; a rejected submission leaves no
    /// placeholder behind.
    pub fn insert_table_with_dialog(
        &mut self,
        anchor: Option<NodeId>,
        dialog: &mut dyn Dialog,
    ) -> Result<CommandOutcome, CommandError> {
        let request = self.begin_table(anchor)?;
        let result = dialog.open(&request);
        let outcome = self.finish_table(&request, result)?;
        if let CommandOutcome::Aborted(err) = &outcome {
            tracing::debug!(error = %err, "table configuration rejected");
            self.cancel_placeholder(request.placeholder)?;
        }
        Ok(outcome)
    }
}
