use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ApplyError, CommandError, QueryError, TableError};
use crate::ops::{AttrPatch, Op, Transaction};
use crate::plugin::{CommandOptions, CommandOutcome, CommandSpec, PluginRegistry};
use crate::render::{RepaintQueue, Renderer};
use crate::toolbar::Toolbar;
use crate::tree::{Attrs, Document, DocumentTree, ElementKind, Node, NodeId, TEXT, TreeError};

/// Anchor and focus of the live selection. Both are node ids; a collapsed
/// selection has them equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub anchor: NodeId,
    pub focus: NodeId,
}

impl Selection {
    pub fn collapsed(node: NodeId) -> Self {
        Self {
            anchor: node,
            focus: node,
        }
    }

    pub fn span(anchor: NodeId, focus: NodeId) -> Self {
        Self { anchor, focus }
    }

    pub fn is_collapsed(&self) -> bool {
        self.anchor == self.focus
    }
}

#[derive(Debug, Clone)]
pub struct UndoRecord {
    pub inverse_ops: Vec<Op>,
    pub selection_before: Selection,
    pub selection_after: Selection,
    pub source: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    pub max_undo: usize,
    pub max_normalize_iterations: usize,
    /// Dimensions offered by the table configuration request.
    pub default_rows: usize,
    pub default_cols: usize,
    /// Upper bound for rows and columns chosen at creation or resize.
    pub max_dimension: usize,
    /// Label of header cells created by column insertion and header repair.
    pub header_label: String,
    /// Removing the last body row or column deletes the whole table instead
    /// of refusing.
    pub delete_empty_tables: bool,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            max_undo: 200,
            max_normalize_iterations: 100,
            default_rows: 2,
            default_cols: 2,
            max_dimension: 32,
            header_label: "Header".to_string(),
            delete_empty_tables: true,
        }
    }
}

impl EditorConfig {
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str::<Self>(json).map(Self::with_defaults)
    }

    fn with_defaults(mut self) -> Self {
        if self.max_undo == 0 {
            self.max_undo = 200;
        }
        if self.max_normalize_iterations == 0 {
            self.max_normalize_iterations = 100;
        }
        if self.max_dimension == 0 {
            self.max_dimension = 32;
        }
        self.default_rows = self.default_rows.clamp(1, self.max_dimension);
        self.default_cols = self.default_cols.clamp(1, self.max_dimension);
        self
    }
}

pub struct Editor {
    doc: DocumentTree,
    selection: Selection,
    registry: PluginRegistry,
    config: EditorConfig,
    toolbar: Toolbar,
    repaints: RepaintQueue,
    undo_stack: Vec<UndoRecord>,
    redo_stack: Vec<UndoRecord>,
}

impl Editor {
    pub fn new(doc: DocumentTree, selection: Selection, registry: PluginRegistry) -> Self {
        let config = EditorConfig::default().with_defaults();
        let mut editor = Self {
            doc,
            selection,
            registry,
            config,
            toolbar: Toolbar::default(),
            repaints: RepaintQueue::default(),
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
        };
        editor.normalize_in_place();
        editor
    }

    /// Loads pre-existing markup; the selection starts on the first text leaf.
    pub fn from_document(doc: &Document, registry: PluginRegistry) -> Self {
        let tree = DocumentTree::from_document(doc);
        let anchor = tree
            .descendants(tree.root())
            .into_iter()
            .find(|&id| tree.is_kind(id, TEXT))
            .unwrap_or(tree.root());
        Self::new(tree, Selection::collapsed(anchor), registry)
    }

    pub fn with_core_plugins() -> Self {
        let doc = Document {
            children: vec![Node::paragraph("")],
        };
        Self::from_document(&doc, PluginRegistry::core())
    }

    pub fn with_table_plugins() -> Self {
        let doc = Document {
            children: vec![Node::paragraph("")],
        };
        Self::from_document(&doc, PluginRegistry::table())
    }

    pub fn with_config(mut self, config: EditorConfig) -> Self {
        self.config = config.with_defaults();
        self
    }

    pub fn tree(&self) -> &DocumentTree {
        &self.doc
    }

    pub(crate) fn tree_mut(&mut self) -> &mut DocumentTree {
        &mut self.doc
    }

    pub fn to_document(&self) -> Document {
        self.doc.to_document()
    }

    /// Creates a detached element for a transaction to insert.
    pub fn create_node(
        &mut self,
        kind: impl Into<ElementKind>,
        attrs: Attrs,
        children: Vec<NodeId>,
    ) -> Result<NodeId, TreeError> {
        self.doc.create_node(kind, attrs, children)
    }

    pub fn create_text(&mut self, text: impl Into<String>) -> NodeId {
        self.doc.create_text(text)
    }

    /// Materializes `node` as a detached subtree for a transaction to insert.
    pub fn build(&mut self, node: &Node) -> NodeId {
        self.doc.build(node)
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn set_selection(&mut self, selection: Selection) {
        self.selection = selection;
        self.normalize_selection_in_place();
        self.refresh_toolbar();
    }

    pub fn toolbar(&self) -> &Toolbar {
        &self.toolbar
    }

    pub fn registry(&self) -> &PluginRegistry {
        &self.registry
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn register_command(&mut self, command: CommandSpec) -> Result<(), CommandError> {
        self.registry
            .register_command(command)
            .map_err(CommandError::new)?;
        self.refresh_toolbar();
        Ok(())
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo(&mut self) -> bool {
        let Some(record) = self.undo_stack.pop() else {
            return false;
        };

        let UndoRecord {
            inverse_ops,
            selection_before,
            selection_after,
            source,
        } = record;

        let mut redo_ops: Vec<Op> = Vec::new();
        for op in inverse_ops.iter().cloned() {
            match self.apply_op(op) {
                Ok(inv) => redo_ops.push(inv),
                Err(err) => {
                    tracing::warn!(error = %err, "undo stopped on an inapplicable op");
                    break;
                }
            }
        }
        redo_ops.reverse();

        self.selection = selection_before;
        self.normalize_in_place();
        tracing::debug!(source = source.as_deref(), "undo");

        self.redo_stack.push(UndoRecord {
            inverse_ops: redo_ops,
            selection_before,
            selection_after,
            source,
        });
        true
    }

    pub fn redo(&mut self) -> bool {
        let Some(record) = self.redo_stack.pop() else {
            return false;
        };

        let UndoRecord {
            inverse_ops,
            selection_before,
            selection_after,
            source,
        } = record;

        let mut undo_ops: Vec<Op> = Vec::new();
        for op in inverse_ops.iter().cloned() {
            match self.apply_op(op) {
                Ok(inv) => undo_ops.push(inv),
                Err(err) => {
                    tracing::warn!(error = %err, "redo stopped on an inapplicable op");
                    break;
                }
            }
        }
        undo_ops.reverse();

        self.selection = selection_after;
        self.normalize_in_place();
        tracing::debug!(source = source.as_deref(), "redo");

        self.undo_stack.push(UndoRecord {
            inverse_ops: undo_ops,
            selection_before,
            selection_after,
            source,
        });
        true
    }

    /// Merges the newest undo step into the one below it when that one came
    /// from `source`, so a single undo reverts both.
    pub(crate) fn fold_undo_into(&mut self, source: &str) -> bool {
        let len = self.undo_stack.len();
        if len < 2 || self.undo_stack[len - 2].source.as_deref() != Some(source) {
            return false;
        }
        let (Some(top), Some(below)) = (self.undo_stack.pop(), self.undo_stack.pop()) else {
            return false;
        };
        let mut inverse_ops = top.inverse_ops;
        inverse_ops.extend(below.inverse_ops);
        self.undo_stack.push(UndoRecord {
            inverse_ops,
            selection_before: below.selection_before,
            selection_after: top.selection_after,
            source: top.source,
        });
        true
    }

    /// Drops the newest undo step without reverting it. Only for steps whose
    /// net effect on the document is nothing.
    pub(crate) fn forget_undo_step(&mut self) {
        if let Some(record) = self.undo_stack.pop() {
            tracing::debug!(source = record.source.as_deref(), "undo step forgotten");
            self.release(&record.inverse_ops);
        }
    }

    /// Applies every op of `tx` and normalizes, or nothing at all: on failure
    /// the ops already applied are rolled back before the error is returned.
    pub fn apply(&mut self, tx: Transaction) -> Result<(), ApplyError> {
        let selection_before = self.selection;
        let Transaction {
            ops,
            selection_after,
            meta,
        } = tx;

        let mut inverse_ops: Vec<Op> = Vec::new();
        for op in ops.iter().cloned() {
            match self.apply_op(op) {
                Ok(inv) => inverse_ops.push(inv),
                Err(err) => {
                    self.rollback(inverse_ops, selection_before);
                    self.release(&ops);
                    return Err(err);
                }
            }
        }

        if let Some(sel) = selection_after {
            self.selection = sel;
        }

        if let Err(err) = self.normalize_with_inverse_ops(&mut inverse_ops) {
            self.rollback(inverse_ops, selection_before);
            self.release(&ops);
            return Err(err);
        }
        inverse_ops.reverse();

        self.normalize_selection_in_place();
        self.refresh_toolbar();

        tracing::debug!(
            source = meta.source.as_deref(),
            ops = ops.len(),
            "transaction applied"
        );

        self.undo_stack.push(UndoRecord {
            inverse_ops,
            selection_before,
            selection_after: self.selection,
            source: meta.source,
        });
        for record in std::mem::take(&mut self.redo_stack) {
            self.release(&record.inverse_ops);
        }
        if self.undo_stack.len() > self.config.max_undo {
            let dropped = self.undo_stack.remove(0);
            self.release(&dropped.inverse_ops);
        }

        Ok(())
    }

    pub fn run_command(
        &mut self,
        id: &str,
        args: Option<Value>,
    ) -> Result<CommandOutcome, CommandError> {
        let options = CommandOptions {
            target: None,
            args,
        };
        self.run_command_with(id, options)
    }

    /// Runs a registered command against `options.target`, or the live
    /// selection's anchor when no target is given. Table errors never reach
    /// the caller as `Err`: they become [`CommandOutcome::Aborted`] and the
    /// document is left as it was.
    pub fn run_command_with(
        &mut self,
        id: &str,
        options: CommandOptions,
    ) -> Result<CommandOutcome, CommandError> {
        let Some(command) = self.registry.command(id) else {
            return Err(CommandError::new(format!("Unknown command: {id}")));
        };

        let anchor = options.target.unwrap_or(self.selection.anchor);
        if !self.doc.is_attached(anchor) {
            let err = TableError::target("anchor");
            tracing::debug!(command = id, error = %err, "command aborted");
            return Ok(CommandOutcome::Aborted(err));
        }

        let tx = match (command.handler)(self, anchor, &options) {
            Ok(tx) => tx,
            Err(err) => {
                tracing::debug!(command = id, error = %err, "command aborted");
                return Ok(CommandOutcome::Aborted(err));
            }
        };

        if tx.is_empty() {
            if let Some(selection) = tx.selection_after {
                self.set_selection(selection);
            }
            return Ok(CommandOutcome::Unchanged);
        }

        let tx = if tx.meta.source.is_none() {
            tx.source(format!("command:{id}"))
        } else {
            tx
        };
        self.apply(tx)
            .map_err(|err| CommandError::new(format!("Failed to apply {id}: {err}")))?;
        Ok(CommandOutcome::Applied)
    }

    pub fn run_query_json(&self, id: &str, args: Option<Value>) -> Result<Value, QueryError> {
        let Some(query) = self.registry.query(id) else {
            return Err(QueryError::new(format!("Unknown query: {id}")));
        };
        (query.handler)(self, args)
    }

    pub fn run_query<T>(&self, id: &str, args: Option<Value>) -> Result<T, QueryError>
    where
        T: DeserializeOwned,
    {
        let value = self.run_query_json(id, args)?;
        serde_json::from_value(value)
            .map_err(|err| QueryError::new(format!("Failed to decode query result: {err}")))
    }

    pub fn pending_repaints(&self) -> &[NodeId] {
        self.repaints.pending()
    }

    /// Hands every queued surface to `renderer`; returns how many were painted.
    pub fn flush_repaints(&mut self, renderer: &mut dyn Renderer) -> usize {
        self.repaints.flush(&self.doc, renderer)
    }

    fn normalize_in_place(&mut self) {
        let mut inverse_ops = Vec::new();
        if let Err(err) = self.normalize_with_inverse_ops(&mut inverse_ops) {
            tracing::warn!(error = %err, "normalization failed");
        }
        self.normalize_selection_in_place();
        self.refresh_toolbar();
    }

    fn normalize_selection_in_place(&mut self) {
        self.selection = self
            .registry
            .normalize_selection(&self.doc, &self.selection);
    }

    fn normalize_with_inverse_ops(&mut self, inverse_ops: &mut Vec<Op>) -> Result<(), ApplyError> {
        for _ in 0..self.config.max_normalize_iterations {
            let ops = self.registry.normalize(&mut self.doc);
            if ops.is_empty() {
                return Ok(());
            }
            for op in ops {
                let inv = self.apply_op(op)?;
                inverse_ops.push(inv);
            }
        }
        Err(ApplyError::NormalizeDidNotConverge)
    }

    fn refresh_toolbar(&mut self) {
        self.toolbar = Toolbar::compute(&self.doc, &self.selection, &self.registry);
    }

    fn rollback(&mut self, inverse_ops: Vec<Op>, selection: Selection) {
        for op in inverse_ops.into_iter().rev() {
            if let Err(err) = self.apply_op(op) {
                tracing::warn!(error = %err, "rollback stopped on an inapplicable op");
                break;
            }
        }
        self.selection = selection;
    }

    /// Frees subtrees that only `ops` still refer to: nodes an `InsertNode`
    /// would attach but that are currently detached.
    fn release(&mut self, ops: &[Op]) {
        for op in ops {
            if let Op::InsertNode { node, .. } = op {
                if self.doc.contains(*node) && self.doc.parent(*node).is_none() {
                    if let Err(err) = self.doc.discard(*node) {
                        tracing::warn!(error = %err, "could not free a detached subtree");
                    }
                }
            }
        }
    }

    fn apply_op(&mut self, op: Op) -> Result<Op, ApplyError> {
        let (inverse, surface) = apply_op_to(&mut self.doc, op)?;
        self.repaints.request(&self.doc, surface);
        Ok(inverse)
    }
}

/// Applies one op and returns its inverse together with the node whose
/// surface changed.
fn apply_op_to(doc: &mut DocumentTree, op: Op) -> Result<(Op, NodeId), ApplyError> {
    match op {
        Op::InsertNode {
            parent,
            index,
            node,
        } => {
            doc.insert_child(parent, node, index)?;
            Ok((Op::RemoveNode { node }, node))
        }
        Op::RemoveNode { node } => {
            let (parent, index) = doc.remove_node(node)?;
            Ok((
                Op::InsertNode {
                    parent,
                    index,
                    node,
                },
                parent,
            ))
        }
        Op::SetNodeAttrs { node, patch } => {
            let old: AttrPatch = doc.set_attrs(node, &patch)?;
            Ok((Op::SetNodeAttrs { node, patch: old }, node))
        }
        Op::SetText { node, text } => {
            let old = doc.set_text(node, text)?;
            Ok((Op::SetText { node, text: old }, node))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paragraphs(texts: &[&str]) -> Editor {
        let doc = Document {
            children: texts.iter().map(|t| Node::paragraph(*t)).collect(),
        };
        Editor::from_document(&doc, PluginRegistry::core())
    }

    #[test]
    fn failed_apply_rolls_back_earlier_ops() {
        let mut editor = paragraphs(&["a", "b"]);
        let before = editor.to_document();
        let root = editor.tree().root();
        let first = editor.tree().children(root)[0];
        let leaf = editor.tree().children(first)[0];

        let tx = Transaction::new(vec![
            Op::RemoveNode { node: first },
            // A text leaf cannot hold children.
            Op::InsertNode {
                parent: leaf,
                index: 0,
                node: first,
            },
        ]);
        assert!(editor.apply(tx).is_err());
        assert_eq!(editor.to_document(), before);
        assert!(!editor.can_undo());
    }

    #[test]
    fn removing_every_block_leaves_an_empty_paragraph() {
        let mut editor = paragraphs(&["only"]);
        let block = editor.tree().children(editor.tree().root())[0];
        editor
            .apply(Transaction::new(vec![Op::RemoveNode { node: block }]))
            .unwrap();
        assert_eq!(
            editor.to_document(),
            Document {
                children: vec![Node::paragraph("")]
            }
        );
        assert!(editor.tree().is_attached(editor.selection().anchor));

        assert!(editor.undo());
        assert_eq!(editor.tree().text_content(editor.tree().root()), "only");
    }

    #[test]
    fn dropping_redo_history_frees_detached_nodes() {
        let mut editor = paragraphs(&["a"]);
        let root = editor.tree().root();
        let extra = editor.build(&Node::paragraph("b"));
        editor
            .apply(Transaction::new(vec![Op::InsertNode {
                parent: root,
                index: 1,
                node: extra,
            }]))
            .unwrap();
        assert!(editor.undo());
        assert!(editor.tree().contains(extra));

        let leaf = editor.tree().descendants(root)[1];
        editor
            .apply(Transaction::new(vec![Op::SetText {
                node: leaf,
                text: "c".into(),
            }]))
            .unwrap();
        assert!(!editor.can_redo());
        assert!(!editor.tree().contains(extra));
    }

    #[test]
    fn config_from_json_fills_missing_fields() {
        let config = EditorConfig::from_json_str(r#"{ "max_undo": 0, "header_label": "H" }"#)
            .unwrap();
        assert_eq!(config.max_undo, 200);
        assert_eq!(config.header_label, "H");
        assert_eq!(config.default_rows, 2);
        assert!(config.delete_empty_tables);
    }
}
