use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::{Editor, Selection};
use crate::error::{QueryError, TableError};
use crate::ops::{Op, Transaction};
use crate::table::TablePlugin;
use crate::tree::{DocumentTree, NodeId, TEXT};

pub type CommandHandler =
    Arc<dyn Fn(&mut Editor, NodeId, &CommandOptions) -> Result<Transaction, TableError> + Send + Sync>;

pub type QueryHandler =
    Arc<dyn Fn(&Editor, Option<Value>) -> Result<Value, QueryError> + Send + Sync>;

/// Per-invocation options. `target` overrides the live selection's anchor so
/// a host can run a command against any node programmatically.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommandOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<NodeId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<Value>,
}

impl CommandOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn target(mut self, target: NodeId) -> Self {
        self.target = Some(target);
        self
    }

    pub fn args(mut self, args: Value) -> Self {
        self.args = Some(args);
        self
    }

    pub fn arg(&self, key: &str) -> Option<&Value> {
        self.args.as_ref().and_then(|v| v.get(key))
    }

    pub fn arg_str(&self, key: &str) -> Option<&str> {
        self.arg(key).and_then(Value::as_str)
    }
}

/// What a command did. Refusals are not errors for the host: the document is
/// untouched and the reason is reported for logging and tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    Applied,
    Unchanged,
    Aborted(TableError),
}

impl CommandOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, CommandOutcome::Applied)
    }
}

#[derive(Clone)]
pub struct CommandSpec {
    pub id: String,
    pub label: String,
    pub description: Option<String>,
    pub keywords: Vec<String>,
    pub args_example: Option<Value>,
    pub hidden: bool,
    pub handler: CommandHandler,
}

impl CommandSpec {
    pub fn new(
        id: impl Into<String>,
        label: impl Into<String>,
        handler: impl Fn(&mut Editor, NodeId, &CommandOptions) -> Result<Transaction, TableError>
        + Send
        + Sync
        + 'static,
    ) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            description: None,
            keywords: Vec::new(),
            args_example: None,
            hidden: false,
            handler: Arc::new(handler),
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keywords = keywords.into_iter().map(Into::into).collect();
        self
    }

    pub fn args_example(mut self, args_example: Value) -> Self {
        self.args_example = Some(args_example);
        self
    }

    pub fn hidden(mut self, hidden: bool) -> Self {
        self.hidden = hidden;
        self
    }
}

#[derive(Clone)]
pub struct QuerySpec {
    pub id: String,
    pub handler: QueryHandler,
}

impl QuerySpec {
    pub fn new(
        id: impl Into<String>,
        handler: impl Fn(&Editor, Option<Value>) -> Result<Value, QueryError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            id: id.into(),
            handler: Arc::new(handler),
        }
    }
}

/// A repair pass run after every transaction until no pass has work left.
/// Passes may create detached nodes and return ops that attach them.
pub trait NormalizePass: Send + Sync {
    fn id(&self) -> &'static str;
    fn run(&self, tree: &mut DocumentTree, registry: &PluginRegistry) -> Vec<Op>;
}

pub trait PlatePlugin: Send + Sync {
    fn id(&self) -> &'static str;
    fn normalize_passes(&self) -> Vec<Box<dyn NormalizePass>> {
        Vec::new()
    }
    fn commands(&self) -> Vec<CommandSpec> {
        Vec::new()
    }
    fn queries(&self) -> Vec<QuerySpec> {
        Vec::new()
    }
}

#[derive(Default)]
pub struct PluginRegistry {
    plugins: Vec<&'static str>,
    normalize_passes: Vec<Box<dyn NormalizePass>>,
    commands: HashMap<String, CommandSpec>,
    queries: HashMap<String, QuerySpec>,
}

impl PluginRegistry {
    pub fn new(plugins: impl IntoIterator<Item = Box<dyn PlatePlugin>>) -> Result<Self, String> {
        let mut registry = Self::default();
        for plugin in plugins {
            registry.register_plugin(plugin)?;
        }
        Ok(registry)
    }

    pub fn core() -> Self {
        let plugins: Vec<Box<dyn PlatePlugin>> = vec![Box::new(CoreNormalizePlugin)];
        Self::new(plugins).expect("core registry must be valid")
    }

    pub fn table() -> Self {
        let plugins: Vec<Box<dyn PlatePlugin>> =
            vec![Box::new(CoreNormalizePlugin), Box::new(TablePlugin)];
        Self::new(plugins).expect("table registry must be valid")
    }

    pub fn register_plugin(&mut self, plugin: Box<dyn PlatePlugin>) -> Result<(), String> {
        if self.plugins.contains(&plugin.id()) {
            return Err(format!("Duplicate plugin id: {}", plugin.id()));
        }

        self.normalize_passes.extend(plugin.normalize_passes());

        for cmd in plugin.commands() {
            self.register_command(cmd)?;
        }

        for query in plugin.queries() {
            if self.queries.contains_key(&query.id) {
                return Err(format!("Duplicate query id: {}", query.id));
            }
            self.queries.insert(query.id.clone(), query);
        }

        self.plugins.push(plugin.id());
        Ok(())
    }

    pub fn register_command(&mut self, cmd: CommandSpec) -> Result<(), String> {
        if self.commands.contains_key(&cmd.id) {
            return Err(format!("Duplicate command id: {}", cmd.id));
        }
        self.commands.insert(cmd.id.clone(), cmd);
        Ok(())
    }

    pub fn normalize_passes(&self) -> &[Box<dyn NormalizePass>] {
        &self.normalize_passes
    }

    pub fn commands(&self) -> &HashMap<String, CommandSpec> {
        &self.commands
    }

    pub fn command(&self, id: &str) -> Option<CommandSpec> {
        self.commands.get(id).cloned()
    }

    pub fn queries(&self) -> &HashMap<String, QuerySpec> {
        &self.queries
    }

    pub fn query(&self, id: &str) -> Option<QuerySpec> {
        self.queries.get(id).cloned()
    }

    /// Ops of the first pass that still has work. Passes see each other's
    /// results because the caller applies these before asking again.
    pub fn normalize(&self, tree: &mut DocumentTree) -> Vec<Op> {
        for pass in &self.normalize_passes {
            let ops = pass.run(tree, self);
            if !ops.is_empty() {
                tracing::trace!(pass = pass.id(), ops = ops.len(), "normalize pass");
                return ops;
            }
        }
        Vec::new()
    }

    /// Re-anchors a selection whose nodes were detached by the last change.
    pub fn normalize_selection(&self, tree: &DocumentTree, selection: &Selection) -> Selection {
        let anchor_ok = tree.is_attached(selection.anchor);
        let focus_ok = tree.is_attached(selection.focus);
        match (anchor_ok, focus_ok) {
            (true, true) => *selection,
            (true, false) => Selection::collapsed(selection.anchor),
            (false, true) => Selection::collapsed(selection.focus),
            (false, false) => {
                Selection::collapsed(first_text_leaf(tree).unwrap_or(tree.root()))
            }
        }
    }
}

fn first_text_leaf(tree: &DocumentTree) -> Option<NodeId> {
    tree.descendants(tree.root())
        .into_iter()
        .find(|&id| tree.is_kind(id, TEXT))
}

struct CoreNormalizePlugin;

impl PlatePlugin for CoreNormalizePlugin {
    fn id(&self) -> &'static str {
        "core.normalize"
    }

    fn normalize_passes(&self) -> Vec<Box<dyn NormalizePass>> {
        vec![Box::new(EnsureNonEmptyDocument)]
    }
}

struct EnsureNonEmptyDocument;

impl NormalizePass for EnsureNonEmptyDocument {
    fn id(&self) -> &'static str {
        "core.ensure_non_empty_document"
    }

    fn run(&self, tree: &mut DocumentTree, _registry: &PluginRegistry) -> Vec<Op> {
        if !tree.is_empty() {
            return Vec::new();
        }
        let paragraph = tree.build(&crate::tree::Node::paragraph(""));
        vec![Op::InsertNode {
            parent: tree.root(),
            index: 0,
            node: paragraph,
        }]
    }
}
