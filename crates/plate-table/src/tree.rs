use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use slotmap::{SlotMap, new_key_type};

use crate::ops::{AttrPatch, patch_apply};

new_key_type! { pub struct NodeId; }

pub type Attrs = BTreeMap<String, Value>;
pub type ElementKind = String;

pub const DOCUMENT: &str = "document";
pub const PARAGRAPH: &str = "paragraph";
pub const TEXT: &str = "text";

/// Nested interchange form of a document, used to load pre-existing markup
/// into a [`DocumentTree`] and to snapshot it back out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Document {
    #[serde(default)]
    pub children: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum Node {
    Element(ElementNode),
    Text(TextNode),
}

impl Node {
    pub fn element(kind: impl Into<ElementKind>, children: Vec<Node>) -> Self {
        Node::Element(ElementNode {
            kind: kind.into(),
            attrs: Attrs::default(),
            children,
        })
    }

    pub fn text(text: impl Into<String>) -> Self {
        Node::Text(TextNode { text: text.into() })
    }

    pub fn paragraph(text: impl Into<String>) -> Self {
        Node::element(PARAGRAPH, vec![Node::text(text)])
    }

    /// Sets an attribute on an element; text nodes are returned unchanged.
    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        if let Node::Element(el) = &mut self {
            el.attrs.insert(key.into(), value.into());
        }
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementNode {
    pub kind: ElementKind,
    #[serde(default)]
    pub attrs: Attrs,
    #[serde(default)]
    pub children: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextNode {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TreeError {
    #[error("node does not exist")]
    MissingNode,
    #[error("`{0}` node cannot hold children")]
    NotAContainer(String),
    #[error("index {index} out of bounds for {len} children")]
    IndexOutOfBounds { index: usize, len: usize },
    #[error("node is already attached to a parent")]
    AlreadyAttached,
    #[error("node is not attached to a parent")]
    NotAttached,
    #[error("cannot insert a node into its own subtree")]
    WouldCycle,
    #[error("the document root cannot be moved")]
    Root,
    #[error("text nodes have no attributes")]
    TextHasNoAttrs,
    #[error("expected a text node")]
    NotText,
}

#[derive(Debug, Clone)]
struct Slot {
    kind: ElementKind,
    attrs: Attrs,
    text: Option<String>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl Slot {
    fn element(kind: ElementKind, attrs: Attrs) -> Self {
        Self {
            kind,
            attrs,
            text: None,
            parent: None,
            children: Vec::new(),
        }
    }

    fn text(text: String) -> Self {
        Self {
            kind: TEXT.to_string(),
            attrs: Attrs::default(),
            text: Some(text),
            parent: None,
            children: Vec::new(),
        }
    }
}

/// Id-indexed node arena with ordered children and parent back-references.
///
/// Nodes are created detached and become part of the document once inserted
/// under an attached parent. Removing a node only detaches it, so undo can
/// re-insert the very same subtree; [`DocumentTree::discard`] frees it.
#[derive(Debug, Clone)]
pub struct DocumentTree {
    arena: SlotMap<NodeId, Slot>,
    root: NodeId,
}

impl Default for DocumentTree {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentTree {
    pub fn new() -> Self {
        let mut arena = SlotMap::with_key();
        let root = arena.insert(Slot::element(DOCUMENT.to_string(), Attrs::default()));
        Self { arena, root }
    }

    pub fn from_document(doc: &Document) -> Self {
        let mut tree = Self::new();
        let root = tree.root;
        for node in &doc.children {
            let id = tree.build(node);
            tree.arena[id].parent = Some(root);
            tree.arena[root].children.push(id);
        }
        tree
    }

    pub fn to_document(&self) -> Document {
        Document {
            children: self
                .children(self.root)
                .iter()
                .filter_map(|&id| self.export(id))
                .collect(),
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Number of live nodes in the arena, detached ones included.
    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children(self.root).is_empty()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.arena.contains_key(id)
    }

    pub fn kind(&self, id: NodeId) -> Option<&str> {
        self.arena.get(id).map(|slot| slot.kind.as_str())
    }

    pub fn is_kind(&self, id: NodeId, kind: &str) -> bool {
        self.kind(id) == Some(kind)
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.arena.get(id).and_then(|slot| slot.parent)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.arena
            .get(id)
            .map(|slot| slot.children.as_slice())
            .unwrap_or(&[])
    }

    pub fn index_in_parent(&self, id: NodeId) -> Option<usize> {
        let parent = self.parent(id)?;
        self.children(parent).iter().position(|&child| child == id)
    }

    /// Strict ancestors of `id`, nearest first.
    pub fn ancestors(&self, id: NodeId) -> Ancestors<'_> {
        Ancestors {
            tree: self,
            next: self.parent(id),
        }
    }

    /// `id` followed by its ancestors, nearest first.
    pub fn self_and_ancestors(&self, id: NodeId) -> Ancestors<'_> {
        Ancestors {
            tree: self,
            next: self.contains(id).then_some(id),
        }
    }

    pub fn is_attached(&self, id: NodeId) -> bool {
        self.self_and_ancestors(id).any(|node| node == self.root)
    }

    pub fn is_ancestor_of(&self, ancestor: NodeId, id: NodeId) -> bool {
        self.ancestors(id).any(|node| node == ancestor)
    }

    /// Descendants of `id` in document order, `id` excluded.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(node) = stack.pop() {
            out.push(node);
            stack.extend(self.children(node).iter().rev());
        }
        out
    }

    pub fn attrs(&self, id: NodeId) -> Option<&Attrs> {
        self.arena.get(id).map(|slot| &slot.attrs)
    }

    pub fn attr(&self, id: NodeId, key: &str) -> Option<&Value> {
        self.attrs(id).and_then(|attrs| attrs.get(key))
    }

    pub fn text(&self, id: NodeId) -> Option<&str> {
        self.arena.get(id).and_then(|slot| slot.text.as_deref())
    }

    /// Concatenated text of every text leaf below `id`.
    pub fn text_content(&self, id: NodeId) -> String {
        if let Some(text) = self.text(id) {
            return text.to_string();
        }
        self.descendants(id)
            .into_iter()
            .filter_map(|node| self.text(node))
            .collect()
    }

    /// Creates a detached element owning `children`, which must be detached.
    pub fn create_node(
        &mut self,
        kind: impl Into<ElementKind>,
        attrs: Attrs,
        children: Vec<NodeId>,
    ) -> Result<NodeId, TreeError> {
        for &child in &children {
            let slot = self.arena.get(child).ok_or(TreeError::MissingNode)?;
            if child == self.root {
                return Err(TreeError::Root);
            }
            if slot.parent.is_some() {
                return Err(TreeError::AlreadyAttached);
            }
        }
        let id = self.arena.insert(Slot::element(kind.into(), attrs));
        for &child in &children {
            self.arena[child].parent = Some(id);
        }
        self.arena[id].children = children;
        Ok(id)
    }

    pub fn create_text(&mut self, text: impl Into<String>) -> NodeId {
        self.arena.insert(Slot::text(text.into()))
    }

    /// Materializes an interchange node as a detached subtree.
    pub fn build(&mut self, node: &Node) -> NodeId {
        match node {
            Node::Text(t) => self.create_text(t.text.clone()),
            Node::Element(el) => {
                let id = self
                    .arena
                    .insert(Slot::element(el.kind.clone(), el.attrs.clone()));
                for child in &el.children {
                    let child_id = self.build(child);
                    self.arena[child_id].parent = Some(id);
                    self.arena[id].children.push(child_id);
                }
                id
            }
        }
    }

    pub fn export(&self, id: NodeId) -> Option<Node> {
        let slot = self.arena.get(id)?;
        if let Some(text) = &slot.text {
            return Some(Node::text(text.clone()));
        }
        Some(Node::Element(ElementNode {
            kind: slot.kind.clone(),
            attrs: slot.attrs.clone(),
            children: slot
                .children
                .iter()
                .filter_map(|&child| self.export(child))
                .collect(),
        }))
    }

    pub fn insert_child(&mut self, parent: NodeId, node: NodeId, at: usize) -> Result<(), TreeError> {
        if node == self.root {
            return Err(TreeError::Root);
        }
        let parent_slot = self.arena.get(parent).ok_or(TreeError::MissingNode)?;
        if parent_slot.text.is_some() {
            return Err(TreeError::NotAContainer(parent_slot.kind.clone()));
        }
        let len = parent_slot.children.len();
        let node_slot = self.arena.get(node).ok_or(TreeError::MissingNode)?;
        if node_slot.parent.is_some() {
            return Err(TreeError::AlreadyAttached);
        }
        if parent == node || self.is_ancestor_of(node, parent) {
            return Err(TreeError::WouldCycle);
        }
        if at > len {
            return Err(TreeError::IndexOutOfBounds { index: at, len });
        }
        self.arena[parent].children.insert(at, node);
        self.arena[node].parent = Some(parent);
        Ok(())
    }

    /// Detaches `node` from its parent and returns where it was.
    pub fn remove_node(&mut self, node: NodeId) -> Result<(NodeId, usize), TreeError> {
        if node == self.root {
            return Err(TreeError::Root);
        }
        let parent = self
            .arena
            .get(node)
            .ok_or(TreeError::MissingNode)?
            .parent
            .ok_or(TreeError::NotAttached)?;
        let index = self
            .index_in_parent(node)
            .ok_or(TreeError::NotAttached)?;
        self.arena[parent].children.remove(index);
        self.arena[node].parent = None;
        Ok((parent, index))
    }

    /// Frees a detached subtree.
    pub fn discard(&mut self, node: NodeId) -> Result<(), TreeError> {
        let slot = self.arena.get(node).ok_or(TreeError::MissingNode)?;
        if node == self.root {
            return Err(TreeError::Root);
        }
        if slot.parent.is_some() {
            return Err(TreeError::AlreadyAttached);
        }
        for id in self.descendants(node) {
            self.arena.remove(id);
        }
        self.arena.remove(node);
        Ok(())
    }

    /// Applies `patch` and returns the patch that undoes it.
    pub fn set_attrs(&mut self, id: NodeId, patch: &AttrPatch) -> Result<AttrPatch, TreeError> {
        let slot = self.arena.get_mut(id).ok_or(TreeError::MissingNode)?;
        if slot.text.is_some() {
            return Err(TreeError::TextHasNoAttrs);
        }
        Ok(patch_apply(&mut slot.attrs, patch))
    }

    /// Replaces the text of a leaf and returns the previous text.
    pub fn set_text(&mut self, id: NodeId, text: String) -> Result<String, TreeError> {
        let slot = self.arena.get_mut(id).ok_or(TreeError::MissingNode)?;
        match &mut slot.text {
            Some(current) => Ok(std::mem::replace(current, text)),
            None => Err(TreeError::NotText),
        }
    }
}

pub struct Ancestors<'a> {
    tree: &'a DocumentTree,
    next: Option<NodeId>,
}

impl Iterator for Ancestors<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let id = self.next?;
        self.next = self.tree.parent(id);
        Some(id)
    }
}
