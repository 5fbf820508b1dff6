use crate::table::schema::WRAPPER;
use crate::tree::{DocumentTree, NodeId};

/// Host surface that paints a node. Rendering is cosmetic: it must be safe to
/// call any number of times for the same node.
pub trait Renderer {
    fn render(&mut self, tree: &DocumentTree, node: NodeId);
}

/// Nodes waiting to be repainted, without duplicates.
#[derive(Debug, Clone, Default)]
pub struct RepaintQueue {
    pending: Vec<NodeId>,
}

impl RepaintQueue {
    /// Queues the surface that owns `node`: the enclosing table wrapper when
    /// there is one, otherwise the node itself or its nearest attached ancestor.
    pub fn request(&mut self, tree: &DocumentTree, node: NodeId) {
        let surface = tree
            .self_and_ancestors(node)
            .find(|&id| tree.is_kind(id, WRAPPER))
            .filter(|&id| tree.is_attached(id))
            .or_else(|| tree.self_and_ancestors(node).find(|&id| tree.is_attached(id)))
            .unwrap_or(tree.root());
        if !self.pending.contains(&surface) {
            self.pending.push(surface);
        }
    }

    pub fn pending(&self) -> &[NodeId] {
        &self.pending
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Renders every queued surface that is still in the document.
    pub fn flush(&mut self, tree: &DocumentTree, renderer: &mut dyn Renderer) -> usize {
        let pending = std::mem::take(&mut self.pending);
        let mut rendered = 0;
        for node in pending {
            if tree.is_attached(node) {
                renderer.render(tree, node);
                rendered += 1;
            }
        }
        rendered
    }
}
