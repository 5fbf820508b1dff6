use crate::error::TableError;
use crate::table::locator::{resolve_row, resolve_section, resolve_table};
use crate::table::schema::{BODY, HEAD, ROW, TABLE, WRAPPER, is_cell};
use crate::tree::{DocumentTree, NodeId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Header,
    Body,
}

/// Read-only view over one table instance.
///
/// Nothing here is cached: every count is recomputed from the tree, so a model
/// is only meaningful for the tree state it was resolved against.
#[derive(Debug, Clone, Copy)]
pub struct TableModel<'a> {
    tree: &'a DocumentTree,
    pub wrapper: NodeId,
    pub table: NodeId,
    pub header: Option<NodeId>,
    pub body: NodeId,
}

impl<'a> TableModel<'a> {
    pub fn resolve(tree: &'a DocumentTree, anchor: NodeId) -> Result<Self, TableError> {
        let table = resolve_table(tree, anchor)?;
        Self::from_table(tree, table)
    }

    pub fn from_table(tree: &'a DocumentTree, table: NodeId) -> Result<Self, TableError> {
        if !tree.is_kind(table, TABLE) {
            return Err(TableError::NotATable);
        }
        let wrapper = tree
            .parent(table)
            .filter(|&parent| tree.is_kind(parent, WRAPPER))
            .ok_or(TableError::NotATable)?;
        let section = |kind: &str| {
            tree.children(table)
                .iter()
                .copied()
                .find(|&child| tree.is_kind(child, kind))
        };
        let body = section(BODY).ok_or(TableError::NotATable)?;
        Ok(Self {
            tree,
            wrapper,
            table,
            header: section(HEAD),
            body,
        })
    }

    pub fn tree(&self) -> &'a DocumentTree {
        self.tree
    }

    pub fn has_header(&self) -> bool {
        self.header.is_some()
    }

    pub fn header_row(&self) -> Option<NodeId> {
        let header = self.header?;
        self.tree
            .children(header)
            .iter()
            .copied()
            .find(|&child| self.tree.is_kind(child, ROW))
    }

    pub fn body_rows(&self) -> Vec<NodeId> {
        self.tree
            .children(self.body)
            .iter()
            .copied()
            .filter(|&child| self.tree.is_kind(child, ROW))
            .collect()
    }

    /// Header row (if any) followed by the body rows.
    pub fn rows(&self) -> Vec<NodeId> {
        self.header_row()
            .into_iter()
            .chain(self.body_rows())
            .collect()
    }

    pub fn row_count(&self) -> usize {
        self.body_rows().len()
    }

    /// Width new rows get: the header's cell count when a header exists,
    /// otherwise the first body row's.
    pub fn column_count(&self) -> usize {
        match self.header_row() {
            Some(row) => self.cells(row).len(),
            None => self.body_column_count(),
        }
    }

    pub fn body_column_count(&self) -> usize {
        self.body_rows()
            .first()
            .map(|&row| self.cells(row).len())
            .unwrap_or(0)
    }

    /// Cells of `row` in document order.
    pub fn cells(&self, row: NodeId) -> Vec<NodeId> {
        row_cells(self.tree, row)
    }

    /// Cell at `row` (index into [`Self::rows`]) and `col`.
    pub fn cell_at(&self, row: usize, col: usize) -> Option<NodeId> {
        let row = *self.rows().get(row)?;
        self.cells(row).get(col).copied()
    }

    pub fn body_cell_at(&self, row: usize, col: usize) -> Option<NodeId> {
        let row = *self.body_rows().get(row)?;
        self.cells(row).get(col).copied()
    }

    pub fn section_of(&self, row: NodeId) -> Option<Section> {
        let section = resolve_section(self.tree, row).ok()?;
        if Some(section) == self.header {
            Some(Section::Header)
        } else if section == self.body {
            Some(Section::Body)
        } else {
            None
        }
    }

    pub fn column_index(&self, cell: NodeId) -> Option<usize> {
        column_index(self.tree, cell)
    }
}

/// Column of `cell`: its ordinal position among the cells of its parent row.
/// A cell whose parent is not a row (decoration between row and cell) falls
/// back to [`column_index_by_document_order`].
pub fn column_index(tree: &DocumentTree, cell: NodeId) -> Option<usize> {
    if !is_cell(tree, cell) {
        return None;
    }
    let parent = tree.parent(cell)?;
    if !tree.is_kind(parent, ROW) {
        return column_index_by_document_order(tree, cell);
    }
    tree.children(parent)
        .iter()
        .copied()
        .filter(|&sibling| is_cell(tree, sibling))
        .position(|sibling| sibling == cell)
}

/// Column of `cell` from the order its row's cells appear in the document.
pub fn column_index_by_document_order(tree: &DocumentTree, cell: NodeId) -> Option<usize> {
    let row = resolve_row(tree, cell).ok()?;
    row_cells(tree, row).iter().position(|&id| id == cell)
}

/// Cells of `row` in document order, looking through decoration nodes but not
/// into the cells themselves or into nested tables.
pub(crate) fn row_cells(tree: &DocumentTree, row: NodeId) -> Vec<NodeId> {
    let mut cells = Vec::new();
    let mut stack: Vec<NodeId> = tree.children(row).iter().rev().copied().collect();
    while let Some(id) = stack.pop() {
        if is_cell(tree, id) {
            cells.push(id);
            continue;
        }
        if tree.is_kind(id, WRAPPER) || tree.is_kind(id, TABLE) || tree.is_kind(id, ROW) {
            continue;
        }
        stack.extend(tree.children(id).iter().rev());
    }
    cells
}

/// Where to insert a new cell so that it becomes cell number `at` of a row
/// whose current cells are `cells`: (parent, child index).
pub(crate) fn cell_insertion_point(
    tree: &DocumentTree,
    row: NodeId,
    cells: &[NodeId],
    at: usize,
) -> (NodeId, usize) {
    if let Some(&next) = cells.get(at) {
        if let (Some(parent), Some(index)) = (tree.parent(next), tree.index_in_parent(next)) {
            return (parent, index);
        }
    }
    if let Some(&last) = cells.last() {
        if let (Some(parent), Some(index)) = (tree.parent(last), tree.index_in_parent(last)) {
            return (parent, index + 1);
        }
    }
    (row, tree.children(row).len())
}
