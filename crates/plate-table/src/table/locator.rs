//! Resolves an arbitrary anchor (a text leaf, an inline decoration, a cell)
//! to the table structure around it by walking parent links upward.

use std::ops::RangeInclusive;

use crate::core::Selection;
use crate::error::TableError;
use crate::table::model::{TableModel, column_index};
use crate::table::schema::{CELL_KINDS, ROW, SECTION_KINDS, TABLE, WRAPPER};
use crate::tree::{DocumentTree, NodeId};

/// Nearest node among `anchor` and its ancestors whose kind is in `kinds`.
/// Non-matching ancestors are skipped, however deeply the anchor is nested.
pub fn closest_of_kind(tree: &DocumentTree, anchor: NodeId, kinds: &[&str]) -> Option<NodeId> {
    tree.self_and_ancestors(anchor)
        .find(|&id| tree.kind(id).is_some_and(|kind| kinds.contains(&kind)))
}

pub fn resolve_cell(tree: &DocumentTree, anchor: NodeId) -> Result<NodeId, TableError> {
    closest_of_kind(tree, anchor, CELL_KINDS).ok_or(TableError::target("cell"))
}

pub fn resolve_row(tree: &DocumentTree, anchor: NodeId) -> Result<NodeId, TableError> {
    closest_of_kind(tree, anchor, &[ROW]).ok_or(TableError::target("row"))
}

pub fn resolve_section(tree: &DocumentTree, anchor: NodeId) -> Result<NodeId, TableError> {
    closest_of_kind(tree, anchor, SECTION_KINDS).ok_or(TableError::target("section"))
}

/// The `table` node enclosing `anchor`; a wrapper anchor resolves to the
/// table it owns.
pub fn resolve_table(tree: &DocumentTree, anchor: NodeId) -> Result<NodeId, TableError> {
    if let Some(table) = closest_of_kind(tree, anchor, &[TABLE]) {
        return Ok(table);
    }
    if tree.is_kind(anchor, WRAPPER) {
        return tree
            .children(anchor)
            .iter()
            .copied()
            .find(|&child| tree.is_kind(child, TABLE))
            .ok_or(TableError::NotATable);
    }
    Err(TableError::NotATable)
}

/// Rows (header row first) and columns covered by a selection, as indices
/// into [`TableModel::rows`] and cell positions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellRect {
    pub table: NodeId,
    pub rows: RangeInclusive<usize>,
    pub cols: RangeInclusive<usize>,
}

/// The rectangle spanned by the selection's anchor and focus cells. A focus
/// outside the anchor's table collapses the rectangle to the anchor cell.
pub fn cell_rect(tree: &DocumentTree, selection: &Selection) -> Result<CellRect, TableError> {
    let anchor_cell = resolve_cell(tree, selection.anchor)?;
    let model = TableModel::resolve(tree, anchor_cell)?;
    let grid = model.rows();
    let locate = |cell: NodeId| -> Option<(usize, usize)> {
        let row = resolve_row(tree, cell).ok()?;
        let r = grid.iter().position(|&id| id == row)?;
        Some((r, column_index(tree, cell)?))
    };

    let (ar, ac) = locate(anchor_cell).ok_or(TableError::target("cell"))?;
    let (fr, fc) = resolve_cell(tree, selection.focus)
        .ok()
        .filter(|&cell| resolve_table(tree, cell).ok() == Some(model.table))
        .and_then(locate)
        .unwrap_or((ar, ac));

    Ok(CellRect {
        table: model.table,
        rows: ar.min(fr)..=ar.max(fr),
        cols: ac.min(fc)..=ac.max(fc),
    })
}

/// Every cell inside the selection rectangle, in reading order.
pub fn selected_cells(tree: &DocumentTree, selection: &Selection) -> Result<Vec<NodeId>, TableError> {
    let rect = cell_rect(tree, selection)?;
    let model = TableModel::from_table(tree, rect.table)?;
    let mut cells = Vec::new();
    for (r, row) in model.rows().into_iter().enumerate() {
        if !rect.rows.contains(&r) {
            continue;
        }
        for (c, cell) in model.cells(row).into_iter().enumerate() {
            if rect.cols.contains(&c) {
                cells.push(cell);
            }
        }
    }
    Ok(cells)
}
