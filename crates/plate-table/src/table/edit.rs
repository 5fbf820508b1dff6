//! Structural edits on a populated table. Each function validates against the
//! current tree first and only then builds the detached nodes its transaction
//! inserts, so a refusal never leaves garbage in the arena.

use serde::{Deserialize, Serialize};

use crate::core::{Editor, EditorConfig, Selection};
use crate::error::TableError;
use crate::ops::{AttrPatch, Op, Transaction};
use crate::table::locator::{resolve_cell, resolve_row};
use crate::table::model::{Section, TableModel, cell_insertion_point, column_index};
use crate::table::schema::{
    BorderState, BorderTarget, CELL, HEAD, HEADER_CELL, border_attrs, cell_node, row_node,
};
use crate::tree::{Attrs, DocumentTree, Node, NodeId, TEXT};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowSide {
    Above,
    Below,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnSide {
    Left,
    Right,
}

/// Where the caret goes when a cell is selected: its first text leaf.
pub(crate) fn caret_in(tree: &DocumentTree, node: NodeId) -> NodeId {
    tree.descendants(node)
        .into_iter()
        .find(|&id| tree.is_kind(id, TEXT))
        .unwrap_or(node)
}

/// Child index in `section` at which a row becomes row number `at` of `rows`.
fn row_insertion_index(tree: &DocumentTree, section: NodeId, rows: &[NodeId], at: usize) -> usize {
    if let Some(index) = rows.get(at).and_then(|&row| tree.index_in_parent(row)) {
        return index;
    }
    rows.last()
        .and_then(|&row| tree.index_in_parent(row))
        .map(|index| index + 1)
        .unwrap_or(tree.children(section).len())
}

pub fn insert_row(
    editor: &mut Editor,
    anchor: NodeId,
    side: RowSide,
) -> Result<Transaction, TableError> {
    let tree = editor.tree();
    let row = resolve_row(tree, anchor)?;
    let model = TableModel::resolve(tree, row)?;
    let body_rows = model.body_rows();

    // Rows never go into the header section: a header anchor inserts at the
    // top of the body.
    let (at, template) = match model.section_of(row) {
        Some(Section::Body) => {
            let position = body_rows
                .iter()
                .position(|&r| r == row)
                .ok_or(TableError::target("row"))?;
            let at = match side {
                RowSide::Above => position,
                RowSide::Below => position + 1,
            };
            (at, row)
        }
        Some(Section::Header) => (0, body_rows.first().copied().unwrap_or(row)),
        None => return Err(TableError::target("row")),
    };

    let width = model.column_count().max(1);
    let template_cells = model.cells(template);
    let cells: Vec<Node> = (0..width)
        .map(|col| {
            let attrs = template_cells
                .get(col)
                .map(|&cell| border_attrs(tree, cell))
                .unwrap_or_default();
            cell_node(CELL, "", attrs)
        })
        .collect();
    let body = model.body;
    let index = row_insertion_index(tree, body, &body_rows, at);

    let new_row = editor.build(&row_node(cells));
    let tree = editor.tree();
    let cells = tree.children(new_row);
    let first = cells.first().map(|&cell| caret_in(tree, cell)).unwrap_or(new_row);
    let last = cells.last().map(|&cell| caret_in(tree, cell)).unwrap_or(new_row);

    Ok(Transaction::new(vec![Op::InsertNode {
        parent: body,
        index,
        node: new_row,
    }])
    .selection_after(Selection::span(first, last)))
}

/// Inserts one cell into every body row at the anchor's column (or after it)
/// and, only when a header already exists, one header cell at the same index.
pub fn insert_column(
    editor: &mut Editor,
    anchor: NodeId,
    side: ColumnSide,
) -> Result<Transaction, TableError> {
    let tree = editor.tree();
    let cell = resolve_cell(tree, anchor)?;
    let model = TableModel::resolve(tree, cell)?;
    let col = column_index(tree, cell).ok_or(TableError::target("cell"))?;
    let anchor_row = resolve_row(tree, cell)?;
    let at = match side {
        ColumnSide::Left => col,
        ColumnSide::Right => col + 1,
    };

    let mut planned: Vec<(NodeId, usize, Node, bool)> = Vec::new();
    for row in model.body_rows() {
        let cells = model.cells(row);
        let attrs = cells
            .get(col)
            .or(cells.last())
            .map(|&sibling| border_attrs(tree, sibling))
            .unwrap_or_default();
        let (parent, index) = cell_insertion_point(tree, row, &cells, at.min(cells.len()));
        planned.push((parent, index, cell_node(CELL, "", attrs), row == anchor_row));
    }
    if let Some(header_row) = model.header_row() {
        let cells = model.cells(header_row);
        let (parent, index) = cell_insertion_point(tree, header_row, &cells, at.min(cells.len()));
        let label = editor.config().header_label.as_str();
        planned.push((
            parent,
            index,
            cell_node(HEADER_CELL, label, Attrs::default()),
            header_row == anchor_row,
        ));
    }

    let mut ops = Vec::with_capacity(planned.len());
    let mut selection = None;
    for (parent, index, node, in_anchor_row) in planned {
        let id = editor.build(&node);
        if in_anchor_row {
            selection = Some(Selection::collapsed(caret_in(editor.tree(), id)));
        }
        ops.push(Op::InsertNode {
            parent,
            index,
            node: id,
        });
    }

    let tx = Transaction::new(ops);
    Ok(match selection {
        Some(selection) => tx.selection_after(selection),
        None => tx,
    })
}

pub fn remove_row(editor: &mut Editor, anchor: NodeId) -> Result<Transaction, TableError> {
    let tree = editor.tree();
    let row = resolve_row(tree, anchor)?;
    let model = TableModel::resolve(tree, row)?;
    match model.section_of(row) {
        Some(Section::Body) => {}
        Some(Section::Header) => {
            return Err(TableError::StructuralGuardViolation(
                "the header row is removed with remove_header",
            ));
        }
        None => return Err(TableError::target("row")),
    }

    let rows = model.body_rows();
    if rows.len() <= 1 {
        return remove_last(
            tree,
            editor.config(),
            model.wrapper,
            "removing the last body row would leave an empty table",
        );
    }

    let position = rows
        .iter()
        .position(|&r| r == row)
        .ok_or(TableError::target("row"))?;
    let neighbour = rows
        .get(position + 1)
        .or_else(|| position.checked_sub(1).and_then(|prev| rows.get(prev)))
        .copied();

    let tx = Transaction::new(vec![Op::RemoveNode { node: row }]);
    let caret = neighbour
        .and_then(|next| model.cells(next).first().copied())
        .map(|cell| caret_in(tree, cell));
    Ok(match caret {
        Some(caret) => tx.selection_after(Selection::collapsed(caret)),
        None => tx,
    })
}

/// Removes the anchor's column from every body row and the header cell at the
/// same index when one exists.
pub fn remove_column(editor: &mut Editor, anchor: NodeId) -> Result<Transaction, TableError> {
    let tree = editor.tree();
    let cell = resolve_cell(tree, anchor)?;
    let model = TableModel::resolve(tree, cell)?;
    let col = column_index(tree, cell).ok_or(TableError::target("cell"))?;

    let mut removed = Vec::new();
    let mut last_column = false;
    for row in model.body_rows() {
        let cells = model.cells(row);
        let Some(&target) = cells.get(col) else {
            return Err(TableError::StructuralGuardViolation(
                "a body row has no cell in this column",
            ));
        };
        last_column |= cells.len() <= 1;
        removed.push(target);
    }
    if last_column {
        return remove_last(
            tree,
            editor.config(),
            model.wrapper,
            "removing the last column would leave an empty table",
        );
    }

    if let Some(header_row) = model.header_row() {
        if let Some(&header_cell) = model.cells(header_row).get(col) {
            removed.push(header_cell);
        }
    }

    let anchor_row = resolve_row(tree, cell)?;
    let row_cells = model.cells(anchor_row);
    let neighbour = row_cells
        .get(col + 1)
        .or_else(|| col.checked_sub(1).and_then(|prev| row_cells.get(prev)))
        .map(|&next| caret_in(tree, next));

    let tx = Transaction::new(
        removed
            .into_iter()
            .map(|node| Op::RemoveNode { node })
            .collect(),
    );
    Ok(match neighbour {
        Some(caret) => tx.selection_after(Selection::collapsed(caret)),
        None => tx,
    })
}

fn remove_last(
    tree: &DocumentTree,
    config: &EditorConfig,
    wrapper: NodeId,
    reason: &'static str,
) -> Result<Transaction, TableError> {
    if config.delete_empty_tables {
        Ok(delete_wrapper_tx(tree, wrapper))
    } else {
        Err(TableError::StructuralGuardViolation(reason))
    }
}

/// Creates a header sized to the first body row, or pads a short existing one.
/// An existing header is never truncated.
pub fn add_header(editor: &mut Editor, anchor: NodeId) -> Result<Transaction, TableError> {
    let tree = editor.tree();
    let model = TableModel::resolve(tree, anchor)?;
    let width = model.body_column_count().max(1);
    let label = editor.config().header_label.clone();
    let header_cell = || cell_node(HEADER_CELL, &label, Attrs::default());

    if let Some(header_row) = model.header_row() {
        let cells = model.cells(header_row);
        if cells.len() >= width {
            return Ok(Transaction::empty());
        }
        let (parent, index) = cell_insertion_point(tree, header_row, &cells, cells.len());
        let missing = width - cells.len();
        let ops: Vec<Op> = (0..missing)
            .map(|offset| Op::InsertNode {
                parent,
                index: index + offset,
                node: editor.build(&header_cell()),
            })
            .collect();
        return Ok(Transaction::new(ops));
    }

    let (table, head) = (model.table, model.header);
    let row = row_node((0..width).map(|_| header_cell()).collect());
    let (parent, node) = match head {
        // A head section without a row only exists in unnormalized input.
        Some(head) => (head, editor.build(&row)),
        None => (table, editor.build(&Node::element(HEAD, vec![row]))),
    };
    Ok(Transaction::new(vec![Op::InsertNode {
        parent,
        index: 0,
        node,
    }]))
}

pub fn remove_header(editor: &mut Editor, anchor: NodeId) -> Result<Transaction, TableError> {
    let tree = editor.tree();
    let model = TableModel::resolve(tree, anchor)?;
    let Some(head) = model.header else {
        return Ok(Transaction::empty());
    };

    let tx = Transaction::new(vec![Op::RemoveNode { node: head }]);
    if !tree.is_ancestor_of(head, anchor) {
        return Ok(tx);
    }
    Ok(match model.body_cell_at(0, 0) {
        Some(cell) => tx.selection_after(Selection::collapsed(caret_in(tree, cell))),
        None => tx,
    })
}

/// Writes one explicit boolean per side per cell. `None` as value toggles,
/// using the first cell's current state of the first affected side; the
/// `none` target always hides.
pub fn set_border(
    tree: &DocumentTree,
    cells: &[NodeId],
    target: BorderTarget,
    value: Option<bool>,
) -> Transaction {
    let Some(&first) = cells.first() else {
        return Transaction::empty();
    };
    let value = match (target, value) {
        (BorderTarget::None, _) => false,
        (_, Some(value)) => value,
        (_, None) => {
            let state = BorderState::read(tree, first);
            !target.sides().iter().all(|&side| state.get(side))
        }
    };

    let ops = cells
        .iter()
        .map(|&cell| {
            let patch = target
                .sides()
                .iter()
                .fold(AttrPatch::default(), |patch, side| {
                    patch.and_set(side.attr(), value)
                });
            Op::SetNodeAttrs { node: cell, patch }
        })
        .collect();
    Transaction::new(ops)
}

pub fn delete_table(editor: &mut Editor, anchor: NodeId) -> Result<Transaction, TableError> {
    let tree = editor.tree();
    let model = TableModel::resolve(tree, anchor)?;
    Ok(delete_wrapper_tx(tree, model.wrapper))
}

/// Removes `wrapper`; the caret moves to the nearest text of a neighbouring
/// block, or is left for selection normalization when there is none.
pub(crate) fn delete_wrapper_tx(tree: &DocumentTree, wrapper: NodeId) -> Transaction {
    let tx = Transaction::new(vec![Op::RemoveNode { node: wrapper }]);
    let Some(parent) = tree.parent(wrapper) else {
        return tx;
    };
    let siblings = tree.children(parent);
    let index = tree.index_in_parent(wrapper).unwrap_or(0);
    let before = index.checked_sub(1).and_then(|prev| siblings.get(prev));
    let after = siblings.get(index + 1);
    let caret = before
        .or(after)
        .map(|&block| caret_in(tree, block))
        .filter(|&caret| tree.is_kind(caret, TEXT));
    match caret {
        Some(caret) => tx.selection_after(Selection::collapsed(caret)),
        None => tx,
    }
}

/// Resizes the body to `rows` x `cols` in place. Cells inside the new bounds
/// keep their content; new cells are empty; header cells follow the column
/// count. Dimensions are clamped to `1..=max_dimension`.
pub fn resize(
    editor: &mut Editor,
    anchor: NodeId,
    rows: usize,
    cols: usize,
) -> Result<Transaction, TableError> {
    let tree = editor.tree();
    let model = TableModel::resolve(tree, anchor)?;
    let max = editor.config().max_dimension;
    let rows = rows.clamp(1, max);
    let cols = cols.clamp(1, max);
    let label = editor.config().header_label.clone();

    let mut removals: Vec<NodeId> = Vec::new();
    let mut inserts: Vec<(NodeId, usize, Node)> = Vec::new();

    let body_rows = model.body_rows();
    for &row in body_rows.iter().take(rows) {
        let cells = model.cells(row);
        if cells.len() > cols {
            removals.extend(&cells[cols..]);
        } else if cells.len() < cols {
            let (parent, index) = cell_insertion_point(tree, row, &cells, cells.len());
            let attrs = cells
                .last()
                .map(|&cell| border_attrs(tree, cell))
                .unwrap_or_default();
            for offset in 0..cols - cells.len() {
                inserts.push((parent, index + offset, cell_node(CELL, "", attrs.clone())));
            }
        }
    }
    removals.extend(body_rows.iter().skip(rows));
    if body_rows.len() < rows {
        let index = row_insertion_index(tree, model.body, &body_rows, body_rows.len());
        for offset in 0..rows - body_rows.len() {
            let cells = (0..cols).map(|_| cell_node(CELL, "", Attrs::default())).collect();
            inserts.push((model.body, index + offset, row_node(cells)));
        }
    }

    if let Some(header_row) = model.header_row() {
        let cells = model.cells(header_row);
        if cells.len() > cols {
            removals.extend(&cells[cols..]);
        } else if cells.len() < cols {
            let (parent, index) = cell_insertion_point(tree, header_row, &cells, cells.len());
            for offset in 0..cols - cells.len() {
                inserts.push((
                    parent,
                    index + offset,
                    cell_node(HEADER_CELL, &label, Attrs::default()),
                ));
            }
        }
    }

    let caret = model.body_cell_at(0, 0).map(|cell| caret_in(tree, cell));
    let shrinks = !removals.is_empty();

    let mut ops: Vec<Op> = removals
        .into_iter()
        .map(|node| Op::RemoveNode { node })
        .collect();
    for (parent, index, node) in inserts {
        ops.push(Op::InsertNode {
            parent,
            index,
            node: editor.build(&node),
        });
    }

    let tx = Transaction::new(ops);
    Ok(match caret {
        Some(caret) if shrinks => tx.selection_after(Selection::collapsed(caret)),
        _ => tx,
    })
}
