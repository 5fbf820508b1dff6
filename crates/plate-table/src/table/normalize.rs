use crate::ops::Op;
use crate::plugin::{NormalizePass, PluginRegistry};
use crate::table::model::{cell_insertion_point, row_cells};
use crate::table::schema::{BODY, CELL, HEAD, ROW, TABLE, WRAPPER, cell_node};
use crate::tree::{Attrs, DocumentTree, Node, NodeId};

/// Repairs externally authored or half-edited tables. Fixes one table at a
/// time; the editor re-runs the pass until it reports nothing.
///
/// Header sections are only ever removed when empty. They are never created,
/// padded or truncated here.
pub(crate) struct NormalizeTableStructure;

impl NormalizePass for NormalizeTableStructure {
    fn id(&self) -> &'static str {
        "table.normalize_structure"
    }

    fn run(&self, tree: &mut DocumentTree, _registry: &PluginRegistry) -> Vec<Op> {
        let root = tree.root();
        let attached = tree.descendants(root);

        for &wrapper in attached.iter().filter(|&&id| tree.is_kind(id, WRAPPER)) {
            let has_table = tree
                .children(wrapper)
                .iter()
                .any(|&child| tree.is_kind(child, TABLE));
            if !has_table {
                return vec![Op::RemoveNode { node: wrapper }];
            }
        }

        let tables: Vec<NodeId> = attached
            .into_iter()
            .filter(|&id| tree.is_kind(id, TABLE))
            .collect();
        for table in tables {
            let ops = normalize_table(tree, table);
            if !ops.is_empty() {
                return ops;
            }
        }
        Vec::new()
    }
}

fn child_of_kind(tree: &DocumentTree, parent: NodeId, kind: &str) -> Option<NodeId> {
    tree.children(parent)
        .iter()
        .copied()
        .find(|&child| tree.is_kind(child, kind))
}

fn rows_of(tree: &DocumentTree, section: NodeId) -> Vec<NodeId> {
    tree.children(section)
        .iter()
        .copied()
        .filter(|&child| tree.is_kind(child, ROW))
        .collect()
}

fn normalize_table(tree: &mut DocumentTree, table: NodeId) -> Vec<Op> {
    let Some(parent) = tree.parent(table) else {
        return Vec::new();
    };

    if !tree.is_kind(parent, WRAPPER) {
        let Some(index) = tree.index_in_parent(table) else {
            return Vec::new();
        };
        let Ok(wrapper) = tree.create_node(WRAPPER, Attrs::default(), Vec::new()) else {
            return Vec::new();
        };
        return vec![
            Op::RemoveNode { node: table },
            Op::InsertNode {
                parent,
                index,
                node: wrapper,
            },
            Op::InsertNode {
                parent: wrapper,
                index: 0,
                node: table,
            },
        ];
    }

    let stray = rows_of(tree, table);
    let body = child_of_kind(tree, table, BODY);
    if body.is_none() || !stray.is_empty() {
        return adopt_stray_rows(tree, table, body, stray);
    }
    let Some(body) = body else {
        return Vec::new();
    };

    let head = child_of_kind(tree, table, HEAD);
    let sections: Vec<NodeId> = head.into_iter().chain([body]).collect();
    let empty_rows: Vec<Op> = sections
        .iter()
        .flat_map(|&section| rows_of(tree, section))
        .filter(|&row| row_cells(tree, row).is_empty())
        .map(|row| Op::RemoveNode { node: row })
        .collect();
    if !empty_rows.is_empty() {
        return empty_rows;
    }

    if let Some(head) = head {
        if rows_of(tree, head).is_empty() {
            return vec![Op::RemoveNode { node: head }];
        }
    }

    let body_rows = rows_of(tree, body);
    if body_rows.is_empty() {
        return vec![Op::RemoveNode { node: parent }];
    }

    let widths: Vec<(NodeId, Vec<NodeId>)> = body_rows
        .iter()
        .map(|&row| (row, row_cells(tree, row)))
        .collect();
    let widest = widths.iter().map(|(_, cells)| cells.len()).max().unwrap_or(0);
    let mut ops = Vec::new();
    for (row, cells) in &widths {
        if cells.len() >= widest {
            continue;
        }
        let (parent, index) = cell_insertion_point(tree, *row, cells, cells.len());
        for offset in 0..widest - cells.len() {
            let cell = tree.build(&cell_node(CELL, "", Attrs::default()));
            ops.push(Op::InsertNode {
                parent,
                index: index + offset,
                node: cell,
            });
        }
    }
    if !ops.is_empty() {
        return ops;
    }

    let empty_cells: Vec<NodeId> = sections
        .iter()
        .flat_map(|&section| rows_of(tree, section))
        .flat_map(|row| row_cells(tree, row))
        .filter(|&cell| tree.children(cell).is_empty())
        .collect();
    empty_cells
        .into_iter()
        .map(|cell| Op::InsertNode {
            parent: cell,
            index: 0,
            node: tree.build(&Node::paragraph("")),
        })
        .collect()
}

/// Moves rows sitting directly under `table` into its body, creating the body
/// when it is missing.
fn adopt_stray_rows(
    tree: &mut DocumentTree,
    table: NodeId,
    body: Option<NodeId>,
    stray: Vec<NodeId>,
) -> Vec<Op> {
    let mut ops: Vec<Op> = stray.iter().map(|&row| Op::RemoveNode { node: row }).collect();
    let (body, mut at) = match body {
        Some(body) => (body, tree.children(body).len()),
        None => {
            let Ok(body) = tree.create_node(BODY, Attrs::default(), Vec::new()) else {
                return Vec::new();
            };
            let index = tree.children(table).len() - stray.len();
            ops.push(Op::InsertNode {
                parent: table,
                index,
                node: body,
            });
            (body, 0)
        }
    };
    for row in stray {
        ops.push(Op::InsertNode {
            parent: body,
            index: at,
            node: row,
        });
        at += 1;
    }
    ops
}
