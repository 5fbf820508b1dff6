use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::tree::{Attrs, DocumentTree, Node, NodeId};

pub const WRAPPER: &str = "table_wrapper";
pub const TABLE: &str = "table";
pub const HEAD: &str = "table_head";
pub const BODY: &str = "table_body";
pub const ROW: &str = "table_row";
pub const CELL: &str = "table_cell";
pub const HEADER_CELL: &str = "table_header_cell";
pub const PLACEHOLDER: &str = "table_placeholder";

pub const CELL_KINDS: &[&str] = &[CELL, HEADER_CELL];
pub const SECTION_KINDS: &[&str] = &[HEAD, BODY];

pub fn is_cell(tree: &DocumentTree, id: NodeId) -> bool {
    tree.kind(id).is_some_and(|kind| CELL_KINDS.contains(&kind))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BorderSide {
    Top,
    Right,
    Bottom,
    Left,
}

impl BorderSide {
    pub const ALL: [BorderSide; 4] = [
        BorderSide::Top,
        BorderSide::Right,
        BorderSide::Bottom,
        BorderSide::Left,
    ];

    pub fn attr(self) -> &'static str {
        match self {
            BorderSide::Top => "border_top",
            BorderSide::Right => "border_right",
            BorderSide::Bottom => "border_bottom",
            BorderSide::Left => "border_left",
        }
    }
}

/// Sides written by one border command. `All` and `None` are shorthands for
/// four per-side writes; nothing records them as a mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BorderTarget {
    Top,
    Right,
    Bottom,
    Left,
    All,
    None,
}

impl BorderTarget {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "top" => Some(BorderTarget::Top),
            "right" => Some(BorderTarget::Right),
            "bottom" => Some(BorderTarget::Bottom),
            "left" => Some(BorderTarget::Left),
            "all" => Some(BorderTarget::All),
            "none" => Some(BorderTarget::None),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BorderTarget::Top => "top",
            BorderTarget::Right => "right",
            BorderTarget::Bottom => "bottom",
            BorderTarget::Left => "left",
            BorderTarget::All => "all",
            BorderTarget::None => "none",
        }
    }

    pub fn sides(self) -> &'static [BorderSide] {
        match self {
            BorderTarget::Top => &[BorderSide::Top],
            BorderTarget::Right => &[BorderSide::Right],
            BorderTarget::Bottom => &[BorderSide::Bottom],
            BorderTarget::Left => &[BorderSide::Left],
            BorderTarget::All | BorderTarget::None => &BorderSide::ALL,
        }
    }
}

/// Visible borders of a cell. A side without an explicit attribute is hidden.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BorderState {
    pub top: bool,
    pub right: bool,
    pub bottom: bool,
    pub left: bool,
}

impl BorderState {
    pub fn read(tree: &DocumentTree, cell: NodeId) -> Self {
        let side = |side: BorderSide| {
            tree.attr(cell, side.attr())
                .and_then(Value::as_bool)
                .unwrap_or(false)
        };
        Self {
            top: side(BorderSide::Top),
            right: side(BorderSide::Right),
            bottom: side(BorderSide::Bottom),
            left: side(BorderSide::Left),
        }
    }

    pub fn get(&self, side: BorderSide) -> bool {
        match side {
            BorderSide::Top => self.top,
            BorderSide::Right => self.right,
            BorderSide::Bottom => self.bottom,
            BorderSide::Left => self.left,
        }
    }
}

/// The explicit border attributes of `cell`, for copying onto a new sibling.
pub(crate) fn border_attrs(tree: &DocumentTree, cell: NodeId) -> Attrs {
    let mut attrs = Attrs::new();
    for side in BorderSide::ALL {
        if let Some(value) = tree.attr(cell, side.attr()) {
            attrs.insert(side.attr().to_string(), value.clone());
        }
    }
    attrs
}

pub fn cell_node(kind: &str, text: &str, attrs: Attrs) -> Node {
    let mut node = Node::element(kind, vec![Node::paragraph(text)]);
    if let Node::Element(el) = &mut node {
        el.attrs = attrs;
    }
    node
}

pub fn row_node(cells: Vec<Node>) -> Node {
    Node::element(ROW, cells)
}

/// A wrapper holding a `rows` x `cols` table of empty cells, with a header row
/// labelled `header_label` when one is given.
pub fn table_node(rows: usize, cols: usize, header_label: Option<&str>) -> Node {
    let rows = rows.max(1);
    let cols = cols.max(1);
    let mut sections = Vec::new();
    if let Some(label) = header_label {
        let cells = (0..cols)
            .map(|_| cell_node(HEADER_CELL, label, Attrs::default()))
            .collect();
        sections.push(Node::element(HEAD, vec![row_node(cells)]));
    }
    let body_rows = (0..rows)
        .map(|_| {
            row_node(
                (0..cols)
                    .map(|_| cell_node(CELL, "", Attrs::default()))
                    .collect(),
            )
        })
        .collect();
    sections.push(Node::element(BODY, body_rows));
    Node::element(WRAPPER, vec![Node::element(TABLE, sections)])
}

/// A wrapper holding a table whose body cells carry the given texts.
pub fn table_fragment<'a, R: AsRef<[&'a str]>>(body: &[R]) -> Node {
    fragment(None, body)
}

pub fn table_fragment_with_header<'a, R: AsRef<[&'a str]>>(
    header: &[&'a str],
    body: &[R],
) -> Node {
    fragment(Some(header), body)
}

fn fragment<'a, R: AsRef<[&'a str]>>(header: Option<&[&'a str]>, body: &[R]) -> Node {
    let mut sections = Vec::new();
    if let Some(header) = header {
        let cells = header
            .iter()
            .map(|text| cell_node(HEADER_CELL, text, Attrs::default()))
            .collect();
        sections.push(Node::element(HEAD, vec![row_node(cells)]));
    }
    let rows = body
        .iter()
        .map(|row| {
            row_node(
                row.as_ref()
                    .iter()
                    .map(|text| cell_node(CELL, text, Attrs::default()))
                    .collect(),
            )
        })
        .collect();
    sections.push(Node::element(BODY, rows));
    Node::element(WRAPPER, vec![Node::element(TABLE, sections)])
}
