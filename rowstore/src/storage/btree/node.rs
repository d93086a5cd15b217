//! B-tree node types and their page encoding.
//!
//! Nodes are decoded from a page into owned values, modified, and written
//! back, so no borrow of a cached page outlives a single pager call. All
//! cross-page references are plain page numbers.
//!
//! A few hot paths operate directly on the page bytes instead: the node type
//! and cell counts used while descending, parent/root flag rewrites after a
//! split, and inserting a cell into a leaf with spare room.

#![allow(clippy::cast_possible_truncation)]

use crate::storage::btree::layout::{
    INTERNAL_NODE_MAX_CELLS, INTERNAL_NODE_NUM_KEYS_OFFSET, INTERNAL_NODE_RIGHT_CHILD_OFFSET,
    IS_ROOT_OFFSET, LEAF_NODE_CELL_SIZE, LEAF_NODE_KEY_SIZE, LEAF_NODE_MAX_CELLS,
    LEAF_NODE_NEXT_LEAF_OFFSET, LEAF_NODE_NUM_CELLS_OFFSET, LEAF_NODE_VALUE_OFFSET,
    NODE_TYPE_OFFSET, PARENT_POINTER_OFFSET, internal_cell_offset, leaf_cell_offset,
};
use crate::storage::page::{Page, PageNum};
use crate::storage::row::{ROW_SIZE, Row};

/// A leaf key. Keys are row ids.
pub type Key = u32;

/// Node type discriminant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum NodeType {
    Internal = 0,
    Leaf = 1,
}

impl TryFrom<u8> for NodeType {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Internal),
            1 => Ok(Self::Leaf),
            _ => Err(value),
        }
    }
}

impl std::fmt::Display for NodeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Internal => write!(f, "internal"),
            Self::Leaf => write!(f, "leaf"),
        }
    }
}

/// Header fields shared by both node kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeHeader {
    pub node_type: NodeType,
    pub is_root: bool,
    pub parent: PageNum,
}

impl NodeHeader {
    /// Read the common header from a page.
    pub fn from_page(page: &Page) -> Result<Self, NodeError> {
        let node_type = node_type(page)?;
        Ok(Self {
            node_type,
            is_root: page.read_u8(IS_ROOT_OFFSET) == 1,
            parent: page.read_u32(PARENT_POINTER_OFFSET),
        })
    }

    /// Write the common header to a page.
    pub fn write_to_page(&self, page: &mut Page) {
        page.write_u8(NODE_TYPE_OFFSET, self.node_type as u8);
        page.write_u8(IS_ROOT_OFFSET, u8::from(self.is_root));
        page.write_u32(PARENT_POINTER_OFFSET, self.parent);
    }
}

/// Read just the node type of a page.
pub fn node_type(page: &Page) -> Result<NodeType, NodeError> {
    NodeType::try_from(page.read_u8(NODE_TYPE_OFFSET)).map_err(NodeError::InvalidNodeType)
}

/// Rewrite the parent pointer of a node in place.
pub fn set_parent(page: &mut Page, parent: PageNum) {
    page.write_u32(PARENT_POINTER_OFFSET, parent);
}

/// Number of cells in a leaf page, without decoding the cells.
#[must_use]
pub fn leaf_num_cells(page: &Page) -> usize {
    page.read_u32(LEAF_NODE_NUM_CELLS_OFFSET) as usize
}

/// Number of keys in an internal page, without decoding the cells.
#[must_use]
pub fn internal_num_keys(page: &Page) -> usize {
    page.read_u32(INTERNAL_NODE_NUM_KEYS_OFFSET) as usize
}

/// Right sibling of a leaf page (0 = none).
#[must_use]
pub fn leaf_next_leaf(page: &Page) -> PageNum {
    page.read_u32(LEAF_NODE_NEXT_LEAF_OFFSET)
}

/// Deserialize the row stored in leaf cell `cell_num`.
#[must_use]
pub fn leaf_row(page: &Page, cell_num: usize) -> Row {
    let mut value = [0u8; ROW_SIZE];
    let offset = leaf_cell_offset(cell_num) + LEAF_NODE_VALUE_OFFSET;
    value.copy_from_slice(page.read_bytes(offset, ROW_SIZE));
    Row::deserialize(&value)
}

/// Insert a cell into a leaf page that has spare room.
///
/// Cells at or after `cell_num` shift one slot right; the cost is
/// proportional to the number of cells moved.
pub fn leaf_insert_in_place(
    page: &mut Page,
    cell_num: usize,
    key: Key,
    value: &[u8; ROW_SIZE],
) -> Result<(), NodeError> {
    let num_cells = leaf_num_cells(page);
    if num_cells >= LEAF_NODE_MAX_CELLS {
        return Err(NodeError::CellCountOutOfRange {
            count: num_cells + 1,
            max: LEAF_NODE_MAX_CELLS,
        });
    }

    if cell_num < num_cells {
        let src = leaf_cell_offset(cell_num);
        page.move_bytes(
            src,
            src + LEAF_NODE_CELL_SIZE,
            (num_cells - cell_num) * LEAF_NODE_CELL_SIZE,
        );
    }

    let offset = leaf_cell_offset(cell_num);
    page.write_u32(offset, key);
    page.write_bytes(offset + LEAF_NODE_KEY_SIZE, value);
    page.write_u32(LEAF_NODE_NUM_CELLS_OFFSET, (num_cells + 1) as u32);
    Ok(())
}

/// A key and its serialized row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeafCell {
    pub key: Key,
    pub value: [u8; ROW_SIZE],
}

impl LeafCell {
    /// Build a cell for a row, keyed by its id.
    #[must_use]
    pub fn from_row(row: &Row) -> Self {
        Self {
            key: row.id(),
            value: row.serialize(),
        }
    }

    #[must_use]
    pub fn row(&self) -> Row {
        Row::deserialize(&self.value)
    }
}

/// A leaf node: sorted cells and a link to the next leaf to the right.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeafNode {
    pub header: NodeHeader,
    /// Right sibling, or 0 if this is the rightmost leaf.
    pub next_leaf: PageNum,
    /// Cells in strictly ascending key order.
    pub cells: Vec<LeafCell>,
}

impl LeafNode {
    /// Create an empty leaf.
    #[must_use]
    pub const fn new(is_root: bool, parent: PageNum) -> Self {
        Self {
            header: NodeHeader {
                node_type: NodeType::Leaf,
                is_root,
                parent,
            },
            next_leaf: 0,
            cells: Vec::new(),
        }
    }

    /// Read a leaf node from a page.
    pub fn from_page(page: &Page) -> Result<Self, NodeError> {
        let header = NodeHeader::from_page(page)?;
        if header.node_type != NodeType::Leaf {
            return Err(NodeError::WrongNodeType {
                expected: NodeType::Leaf,
                found: header.node_type,
            });
        }

        let num_cells = leaf_num_cells(page);
        if num_cells > LEAF_NODE_MAX_CELLS {
            return Err(NodeError::CellCountOutOfRange {
                count: num_cells,
                max: LEAF_NODE_MAX_CELLS,
            });
        }

        let cells = (0..num_cells)
            .map(|cell_num| {
                let offset = leaf_cell_offset(cell_num);
                let mut value = [0u8; ROW_SIZE];
                value.copy_from_slice(page.read_bytes(offset + LEAF_NODE_VALUE_OFFSET, ROW_SIZE));
                LeafCell {
                    key: page.read_u32(offset),
                    value,
                }
            })
            .collect();

        Ok(Self {
            header,
            next_leaf: page.read_u32(LEAF_NODE_NEXT_LEAF_OFFSET),
            cells,
        })
    }

    /// Write the leaf to a page, replacing its previous contents.
    pub fn write_to_page(&self, page: &mut Page) {
        debug_assert!(self.cells.len() <= LEAF_NODE_MAX_CELLS);

        page.clear();
        self.header.write_to_page(page);
        page.write_u32(LEAF_NODE_NUM_CELLS_OFFSET, self.cells.len() as u32);
        page.write_u32(LEAF_NODE_NEXT_LEAF_OFFSET, self.next_leaf);

        for (cell_num, cell) in self.cells.iter().enumerate() {
            let offset = leaf_cell_offset(cell_num);
            page.write_u32(offset, cell.key);
            page.write_bytes(offset + LEAF_NODE_VALUE_OFFSET, &cell.value);
        }
    }

    /// Binary search for `key`.
    ///
    /// `Ok(i)` is an exact match; `Err(i)` is the insertion point, i.e. the
    /// first cell whose key is greater.
    pub fn find_index(&self, key: Key) -> Result<usize, usize> {
        self.cells.binary_search_by(|cell| cell.key.cmp(&key))
    }

    /// Largest key in the node.
    #[must_use]
    pub fn max_key(&self) -> Option<Key> {
        self.cells.last().map(|cell| cell.key)
    }

    #[must_use]
    pub fn is_full(&self) -> bool {
        self.cells.len() >= LEAF_NODE_MAX_CELLS
    }
}

/// A child pointer and the largest key in that child's subtree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InternalCell {
    pub child: PageNum,
    pub key: Key,
}

/// An internal node.
///
/// `cells[i].key` is the maximum key under `cells[i].child`. Keys greater
/// than every cell key live under `right_child`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InternalNode {
    pub header: NodeHeader,
    pub cells: Vec<InternalCell>,
    pub right_child: PageNum,
}

impl InternalNode {
    /// Create an internal node with one separator and two children.
    #[must_use]
    pub fn with_children(
        is_root: bool,
        parent: PageNum,
        left_child: PageNum,
        left_max: Key,
        right_child: PageNum,
    ) -> Self {
        Self {
            header: NodeHeader {
                node_type: NodeType::Internal,
                is_root,
                parent,
            },
            cells: vec![InternalCell {
                child: left_child,
                key: left_max,
            }],
            right_child,
        }
    }

    /// Read an internal node from a page.
    pub fn from_page(page: &Page) -> Result<Self, NodeError> {
        let header = NodeHeader::from_page(page)?;
        if header.node_type != NodeType::Internal {
            return Err(NodeError::WrongNodeType {
                expected: NodeType::Internal,
                found: header.node_type,
            });
        }

        let num_keys = internal_num_keys(page);
        if num_keys > INTERNAL_NODE_MAX_CELLS {
            return Err(NodeError::CellCountOutOfRange {
                count: num_keys,
                max: INTERNAL_NODE_MAX_CELLS,
            });
        }

        let cells = (0..num_keys)
            .map(|cell_num| {
                let offset = internal_cell_offset(cell_num);
                InternalCell {
                    child: page.read_u32(offset),
                    key: page.read_u32(offset + 4),
                }
            })
            .collect();

        Ok(Self {
            header,
            cells,
            right_child: page.read_u32(INTERNAL_NODE_RIGHT_CHILD_OFFSET),
        })
    }

    /// Write the node to a page, replacing its previous contents.
    pub fn write_to_page(&self, page: &mut Page) {
        debug_assert!(self.cells.len() <= INTERNAL_NODE_MAX_CELLS);

        page.clear();
        self.header.write_to_page(page);
        page.write_u32(INTERNAL_NODE_NUM_KEYS_OFFSET, self.cells.len() as u32);
        page.write_u32(INTERNAL_NODE_RIGHT_CHILD_OFFSET, self.right_child);

        for (cell_num, cell) in self.cells.iter().enumerate() {
            let offset = internal_cell_offset(cell_num);
            page.write_u32(offset, cell.child);
            page.write_u32(offset + 4, cell.key);
        }
    }

    /// Index of the child subtree that holds `key`: the first cell whose key
    /// is `>= key`, or `cells.len()` for the right child.
    #[must_use]
    pub fn find_child_index(&self, key: Key) -> usize {
        self.cells.partition_point(|cell| cell.key < key)
    }

    /// Page number of child `index`, where `cells.len()` is the right child.
    #[must_use]
    pub fn child(&self, index: usize) -> PageNum {
        self.cells
            .get(index)
            .map_or(self.right_child, |cell| cell.child)
    }

    /// All child page numbers, left to right.
    pub fn children(&self) -> impl Iterator<Item = PageNum> + '_ {
        self.cells
            .iter()
            .map(|cell| cell.child)
            .chain(std::iter::once(self.right_child))
    }

    /// Record that child `index` split into itself (keeping the lower half,
    /// now ending at `left_max`) and a new right sibling at `new_child`.
    ///
    /// Every cell key stays equal to the maximum of its child's subtree.
    pub fn insert_split_child(&mut self, index: usize, left_max: Key, new_child: PageNum) {
        if index >= self.cells.len() {
            // The right child split: it becomes a keyed cell and the new
            // sibling takes over as the unbounded right child.
            self.cells.push(InternalCell {
                child: self.right_child,
                key: left_max,
            });
            self.right_child = new_child;
        } else {
            let old_max = self.cells[index].key;
            self.cells[index].key = left_max;
            self.cells.insert(
                index + 1,
                InternalCell {
                    child: new_child,
                    key: old_max,
                },
            );
        }
    }

    /// Split an overfull node in two.
    ///
    /// The left half keeps cells `[0, mid)` and inherits `cells[mid].child`
    /// as its right child; `cells[mid].key` is promoted and is the maximum
    /// key of the left half. The returned right node owns the remaining
    /// cells and the original right child.
    #[must_use]
    pub fn split(&mut self) -> (Key, Self) {
        debug_assert!(self.cells.len() >= 3, "only overfull nodes split");

        let mid = self.cells.len() / 2;
        let mut right_cells = self.cells.split_off(mid);
        let middle = right_cells.remove(0);
        let right_child = std::mem::replace(&mut self.right_child, middle.child);

        let right = Self {
            header: NodeHeader {
                node_type: NodeType::Internal,
                is_root: false,
                parent: self.header.parent,
            },
            cells: right_cells,
            right_child,
        };

        (middle.key, right)
    }
}

/// Errors that can occur when decoding or modifying nodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeError {
    /// Unknown node type byte.
    InvalidNodeType(u8),
    /// The page holds the other kind of node.
    WrongNodeType { expected: NodeType, found: NodeType },
    /// Cell count exceeds what fits in a page.
    CellCountOutOfRange { count: usize, max: usize },
}

impl std::fmt::Display for NodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidNodeType(v) => write!(f, "invalid node type: 0x{v:02x}"),
            Self::WrongNodeType { expected, found } => {
                write!(f, "expected {expected} node, found {found} node")
            }
            Self::CellCountOutOfRange { count, max } => {
                write!(f, "cell count {count} out of range (max {max})")
            }
        }
    }
}

impl std::error::Error for NodeError {}
