//! B+tree over fixed-size pages.
//!
//! # Structure
//!
//! The tree consists of:
//! - Internal nodes: child page pointers, each paired with the largest key
//!   in that child's subtree, plus an unbounded right child
//! - Leaf nodes: `(id, row)` cells in ascending order, chained left to right
//!   for sequential scans
//!
//! Page 0 is always the root. A root split moves the old root's content to
//! a new page and rewrites page 0 as an internal node.
//!
//! # Usage
//!
//! ```no_run
//! use rowstore::storage::btree::BTree;
//! use rowstore::storage::btree::layout::INTERNAL_NODE_MAX_CELLS;
//! use rowstore::storage::pager::{Pager, PagerLimits};
//! use rowstore::storage::row::Row;
//!
//! let mut pager = Pager::open("rows.db".as_ref(), PagerLimits::default())?;
//! let mut tree = BTree::new(&mut pager, 0, INTERNAL_NODE_MAX_CELLS);
//! tree.ensure_root()?;
//! tree.insert(&Row::new(1, "alice", "alice@example.com")?)?;
//! for row in tree.start()? {
//!     println!("{}", row?);
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod cursor;
pub mod layout;
mod node;
mod tree;
mod verify;

pub use cursor::Cursor;
pub use node::{
    InternalCell, InternalNode, Key, LeafCell, LeafNode, NodeError, NodeHeader, NodeType,
};
pub use tree::{BTree, MAX_TREE_DEPTH, TreeError};
pub use verify::TreeStats;
