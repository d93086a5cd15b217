//! Whole-tree structural check.

use std::collections::HashSet;

use crate::storage::btree::node::{Key, NodeType};
use crate::storage::btree::tree::{BTree, MAX_TREE_DEPTH, TreeError};
use crate::storage::page::PageNum;

/// Shape of a tree that passed verification.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TreeStats {
    /// Levels from the root to the leaves, counting both.
    pub depth: usize,
    pub leaf_count: usize,
    pub internal_count: usize,
    pub row_count: usize,
}

/// State threaded through the walk.
#[derive(Debug, Default)]
struct Walk {
    stats: TreeStats,
    visited: HashSet<PageNum>,
    /// Leaves in key order, as reached through child pointers.
    leaves: Vec<PageNum>,
}

impl BTree<'_> {
    /// Check every structural invariant of the tree.
    ///
    /// - keys ascend strictly within each node and across the whole tree
    /// - each internal cell key equals the largest key under its child
    /// - all leaves sit at the same depth
    /// - parent pointers and root flags match the actual shape
    /// - the leaf chain visits the leaves in key order and ends at 0
    ///
    /// The first violation found is returned as `TreeError::Corrupt`.
    pub fn verify(&mut self) -> Result<TreeStats, TreeError> {
        let mut walk = Walk::default();
        self.verify_node(self.root_page(), None, 1, None, None, &mut walk)?;
        self.verify_leaf_chain(&walk.leaves)?;

        tracing::debug!("verified tree: {:?}", walk.stats);
        Ok(walk.stats)
    }

    /// Verify the subtree at `page_num`, whose keys must lie in
    /// `(lower, upper]`. Returns its largest key, if it holds any.
    fn verify_node(
        &mut self,
        page_num: PageNum,
        parent: Option<PageNum>,
        depth: usize,
        lower: Option<Key>,
        upper: Option<Key>,
        walk: &mut Walk,
    ) -> Result<Option<Key>, TreeError> {
        if depth > MAX_TREE_DEPTH {
            return Err(TreeError::Corrupt(format!(
                "page {page_num} is deeper than {MAX_TREE_DEPTH} levels"
            )));
        }
        if !walk.visited.insert(page_num) {
            return Err(TreeError::Corrupt(format!(
                "page {page_num} is reachable more than once"
            )));
        }

        let header = self.read_header(page_num)?;
        if header.is_root != parent.is_none() {
            return Err(TreeError::Corrupt(format!(
                "page {page_num} has root flag {} but {}",
                header.is_root,
                if parent.is_none() { "is the root" } else { "has a parent" }
            )));
        }
        if let Some(parent) = parent.filter(|&parent| parent != header.parent) {
            return Err(TreeError::Corrupt(format!(
                "page {page_num} records parent {} but hangs under {parent}",
                header.parent
            )));
        }

        match header.node_type {
            NodeType::Leaf => self.verify_leaf(page_num, parent, depth, lower, upper, walk),
            NodeType::Internal => self.verify_internal(page_num, depth, lower, upper, walk),
        }
    }

    fn verify_leaf(
        &mut self,
        page_num: PageNum,
        parent: Option<PageNum>,
        depth: usize,
        lower: Option<Key>,
        upper: Option<Key>,
        walk: &mut Walk,
    ) -> Result<Option<Key>, TreeError> {
        let leaf = self.read_leaf(page_num)?;

        if walk.stats.depth == 0 {
            walk.stats.depth = depth;
        } else if walk.stats.depth != depth {
            return Err(TreeError::Corrupt(format!(
                "leaf {page_num} at depth {depth}, expected {}",
                walk.stats.depth
            )));
        }
        if leaf.cells.is_empty() && parent.is_some() {
            return Err(TreeError::Corrupt(format!("non-root leaf {page_num} is empty")));
        }

        let mut previous = lower;
        for cell in &leaf.cells {
            if previous.is_some_and(|prev| cell.key <= prev) {
                return Err(TreeError::Corrupt(format!(
                    "leaf {page_num}: key {} out of order",
                    cell.key
                )));
            }
            if upper.is_some_and(|max| cell.key > max) {
                return Err(TreeError::Corrupt(format!(
                    "leaf {page_num}: key {} above its separator",
                    cell.key
                )));
            }
            previous = Some(cell.key);
        }

        walk.stats.leaf_count += 1;
        walk.stats.row_count += leaf.cells.len();
        walk.leaves.push(page_num);
        Ok(leaf.max_key())
    }

    fn verify_internal(
        &mut self,
        page_num: PageNum,
        depth: usize,
        lower: Option<Key>,
        upper: Option<Key>,
        walk: &mut Walk,
    ) -> Result<Option<Key>, TreeError> {
        let internal = self.read_internal(page_num)?;
        if internal.cells.is_empty() {
            return Err(TreeError::Corrupt(format!(
                "internal node {page_num} has no keys"
            )));
        }

        let mut child_lower = lower;
        for cell in &internal.cells {
            if child_lower.is_some_and(|prev| cell.key <= prev) {
                return Err(TreeError::Corrupt(format!(
                    "internal node {page_num}: key {} out of order",
                    cell.key
                )));
            }
            let child = self.checked_child(page_num, cell.child)?;
            let child_max =
                self.verify_node(child, Some(page_num), depth + 1, child_lower, Some(cell.key), walk)?;
            if child_max != Some(cell.key) {
                return Err(TreeError::Corrupt(format!(
                    "internal node {page_num}: key {} but child {child} tops out at {child_max:?}",
                    cell.key
                )));
            }
            child_lower = Some(cell.key);
        }

        let right_child = self.checked_child(page_num, internal.right_child)?;
        let right_max =
            self.verify_node(right_child, Some(page_num), depth + 1, child_lower, upper, walk)?;
        if right_max.is_none() {
            return Err(TreeError::Corrupt(format!(
                "internal node {page_num}: right child {right_child} is empty"
            )));
        }

        walk.stats.internal_count += 1;
        Ok(right_max)
    }

    /// Follow `next_leaf` from the first leaf and compare with tree order.
    fn verify_leaf_chain(&mut self, leaves: &[PageNum]) -> Result<(), TreeError> {
        let Some(&first) = leaves.first() else {
            return Ok(());
        };

        let mut page_num = first;
        for (position, &expected) in leaves.iter().enumerate() {
            if page_num != expected {
                return Err(TreeError::Corrupt(format!(
                    "leaf chain reaches page {page_num} at position {position}, expected {expected}"
                )));
            }
            let next = self.read_leaf(page_num)?.next_leaf;
            page_num = if next == 0 {
                0
            } else {
                self.checked_next_leaf(page_num, next)?
            };
        }

        if page_num != 0 {
            return Err(TreeError::Corrupt(format!(
                "leaf chain continues past the last leaf to page {page_num}"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use crate::storage::btree::layout::INTERNAL_NODE_MAX_CELLS;
    use crate::storage::btree::node::{InternalNode, LeafNode};
    use crate::storage::btree::tree::BTree;
    use crate::storage::pager::{Pager, PagerLimits};
    use crate::storage::row::Row;

    fn row(id: u32) -> Row {
        Row::new(id, format!("user{id}"), format!("user{id}@example.com")).expect("valid row")
    }

    fn open(dir: &TempDir) -> Pager {
        Pager::open(&dir.path().join("test.db"), PagerLimits::default()).expect("should open")
    }

    #[test]
    fn test_verify_empty_tree() {
        let dir = TempDir::new().expect("create temp dir");
        let mut pager = open(&dir);
        let mut tree = BTree::new(&mut pager, 0, INTERNAL_NODE_MAX_CELLS);
        tree.ensure_root().expect("init root");

        let stats = tree.verify().expect("empty tree is valid");
        assert_eq!(stats.depth, 1);
        assert_eq!(stats.leaf_count, 1);
        assert_eq!(stats.internal_count, 0);
        assert_eq!(stats.row_count, 0);
    }

    #[test]
    fn test_verify_detects_bad_separator() {
        let dir = TempDir::new().expect("create temp dir");
        let mut pager = open(&dir);
        {
            let mut tree = BTree::new(&mut pager, 0, INTERNAL_NODE_MAX_CELLS);
            tree.ensure_root().expect("init root");
            for id in 1..=14 {
                tree.insert(&row(id)).expect("insert");
            }
        }

        // Separator should be 7, the left leaf's max.
        let mut root = InternalNode::from_page(pager.page(0).expect("fetch")).expect("decode");
        root.cells[0].key = 8;
        root.write_to_page(pager.page(0).expect("fetch"));

        let mut tree = BTree::new(&mut pager, 0, INTERNAL_NODE_MAX_CELLS);
        let err = tree.verify().expect_err("separator mismatch");
        assert!(err.to_string().contains("tops out at"), "{err}");
    }

    #[test]
    fn test_verify_detects_wrong_parent() {
        let dir = TempDir::new().expect("create temp dir");
        let mut pager = open(&dir);
        {
            let mut tree = BTree::new(&mut pager, 0, INTERNAL_NODE_MAX_CELLS);
            tree.ensure_root().expect("init root");
            for id in 1..=14 {
                tree.insert(&row(id)).expect("insert");
            }
        }

        let mut leaf = LeafNode::from_page(pager.page(1).expect("fetch")).expect("decode");
        leaf.header.parent = 2;
        leaf.write_to_page(pager.page(1).expect("fetch"));

        let mut tree = BTree::new(&mut pager, 0, INTERNAL_NODE_MAX_CELLS);
        let err = tree.verify().expect_err("wrong parent");
        assert!(err.to_string().contains("records parent 2"), "{err}");
    }

    #[test]
    fn test_verify_detects_broken_leaf_chain() {
        let dir = TempDir::new().expect("create temp dir");
        let mut pager = open(&dir);
        {
            let mut tree = BTree::new(&mut pager, 0, INTERNAL_NODE_MAX_CELLS);
            tree.ensure_root().expect("init root");
            for id in 1..=14 {
                tree.insert(&row(id)).expect("insert");
            }
        }

        // Left leaf (page 2) should link to the right leaf (page 1).
        let mut leaf = LeafNode::from_page(pager.page(2).expect("fetch")).expect("decode");
        leaf.next_leaf = 0;
        leaf.write_to_page(pager.page(2).expect("fetch"));

        let mut tree = BTree::new(&mut pager, 0, INTERNAL_NODE_MAX_CELLS);
        let err = tree.verify().expect_err("chain broken");
        assert!(err.to_string().contains("leaf chain"), "{err}");
    }
}
