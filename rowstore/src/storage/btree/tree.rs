//! B+tree over the table file.
//!
//! Rows live in leaves, keyed by id. Internal cells carry the maximum key of
//! their child subtree, so a search follows the first cell whose key is at
//! least the target, or the right child when every cell key is smaller.
//!
//! The root is pinned to one page number for the life of the file. When the
//! root splits, its contents move to a fresh page and the root page is
//! rewritten as an internal node over the two halves, which is how the tree
//! grows in depth.

#![allow(clippy::cast_possible_truncation)]

use crate::storage::btree::cursor::{self, Cursor};
use crate::storage::btree::layout::{INTERNAL_NODE_MAX_CELLS, LEAF_NODE_LEFT_SPLIT_COUNT};
use crate::storage::btree::node::{
    self, InternalNode, Key, LeafCell, LeafNode, NodeError, NodeHeader, NodeType,
};
use crate::storage::page::PageNum;
use crate::storage::pager::{Pager, PagerError};
use crate::storage::row::Row;

/// Deepest tree we will walk before assuming the child pointers form a cycle.
///
/// Even with two-cell internal nodes, 64 levels address far more rows than a
/// `u32` key space holds.
pub const MAX_TREE_DEPTH: usize = 64;

/// One step of a root-to-leaf descent: the internal page visited and the
/// index of the child taken (`cells.len()` for the right child).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Frame {
    page_num: PageNum,
    child_index: usize,
}

/// A decoded node of either kind.
#[derive(Debug)]
enum Node {
    Leaf(LeafNode),
    Internal(InternalNode),
}

impl Node {
    const fn header_mut(&mut self) -> &mut NodeHeader {
        match self {
            Self::Leaf(leaf) => &mut leaf.header,
            Self::Internal(internal) => &mut internal.header,
        }
    }
}

/// A node that has split in two and still needs a home for its right half.
#[derive(Debug)]
struct Split {
    /// Page of the lower half (the page that split).
    left_page: PageNum,
    left: Node,
    /// Largest key under the lower half.
    left_max: Key,
    right_page: PageNum,
    right: Node,
}

impl Split {
    fn set_placement(&mut self, is_root: bool, parent: PageNum) {
        for node in [&mut self.left, &mut self.right] {
            let header = node.header_mut();
            header.is_root = is_root;
            header.parent = parent;
        }
    }
}

/// A B+tree rooted at a fixed page of a pager.
#[derive(Debug)]
pub struct BTree<'a> {
    pager: &'a mut Pager,
    root_page: PageNum,
    internal_max_cells: usize,
}

impl<'a> BTree<'a> {
    /// Wrap the tree rooted at `root_page`.
    ///
    /// `internal_max_cells` caps internal node fan-out and is clamped to
    /// `2..=INTERNAL_NODE_MAX_CELLS`.
    pub fn new(pager: &'a mut Pager, root_page: PageNum, internal_max_cells: usize) -> Self {
        Self {
            pager,
            root_page,
            internal_max_cells: internal_max_cells.clamp(2, INTERNAL_NODE_MAX_CELLS),
        }
    }

    #[must_use]
    pub const fn root_page(&self) -> PageNum {
        self.root_page
    }

    /// Make sure the root page holds a node.
    ///
    /// An empty file gets an empty root leaf. Otherwise the root page must
    /// decode as a node marked root.
    pub fn ensure_root(&mut self) -> Result<(), TreeError> {
        if self.pager.num_pages() == 0 {
            let page_num = self.pager.allocate()?;
            if page_num != self.root_page {
                return Err(TreeError::Corrupt(format!(
                    "empty file allocated page {page_num} for root page {}",
                    self.root_page
                )));
            }
            LeafNode::new(true, 0).write_to_page(self.pager.page(page_num)?);
            tracing::debug!("initialized empty root leaf at page {page_num}");
            return Ok(());
        }

        let root_page = self.root_page;
        let header = NodeHeader::from_page(self.pager.page(root_page)?).map_err(|source| {
            TreeError::Node {
                page_num: root_page,
                source,
            }
        })?;
        if !header.is_root {
            return Err(TreeError::Corrupt(format!(
                "page {root_page} is not marked as the root"
            )));
        }
        Ok(())
    }

    /// Cursor at `key`, or at the position `key` would be inserted.
    pub fn find(&mut self, key: Key) -> Result<Cursor<'_>, TreeError> {
        let (leaf_page, cell_num) = self.find_slot(key)?;
        Cursor::new(self.pager, leaf_page, cell_num)
    }

    /// Cursor at the smallest key.
    pub fn start(&mut self) -> Result<Cursor<'_>, TreeError> {
        let leaf_page = self.leftmost_leaf()?;
        Cursor::new(self.pager, leaf_page, 0)
    }

    /// Leaf and cell index where `key` is, or would be inserted.
    pub(crate) fn find_slot(&mut self, key: Key) -> Result<(PageNum, usize), TreeError> {
        let (leaf_page, _) = self.descend(key)?;
        let leaf = self.read_leaf(leaf_page)?;
        Ok((leaf_page, leaf.find_index(key).unwrap_or_else(|index| index)))
    }

    /// The leaf holding the smallest keys.
    pub(crate) fn leftmost_leaf(&mut self) -> Result<PageNum, TreeError> {
        let mut page_num = self.root_page;
        for _ in 0..MAX_TREE_DEPTH {
            let page = self.pager.page(page_num)?;
            match node::node_type(page).map_err(|source| TreeError::Node { page_num, source })? {
                NodeType::Leaf => return Ok(page_num),
                NodeType::Internal => {
                    let internal = self.read_internal(page_num)?;
                    page_num = self.checked_child(page_num, internal.child(0))?;
                }
            }
        }
        Err(self.too_deep())
    }

    /// Number of rows, counted leaf by leaf along the chain.
    pub fn len(&mut self) -> Result<usize, TreeError> {
        let mut page_num = self.leftmost_leaf()?;
        let mut rows = 0;
        for _ in 0..=self.pager.num_pages() {
            let page = self.pager.page(page_num)?;
            rows += cursor::checked_num_cells(page_num, node::leaf_num_cells(page))?;
            let next = node::leaf_next_leaf(page);
            if next == 0 {
                return Ok(rows);
            }
            page_num = self.checked_next_leaf(page_num, next)?;
        }
        Err(TreeError::Corrupt(
            "leaf chain is longer than the file".to_string(),
        ))
    }

    /// Whether the tree holds no rows.
    pub fn is_empty(&mut self) -> Result<bool, TreeError> {
        let leaf_page = self.leftmost_leaf()?;
        let page = self.pager.page(leaf_page)?;
        Ok(node::leaf_num_cells(page) == 0 && node::leaf_next_leaf(page) == 0)
    }

    /// Look up the row stored under `key`.
    pub fn get(&mut self, key: Key) -> Result<Option<Row>, TreeError> {
        let (leaf_page, _) = self.descend(key)?;
        let leaf = self.read_leaf(leaf_page)?;
        Ok(leaf.find_index(key).ok().map(|index| leaf.cells[index].row()))
    }

    /// Number of levels from the root to the leaves (1 for a lone root leaf).
    pub fn depth(&mut self) -> Result<usize, TreeError> {
        let mut page_num = self.root_page;
        for depth in 1..=MAX_TREE_DEPTH {
            let page = self.pager.page(page_num)?;
            match node::node_type(page).map_err(|source| TreeError::Node { page_num, source })? {
                NodeType::Leaf => return Ok(depth),
                NodeType::Internal => {
                    let internal = self.read_internal(page_num)?;
                    page_num = self.checked_child(page_num, internal.child(0))?;
                }
            }
        }
        Err(self.too_deep())
    }

    /// Insert a row keyed by its id.
    ///
    /// Fails without touching the tree if the key already exists or if the
    /// pages a split would need can't be allocated.
    pub fn insert(&mut self, row: &Row) -> Result<(), TreeError> {
        let key = row.id();
        let (leaf_page, frames) = self.descend(key)?;
        let leaf = self.read_leaf(leaf_page)?;

        let index = match leaf.find_index(key) {
            Ok(_) => return Err(TreeError::DuplicateKey(key)),
            Err(index) => index,
        };
        let cell = LeafCell::from_row(row);

        if !leaf.is_full() {
            let page = self.pager.page(leaf_page)?;
            return node::leaf_insert_in_place(page, index, key, &cell.value).map_err(|source| {
                TreeError::Node {
                    page_num: leaf_page,
                    source,
                }
            });
        }

        let needed = self.pages_needed_for_split(&frames)?;
        self.pager.ensure_capacity(needed)?;
        self.split_leaf_and_insert(leaf_page, leaf, index, cell, frames)
    }

    /// Render the tree as an indented listing, one node or key per line.
    pub fn render(&mut self) -> Result<String, TreeError> {
        let mut out = String::new();
        let mut visited = 0;
        self.render_node(self.root_page, 0, &mut visited, &mut out)?;
        Ok(out)
    }

    /// Walk from the root to the leaf that holds (or would hold) `key`.
    fn descend(&mut self, key: Key) -> Result<(PageNum, Vec<Frame>), TreeError> {
        let mut frames = Vec::new();
        let mut page_num = self.root_page;

        loop {
            let page = self.pager.page(page_num)?;
            match node::node_type(page).map_err(|source| TreeError::Node { page_num, source })? {
                NodeType::Leaf => return Ok((page_num, frames)),
                NodeType::Internal => {
                    if frames.len() >= MAX_TREE_DEPTH {
                        return Err(self.too_deep());
                    }
                    let internal = self.read_internal(page_num)?;
                    let child_index = internal.find_child_index(key);
                    let child = self.checked_child(page_num, internal.child(child_index))?;
                    frames.push(Frame {
                        page_num,
                        child_index,
                    });
                    page_num = child;
                }
            }
        }
    }

    /// Pages a leaf split along `frames` will allocate: one for the new leaf,
    /// one per full ancestor that splits in turn, and one more if the split
    /// reaches the root.
    fn pages_needed_for_split(&mut self, frames: &[Frame]) -> Result<u32, TreeError> {
        let mut needed = 1;
        for frame in frames.iter().rev() {
            let page = self.pager.page(frame.page_num)?;
            if node::internal_num_keys(page) < self.internal_max_cells {
                return Ok(needed);
            }
            needed += 1;
        }
        Ok(needed + 1)
    }

    fn split_leaf_and_insert(
        &mut self,
        leaf_page: PageNum,
        leaf: LeafNode,
        index: usize,
        cell: LeafCell,
        frames: Vec<Frame>,
    ) -> Result<(), TreeError> {
        let right_page = self.pager.allocate()?;

        let LeafNode {
            header,
            next_leaf,
            mut cells,
        } = leaf;
        cells.insert(index, cell);
        let right_cells = cells.split_off(LEAF_NODE_LEFT_SPLIT_COUNT);

        let left = LeafNode {
            header,
            next_leaf: right_page,
            cells,
        };
        let right = LeafNode {
            header: NodeHeader {
                is_root: false,
                ..header
            },
            next_leaf,
            cells: right_cells,
        };

        let left_max = left
            .max_key()
            .ok_or_else(|| TreeError::Corrupt(format!("leaf {leaf_page} split into an empty half")))?;
        tracing::debug!(
            "split leaf {leaf_page}: {} cells stay, {} move to page {right_page}",
            left.cells.len(),
            right.cells.len()
        );

        self.propagate_split(
            Split {
                left_page: leaf_page,
                left: Node::Leaf(left),
                left_max,
                right_page,
                right: Node::Leaf(right),
            },
            frames,
        )
    }

    /// Hand a split to each ancestor in turn until one absorbs it without
    /// overflowing, or the root itself splits.
    fn propagate_split(&mut self, mut split: Split, mut frames: Vec<Frame>) -> Result<(), TreeError> {
        loop {
            let Some(frame) = frames.pop() else {
                return self.split_root(split);
            };

            split.set_placement(false, frame.page_num);
            self.write_node(split.left_page, &split.left)?;
            self.write_node(split.right_page, &split.right)?;

            let mut parent = self.read_internal(frame.page_num)?;
            parent.insert_split_child(frame.child_index, split.left_max, split.right_page);

            if parent.cells.len() <= self.internal_max_cells {
                parent.write_to_page(self.pager.page(frame.page_num)?);
                return Ok(());
            }

            let (promoted, right) = parent.split();
            let right_page = self.pager.allocate()?;
            tracing::debug!(
                "split internal node {}: promoted key {promoted}, right half on page {right_page}",
                frame.page_num
            );
            for child in right.children() {
                self.set_parent(child, right_page)?;
            }

            split = Split {
                left_page: frame.page_num,
                left: Node::Internal(parent),
                left_max: promoted,
                right_page,
                right: Node::Internal(right),
            };
        }
    }

    /// Move the split root's lower half to a fresh page and rewrite the root
    /// page as an internal node over both halves.
    fn split_root(&mut self, mut split: Split) -> Result<(), TreeError> {
        if split.left_page != self.root_page {
            return Err(TreeError::Corrupt(format!(
                "page {} split with no parent but is not the root",
                split.left_page
            )));
        }

        let new_left_page = self.pager.allocate()?;
        split.set_placement(false, self.root_page);
        self.write_node(new_left_page, &split.left)?;
        self.write_node(split.right_page, &split.right)?;

        if let Node::Internal(left) = &split.left {
            for child in left.children() {
                self.set_parent(child, new_left_page)?;
            }
        }

        let root = InternalNode::with_children(
            true,
            0,
            new_left_page,
            split.left_max,
            split.right_page,
        );
        root.write_to_page(self.pager.page(self.root_page)?);

        tracing::debug!(
            "root split: children {new_left_page} and {} under page {}",
            split.right_page,
            self.root_page
        );
        Ok(())
    }

    fn render_node(
        &mut self,
        page_num: PageNum,
        level: usize,
        visited: &mut u32,
        out: &mut String,
    ) -> Result<(), TreeError> {
        *visited += 1;
        if level >= MAX_TREE_DEPTH || *visited > self.pager.num_pages() {
            return Err(self.too_deep());
        }

        let page = self.pager.page(page_num)?;
        match node::node_type(page).map_err(|source| TreeError::Node { page_num, source })? {
            NodeType::Leaf => {
                let leaf = self.read_leaf(page_num)?;
                out.push_str(&format!("{}- leaf (size {})\n", indent(level), leaf.cells.len()));
                for cell in &leaf.cells {
                    out.push_str(&format!("{}- {}\n", indent(level + 1), cell.key));
                }
            }
            NodeType::Internal => {
                let internal = self.read_internal(page_num)?;
                out.push_str(&format!(
                    "{}- internal (size {})\n",
                    indent(level),
                    internal.cells.len()
                ));
                for cell in &internal.cells {
                    let child = self.checked_child(page_num, cell.child)?;
                    self.render_node(child, level + 1, visited, out)?;
                    out.push_str(&format!("{}- key {}\n", indent(level + 1), cell.key));
                }
                let right_child = self.checked_child(page_num, internal.right_child)?;
                self.render_node(right_child, level + 1, visited, out)?;
            }
        }
        Ok(())
    }

    fn write_node(&mut self, page_num: PageNum, node: &Node) -> Result<(), TreeError> {
        let page = self.pager.page(page_num)?;
        match node {
            Node::Leaf(leaf) => leaf.write_to_page(page),
            Node::Internal(internal) => internal.write_to_page(page),
        }
        Ok(())
    }

    fn set_parent(&mut self, page_num: PageNum, parent: PageNum) -> Result<(), TreeError> {
        node::set_parent(self.pager.page(page_num)?, parent);
        Ok(())
    }

    pub(crate) fn read_leaf(&mut self, page_num: PageNum) -> Result<LeafNode, TreeError> {
        LeafNode::from_page(self.pager.page(page_num)?)
            .map_err(|source| TreeError::Node { page_num, source })
    }

    pub(crate) fn read_internal(&mut self, page_num: PageNum) -> Result<InternalNode, TreeError> {
        InternalNode::from_page(self.pager.page(page_num)?)
            .map_err(|source| TreeError::Node { page_num, source })
    }

    pub(crate) fn read_header(&mut self, page_num: PageNum) -> Result<NodeHeader, TreeError> {
        NodeHeader::from_page(self.pager.page(page_num)?)
            .map_err(|source| TreeError::Node { page_num, source })
    }

    /// Reject child pointers that can't name a node below `parent`.
    pub(crate) fn checked_child(
        &self,
        parent: PageNum,
        child: PageNum,
    ) -> Result<PageNum, TreeError> {
        if child == self.root_page || child >= self.pager.num_pages() {
            return Err(TreeError::Corrupt(format!(
                "internal node {parent} points at invalid child page {child}"
            )));
        }
        Ok(child)
    }

    /// Validate a non-zero `next_leaf` pointer before following it.
    pub(crate) fn checked_next_leaf(
        &self,
        leaf: PageNum,
        next: PageNum,
    ) -> Result<PageNum, TreeError> {
        if next == self.root_page {
            return Err(TreeError::Corrupt(format!(
                "leaf {leaf} points back at the root page {next}"
            )));
        }
        cursor::checked_next_leaf(self.pager, leaf, next)
    }

    fn too_deep(&self) -> TreeError {
        TreeError::Corrupt(format!(
            "tree under page {} is deeper than {MAX_TREE_DEPTH} levels",
            self.root_page
        ))
    }
}

fn indent(level: usize) -> String {
    "  ".repeat(level)
}

/// Errors that can occur during tree operations.
#[derive(Debug)]
pub enum TreeError {
    /// Page I/O or allocation failed.
    Pager(PagerError),
    /// A page did not decode as the node it should hold.
    Node { page_num: PageNum, source: NodeError },
    /// The key is already present. The tree is unchanged.
    DuplicateKey(Key),
    /// A structural invariant does not hold.
    Corrupt(String),
}

impl std::fmt::Display for TreeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pager(e) => write!(f, "{e}"),
            Self::Node { page_num, source } => write!(f, "page {page_num}: {source}"),
            Self::DuplicateKey(key) => write!(f, "duplicate key: {key}"),
            Self::Corrupt(msg) => write!(f, "tree corrupted: {msg}"),
        }
    }
}

impl std::error::Error for TreeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Pager(e) => Some(e),
            Self::Node { source, .. } => Some(source),
            Self::DuplicateKey(_) | Self::Corrupt(_) => None,
        }
    }
}

impl From<PagerError> for TreeError {
    fn from(e: PagerError) -> Self {
        Self::Pager(e)
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use rand::seq::SliceRandom;
    use tempfile::TempDir;

    use super::*;
    use crate::storage::btree::layout::{LEAF_NODE_MAX_CELLS, LEAF_NODE_RIGHT_SPLIT_COUNT};
    use crate::storage::pager::PagerLimits;

    fn row(id: u32) -> Row {
        Row::new(id, format!("user{id}"), format!("user{id}@example.com")).expect("valid row")
    }

    fn open(dir: &TempDir, limits: PagerLimits) -> Pager {
        Pager::open(&dir.path().join("test.db"), limits).expect("should open")
    }

    fn scan_ids(tree: &mut BTree<'_>) -> Vec<u32> {
        tree.start()
            .expect("start")
            .map(|row| row.expect("scan").id())
            .collect()
    }

    #[test]
    fn test_empty_tree() {
        let dir = TempDir::new().expect("create temp dir");
        let mut pager = open(&dir, PagerLimits::default());
        let mut tree = BTree::new(&mut pager, 0, INTERNAL_NODE_MAX_CELLS);
        tree.ensure_root().expect("init root");

        let cursor = tree.start().expect("start");
        assert!(cursor.is_end());
        assert!(scan_ids(&mut tree).is_empty());
        assert_eq!(tree.depth().expect("depth"), 1);
        assert_eq!(tree.get(1).expect("get"), None);
        assert_eq!(tree.len().expect("len"), 0);
        assert!(tree.is_empty().expect("is_empty"));
    }

    #[test]
    fn test_insert_within_one_leaf() {
        let dir = TempDir::new().expect("create temp dir");
        let mut pager = open(&dir, PagerLimits::default());
        let mut tree = BTree::new(&mut pager, 0, INTERNAL_NODE_MAX_CELLS);
        tree.ensure_root().expect("init root");

        for id in [3, 1, 2] {
            tree.insert(&row(id)).expect("insert");
        }

        assert_eq!(scan_ids(&mut tree), vec![1, 2, 3]);
        assert_eq!(tree.get(2).expect("get"), Some(row(2)));
        assert_eq!(tree.depth().expect("depth"), 1);
    }

    #[test]
    fn test_leaf_split_creates_root() {
        let dir = TempDir::new().expect("create temp dir");
        let mut pager = open(&dir, PagerLimits::default());
        let mut tree = BTree::new(&mut pager, 0, INTERNAL_NODE_MAX_CELLS);
        tree.ensure_root().expect("init root");

        let count = u32::try_from(LEAF_NODE_MAX_CELLS).expect("fits in u32") + 1;
        for id in 1..=count {
            tree.insert(&row(id)).expect("insert");
        }

        // Right half goes to page 1, the old root's content moves to page 2.
        let root = tree.read_internal(0).expect("root is internal");
        assert!(root.header.is_root);
        assert_eq!(root.cells, vec![node::InternalCell { child: 2, key: 7 }]);
        assert_eq!(root.right_child, 1);

        let left = tree.read_leaf(2).expect("left leaf");
        assert_eq!(left.cells.len(), LEAF_NODE_LEFT_SPLIT_COUNT);
        assert_eq!(left.max_key(), Some(7));
        assert_eq!(left.next_leaf, 1);
        assert_eq!(left.header.parent, 0);
        assert!(!left.header.is_root);

        let right = tree.read_leaf(1).expect("right leaf");
        assert_eq!(right.cells.len(), LEAF_NODE_RIGHT_SPLIT_COUNT);
        assert_eq!(right.next_leaf, 0);
        assert_eq!(right.header.parent, 0);

        assert_eq!(scan_ids(&mut tree), (1..=count).collect::<Vec<_>>());
        assert_eq!(tree.depth().expect("depth"), 2);
    }

    #[test]
    fn test_duplicate_key_leaves_tree_unchanged() {
        let dir = TempDir::new().expect("create temp dir");
        let mut pager = open(&dir, PagerLimits::default());
        let mut tree = BTree::new(&mut pager, 0, INTERNAL_NODE_MAX_CELLS);
        tree.ensure_root().expect("init root");

        for id in 1..=20 {
            tree.insert(&row(id)).expect("insert");
        }
        let before = scan_ids(&mut tree);

        let dup = Row::new(5, "other", "other@example.com").expect("valid row");
        let result = tree.insert(&dup);
        assert!(matches!(result, Err(TreeError::DuplicateKey(5))));

        assert_eq!(scan_ids(&mut tree), before);
        assert_eq!(tree.get(5).expect("get"), Some(row(5)));
    }

    #[test]
    fn test_shuffled_inserts_scan_in_order() {
        let dir = TempDir::new().expect("create temp dir");
        let mut pager = open(&dir, PagerLimits::default());
        let mut tree = BTree::new(&mut pager, 0, INTERNAL_NODE_MAX_CELLS);
        tree.ensure_root().expect("init root");

        let mut ids: Vec<u32> = (0..500).map(|i| i * 3 + 1).collect();
        let mut rng = StdRng::seed_from_u64(7);
        ids.shuffle(&mut rng);

        for &id in &ids {
            tree.insert(&row(id)).expect("insert");
        }

        ids.sort_unstable();
        assert_eq!(scan_ids(&mut tree), ids);
        let stats = tree.verify().expect("valid tree");
        assert_eq!(stats.row_count, 500);
        assert_eq!(tree.len().expect("len"), 500);
        assert!(!tree.is_empty().expect("is_empty"));
    }

    #[test]
    fn test_internal_splits_grow_depth() {
        let dir = TempDir::new().expect("create temp dir");
        let mut pager = open(&dir, PagerLimits::default());
        let mut tree = BTree::new(&mut pager, 0, 3);
        tree.ensure_root().expect("init root");

        for id in 1..=1000 {
            tree.insert(&row(id)).expect("insert");
        }

        let stats = tree.verify().expect("valid tree");
        assert!(stats.depth >= 4, "depth {}", stats.depth);
        assert_eq!(stats.row_count, 1000);
        assert_eq!(tree.depth().expect("depth"), stats.depth);
        assert_eq!(scan_ids(&mut tree), (1..=1000).collect::<Vec<_>>());
    }

    #[test]
    fn test_internal_splits_with_random_order() {
        let dir = TempDir::new().expect("create temp dir");
        let mut pager = open(&dir, PagerLimits::default());
        let mut tree = BTree::new(&mut pager, 0, 2);
        tree.ensure_root().expect("init root");

        let mut ids: Vec<u32> = (1..=800).collect();
        let mut rng = StdRng::seed_from_u64(1234);
        ids.shuffle(&mut rng);

        for (n, &id) in ids.iter().enumerate() {
            tree.insert(&row(id)).expect("insert");
            if n % 100 == 0 {
                tree.verify().expect("valid after each batch");
            }
        }

        let stats = tree.verify().expect("valid tree");
        assert!(stats.depth >= 4, "depth {}", stats.depth);
        assert_eq!(scan_ids(&mut tree), (1..=800).collect::<Vec<_>>());
        for id in [1, 400, 800] {
            assert_eq!(tree.get(id).expect("get"), Some(row(id)));
        }
        assert_eq!(tree.get(801).expect("get"), None);
    }

    #[test]
    fn test_find_positions() {
        let dir = TempDir::new().expect("create temp dir");
        let mut pager = open(&dir, PagerLimits::default());
        let mut tree = BTree::new(&mut pager, 0, INTERNAL_NODE_MAX_CELLS);
        tree.ensure_root().expect("init root");

        for id in (2..=40).step_by(2) {
            tree.insert(&row(id)).expect("insert");
        }

        let mut cursor = tree.find(10).expect("find");
        assert_eq!(cursor.value().expect("value"), Some(row(10)));

        // Missing key: cursor rests on the next larger key.
        let mut cursor = tree.find(15).expect("find");
        assert_eq!(cursor.value().expect("value"), Some(row(16)));
        cursor.advance().expect("advance");
        assert_eq!(cursor.value().expect("value"), Some(row(18)));

        // Past the largest key.
        let mut cursor = tree.find(41).expect("find");
        assert_eq!(cursor.value().expect("value"), None);
        assert!(cursor.is_end());
    }

    #[test]
    fn test_capacity_checked_before_split() {
        let dir = TempDir::new().expect("create temp dir");
        let limits = PagerLimits {
            cache_capacity: None,
            max_pages: Some(2),
        };
        let mut pager = open(&dir, limits);
        let mut tree = BTree::new(&mut pager, 0, INTERNAL_NODE_MAX_CELLS);
        tree.ensure_root().expect("init root");

        for id in 1..=u32::try_from(LEAF_NODE_MAX_CELLS).expect("fits in u32") {
            tree.insert(&row(id)).expect("insert");
        }

        // A root split needs two more pages; only one is available.
        let result = tree.insert(&row(100));
        assert!(matches!(
            result,
            Err(TreeError::Pager(PagerError::Capacity { max_pages: 2 }))
        ));
        assert_eq!(tree.depth().expect("depth"), 1);
        assert_eq!(scan_ids(&mut tree).len(), LEAF_NODE_MAX_CELLS);
        assert_eq!(pager.num_pages(), 1);
    }

    #[test]
    fn test_render() {
        let dir = TempDir::new().expect("create temp dir");
        let mut pager = open(&dir, PagerLimits::default());
        let mut tree = BTree::new(&mut pager, 0, INTERNAL_NODE_MAX_CELLS);
        tree.ensure_root().expect("init root");

        for id in [3, 1, 2] {
            tree.insert(&row(id)).expect("insert");
        }
        assert_eq!(
            tree.render().expect("render"),
            "- leaf (size 3)\n  - 1\n  - 2\n  - 3\n"
        );

        for id in 4..=14 {
            tree.insert(&row(id)).expect("insert");
        }
        let mut expected = String::from("- internal (size 1)\n  - leaf (size 7)\n");
        for id in 1..=7 {
            expected.push_str(&format!("    - {id}\n"));
        }
        expected.push_str("  - key 7\n  - leaf (size 7)\n");
        for id in 8..=14 {
            expected.push_str(&format!("    - {id}\n"));
        }
        assert_eq!(tree.render().expect("render"), expected);
    }

    #[test]
    fn test_child_cycle_is_reported() {
        let dir = TempDir::new().expect("create temp dir");
        let mut pager = open(&dir, PagerLimits::default());
        pager.allocate().expect("allocate");
        InternalNode::with_children(true, 0, 0, 5, 0).write_to_page(pager.page(0).expect("fetch"));

        let mut tree = BTree::new(&mut pager, 0, INTERNAL_NODE_MAX_CELLS);
        tree.ensure_root().expect("root page decodes");
        assert!(matches!(tree.get(1), Err(TreeError::Corrupt(_))));
        assert!(matches!(tree.insert(&row(1)), Err(TreeError::Corrupt(_))));
    }

    #[test]
    fn test_reopen_existing_tree() {
        let dir = TempDir::new().expect("create temp dir");
        {
            let mut pager = open(&dir, PagerLimits::default());
            let mut tree = BTree::new(&mut pager, 0, INTERNAL_NODE_MAX_CELLS);
            tree.ensure_root().expect("init root");
            for id in 1..=30 {
                tree.insert(&row(id)).expect("insert");
            }
            pager.close().expect("close");
        }

        let mut pager = open(&dir, PagerLimits::default());
        let mut tree = BTree::new(&mut pager, 0, INTERNAL_NODE_MAX_CELLS);
        tree.ensure_root().expect("existing root");
        assert_eq!(scan_ids(&mut tree), (1..=30).collect::<Vec<_>>());
        tree.verify().expect("valid tree");
    }
}
