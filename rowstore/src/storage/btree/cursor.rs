//! Cursor over the rows of a tree in ascending key order.

use crate::storage::btree::layout::LEAF_NODE_MAX_CELLS;
use crate::storage::btree::node::{self, NodeError, NodeType, leaf_next_leaf, leaf_num_cells};
use crate::storage::btree::tree::TreeError;
use crate::storage::page::PageNum;
use crate::storage::pager::Pager;
use crate::storage::row::Row;

/// A position in key order: a leaf page and a cell within it.
///
/// A cursor may sit one past the last cell of a leaf (an insertion point);
/// reading or advancing from there continues with the next leaf.
#[derive(Debug)]
pub struct Cursor<'a> {
    pager: &'a mut Pager,
    page_num: PageNum,
    cell_num: usize,
    end_of_table: bool,
    /// Leaf-to-leaf hops taken, bounded by the page count to catch cycles.
    hops: u32,
}

impl<'a> Cursor<'a> {
    /// Position a cursor at `cell_num` of leaf `page_num`.
    ///
    /// A position one past the last cell of a leaf moves on to the next
    /// leaf, or to the end of the table if there is none.
    pub(crate) fn new(
        pager: &'a mut Pager,
        page_num: PageNum,
        cell_num: usize,
    ) -> Result<Self, TreeError> {
        let mut cursor = Self {
            pager,
            page_num,
            cell_num,
            end_of_table: false,
            hops: 0,
        };
        cursor.skip_exhausted_leaves()?;
        Ok(cursor)
    }

    /// Leaf page the cursor points into.
    #[must_use]
    pub const fn page_num(&self) -> PageNum {
        self.page_num
    }

    /// Cell index within the leaf.
    #[must_use]
    pub const fn cell_num(&self) -> usize {
        self.cell_num
    }

    /// Whether the cursor has moved past the last row.
    #[must_use]
    pub const fn is_end(&self) -> bool {
        self.end_of_table
    }

    /// Row at the cursor, or `None` at the end of the table.
    pub fn value(&mut self) -> Result<Option<Row>, TreeError> {
        self.skip_exhausted_leaves()?;
        if self.end_of_table {
            return Ok(None);
        }
        let page = self.pager.page(self.page_num)?;
        Ok(Some(node::leaf_row(page, self.cell_num)))
    }

    /// Move to the next row, following the leaf chain across pages.
    pub fn advance(&mut self) -> Result<(), TreeError> {
        if self.end_of_table {
            return Ok(());
        }
        self.cell_num += 1;
        self.skip_exhausted_leaves()
    }

    /// Return the row at the cursor and advance past it.
    pub fn next_row(&mut self) -> Result<Option<Row>, TreeError> {
        let row = self.value()?;
        if row.is_some() {
            self.advance()?;
        }
        Ok(row)
    }

    /// Move forward until the cursor rests on a cell or runs off the last leaf.
    fn skip_exhausted_leaves(&mut self) -> Result<(), TreeError> {
        while !self.end_of_table {
            let page_num = self.page_num;
            let page = self.pager.page(page_num)?;

            let kind = node::node_type(page).map_err(|source| TreeError::Node { page_num, source })?;
            if kind != NodeType::Leaf {
                return Err(TreeError::Node {
                    page_num,
                    source: NodeError::WrongNodeType {
                        expected: NodeType::Leaf,
                        found: kind,
                    },
                });
            }

            if self.cell_num < checked_num_cells(page_num, leaf_num_cells(page))? {
                return Ok(());
            }

            let next = leaf_next_leaf(page);
            if next == 0 {
                self.end_of_table = true;
                return Ok(());
            }
            let next = checked_next_leaf(self.pager, page_num, next)?;

            self.hops += 1;
            if self.hops > self.pager.num_pages() {
                return Err(TreeError::Corrupt(format!(
                    "leaf chain starting before page {page_num} does not terminate"
                )));
            }
            self.page_num = next;
            self.cell_num = 0;
        }
        Ok(())
    }
}

impl Iterator for Cursor<'_> {
    type Item = Result<Row, TreeError>;

    fn next(&mut self) -> Option<Self::Item> {
        let row = self.next_row();
        if row.is_err() {
            // An error ends the scan.
            self.end_of_table = true;
        }
        row.transpose()
    }
}

/// Reject a leaf cell count that cannot fit in a page.
pub(crate) const fn checked_num_cells(
    page_num: PageNum,
    count: usize,
) -> Result<usize, TreeError> {
    if count > LEAF_NODE_MAX_CELLS {
        return Err(TreeError::Node {
            page_num,
            source: NodeError::CellCountOutOfRange {
                count,
                max: LEAF_NODE_MAX_CELLS,
            },
        });
    }
    Ok(count)
}

/// Reject a `next_leaf` pointer that does not name an existing non-root page.
///
/// Zero is the end-of-chain marker and must be handled by the caller.
pub(crate) fn checked_next_leaf(
    pager: &Pager,
    leaf: PageNum,
    next: PageNum,
) -> Result<PageNum, TreeError> {
    if next == 0 || next >= pager.num_pages() {
        return Err(TreeError::Corrupt(format!(
            "leaf {leaf} points at invalid next leaf {next}"
        )));
    }
    Ok(next)
}
