//! Single-table row storage engine.
//!
//! A table is one file of 4KB pages holding a B+tree keyed by row id.
//!
//! # File Format
//!
//! - Page 0: the tree root (a leaf until the first split, internal after)
//! - Pages 1-N: leaf and internal nodes, in allocation order
//!
//! There is no superblock. The page count is the file length divided by the
//! page size, and every page's header says what kind of node it holds.
//!
//! # Usage
//!
//! ```no_run
//! use rowstore::config::EngineConfig;
//! use rowstore::storage::{Row, Table};
//!
//! let mut table = Table::open("rows.db".as_ref(), EngineConfig::default())?;
//! table.insert(&Row::new(1, "alice", "alice@example.com")?)?;
//! for row in table.scan()? {
//!     println!("{row}");
//! }
//! table.close()?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod btree;
pub mod eviction;
pub mod page;
pub mod pager;
pub mod row;
pub mod table;

pub use btree::{BTree, Cursor, TreeError, TreeStats};
pub use page::{PAGE_SIZE, Page, PageNum};
pub use pager::{Pager, PagerError, PagerLimits};
pub use row::{Row, RowError};
pub use table::{ROOT_PAGE_NUM, Table, TableError};
