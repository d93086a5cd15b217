//! The table handle: one file, one B+tree, rows keyed by id.
//!
//! # Lifecycle
//!
//! `open` creates the file if needed and writes an empty root leaf into a
//! new file. Mutations stay in the page cache (or reach disk on eviction)
//! until `close` flushes every resident page and syncs the file. There is no
//! write-ahead log, so a crash before `close` can leave a partial tree.

use std::path::Path;

use crate::config::EngineConfig;
use crate::storage::btree::{BTree, Cursor, Key, NodeError, TreeError, TreeStats};
use crate::storage::page::PageNum;
use crate::storage::pager::{Pager, PagerError};
use crate::storage::row::{Row, RowError};

/// Page number of the tree root.
pub const ROOT_PAGE_NUM: PageNum = 0;

/// An open table.
#[derive(Debug)]
pub struct Table {
    pager: Pager,
    config: EngineConfig,
}

impl Table {
    /// Open or create the table file at `path`.
    pub fn open(path: &Path, config: EngineConfig) -> Result<Self, TableError> {
        let pager = Pager::open(path, config.pager_limits())?;
        let mut table = Self { pager, config };
        table.tree().ensure_root()?;

        tracing::info!(
            "opened table {} ({} pages)",
            path.display(),
            table.pager.num_pages()
        );
        Ok(table)
    }

    fn tree(&mut self) -> BTree<'_> {
        BTree::new(
            &mut self.pager,
            ROOT_PAGE_NUM,
            self.config.internal_node_max_cells,
        )
    }

    /// Insert a row. Fails with `DuplicateKey` if its id is already present.
    pub fn insert(&mut self, row: &Row) -> Result<(), TableError> {
        self.tree().insert(row)?;
        tracing::trace!("inserted row {}", row.id());
        Ok(())
    }

    /// Validate the fields and insert the resulting row.
    pub fn insert_fields(&mut self, id: u32, username: &str, email: &str) -> Result<(), TableError> {
        let row = Row::new(id, username, email)?;
        self.insert(&row)
    }

    /// Look up a row by id.
    pub fn get(&mut self, id: Key) -> Result<Option<Row>, TableError> {
        Ok(self.tree().get(id)?)
    }

    /// Cursor at the first row. Each call starts a fresh scan.
    pub fn start(&mut self) -> Result<Cursor<'_>, TableError> {
        let leaf_page = self.tree().leftmost_leaf()?;
        Ok(Cursor::new(&mut self.pager, leaf_page, 0)?)
    }

    /// Cursor at `id`, or at the first row with a larger id.
    pub fn find(&mut self, id: Key) -> Result<Cursor<'_>, TableError> {
        let (leaf_page, cell_num) = self.tree().find_slot(id)?;
        Ok(Cursor::new(&mut self.pager, leaf_page, cell_num)?)
    }

    /// Every row in ascending id order.
    pub fn scan(&mut self) -> Result<Vec<Row>, TableError> {
        let mut rows = Vec::new();
        for row in self.start()? {
            rows.push(row?);
        }
        Ok(rows)
    }

    /// Number of rows.
    pub fn len(&mut self) -> Result<usize, TableError> {
        Ok(self.tree().len()?)
    }

    pub fn is_empty(&mut self) -> Result<bool, TableError> {
        Ok(self.tree().is_empty()?)
    }

    /// Levels from the root to the leaves.
    pub fn depth(&mut self) -> Result<usize, TableError> {
        Ok(self.tree().depth()?)
    }

    /// Check the tree's structural invariants.
    pub fn verify(&mut self) -> Result<TreeStats, TableError> {
        Ok(self.tree().verify()?)
    }

    /// Indented listing of the tree's nodes and keys.
    pub fn render(&mut self) -> Result<String, TableError> {
        Ok(self.tree().render()?)
    }

    /// Pages allocated so far.
    #[must_use]
    pub const fn num_pages(&self) -> u32 {
        self.pager.num_pages()
    }

    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Flush every page and release the file.
    pub fn close(self) -> Result<(), TableError> {
        let num_pages = self.pager.num_pages();
        self.pager.close()?;
        tracing::info!("closed table ({num_pages} pages)");
        Ok(())
    }
}

/// Errors surfaced by table operations.
#[derive(Debug)]
pub enum TableError {
    /// Disk I/O failed. The tree may be partially updated.
    Io(std::io::Error),
    /// The id is already present. Nothing was written.
    DuplicateKey(Key),
    /// The configured page ceiling would be exceeded. Nothing was written.
    Capacity { max_pages: u32 },
    /// The row's fields don't fit the schema. Nothing was written.
    MalformedInput(RowError),
    /// The file violates a tree invariant.
    Corrupt(String),
}

impl TableError {
    /// Whether the table should not be used further after this error.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Io(_) | Self::Corrupt(_))
    }
}

impl std::fmt::Display for TableError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::DuplicateKey(id) => write!(f, "duplicate key: {id}"),
            Self::Capacity { max_pages } => write!(f, "table full (max pages: {max_pages})"),
            Self::MalformedInput(e) => write!(f, "malformed row: {e}"),
            Self::Corrupt(msg) => write!(f, "table corrupted: {msg}"),
        }
    }
}

impl std::error::Error for TableError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::MalformedInput(e) => Some(e),
            Self::DuplicateKey(_) | Self::Capacity { .. } | Self::Corrupt(_) => None,
        }
    }
}

impl From<PagerError> for TableError {
    fn from(e: PagerError) -> Self {
        match e {
            PagerError::Io(e) => Self::Io(e),
            PagerError::Capacity { max_pages } => Self::Capacity { max_pages },
        }
    }
}

impl From<NodeError> for TableError {
    fn from(e: NodeError) -> Self {
        Self::Corrupt(e.to_string())
    }
}

impl From<TreeError> for TableError {
    fn from(e: TreeError) -> Self {
        match e {
            TreeError::Pager(e) => e.into(),
            TreeError::Node { page_num, source } => Self::Corrupt(format!("page {page_num}: {source}")),
            TreeError::DuplicateKey(key) => Self::DuplicateKey(key),
            TreeError::Corrupt(msg) => Self::Corrupt(msg),
        }
    }
}

impl From<RowError> for TableError {
    fn from(e: RowError) -> Self {
        Self::MalformedInput(e)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write as _;

    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use rand::seq::SliceRandom;
    use tempfile::TempDir;

    use super::*;
    use crate::storage::btree::layout::LEAF_NODE_MAX_CELLS;
    use crate::storage::page::{PAGE_SIZE, PAGE_SIZE_U64};

    fn row(id: u32) -> Row {
        Row::new(id, format!("user{id}"), format!("person{id}@example.com")).expect("valid row")
    }

    /// Insert `ids`, close, reopen, and check the scan is unchanged.
    fn assert_survives_reopen(ids: &[u32], config: EngineConfig) {
        let dir = TempDir::new().expect("create temp dir");
        let path = dir.path().join("table.db");

        let mut table = Table::open(&path, config).expect("open");
        for &id in ids {
            table.insert(&row(id)).expect("insert");
        }
        let before = table.scan().expect("scan");
        table.close().expect("close");

        let mut sorted = ids.to_vec();
        sorted.sort_unstable();
        assert_eq!(before.iter().map(Row::id).collect::<Vec<_>>(), sorted);

        let mut table = Table::open(&path, config).expect("reopen");
        assert_eq!(table.scan().expect("scan"), before);
        table.verify().expect("valid tree");
        table.close().expect("close");
    }

    #[test]
    fn test_scan_empty_table() {
        let dir = TempDir::new().expect("create temp dir");
        let mut table = Table::open(&dir.path().join("t.db"), EngineConfig::default())
            .expect("open");

        assert_eq!(table.scan().expect("scan"), Vec::<Row>::new());
        assert!(table.is_empty().expect("is_empty"));
        assert_eq!(table.num_pages(), 1);
    }

    #[test]
    fn test_new_file_has_root_leaf() {
        let dir = TempDir::new().expect("create temp dir");
        let path = dir.path().join("t.db");
        Table::open(&path, EngineConfig::default())
            .expect("open")
            .close()
            .expect("close");

        let bytes = std::fs::read(&path).expect("read file");
        assert_eq!(bytes.len(), PAGE_SIZE);
        assert_eq!(bytes[0], 1); // leaf
        assert_eq!(bytes[1], 1); // root
        assert!(bytes[2..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_round_trip_sizes() {
        let one_leaf = u32::try_from(LEAF_NODE_MAX_CELLS).expect("fits in u32");
        let multi_level = EngineConfig {
            internal_node_max_cells: 3,
            ..EngineConfig::default()
        };

        assert_survives_reopen(&[], EngineConfig::default());
        assert_survives_reopen(&[42], EngineConfig::default());
        assert_survives_reopen(&(1..=one_leaf).collect::<Vec<_>>(), EngineConfig::default());
        assert_survives_reopen(&(1..=200).rev().collect::<Vec<_>>(), EngineConfig::default());
        assert_survives_reopen(&(1..=600).collect::<Vec<_>>(), multi_level);
    }

    #[test]
    fn test_duplicate_key_is_recoverable() {
        let dir = TempDir::new().expect("create temp dir");
        let mut table = Table::open(&dir.path().join("t.db"), EngineConfig::default())
            .expect("open");

        table.insert(&row(1)).expect("insert");
        let err = table.insert(&row(1)).expect_err("duplicate");
        assert!(matches!(err, TableError::DuplicateKey(1)));
        assert!(!err.is_fatal());
        assert_eq!(table.len().expect("len"), 1);
    }

    #[test]
    fn test_malformed_input_rejected_before_write() {
        let dir = TempDir::new().expect("create temp dir");
        let mut table = Table::open(&dir.path().join("t.db"), EngineConfig::default())
            .expect("open");

        let err = table
            .insert_fields(1, &"a".repeat(33), "a@example.com")
            .expect_err("username too long");
        assert!(matches!(err, TableError::MalformedInput(RowError::UsernameTooLong(33))));
        assert!(!err.is_fatal());
        assert!(table.is_empty().expect("is_empty"));

        table
            .insert_fields(1, &"a".repeat(32), &"b".repeat(255))
            .expect("fields at the limit");
        assert_eq!(table.get(1).expect("get").map(|r| r.username().len()), Some(32));
    }

    #[test]
    fn test_capacity_error() {
        let dir = TempDir::new().expect("create temp dir");
        let config = EngineConfig {
            max_pages: Some(3),
            ..EngineConfig::default()
        };
        let mut table = Table::open(&dir.path().join("t.db"), config).expect("open");

        // Root split takes the file from 1 to 3 pages.
        for id in 1..=14 {
            table.insert(&row(id)).expect("insert");
        }
        // Filling the right leaf (7 rows) to 13 still fits.
        for id in 15..=20 {
            table.insert(&row(id)).expect("insert");
        }

        let err = table.insert(&row(21)).expect_err("needs a fourth page");
        assert!(matches!(err, TableError::Capacity { max_pages: 3 }));
        assert!(!err.is_fatal());
        assert_eq!(table.len().expect("len"), 20);
        assert_eq!(table.num_pages(), 3);
        table.verify().expect("valid tree");
    }

    #[test]
    fn test_bounded_cache() {
        let config = EngineConfig {
            cache_capacity: Some(2),
            internal_node_max_cells: 4,
            ..EngineConfig::default()
        };
        let mut ids: Vec<u32> = (1..=400).collect();
        ids.shuffle(&mut StdRng::seed_from_u64(99));

        assert_survives_reopen(&ids, config);
    }

    #[test]
    fn test_find_and_get() {
        let dir = TempDir::new().expect("create temp dir");
        let mut table = Table::open(&dir.path().join("t.db"), EngineConfig::default())
            .expect("open");
        for id in (10..=300).step_by(10) {
            table.insert(&row(id)).expect("insert");
        }

        assert_eq!(table.get(150).expect("get"), Some(row(150)));
        assert_eq!(table.get(155).expect("get"), None);

        let tail: Vec<u32> = table
            .find(275)
            .expect("find")
            .map(|row| row.expect("row").id())
            .collect();
        assert_eq!(tail, vec![280, 290, 300]);
    }

    #[test]
    fn test_corrupt_root_is_fatal() {
        let dir = TempDir::new().expect("create temp dir");
        let path = dir.path().join("t.db");
        let mut file = std::fs::File::create(&path).expect("create file");
        let mut page = vec![0u8; PAGE_SIZE];
        page[0] = 9;
        file.write_all(&page).expect("write");
        drop(file);

        let err = Table::open(&path, EngineConfig::default()).expect_err("bad node type");
        assert!(err.is_fatal());
        assert!(err.to_string().contains("invalid node type"), "{err}");
    }

    /// Write a one-row table, close it, then overwrite a u32 in the root page.
    fn one_row_table_with_root_field(
        dir: &TempDir,
        offset: usize,
        value: u32,
    ) -> std::path::PathBuf {
        let path = dir.path().join("t.db");
        let mut table = Table::open(&path, EngineConfig::default()).expect("open");
        table.insert(&row(1)).expect("insert");
        table.close().expect("close");

        let mut bytes = std::fs::read(&path).expect("read file");
        bytes[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
        std::fs::write(&path, &bytes).expect("write file");
        path
    }

    #[test]
    fn test_oversized_leaf_cell_count_is_fatal() {
        let dir = TempDir::new().expect("create temp dir");
        // Leaf cell count lives at offset 6.
        let path = one_row_table_with_root_field(&dir, 6, 20);

        let mut table = Table::open(&path, EngineConfig::default()).expect("header still decodes");
        let err = table.scan().expect_err("cell count past page end");
        assert!(err.is_fatal());
        assert!(err.to_string().contains("cell count 20"), "{err}");
        assert!(table.len().is_err());
        assert!(table.verify().is_err());
    }

    #[test]
    fn test_out_of_range_next_leaf_is_fatal_and_not_followed() {
        let dir = TempDir::new().expect("create temp dir");
        // Leaf next pointer lives at offset 10.
        let path = one_row_table_with_root_field(&dir, 10, 100_000);

        let mut table = Table::open(&path, EngineConfig::default()).expect("header still decodes");
        let err = table.scan().expect_err("next leaf past end of file");
        assert!(matches!(err, TableError::Corrupt(_)), "{err}");
        assert!(err.to_string().contains("invalid next leaf 100000"), "{err}");
        assert!(table.len().is_err());
        assert!(table.verify().is_err());
        assert_eq!(table.num_pages(), 1);
        table.close().expect("close");

        let file_len = std::fs::metadata(&path).expect("metadata").len();
        assert_eq!(file_len, PAGE_SIZE_U64);
    }

    #[test]
    fn test_scan_iterator_ends_after_error() {
        let dir = TempDir::new().expect("create temp dir");
        let path = one_row_table_with_root_field(&dir, 10, 100_000);

        let mut table = Table::open(&path, EngineConfig::default()).expect("open");
        let results: Vec<_> = table.start().expect("first row is readable").collect();
        assert_eq!(results.len(), 1);
        assert!(results[0].is_err());

        let ok_rows = table.start().expect("start").filter_map(Result::ok).count();
        assert_eq!(ok_rows, 0);
    }
}
