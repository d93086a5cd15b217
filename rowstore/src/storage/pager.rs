//! Page-level file I/O with an in-memory page cache.
//!
//! The pager owns the table file and a resizable map from page number to an
//! owned page buffer. Pages are loaded lazily on first fetch and stay
//! resident until `close`, unless a cache bound is configured, in which case
//! the eviction policy picks victims that are flushed before being dropped.
//!
//! # Invariants
//!
//! - `pages_on_disk * PAGE_SIZE <= file length` (a trailing partial page is ignored)
//! - `num_pages >= pages_on_disk`; page numbers below `num_pages` have been handed out
//! - Every cached page is tracked by the eviction policy

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use crate::storage::eviction::{ClockPolicy, EvictionPolicy};
use crate::storage::page::{PAGE_SIZE_U64, Page, PageNum, page_offset};

/// Limits applied by the pager.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PagerLimits {
    /// Maximum number of resident pages. `None` keeps every page resident.
    pub cache_capacity: Option<usize>,
    /// Soft ceiling on the number of pages in the file.
    pub max_pages: Option<u32>,
}

/// A table file with a page cache.
#[derive(Debug)]
pub struct Pager {
    file: File,
    /// Number of whole pages present in the file.
    pages_on_disk: u32,
    /// One past the highest page number handed out.
    num_pages: u32,
    cache: HashMap<PageNum, Page>,
    eviction: Box<dyn EvictionPolicy>,
    limits: PagerLimits,
}

impl Pager {
    /// Open or create the file at `path`.
    ///
    /// No pages are read until they are fetched.
    pub fn open(path: &Path, limits: PagerLimits) -> Result<Self, PagerError> {
        Self::with_policy(path, limits, Box::new(ClockPolicy::new()))
    }

    /// Open with a caller-supplied eviction policy.
    pub fn with_policy(
        path: &Path,
        limits: PagerLimits,
        eviction: Box<dyn EvictionPolicy>,
    ) -> Result<Self, PagerError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(PagerError::Io)?;

        let file_length = file.metadata().map_err(PagerError::Io)?.len();
        if file_length % PAGE_SIZE_U64 != 0 {
            tracing::warn!(
                "{} has a trailing partial page ({file_length} bytes); ignoring it",
                path.display()
            );
        }
        let pages_on_disk = u32::try_from(file_length / PAGE_SIZE_U64).map_err(|_| {
            PagerError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("file too large: {file_length} bytes"),
            ))
        })?;

        tracing::debug!(
            "opened pager for {} with {pages_on_disk} pages",
            path.display()
        );

        Ok(Self {
            file,
            pages_on_disk,
            num_pages: pages_on_disk,
            cache: HashMap::new(),
            eviction,
            limits,
        })
    }

    /// Number of pages handed out so far (on disk or only in memory).
    #[must_use]
    pub const fn num_pages(&self) -> u32 {
        self.num_pages
    }

    /// Number of pages currently resident in the cache.
    #[must_use]
    pub fn resident_pages(&self) -> usize {
        self.cache.len()
    }

    /// Whether `count` more pages can be allocated without exceeding the ceiling.
    #[must_use]
    pub fn can_allocate(&self, count: u32) -> bool {
        self.limits
            .max_pages
            .is_none_or(|max| u64::from(self.num_pages) + u64::from(count) <= u64::from(max))
    }

    /// Fail with `Capacity` unless `count` more pages can be allocated.
    pub fn ensure_capacity(&self, count: u32) -> Result<(), PagerError> {
        if self.can_allocate(count) {
            Ok(())
        } else {
            Err(PagerError::Capacity {
                max_pages: self.limits.max_pages.unwrap_or(u32::MAX),
            })
        }
    }

    /// Hand out the next unused page number.
    ///
    /// Numbers are never reused. The page itself is materialized (zeroed) on
    /// its first fetch.
    pub fn allocate(&mut self) -> Result<PageNum, PagerError> {
        self.ensure_capacity(1)?;
        let page_num = self.num_pages;
        self.num_pages = self.num_pages.checked_add(1).ok_or(PagerError::Capacity {
            max_pages: u32::MAX,
        })?;
        Ok(page_num)
    }

    /// Fetch a page, loading it from disk on first access.
    ///
    /// Pages beyond the end of the file come back zero-filled. The returned
    /// page is mutable; changes reach disk on `flush`, eviction, or `close`.
    pub fn page(&mut self, page_num: PageNum) -> Result<&mut Page, PagerError> {
        if self.cache.contains_key(&page_num) {
            self.eviction.record_access(page_num);
        } else {
            self.make_room()?;
            let page = self.load(page_num)?;
            self.cache.insert(page_num, page);
            self.eviction.record_insert(page_num);
            if page_num >= self.num_pages {
                self.num_pages = page_num.saturating_add(1);
            }
        }

        Ok(self.cache.entry(page_num).or_default())
    }

    /// Write a cached page to its offset in the file.
    ///
    /// Flushing a page that is not resident is a no-op.
    pub fn flush(&mut self, page_num: PageNum) -> Result<(), PagerError> {
        let Some(page) = self.cache.get(&page_num) else {
            return Ok(());
        };

        self.file
            .seek(SeekFrom::Start(page_offset(page_num)))
            .map_err(PagerError::Io)?;
        self.file.write_all(page.as_bytes()).map_err(PagerError::Io)?;

        if page_num >= self.pages_on_disk {
            self.pages_on_disk = page_num.saturating_add(1);
        }
        tracing::trace!("flushed page {page_num}");
        Ok(())
    }

    /// Flush every resident page in ascending page order and sync the file.
    ///
    /// Consumes the pager: the file handle is released and the cache dropped.
    pub fn close(mut self) -> Result<(), PagerError> {
        let mut resident: Vec<PageNum> = self.cache.keys().copied().collect();
        resident.sort_unstable();

        for &page_num in &resident {
            self.flush(page_num)?;
        }
        self.file.sync_all().map_err(PagerError::Io)?;

        tracing::debug!("closed pager after flushing {} pages", resident.len());
        Ok(())
    }

    /// Evict pages until there is room for one more.
    fn make_room(&mut self) -> Result<(), PagerError> {
        let Some(capacity) = self.limits.cache_capacity else {
            return Ok(());
        };

        while self.cache.len() >= capacity.max(1) {
            let Some(victim) = self.eviction.victim() else {
                break;
            };
            self.flush(victim)?;
            self.cache.remove(&victim);
            tracing::debug!("evicted page {victim}");
        }
        Ok(())
    }

    /// Read a page from disk, or return a zeroed page past the end of file.
    fn load(&mut self, page_num: PageNum) -> Result<Page, PagerError> {
        let mut page = Page::new();
        if page_num < self.pages_on_disk {
            self.file
                .seek(SeekFrom::Start(page_offset(page_num)))
                .map_err(PagerError::Io)?;
            self.file
                .read_exact(page.as_bytes_mut())
                .map_err(PagerError::Io)?;
            tracing::trace!("loaded page {page_num} from disk");
        }
        Ok(page)
    }
}

/// Errors that can occur during pager operations.
#[derive(Debug)]
pub enum PagerError {
    /// I/O error. Fatal for the operation in flight.
    Io(std::io::Error),
    /// The configured page ceiling was reached.
    Capacity { max_pages: u32 },
}

impl std::fmt::Display for PagerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::Capacity { max_pages } => {
                write!(f, "page limit reached (max pages: {max_pages})")
            }
        }
    }
}

impl std::error::Error for PagerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Capacity { .. } => None,
        }
    }
}
