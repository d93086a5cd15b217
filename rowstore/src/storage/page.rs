//! Page buffer and page numbering.
//!
//! The table file is a sequence of 4KB pages. A page is the unit of I/O and
//! the unit of caching; its contents are interpreted by `btree::node`.

/// Page size in bytes (4KB).
pub const PAGE_SIZE: usize = 4096;

/// Page size as u64 for offset calculations.
pub const PAGE_SIZE_U64: u64 = PAGE_SIZE as u64;

/// A page number (0-indexed). Page 0 is always the tree root.
pub type PageNum = u32;

/// Byte offset of a page within the table file.
#[must_use]
pub const fn page_offset(page_num: PageNum) -> u64 {
    page_num as u64 * PAGE_SIZE_U64
}

/// A raw page buffer.
pub struct Page {
    data: Box<[u8; PAGE_SIZE]>,
}

impl Page {
    /// Create a new zeroed page.
    #[must_use]
    pub fn new() -> Self {
        Self {
            data: Box::new([0u8; PAGE_SIZE]),
        }
    }

    /// Get the raw page data.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; PAGE_SIZE] {
        &self.data
    }

    /// Get mutable access to the raw page data.
    pub fn as_bytes_mut(&mut self) -> &mut [u8; PAGE_SIZE] {
        &mut self.data
    }

    /// Read bytes at a specific offset.
    #[must_use]
    pub fn read_bytes(&self, offset: usize, len: usize) -> &[u8] {
        &self.data[offset..offset + len]
    }

    /// Write bytes at a specific offset.
    pub fn write_bytes(&mut self, offset: usize, bytes: &[u8]) {
        self.data[offset..offset + bytes.len()].copy_from_slice(bytes);
    }

    /// Read a u8 at the given offset.
    #[must_use]
    pub fn read_u8(&self, offset: usize) -> u8 {
        self.data[offset]
    }

    /// Write a u8 at the given offset.
    pub fn write_u8(&mut self, offset: usize, value: u8) {
        self.data[offset] = value;
    }

    /// Read a u32 (little-endian) at the given offset.
    #[must_use]
    pub fn read_u32(&self, offset: usize) -> u32 {
        u32::from_le_bytes([
            self.data[offset],
            self.data[offset + 1],
            self.data[offset + 2],
            self.data[offset + 3],
        ])
    }

    /// Write a u32 (little-endian) at the given offset.
    pub fn write_u32(&mut self, offset: usize, value: u32) {
        self.data[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
    }

    /// Move `len` bytes starting at `src` so they start at `dest`.
    ///
    /// The ranges may overlap.
    pub fn move_bytes(&mut self, src: usize, dest: usize, len: usize) {
        self.data.copy_within(src..src + len, dest);
    }

    /// Zero the whole page.
    pub fn clear(&mut self) {
        self.data.fill(0);
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Page {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Page")
            .field("first_16_bytes", &&self.data[..16])
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_read_write() {
        let mut page = Page::new();

        page.write_u8(0, 0xFF);
        assert_eq!(page.read_u8(0), 0xFF);

        page.write_u32(100, 0x1234_5678);
        assert_eq!(page.read_u32(100), 0x1234_5678);
        // Little-endian on disk.
        assert_eq!(page.read_bytes(100, 4), &[0x78, 0x56, 0x34, 0x12]);

        page.write_bytes(500, b"hello");
        assert_eq!(page.read_bytes(500, 5), b"hello");
    }

    #[test]
    fn test_move_bytes_overlapping() {
        let mut page = Page::new();
        page.write_bytes(10, b"abcdef");

        page.move_bytes(10, 12, 6);

        assert_eq!(page.read_bytes(12, 6), b"abcdef");
        assert_eq!(page.read_bytes(10, 2), b"ab");
    }

    #[test]
    fn test_page_offset() {
        assert_eq!(page_offset(0), 0);
        assert_eq!(page_offset(3), 3 * 4096);
        assert_eq!(page_offset(u32::MAX), u64::from(u32::MAX) * 4096);
    }

    #[test]
    fn test_clear() {
        let mut page = Page::new();
        page.write_u32(0, 7);
        page.clear();
        assert!(page.as_bytes().iter().all(|&b| b == 0));
    }
}
