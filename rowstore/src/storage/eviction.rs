//! Page eviction policies for the pager cache.
//!
//! By default the pager keeps every page it has touched resident. When a
//! cache bound is configured, the pager asks its policy for a victim before
//! admitting a new page, flushes the victim to disk, and drops it.
//!
//! The default policy is the clock (second-chance) algorithm:
//! 1. Each resident page has a reference bit set when accessed
//! 2. The hand sweeps the ring in admission order
//! 3. A page with its bit set gets the bit cleared and goes to the back
//! 4. A page with its bit clear is the victim

use std::collections::{HashMap, VecDeque};

use crate::storage::page::PageNum;

/// Chooses which resident page to drop when the cache is full.
///
/// The pager reports every admission and access; the policy only tracks
/// page numbers, never page contents.
pub trait EvictionPolicy: std::fmt::Debug {
    /// A page was loaded into the cache.
    fn record_insert(&mut self, page_num: PageNum);

    /// A resident page was fetched again.
    fn record_access(&mut self, page_num: PageNum);

    /// Pick a resident page to evict and stop tracking it.
    ///
    /// Returns `None` if nothing is tracked.
    fn victim(&mut self) -> Option<PageNum>;
}

/// Clock replacement over the resident pages.
#[derive(Debug, Default)]
pub struct ClockPolicy {
    /// Resident pages in hand order.
    ring: VecDeque<PageNum>,
    /// Reference bit per resident page.
    referenced: HashMap<PageNum, bool>,
}

impl ClockPolicy {
    /// Create an empty clock.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl EvictionPolicy for ClockPolicy {
    fn record_insert(&mut self, page_num: PageNum) {
        if self.referenced.insert(page_num, false).is_none() {
            self.ring.push_back(page_num);
        }
    }

    fn record_access(&mut self, page_num: PageNum) {
        if let Some(bit) = self.referenced.get_mut(&page_num) {
            *bit = true;
        }
    }

    fn victim(&mut self) -> Option<PageNum> {
        // Two sweeps are enough: the first clears every bit it passes.
        let max_steps = 2 * self.ring.len() + 1;

        for _ in 0..max_steps {
            let page_num = self.ring.pop_front()?;
            match self.referenced.get_mut(&page_num) {
                Some(bit) if *bit => {
                    *bit = false;
                    self.ring.push_back(page_num);
                }
                Some(_) => {
                    self.referenced.remove(&page_num);
                    return Some(page_num);
                }
                // Untracked slot; drop it.
                None => {}
            }
        }

        None
    }
}
