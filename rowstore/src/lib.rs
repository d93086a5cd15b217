// Layers, bottom up:
//  - page / pager: fixed-size pages, file I/O, page cache with eviction
//  - btree: node layout, search, insert with splits, cursor, verification
//  - table: the handle that owns the pager and the root page
//  - repl: text statements mapped onto the table API
//
// Data flow for an insert:
// 1. Line comes in, parsed into a Row
// 2. Tree descends from page 0 to the target leaf
// 3. Row goes into the leaf, splitting upward if it's full
// 4. Pages stay cached until close (or eviction) writes them back

pub mod config;
pub mod repl;
pub mod storage;

mod e2e_tests;
