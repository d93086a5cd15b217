//! End-to-end tests at the statement level.
//!
//! Each test file covers a specific scenario, feeding a script of lines to a
//! fresh session and checking the exact output.

#![cfg(test)]

mod helpers;

mod test_btree_output;
mod test_duplicate_key;
mod test_insert_select;
mod test_many_inserts;
mod test_meta_commands;
mod test_persistence;
mod test_string_limits;
mod test_table_full;
