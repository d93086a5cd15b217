//! Test that rows survive closing and reopening the table file.

use crate::config::EngineConfig;
use crate::e2e_tests::helpers::{
    TestSession, as_strs, insert_line, insert_lines, row_line, selected_rows,
};
use crate::storage::Table;

#[test]
fn test_data_survives_reopen() {
    let test = TestSession::new();

    let first = test.run(&["insert 1 user1 person1@example.com", ".exit"]);
    assert_eq!(first, vec!["db > Executed.", "db > "]);

    let second = test.run(&["select", ".exit"]);
    assert_eq!(
        second,
        vec![
            "db > (1, user1, person1@example.com)",
            "Executed.",
            "db > ",
        ]
    );
}

#[test]
fn test_multi_page_tree_survives_reopen() {
    let test = TestSession::new();

    let ids: Vec<u32> = (1..=100).rev().collect();
    let mut lines = insert_lines(&ids);
    lines.push(".exit".to_string());
    test.run(&as_strs(&lines));

    let output = test.run(&["select"]);
    let expected: Vec<String> = (1..=100).map(row_line).collect();
    assert_eq!(selected_rows(&output), expected);
}

#[test]
fn test_multi_level_tree_survives_reopen() {
    let test = TestSession::with_config(EngineConfig {
        internal_node_max_cells: 3,
        ..EngineConfig::default()
    });

    let ids: Vec<u32> = (1..=300).collect();
    test.run(&as_strs(&insert_lines(&ids)));

    // Insert more after reopening, into the existing deep tree.
    test.run(&[&insert_line(1000), &insert_line(0)]);

    let mut table = Table::open(&test.path(), EngineConfig::default()).expect("reopen");
    let stats = table.verify().expect("valid tree");
    assert!(stats.depth >= 4, "depth {}", stats.depth);
    assert_eq!(stats.row_count, 302);
    table.close().expect("close");

    let output = test.run(&["select"]);
    let rows = selected_rows(&output);
    assert_eq!(rows.len(), 302);
    assert_eq!(rows.first(), Some(&row_line(0)));
    assert_eq!(rows.last(), Some(&row_line(1000)));
}

#[test]
fn test_file_length_is_whole_pages() {
    let test = TestSession::new();

    let ids: Vec<u32> = (1..=30).collect();
    test.run(&as_strs(&insert_lines(&ids)));

    let length = std::fs::metadata(test.path()).expect("stat").len();
    assert_eq!(length % 4096, 0);
    assert!(length >= 3 * 4096);
}
