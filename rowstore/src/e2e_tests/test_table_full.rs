//! Test the page ceiling surfaces as "Table full" without losing data.

use crate::config::EngineConfig;
use crate::e2e_tests::helpers::{TestSession, as_strs, insert_line, insert_lines, selected_rows};

#[test]
fn test_table_full_when_page_limit_reached() {
    let test = TestSession::with_config(EngineConfig {
        max_pages: Some(1),
        ..EngineConfig::default()
    });

    // One page holds a single leaf of 13 rows.
    let ids: Vec<u32> = (1..=14).collect();
    let mut lines = insert_lines(&ids);
    lines.push("select".to_string());

    let output = test.run(&as_strs(&lines));
    for line in &output[..13] {
        assert_eq!(line, "db > Executed.");
    }
    assert_eq!(output[13], "db > Error: Table full.");
    assert_eq!(selected_rows(&output).len(), 13);
}

#[test]
fn test_table_full_is_recoverable() {
    let test = TestSession::with_config(EngineConfig {
        max_pages: Some(1),
        ..EngineConfig::default()
    });

    let ids: Vec<u32> = (1..=13).collect();
    test.run(&as_strs(&insert_lines(&ids)));

    // Still full, still usable, and a duplicate is reported as such.
    let output = test.run(&[&insert_line(100), &insert_line(5), ".verify"]);
    assert_eq!(output[0], "db > Error: Table full.");
    assert_eq!(output[1], "db > Error: Duplicate key.");
    assert_eq!(
        output[2],
        "db > Tree is valid: depth 1, 1 leaves, 0 internal nodes, 13 rows."
    );
}
