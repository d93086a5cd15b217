//! Test that re-inserting an existing id is rejected without side effects.

use crate::e2e_tests::helpers::{TestSession, as_strs, insert_line, insert_lines, selected_rows};

#[test]
fn test_duplicate_id_rejected() {
    let test = TestSession::new();

    let output = test.run(&[
        "insert 1 user1 person1@example.com",
        "insert 1 user1 person1@example.com",
        "select",
        ".exit",
    ]);
    assert_eq!(
        output,
        vec![
            "db > Executed.",
            "db > Error: Duplicate key.",
            "db > (1, user1, person1@example.com)",
            "Executed.",
            "db > ",
        ]
    );
}

#[test]
fn test_duplicate_keeps_original_row() {
    let test = TestSession::new();

    let output = test.run(&[
        "insert 7 first first@example.com",
        "insert 7 second second@example.com",
        "select",
    ]);
    assert_eq!(selected_rows(&output), vec!["(7, first, first@example.com)"]);
}

#[test]
fn test_duplicate_in_multi_level_tree() {
    let test = TestSession::new();

    let ids: Vec<u32> = (1..=40).collect();
    let mut lines = insert_lines(&ids);
    lines.push("select".to_string());
    let before = selected_rows(&test.run(&as_strs(&lines)));

    let output = test.run(&[&insert_line(20), &insert_line(40), &insert_line(1), "select"]);
    assert_eq!(output[0], "db > Error: Duplicate key.");
    assert_eq!(output[1], "db > Error: Duplicate key.");
    assert_eq!(output[2], "db > Error: Duplicate key.");
    assert_eq!(selected_rows(&output), before);
}
