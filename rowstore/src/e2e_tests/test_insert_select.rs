//! Test inserting rows and reading them back with `select`.

use crate::e2e_tests::helpers::{
    TestSession, as_strs, insert_line, insert_lines, row_line, selected_rows,
};

#[test]
fn test_select_empty_table() {
    let test = TestSession::new();

    let output = test.run(&["select", ".exit"]);
    assert_eq!(output, vec!["db > Executed.", "db > "]);
}

#[test]
fn test_insert_and_retrieve_row() {
    let test = TestSession::new();

    let output = test.run(&["insert 1 user1 person1@example.com", "select", ".exit"]);
    assert_eq!(
        output,
        vec![
            "db > Executed.",
            "db > (1, user1, person1@example.com)",
            "Executed.",
            "db > ",
        ]
    );
}

#[test]
fn test_select_returns_rows_in_id_order() {
    let test = TestSession::new();

    let ids = [5, 3, 9, 1, 7];
    let mut lines = insert_lines(&ids);
    lines.push("select".to_string());

    let output = test.run(&as_strs(&lines));
    let expected: Vec<String> = [1, 3, 5, 7, 9].iter().map(|&id| row_line(id)).collect();
    assert_eq!(selected_rows(&output), expected);
}

#[test]
fn test_select_is_repeatable() {
    let test = TestSession::new();

    let output = test.run(&[&insert_line(2), &insert_line(1), "select", "select"]);
    assert_eq!(
        output,
        vec![
            "db > Executed.",
            "db > Executed.",
            "db > (1, user1, person1@example.com)",
            "(2, user2, person2@example.com)",
            "Executed.",
            "db > (1, user1, person1@example.com)",
            "(2, user2, person2@example.com)",
            "Executed.",
            "db > ",
        ]
    );
}

#[test]
fn test_end_of_input_closes_cleanly() {
    let test = TestSession::new();

    // No `.exit`: the session ends at end of input and still persists.
    test.run(&[&insert_line(1)]);

    let output = test.run(&["select"]);
    assert_eq!(selected_rows(&output), vec![row_line(1)]);
}
