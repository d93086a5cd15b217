//! Test unknown input and early exit.

use crate::e2e_tests::helpers::{TestSession, insert_line, selected_rows};
use crate::repl::ReplError;
use crate::storage::TableError;

#[test]
fn test_unrecognized_meta_command() {
    let test = TestSession::new();

    let output = test.run(&[".tables", ".exit"]);
    assert_eq!(output, vec!["db > Unrecognized command '.tables'", "db > "]);
}

#[test]
fn test_unrecognized_keyword() {
    let test = TestSession::new();

    let output = test.run(&["delete 1", ""]);
    assert_eq!(
        output,
        vec![
            "db > Unrecognized keyword at start of 'delete 1'.",
            "db > Unrecognized keyword at start of ''.",
            "db > ",
        ]
    );
}

#[test]
fn test_exit_ignores_remaining_input() {
    let test = TestSession::new();

    let output = test.run(&[".exit", &insert_line(1)]);
    assert_eq!(output, vec!["db > "]);
    assert!(selected_rows(&test.run(&["select"])).is_empty());
}

#[test]
fn test_corrupt_file_ends_session() {
    let test = TestSession::new();
    test.run(&[&insert_line(1)]);

    // Retag the root leaf as internal: its first "child" is then the key 1,
    // a page that doesn't exist.
    let mut bytes = std::fs::read(test.path()).expect("read");
    bytes[0] = 0;
    std::fs::write(test.path(), &bytes).expect("write");

    let result = test.try_run(&["select"]);
    assert!(matches!(
        result,
        Err(ReplError::Table(TableError::Corrupt(_)))
    ));
}
