//! Test field length limits and statement parsing errors.

use crate::e2e_tests::helpers::{TestSession, selected_rows};

#[test]
fn test_max_length_strings_accepted() {
    let test = TestSession::new();

    let username = "a".repeat(32);
    let email = "a".repeat(255);
    let insert = format!("insert 1 {username} {email}");

    let output = test.run(&[&insert, "select", ".exit"]);
    assert_eq!(
        output,
        vec![
            "db > Executed.".to_string(),
            format!("db > (1, {username}, {email})"),
            "Executed.".to_string(),
            "db > ".to_string(),
        ]
    );
}

#[test]
fn test_string_too_long_rejected() {
    let test = TestSession::new();

    let long_username = "a".repeat(33);
    let long_email = "a".repeat(256);

    let output = test.run(&[
        &format!("insert 1 {long_username} ok@example.com"),
        &format!("insert 2 ok {long_email}"),
        "select",
        ".exit",
    ]);
    assert_eq!(
        output,
        vec![
            "db > String is too long.",
            "db > String is too long.",
            "db > Executed.",
            "db > ",
        ]
    );
}

#[test]
fn test_negative_id_rejected() {
    let test = TestSession::new();

    let output = test.run(&["insert -1 cstack foo@bar.com", "select", ".exit"]);
    assert_eq!(
        output,
        vec![
            "db > ID must be a non-negative integer.",
            "db > Executed.",
            "db > ",
        ]
    );
}

#[test]
fn test_malformed_insert_rejected() {
    let test = TestSession::new();

    let output = test.run(&[
        "insert",
        "insert 1 onlyname",
        "insert abc name email",
        "insert 1 a b extra",
        "insert 99999999999 a b",
    ]);
    for line in &output[..5] {
        assert_eq!(line, "db > Syntax error. Could not parse statement.");
    }
    assert_eq!(selected_rows(&test.run(&["select"])), Vec::<String>::new());
}

#[test]
fn test_largest_id_accepted() {
    let test = TestSession::new();

    let output = test.run(&["insert 4294967295 max max@example.com", "select"]);
    assert_eq!(
        selected_rows(&output),
        vec!["(4294967295, max, max@example.com)"]
    );
}
