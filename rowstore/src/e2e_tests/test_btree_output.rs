//! Test the introspection commands.

use crate::e2e_tests::helpers::{TestSession, as_strs, insert_lines};

#[test]
fn test_btree_single_leaf() {
    let test = TestSession::new();

    let mut lines = insert_lines(&[3, 1, 2]);
    lines.push(".btree".to_string());
    lines.push(".exit".to_string());

    let output = test.run(&as_strs(&lines));
    assert_eq!(
        output,
        vec![
            "db > Executed.",
            "db > Executed.",
            "db > Executed.",
            "db > Tree:",
            "- leaf (size 3)",
            "  - 1",
            "  - 2",
            "  - 3",
            "db > ",
        ]
    );
}

#[test]
fn test_btree_after_leaf_split() {
    let test = TestSession::new();

    let ids: Vec<u32> = (1..=14).collect();
    let mut lines = insert_lines(&ids);
    lines.push(".btree".to_string());

    let output = test.run(&as_strs(&lines));
    let mut expected = vec![
        "db > Tree:".to_string(),
        "- internal (size 1)".to_string(),
        "  - leaf (size 7)".to_string(),
    ];
    expected.extend((1..=7).map(|id| format!("    - {id}")));
    expected.push("  - key 7".to_string());
    expected.push("  - leaf (size 7)".to_string());
    expected.extend((8..=14).map(|id| format!("    - {id}")));
    expected.push("db > ".to_string());

    assert_eq!(output[14..], expected[..]);
}

#[test]
fn test_constants() {
    let test = TestSession::new();

    let output = test.run(&[".constants", ".exit"]);
    assert_eq!(
        output,
        vec![
            "db > Constants:",
            "ROW_SIZE: 293",
            "COMMON_NODE_HEADER_SIZE: 6",
            "LEAF_NODE_HEADER_SIZE: 14",
            "LEAF_NODE_CELL_SIZE: 297",
            "LEAF_NODE_SPACE_FOR_CELLS: 4082",
            "LEAF_NODE_MAX_CELLS: 13",
            "INTERNAL_NODE_HEADER_SIZE: 14",
            "INTERNAL_NODE_MAX_CELLS: 510",
            "db > ",
        ]
    );
}

#[test]
fn test_verify_reports_shape() {
    let test = TestSession::new();

    let ids: Vec<u32> = (1..=14).collect();
    let mut lines = insert_lines(&ids);
    lines.push(".verify".to_string());

    let output = test.run(&as_strs(&lines));
    assert_eq!(
        output[14],
        "db > Tree is valid: depth 2, 2 leaves, 1 internal nodes, 14 rows."
    );
}
