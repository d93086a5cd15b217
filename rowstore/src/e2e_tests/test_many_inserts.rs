//! Test large shuffled workloads against the structural verifier.

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use crate::config::EngineConfig;
use crate::e2e_tests::helpers::{TestSession, as_strs, insert_lines, row_line, selected_rows};

fn shuffled(count: u32, seed: u64) -> Vec<u32> {
    let mut ids: Vec<u32> = (1..=count).collect();
    ids.shuffle(&mut StdRng::seed_from_u64(seed));
    ids
}

#[test]
fn test_many_shuffled_inserts() {
    let test = TestSession::new();

    let mut lines = insert_lines(&shuffled(1000, 42));
    lines.push(".verify".to_string());
    lines.push("select".to_string());

    let output = test.run(&as_strs(&lines));
    assert!(output[..1000].iter().all(|line| line == "db > Executed."));
    assert!(output[1000].starts_with("db > Tree is valid: depth 2,"), "{}", output[1000]);

    let expected: Vec<String> = (1..=1000).map(row_line).collect();
    assert_eq!(selected_rows(&output), expected);
}

#[test]
fn test_deep_tree_with_small_internal_nodes() {
    let test = TestSession::with_config(EngineConfig {
        internal_node_max_cells: 2,
        cache_capacity: Some(4),
        ..EngineConfig::default()
    });

    let mut lines = insert_lines(&shuffled(700, 7));
    lines.push(".verify".to_string());
    lines.push("select".to_string());

    let output = test.run(&as_strs(&lines));
    assert!(output[..700].iter().all(|line| line == "db > Executed."));
    assert!(output[700].starts_with("db > Tree is valid:"), "{}", output[700]);
    assert!(output[700].ends_with("700 rows."), "{}", output[700]);

    let expected: Vec<String> = (1..=700).map(row_line).collect();
    assert_eq!(selected_rows(&output), expected);
}
