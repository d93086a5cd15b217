//! Common helpers for end-to-end tests.

use std::path::PathBuf;

use tempfile::TempDir;

use crate::config::EngineConfig;
use crate::repl::{Repl, ReplError};
use crate::storage::Table;

/// A table file in its own temporary directory, removed on drop.
///
/// Every `run` opens the file afresh, so consecutive runs exercise the
/// close/reopen path.
pub struct TestSession {
    dir: TempDir,
    config: EngineConfig,
}

impl TestSession {
    /// Create a session with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    #[must_use]
    pub fn with_config(config: EngineConfig) -> Self {
        #[allow(clippy::expect_used)]
        let dir = TempDir::new().expect("Failed to create temp dir");
        Self { dir, config }
    }

    /// Path of the table file.
    #[must_use]
    pub fn path(&self) -> PathBuf {
        self.dir.path().join("test.db")
    }

    /// Feed `lines` to a new session and return its output, split on
    /// newlines. The last element is the prompt printed before end of input
    /// (or before `.exit`).
    pub fn run(&self, lines: &[&str]) -> Vec<String> {
        #[allow(clippy::expect_used)]
        self.try_run(lines).expect("Session failed")
    }

    /// Like `run`, but surfaces a fatal session error.
    pub fn try_run(&self, lines: &[&str]) -> Result<Vec<String>, ReplError> {
        let table = Table::open(&self.path(), self.config)?;
        let mut script = lines.join("\n");
        script.push('\n');

        let output = Repl::new(table, Vec::new()).run(script.as_bytes())?;
        Ok(String::from_utf8_lossy(&output)
            .split('\n')
            .map(str::to_string)
            .collect())
    }
}

/// `insert` statement for a row with fields derived from `id`.
#[must_use]
pub fn insert_line(id: u32) -> String {
    format!("insert {id} user{id} person{id}@example.com")
}

/// How `select` prints the row `insert_line(id)` stored.
#[must_use]
pub fn row_line(id: u32) -> String {
    format!("({id}, user{id}, person{id}@example.com)")
}

/// Insert lines for every id, in order.
#[must_use]
pub fn insert_lines(ids: &[u32]) -> Vec<String> {
    ids.iter().map(|&id| insert_line(id)).collect()
}

/// Borrow a list of owned lines for `TestSession::run`.
#[must_use]
pub fn as_strs(lines: &[String]) -> Vec<&str> {
    lines.iter().map(String::as_str).collect()
}

/// Rows printed by a `select` that ran as the last statement of a script.
///
/// Strips the prompt, the trailing `Executed.` and the final prompt.
#[must_use]
pub fn selected_rows(output: &[String]) -> Vec<String> {
    let Some(end) = output.iter().rposition(|line| line == "Executed.") else {
        return Vec::new();
    };
    let start = output[..end]
        .iter()
        .rposition(|line| line.starts_with("db > "))
        .unwrap_or(0);

    let mut rows: Vec<String> = output[start..end].to_vec();
    if let Some(first) = rows.first_mut() {
        *first = first.trim_start_matches("db > ").to_string();
    }
    rows
}
