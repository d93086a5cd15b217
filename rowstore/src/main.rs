#![cfg_attr(test, allow(clippy::disallowed_methods))]
// Forbid unwrap() in production code to prevent panics from corrupt data.
// Test code is allowed to use unwrap() for convenience.
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
use std::io::{BufWriter, stdin, stdout};
use std::path::PathBuf;
use std::process::ExitCode;

use rowstore::config::EngineConfig;
use rowstore::repl::Repl;
use rowstore::storage::Table;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> ExitCode {
    // Logs go to stderr so stdout carries only the session's output.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rowstore=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let Some(path) = std::env::args_os().nth(1).map(PathBuf::from) else {
        eprintln!("Must supply a database filename.");
        return ExitCode::from(2);
    };

    let config = match EngineConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        }
    };
    tracing::debug!("Loaded configuration: {config:?}");

    let table = match Table::open(&path, config) {
        Ok(table) => table,
        Err(e) => {
            tracing::error!("Failed to open {}: {e}", path.display());
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let repl = Repl::new(table, BufWriter::new(stdout().lock()));
    match repl.run(stdin().lock()) {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("Session ended with error: {e}");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
