//! Line-oriented front-end over a table.
//!
//! Each input line is either a meta command (leading `.`) or a statement:
//!
//! - `insert <id> <username> <email>`
//! - `select`
//! - `.exit`, `.btree`, `.constants`, `.verify`
//!
//! Recoverable errors (duplicate key, bad input, table full) are reported on
//! the output and the loop continues. I/O failures and corruption end the
//! session with an error, leaving the table unclosed.

use std::io::{BufRead, Write};

use crate::storage::btree::layout::{
    COMMON_NODE_HEADER_SIZE, INTERNAL_NODE_HEADER_SIZE, INTERNAL_NODE_MAX_CELLS,
    LEAF_NODE_CELL_SIZE, LEAF_NODE_HEADER_SIZE, LEAF_NODE_MAX_CELLS, LEAF_NODE_SPACE_FOR_CELLS,
};
use crate::storage::row::{COLUMN_EMAIL_SIZE, COLUMN_USERNAME_SIZE, ROW_SIZE, Row, RowError};
use crate::storage::table::{Table, TableError};

pub const PROMPT: &str = "db > ";

/// A parsed statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    Insert(Row),
    Select,
}

/// Why a statement line was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrepareError {
    NegativeId,
    StringTooLong,
    SyntaxError,
    UnrecognizedStatement,
}

impl PrepareError {
    /// Message shown to the user for this error on `line`.
    #[must_use]
    pub fn message(&self, line: &str) -> String {
        match self {
            Self::NegativeId => "ID must be a non-negative integer.".to_string(),
            Self::StringTooLong => "String is too long.".to_string(),
            Self::SyntaxError => "Syntax error. Could not parse statement.".to_string(),
            Self::UnrecognizedStatement => format!("Unrecognized keyword at start of '{line}'."),
        }
    }
}

/// A meta command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetaCommand {
    Exit,
    Btree,
    Constants,
    Verify,
}

impl MetaCommand {
    /// Parse a line starting with `.`; `None` if the command is unknown.
    #[must_use]
    pub fn parse(line: &str) -> Option<Self> {
        match line {
            ".exit" => Some(Self::Exit),
            ".btree" => Some(Self::Btree),
            ".constants" => Some(Self::Constants),
            ".verify" => Some(Self::Verify),
            _ => None,
        }
    }
}

/// Parse a statement line.
pub fn prepare_statement(line: &str) -> Result<Statement, PrepareError> {
    let mut tokens = line.split_whitespace();
    match tokens.next() {
        Some("insert") => prepare_insert(tokens),
        Some("select") if tokens.next().is_none() => Ok(Statement::Select),
        Some("select") => Err(PrepareError::SyntaxError),
        _ => Err(PrepareError::UnrecognizedStatement),
    }
}

fn prepare_insert<'a>(mut args: impl Iterator<Item = &'a str>) -> Result<Statement, PrepareError> {
    let (Some(id), Some(username), Some(email), None) =
        (args.next(), args.next(), args.next(), args.next())
    else {
        return Err(PrepareError::SyntaxError);
    };

    let id = match id.parse::<u32>() {
        Ok(id) => id,
        Err(_) if id.parse::<i64>().is_ok_and(i64::is_negative) => {
            return Err(PrepareError::NegativeId);
        }
        Err(_) => return Err(PrepareError::SyntaxError),
    };
    if username.len() > COLUMN_USERNAME_SIZE || email.len() > COLUMN_EMAIL_SIZE {
        return Err(PrepareError::StringTooLong);
    }

    match Row::new(id, username, email) {
        Ok(row) => Ok(Statement::Insert(row)),
        Err(RowError::UsernameTooLong(_) | RowError::EmailTooLong(_)) => {
            Err(PrepareError::StringTooLong)
        }
        Err(RowError::EmbeddedNul(_)) => Err(PrepareError::SyntaxError),
    }
}

/// Whether the loop should keep reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Continue,
    Exit,
}

/// Errors that end a session.
#[derive(Debug)]
pub enum ReplError {
    /// Reading input or writing output failed.
    Io(std::io::Error),
    /// The table reported a fatal error.
    Table(TableError),
}

impl std::fmt::Display for ReplError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::Table(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for ReplError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Table(e) => Some(e),
        }
    }
}

impl From<std::io::Error> for ReplError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<TableError> for ReplError {
    fn from(e: TableError) -> Self {
        Self::Table(e)
    }
}

/// An interactive session writing to `out`.
#[derive(Debug)]
pub struct Repl<W: Write> {
    table: Table,
    out: W,
}

impl<W: Write> Repl<W> {
    pub const fn new(table: Table, out: W) -> Self {
        Self { table, out }
    }

    /// Read lines until `.exit` or end of input, then close the table.
    ///
    /// Returns the output sink so callers can inspect what was written.
    pub fn run(mut self, mut input: impl BufRead) -> Result<W, ReplError> {
        let mut line = String::new();
        loop {
            write!(self.out, "{PROMPT}")?;
            self.out.flush()?;

            line.clear();
            if input.read_line(&mut line)? == 0 {
                tracing::debug!("end of input");
                break;
            }
            if self.handle_line(line.trim_end_matches(['\n', '\r']))? == Control::Exit {
                break;
            }
        }

        let Self { table, mut out } = self;
        table.close()?;
        out.flush()?;
        Ok(out)
    }

    /// Execute one line of input.
    pub fn handle_line(&mut self, line: &str) -> Result<Control, ReplError> {
        if line.starts_with('.') {
            return match MetaCommand::parse(line) {
                Some(command) => self.execute_meta(command),
                None => {
                    writeln!(self.out, "Unrecognized command '{line}'")?;
                    Ok(Control::Continue)
                }
            };
        }

        match prepare_statement(line) {
            Ok(statement) => self.execute(statement)?,
            Err(e) => writeln!(self.out, "{}", e.message(line))?,
        }
        Ok(Control::Continue)
    }

    fn execute(&mut self, statement: Statement) -> Result<(), ReplError> {
        let result = match statement {
            Statement::Insert(row) => self.table.insert(&row),
            Statement::Select => self.select(),
        };

        match result {
            Ok(()) => writeln!(self.out, "Executed.")?,
            Err(TableError::DuplicateKey(_)) => writeln!(self.out, "Error: Duplicate key.")?,
            Err(TableError::Capacity { .. }) => writeln!(self.out, "Error: Table full.")?,
            Err(TableError::MalformedInput(_)) => writeln!(self.out, "String is too long.")?,
            Err(e) => {
                tracing::error!("fatal table error: {e}");
                return Err(e.into());
            }
        }
        Ok(())
    }

    fn select(&mut self) -> Result<(), TableError> {
        for row in self.table.start()? {
            let row = row?;
            writeln!(self.out, "{row}").map_err(TableError::Io)?;
        }
        Ok(())
    }

    fn execute_meta(&mut self, command: MetaCommand) -> Result<Control, ReplError> {
        match command {
            MetaCommand::Exit => return Ok(Control::Exit),
            MetaCommand::Btree => {
                let tree = self.table.render()?;
                write!(self.out, "Tree:\n{tree}")?;
            }
            MetaCommand::Constants => {
                writeln!(self.out, "Constants:")?;
                for (name, value) in [
                    ("ROW_SIZE", ROW_SIZE),
                    ("COMMON_NODE_HEADER_SIZE", COMMON_NODE_HEADER_SIZE),
                    ("LEAF_NODE_HEADER_SIZE", LEAF_NODE_HEADER_SIZE),
                    ("LEAF_NODE_CELL_SIZE", LEAF_NODE_CELL_SIZE),
                    ("LEAF_NODE_SPACE_FOR_CELLS", LEAF_NODE_SPACE_FOR_CELLS),
                    ("LEAF_NODE_MAX_CELLS", LEAF_NODE_MAX_CELLS),
                    ("INTERNAL_NODE_HEADER_SIZE", INTERNAL_NODE_HEADER_SIZE),
                    ("INTERNAL_NODE_MAX_CELLS", INTERNAL_NODE_MAX_CELLS),
                ] {
                    writeln!(self.out, "{name}: {value}")?;
                }
            }
            MetaCommand::Verify => {
                let stats = self.table.verify()?;
                writeln!(
                    self.out,
                    "Tree is valid: depth {}, {} leaves, {} internal nodes, {} rows.",
                    stats.depth, stats.leaf_count, stats.internal_count, stats.row_count
                )?;
            }
        }
        Ok(Control::Continue)
    }
}
