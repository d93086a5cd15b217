//! Engine configuration module.
//!
//! This module loads the storage engine's tunables from environment
//! variables.
//!
//! # Environment Variables
//!
//! - `ROWSTORE_CACHE_PAGES`: Maximum number of resident pages (default: unbounded)
//! - `ROWSTORE_MAX_PAGES`: Soft ceiling on the table file's page count (default: none)
//! - `ROWSTORE_INTERNAL_MAX_CELLS`: Cells per internal node before it splits (default: `510`)
//!
//! # Invariants
//!
//! - `cache_capacity`, when set, is at least 1
//! - `max_pages`, when set, is at least 1 (room for the root page)
//! - `internal_node_max_cells` is in `2..=INTERNAL_NODE_MAX_CELLS`

use crate::storage::btree::layout::INTERNAL_NODE_MAX_CELLS;
use crate::storage::pager::PagerLimits;

/// Storage engine configuration.
///
/// # Post-conditions
///
/// When constructed via `from_env()` or `from_lookup()`, every field is
/// within its documented range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Maximum number of pages kept in memory. `None` keeps every page
    /// resident until close.
    pub cache_capacity: Option<usize>,
    /// Soft ceiling on the number of pages in the table file.
    pub max_pages: Option<u32>,
    /// Maximum cells in an internal node.
    /// Lower values make the tree deeper for the same number of rows.
    pub internal_node_max_cells: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cache_capacity: None,
            max_pages: None,
            internal_node_max_cells: INTERNAL_NODE_MAX_CELLS,
        }
    }
}

/// Error returned when loading configuration fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// An environment variable has an invalid value.
    InvalidValue { name: String, message: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidValue { name, message } => {
                write!(f, "invalid value for {name}: {message}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

impl EngineConfig {
    pub const CACHE_PAGES_VAR: &'static str = "ROWSTORE_CACHE_PAGES";
    pub const MAX_PAGES_VAR: &'static str = "ROWSTORE_MAX_PAGES";
    pub const INTERNAL_MAX_CELLS_VAR: &'static str = "ROWSTORE_INTERNAL_MAX_CELLS";

    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if any variable is set to a value outside its range.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let cache_capacity = parse_optional::<usize>(&lookup, Self::CACHE_PAGES_VAR, 1, usize::MAX)?;
        let max_pages = parse_optional::<u32>(&lookup, Self::MAX_PAGES_VAR, 1, u32::MAX)?;
        let internal_node_max_cells = parse_optional::<usize>(
            &lookup,
            Self::INTERNAL_MAX_CELLS_VAR,
            2,
            INTERNAL_NODE_MAX_CELLS,
        )?
        .unwrap_or(INTERNAL_NODE_MAX_CELLS);

        Ok(Self {
            cache_capacity,
            max_pages,
            internal_node_max_cells,
        })
    }

    /// Limits handed to the pager.
    #[must_use]
    pub const fn pager_limits(&self) -> PagerLimits {
        PagerLimits {
            cache_capacity: self.cache_capacity,
            max_pages: self.max_pages,
        }
    }
}

/// Parse `name` if set, rejecting values outside `min..=max`.
fn parse_optional<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    min: T,
    max: T,
) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr + PartialOrd + std::fmt::Display + Copy,
{
    let Some(value) = lookup(name) else {
        return Ok(None);
    };

    let parsed = value.trim().parse::<T>().map_err(|_| ConfigError::InvalidValue {
        name: name.to_string(),
        message: format!("'{value}' is not a valid number"),
    })?;
    if parsed < min || parsed > max {
        return Err(ConfigError::InvalidValue {
            name: name.to_string(),
            message: format!("{parsed} is out of range ({min}..={max})"),
        });
    }
    Ok(Some(parsed))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_default_values() {
        let config = EngineConfig::from_lookup(lookup(&[])).expect("defaults are valid");
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.internal_node_max_cells, 510);
        assert_eq!(config.pager_limits(), PagerLimits::default());
    }

    #[test]
    fn test_all_values_set() {
        let config = EngineConfig::from_lookup(lookup(&[
            ("ROWSTORE_CACHE_PAGES", "16"),
            ("ROWSTORE_MAX_PAGES", "1000"),
            ("ROWSTORE_INTERNAL_MAX_CELLS", "3"),
        ]))
        .expect("valid config");

        assert_eq!(config.cache_capacity, Some(16));
        assert_eq!(config.max_pages, Some(1000));
        assert_eq!(config.internal_node_max_cells, 3);
    }

    #[test]
    fn test_rejects_non_numeric() {
        let err = EngineConfig::from_lookup(lookup(&[("ROWSTORE_CACHE_PAGES", "lots")]))
            .expect_err("not a number");
        assert_eq!(
            err.to_string(),
            "invalid value for ROWSTORE_CACHE_PAGES: 'lots' is not a valid number"
        );
    }

    #[test]
    fn test_rejects_out_of_range() {
        let err = EngineConfig::from_lookup(lookup(&[("ROWSTORE_INTERNAL_MAX_CELLS", "1")]))
            .expect_err("below minimum");
        assert_eq!(
            err,
            ConfigError::InvalidValue {
                name: "ROWSTORE_INTERNAL_MAX_CELLS".to_string(),
                message: "1 is out of range (2..=510)".to_string(),
            }
        );

        assert!(EngineConfig::from_lookup(lookup(&[("ROWSTORE_INTERNAL_MAX_CELLS", "511")])).is_err());
        assert!(EngineConfig::from_lookup(lookup(&[("ROWSTORE_CACHE_PAGES", "0")])).is_err());
        assert!(EngineConfig::from_lookup(lookup(&[("ROWSTORE_MAX_PAGES", "0")])).is_err());
    }

    #[test]
    fn test_config_error_display_invalid() {
        let error = ConfigError::InvalidValue {
            name: "TEST_VAR".to_string(),
            message: "bad value".to_string(),
        };
        assert_eq!(error.to_string(), "invalid value for TEST_VAR: bad value");
    }
}
