//! Engine configuration via `tempora.toml`
//!
//! Only settings of the engine itself live here. Modules loaded into the
//! engine carry their own configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;

use tempora_core::{Error, Result};

/// Config file name looked up next to the data.
pub const CONFIG_FILE_NAME: &str = "tempora.toml";

/// Engine configuration loaded from `tempora.toml`.
///
/// # Example
///
/// ```toml
/// # First transaction id handed out (ids below 3 are reserved)
/// first_normal_xid = 3
///
/// # Maximum nesting of SPI connections
/// max_spi_depth = 8
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EngineConfig {
    /// First transaction id handed out.
    #[serde(default = "default_first_normal_xid")]
    pub first_normal_xid: u32,
    /// Maximum nesting of SPI connections.
    #[serde(default = "default_max_spi_depth")]
    pub max_spi_depth: usize,
}

fn default_first_normal_xid() -> u32 {
    3
}

fn default_max_spi_depth() -> usize {
    8
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            first_normal_xid: default_first_normal_xid(),
            max_spi_depth: default_max_spi_depth(),
        }
    }
}

impl EngineConfig {
    /// Check value ranges.
    ///
    /// # Errors
    ///
    /// Returns an error if `first_normal_xid` names a reserved id or
    /// `max_spi_depth` is zero.
    pub fn validate(&self) -> Result<()> {
        if self.first_normal_xid < 3 {
            return Err(Error::config(format!(
                "first_normal_xid = {} is reserved; use 3 or more",
                self.first_normal_xid
            )));
        }
        if self.max_spi_depth == 0 {
            return Err(Error::config("max_spi_depth must be at least 1"));
        }
        Ok(())
    }

    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# Tempora engine configuration
#
# First transaction id handed out (ids below 3 are reserved)
first_normal_xid = 3

# Maximum nesting of SPI connections (auxiliary SQL issued from hooks
# and functions that itself runs hooks and functions)
max_spi_depth = 8
"#
    }

    /// Parse and validate config text.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: EngineConfig = toml::from_str(content)
            .map_err(|e| Error::config(format!("failed to parse engine config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse config from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!(
                "failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&content)
    }

    /// Write the default config file if it does not already exist.
    pub fn write_default_if_missing(path: &Path) -> Result<()> {
        if !path.exists() {
            std::fs::write(path, Self::default_toml())?;
        }
        Ok(())
    }
}
