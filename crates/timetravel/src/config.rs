//! Module configuration via `timetravel.toml`

use serde::{Deserialize, Serialize};
use std::path::Path;

use tempora_core::{Error, Result};
use tracing::warn;

use crate::rewriter::RewriteScope;

/// Config file name looked up next to the engine's own config.
pub const CONFIG_FILE_NAME: &str = "timetravel.toml";

/// Default name of the audit table.
pub const DEFAULT_AUDIT_TABLE: &str = "audit_log";

/// Default name of the marker function.
pub const DEFAULT_MARKER_FUNCTION: &str = "snapshot";

/// Time-travel module configuration.
///
/// # Example
///
/// ```toml
/// audit_table = "audit_log"
/// marker_function = "snapshot"
/// rewrite_scope = "all"
/// audit_enabled = true
/// time_travel_enabled = true
/// create_audit_table = true
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimeTravelConfig {
    /// Table audit records are appended to.
    #[serde(default = "default_audit_table")]
    pub audit_table: String,
    /// Name of the marker function (and of the snapshot table function).
    #[serde(default = "default_marker_function")]
    pub marker_function: String,
    /// Which scans a marker retargets.
    #[serde(default)]
    pub rewrite_scope: RewriteScope,
    /// Append an audit record for every completed query.
    #[serde(default = "default_true")]
    pub audit_enabled: bool,
    /// Register the marker and honour it.
    #[serde(default = "default_true")]
    pub time_travel_enabled: bool,
    /// Create the audit table at load if it does not exist.
    #[serde(default = "default_true")]
    pub create_audit_table: bool,
}

fn default_audit_table() -> String {
    DEFAULT_AUDIT_TABLE.to_string()
}

fn default_marker_function() -> String {
    DEFAULT_MARKER_FUNCTION.to_string()
}

fn default_true() -> bool {
    true
}

impl Default for TimeTravelConfig {
    fn default() -> Self {
        Self {
            audit_table: default_audit_table(),
            marker_function: default_marker_function(),
            rewrite_scope: RewriteScope::default(),
            audit_enabled: true,
            time_travel_enabled: true,
            create_audit_table: true,
        }
    }
}

/// `name` or `schema.name`, each part a plain lower-case identifier
pub(crate) fn is_plain_name(name: &str) -> bool {
    let parts: Vec<&str> = name.split('.').collect();
    parts.len() <= 2
        && parts.iter().all(|part| {
            let mut chars = part.chars();
            matches!(chars.next(), Some(c) if c.is_ascii_lowercase() || c == '_')
                && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        })
}

impl TimeTravelConfig {
    /// Check names and warn about settings that have no effect.
    ///
    /// # Errors
    ///
    /// Returns an error if the audit table or marker function name is not
    /// a plain lower-case identifier.
    pub fn validate(&self) -> Result<()> {
        if !is_plain_name(&self.audit_table) {
            return Err(Error::config(format!(
                "audit_table '{}' is not a plain lower-case table name",
                self.audit_table
            )));
        }
        if self.marker_function.contains('.') || !is_plain_name(&self.marker_function) {
            return Err(Error::config(format!(
                "marker_function '{}' is not a plain lower-case function name",
                self.marker_function
            )));
        }
        if self.create_audit_table && !self.audit_enabled {
            warn!(
                target: "tempora::timetravel",
                "create_audit_table is ignored while audit_enabled = false"
            );
        }
        Ok(())
    }

    /// Audit table name without a `public.` prefix.
    pub fn audit_relation(&self) -> &str {
        self.audit_table
            .strip_prefix("public.")
            .unwrap_or(&self.audit_table)
    }

    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# Tempora time-travel module configuration
#
# Table every completed query is recorded in
audit_table = "audit_log"

# Marker function: SELECT snapshot(105) FROM orders reads orders as of 105
marker_function = "snapshot"

# Which scans a marker retargets: "all" or "first"
rewrite_scope = "all"

audit_enabled = true
time_travel_enabled = true

# Create the audit table when the module loads
create_audit_table = true
"#
    }

    /// Parse and validate config text.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: TimeTravelConfig = toml::from_str(content)
            .map_err(|e| Error::config(format!("failed to parse time-travel config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse config from a file path.
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
}
