//! Audit logging and time-travel scans for Tempora
//!
//! Loaded into a host engine, this module:
//! - appends one record to the audit table for every completed query
//!   (the snapshot bounds it ran under and its exact text)
//! - honours `snapshot(T)` in a query's projection by retargeting the
//!   query's table scans to boundary `T` before they produce a row
//! - provides `snapshot(table_name, T)` for reading one table as of `T`
//!
//! # Example
//!
//! ```ignore
//! let tt = TimeTravel::on_load(&backend, TimeTravelConfig::default())?;
//! backend.execute("SELECT snapshot(105) FROM orders")?;
//! let records = AuditLog::read_all(&backend)?;
//! tt.on_unload(&backend)?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod audit;
pub mod config;
pub mod marker;
pub mod registry;
pub mod rewriter;
pub mod scan;

pub use audit::{AuditLog, AuditLogger, AuditRecord};
pub use config::{TimeTravelConfig, CONFIG_FILE_NAME, DEFAULT_AUDIT_TABLE, DEFAULT_MARKER_FUNCTION};
pub use marker::{decode_boundary, MarkerScanner};
pub use registry::{Interceptor, InterceptorRegistry};
pub use rewriter::{RewriteScope, SnapshotRewriter};

use std::sync::Arc;

use tempora_core::{DataType, Datum, FunctionDef, Host, Result, ScalarFn, Spi};
use tracing::{info, warn};

/// Name the module claims in a host's hook slots while loaded
pub const MODULE_NAME: &str = "timetravel";

/// A loaded time-travel module
#[derive(Debug)]
pub struct TimeTravel {
    config: TimeTravelConfig,
    registry: InterceptorRegistry,
}

impl TimeTravel {
    /// Load the module into `host`
    ///
    /// Creates the audit table if configured to, registers the marker and
    /// the table function, and installs the executor hooks.
    ///
    /// Loading into a host that already has the module loaded does nothing:
    /// the returned handle is not installed and unloading it is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error for an invalid config, or when the host rejects
    /// the table creation or a function definition.
    pub fn on_load(host: &dyn Host, config: TimeTravelConfig) -> Result<TimeTravel> {
        config.validate()?;

        let registry = InterceptorRegistry::new();
        if !host.hooks().claim_module(MODULE_NAME) {
            warn!(target: "tempora::timetravel", "time-travel module already loaded");
            return Ok(TimeTravel { config, registry });
        }
        match Self::install(host, &config, &registry) {
            Ok(()) => Ok(TimeTravel { config, registry }),
            Err(e) => {
                host.hooks().release_module(MODULE_NAME);
                Err(e)
            }
        }
    }

    fn install(
        host: &dyn Host,
        config: &TimeTravelConfig,
        registry: &InterceptorRegistry,
    ) -> Result<()> {
        if config.audit_enabled && config.create_audit_table {
            let conn = host.connect()?;
            let ddl = format!(
                "CREATE TABLE IF NOT EXISTS {} (lower_bound integer, upper_bound integer, source_text text)",
                config.audit_table
            );
            host.execute(&conn, &ddl, false, 0)?;
        }

        let scanner = if config.time_travel_enabled {
            let identity: ScalarFn = Arc::new(|args: &[Datum]| -> Result<Datum> {
                Ok(args.first().cloned().unwrap_or(Datum::Null))
            });
            let marker = host.define_function(FunctionDef::scalar(
                config.marker_function.as_str(),
                vec![DataType::Integer],
                DataType::Integer,
                identity,
            ))?;
            host.define_function(scan::table_function(&config.marker_function))?;
            Some(MarkerScanner::new(marker))
        } else {
            None
        };

        let logger = config
            .audit_enabled
            .then(|| AuditLogger::new(config.audit_table.as_str()));
        let rewriter = SnapshotRewriter::new(config.rewrite_scope);
        let interceptor = Interceptor::new(scanner, rewriter, logger);

        registry.install(host, Arc::new(interceptor));
        info!(
            target: "tempora::timetravel",
            audit_table = %config.audit_table,
            audit = config.audit_enabled,
            time_travel = config.time_travel_enabled,
            scope = ?config.rewrite_scope,
            "time-travel module loaded"
        );
        Ok(())
    }

    /// Unload the module: uninstall the hooks and free the audit statement
    ///
    /// A no-op for a handle that did not install anything.
    pub fn on_unload(&self, host: &dyn Host) -> Result<()> {
        if !self.registry.is_installed() {
            return Ok(());
        }
        let result = self.registry.uninstall(host);
        host.hooks().release_module(MODULE_NAME);
        result?;
        info!(target: "tempora::timetravel", "time-travel module unloaded");
        Ok(())
    }

    /// Active configuration
    pub fn config(&self) -> &TimeTravelConfig {
        &self.config
    }

    /// The module's hook registry
    pub fn registry(&self) -> &InterceptorRegistry {
        &self.registry
    }
}
