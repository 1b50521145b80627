//! Database struct and session creation
//!
//! A [`Database`] owns everything shared between sessions:
//! - the transaction manager (xid allocation, commit log)
//! - the heap store (tables and their row versions)
//! - the function catalog
//!
//! Per-session state lives in [`Backend`](crate::Backend): the executor
//! hook slots, the SPI plan table, the current transaction and the stack
//! of active snapshots. Modules are loaded into a backend, not into the
//! database, so each session runs its own interception chain.

pub mod config;

pub use config::{EngineConfig, CONFIG_FILE_NAME};

use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use tempora_concurrency::TransactionManager;
use tempora_core::{Result, TxnId};
use tempora_storage::HeapStore;
use tracing::info;

use crate::backend::Backend;
use crate::catalog::FunctionCatalog;

// ============================================================================
// Database Struct
// ============================================================================

/// Shared state of one in-memory database
///
/// # Example
///
/// ```text
/// use tempora_engine::{Database, EngineConfig};
///
/// let db = Database::new(EngineConfig::default())?;
/// let session = db.connect();
/// session.execute("CREATE TABLE orders (id integer, item text)")?;
/// ```
pub struct Database {
    config: EngineConfig,

    /// Transaction ids and commit log
    txns: TransactionManager,

    /// Heap tables
    store: HeapStore,

    /// Scalar and set-returning functions
    functions: FunctionCatalog,

    /// Id of the next session
    next_backend_id: AtomicU32,
}

impl Database {
    /// Create an empty database
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(config: EngineConfig) -> Result<Arc<Database>> {
        config.validate()?;
        let txns = TransactionManager::new(TxnId::new(config.first_normal_xid));
        info!(
            target: "tempora::engine",
            first_xid = config.first_normal_xid,
            max_spi_depth = config.max_spi_depth,
            "database created"
        );
        Ok(Arc::new(Database {
            config,
            txns,
            store: HeapStore::new(),
            functions: FunctionCatalog::new(),
            next_backend_id: AtomicU32::new(1),
        }))
    }

    /// Create an empty database configured from a `tempora.toml` file
    pub fn from_config_file(path: &Path) -> Result<Arc<Database>> {
        Self::new(EngineConfig::from_file(path)?)
    }

    /// Open a new session
    pub fn connect(self: &Arc<Self>) -> Backend {
        let id = self.next_backend_id.fetch_add(1, Ordering::Relaxed);
        Backend::new(id, Arc::clone(self))
    }

    /// Engine configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Transaction manager
    pub fn transactions(&self) -> &TransactionManager {
        &self.txns
    }

    /// Heap store
    pub fn store(&self) -> &HeapStore {
        &self.store
    }

    /// Function catalog
    pub fn functions(&self) -> &FunctionCatalog {
        &self.functions
    }

    /// Make the next transaction id at least `xid`
    ///
    /// Used to lay out a transaction history with specific ids.
    pub fn advance_xid_to(&self, xid: TxnId) {
        self.txns.advance_to(xid);
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("config", &self.config)
            .field("txns", &self.txns)
            .field("tables", &self.store.table_names())
            .finish()
    }
}
