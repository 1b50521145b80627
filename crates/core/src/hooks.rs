//! Executor interception chain
//!
//! The engine exposes one slot per lifecycle event. A module installs a
//! handler by swapping it into the slot and keeping whatever was there
//! before; its handler must call that previous handler (or the engine's
//! standard routine when there was none) exactly once. Handlers are
//! reference-counted so identity can be compared with `Arc::ptr_eq`.
//!
//! Modules loaded into the engine claim their name in the slots, so a
//! module can tell it is already chained in before installing again.
//!
//! The engine clones the current handler out of the slot before calling
//! it, so no lock is held while a handler runs and handlers may re-enter
//! the executor (for example through SPI).

use parking_lot::{Mutex, RwLock};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use crate::error::Result;
use crate::host::Host;
use crate::query::QueryDesc;

/// Flags passed to the start hook
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecutorFlags {
    /// Plan is only being described, no rows will be pulled
    pub explain_only: bool,
}

/// Handler run before the first row is produced
pub type ExecutorStartHook =
    Arc<dyn Fn(&dyn Host, &mut QueryDesc, ExecutorFlags) -> Result<()> + Send + Sync>;

/// Handler run after the last row was produced
pub type ExecutorEndHook = Arc<dyn Fn(&dyn Host, &mut QueryDesc) -> Result<()> + Send + Sync>;

/// The engine's hook slots
#[derive(Default)]
pub struct HookSlots {
    executor_start: RwLock<Option<ExecutorStartHook>>,
    executor_end: RwLock<Option<ExecutorEndHook>>,
    modules: Mutex<HashSet<String>>,
}

impl HookSlots {
    /// Empty slots
    pub fn new() -> Self {
        Self::default()
    }

    /// Currently installed start handler
    pub fn executor_start(&self) -> Option<ExecutorStartHook> {
        self.executor_start.read().clone()
    }

    /// Replace the start handler, returning the previous one
    pub fn set_executor_start(&self, hook: Option<ExecutorStartHook>) -> Option<ExecutorStartHook> {
        std::mem::replace(&mut *self.executor_start.write(), hook)
    }

    /// Currently installed end handler
    pub fn executor_end(&self) -> Option<ExecutorEndHook> {
        self.executor_end.read().clone()
    }

    /// Replace the end handler, returning the previous one
    pub fn set_executor_end(&self, hook: Option<ExecutorEndHook>) -> Option<ExecutorEndHook> {
        std::mem::replace(&mut *self.executor_end.write(), hook)
    }

    /// Mark module `name` as loaded; false if it already was
    pub fn claim_module(&self, name: &str) -> bool {
        self.modules.lock().insert(name.to_string())
    }

    /// Mark module `name` as unloaded; false if it was not loaded
    pub fn release_module(&self, name: &str) -> bool {
        self.modules.lock().remove(name)
    }

    /// Whether module `name` is loaded
    pub fn is_module_loaded(&self, name: &str) -> bool {
        self.modules.lock().contains(name)
    }
}

impl fmt::Debug for HookSlots {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookSlots")
            .field("executor_start", &self.executor_start.read().is_some())
            .field("executor_end", &self.executor_end.read().is_some())
            .finish()
    }
}
