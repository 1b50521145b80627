//! Interception registry
//!
//! Installs the module's executor handlers into a host's hook slots and
//! takes them out again. Installing remembers the handlers that were in
//! the slots before; the module's handlers delegate to them (or to the
//! host's standard routines when there were none) exactly once per call,
//! after doing their own work.
//!
//! ```text
//!   start slot:  ours ──► previous start ──► ... ──► standard start
//!   end slot:    ours ──► previous end   ──► ... ──► standard end
//! ```
//!
//! Uninstalling puts the remembered handlers back when the module's
//! handlers are still at the head of both slots. If another module has
//! chained on top since, the slots are left alone and the module's
//! handlers turn into plain pass-throughs, so the chain stays intact.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tempora_core::{
    ExecutorEndHook, ExecutorFlags, ExecutorStartHook, Host, QueryDesc, Result,
};
use tracing::{debug, info, warn};

use crate::audit::AuditLogger;
use crate::marker::MarkerScanner;
use crate::rewriter::SnapshotRewriter;

/// The module's per-query work
#[derive(Debug)]
pub struct Interceptor {
    scanner: Option<MarkerScanner>,
    rewriter: SnapshotRewriter,
    logger: Option<AuditLogger>,
    active: AtomicBool,
}

impl Interceptor {
    /// Interceptor doing time travel when `scanner` is set and auditing
    /// when `logger` is set
    pub fn new(
        scanner: Option<MarkerScanner>,
        rewriter: SnapshotRewriter,
        logger: Option<AuditLogger>,
    ) -> Self {
        Interceptor {
            scanner,
            rewriter,
            logger,
            active: AtomicBool::new(true),
        }
    }

    /// Audit logger, if auditing is enabled
    pub fn logger(&self) -> Option<&AuditLogger> {
        self.logger.as_ref()
    }

    /// False once the interceptor was deactivated by an uninstall
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    fn set_active(&self, active: bool) {
        self.active.store(active, Ordering::Release);
    }

    /// Work done before the query's first row: marker detection and
    /// scan retargeting
    ///
    /// Returns the number of scans retargeted.
    pub fn before_start(&self, qd: &mut QueryDesc) -> Result<usize> {
        if !self.is_active() {
            return Ok(0);
        }
        let Some(scanner) = &self.scanner else {
            return Ok(0);
        };
        let Some(boundary) = scanner.scan(qd.plan.target_list(), &qd.params)? else {
            return Ok(0);
        };
        debug!(
            target: "tempora::timetravel",
            %boundary,
            source_text = %qd.source_text,
            "snapshot marker found"
        );
        Ok(match qd.estate.as_mut() {
            Some(estate) => self.rewriter.rewrite(boundary, estate),
            None => 0,
        })
    }

    /// Work done after the query's last row: the audit record
    ///
    /// Returns whether a record was written.
    pub fn after_run(&self, host: &dyn Host, qd: &QueryDesc) -> Result<bool> {
        match &self.logger {
            Some(logger) if self.is_active() => logger.log(host, qd),
            _ => Ok(false),
        }
    }
}

/// Handlers of one installation
struct Installed {
    prev_start: Option<ExecutorStartHook>,
    prev_end: Option<ExecutorEndHook>,
    ours_start: ExecutorStartHook,
    ours_end: ExecutorEndHook,
    interceptor: Arc<Interceptor>,
}

/// Owns the module's place in a host's hook chain
#[derive(Default)]
pub struct InterceptorRegistry {
    installed: Mutex<Option<Installed>>,
}

impl InterceptorRegistry {
    /// Registry with nothing installed
    pub fn new() -> Self {
        Self::default()
    }

    /// True between `install` and `uninstall`
    pub fn is_installed(&self) -> bool {
        self.installed.lock().is_some()
    }

    /// The installed interceptor
    pub fn interceptor(&self) -> Option<Arc<Interceptor>> {
        self.installed
            .lock()
            .as_ref()
            .map(|installed| Arc::clone(&installed.interceptor))
    }

    /// Chain `interceptor` in front of the host's current handlers
    ///
    /// Returns false, changing nothing, if something is already installed.
    pub fn install(&self, host: &dyn Host, interceptor: Arc<Interceptor>) -> bool {
        let mut installed = self.installed.lock();
        if installed.is_some() {
            debug!(target: "tempora::timetravel", "already installed");
            return false;
        }
        let hooks = host.hooks();
        let prev_start = hooks.executor_start();
        let prev_end = hooks.executor_end();

        let start_prev = prev_start.clone();
        let start_interceptor = Arc::clone(&interceptor);
        let ours_start: ExecutorStartHook = Arc::new(
            move |host: &dyn Host, qd: &mut QueryDesc, flags: ExecutorFlags| -> Result<()> {
                start_interceptor.before_start(qd)?;
                match &start_prev {
                    Some(prev) => prev(host, qd, flags),
                    None => host.standard_executor_start(qd, flags),
                }
            },
        );

        let end_prev = prev_end.clone();
        let end_interceptor = Arc::clone(&interceptor);
        let ours_end: ExecutorEndHook =
            Arc::new(move |host: &dyn Host, qd: &mut QueryDesc| -> Result<()> {
                end_interceptor.after_run(host, qd)?;
                match &end_prev {
                    Some(prev) => prev(host, qd),
                    None => host.standard_executor_end(qd),
                }
            });

        hooks.set_executor_start(Some(Arc::clone(&ours_start)));
        hooks.set_executor_end(Some(Arc::clone(&ours_end)));
        info!(
            target: "tempora::timetravel",
            chained_start = prev_start.is_some(),
            chained_end = prev_end.is_some(),
            "executor hooks installed"
        );
        *installed = Some(Installed {
            prev_start,
            prev_end,
            ours_start,
            ours_end,
            interceptor,
        });
        true
    }

    /// Take the module's handlers out of the chain and release the cached
    /// audit statement
    ///
    /// A no-op when nothing is installed.
    ///
    /// # Errors
    ///
    /// Returns the host's error if freeing the cached statement fails.
    pub fn uninstall(&self, host: &dyn Host) -> Result<()> {
        let Some(installed) = self.installed.lock().take() else {
            return Ok(());
        };
        let hooks = host.hooks();
        let start_is_ours = hooks
            .executor_start()
            .is_some_and(|head| Arc::ptr_eq(&head, &installed.ours_start));
        let end_is_ours = hooks
            .executor_end()
            .is_some_and(|head| Arc::ptr_eq(&head, &installed.ours_end));

        if start_is_ours && end_is_ours {
            hooks.set_executor_start(installed.prev_start);
            hooks.set_executor_end(installed.prev_end);
            info!(target: "tempora::timetravel", "executor hooks uninstalled");
        } else {
            installed.interceptor.set_active(false);
            warn!(
                target: "tempora::timetravel",
                "executor hooks were chained over; leaving pass-through handlers in place"
            );
        }

        match installed.interceptor.logger() {
            Some(logger) => logger.release(host),
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for InterceptorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterceptorRegistry")
            .field("installed", &self.is_installed())
            .finish()
    }
}
