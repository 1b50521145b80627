//! Transaction manager
//!
//! Allocates transaction ids and records their outcome in a commit log.
//!
//! ## Snapshot construction
//!
//! ```text
//! xmax = next id to be handed out
//! xip  = ids allocated but neither committed nor aborted
//! xmin = min(xip), or xmax when nothing is running
//! ```
//!
//! Allocation and snapshot construction both happen under the commit-log
//! lock, so a snapshot never sees an id below `xmax` that is missing from
//! both the log and `xip`.

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::sync::atomic::{AtomicU32, Ordering};

use tempora_core::{Error, Result, Snapshot, TxnId};

/// Outcome of a transaction as recorded in the commit log
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxnStatus {
    /// Still running
    InProgress,
    /// Committed; its writes are visible to later snapshots
    Committed,
    /// Rolled back; its writes are never visible
    Aborted,
}

/// Manages transaction ids and the commit log
pub struct TransactionManager {
    /// Next transaction id to hand out
    ///
    /// Only advanced while the commit-log write lock is held.
    next_xid: AtomicU32,

    /// Status of every transaction id handed out so far
    clog: RwLock<FxHashMap<TxnId, TxnStatus>>,
}

impl TransactionManager {
    /// Create a manager whose first transaction gets `first_xid`
    ///
    /// Ids below [`TxnId::FIRST_NORMAL`] are reserved, so a lower
    /// `first_xid` is raised to it.
    pub fn new(first_xid: TxnId) -> Self {
        let first = first_xid.max(TxnId::FIRST_NORMAL);
        TransactionManager {
            next_xid: AtomicU32::new(first.as_u32()),
            clog: RwLock::new(FxHashMap::default()),
        }
    }

    /// The id the next call to [`begin`](Self::begin) will return
    pub fn next_xid(&self) -> TxnId {
        TxnId::new(self.next_xid.load(Ordering::Acquire))
    }

    /// Start a transaction
    ///
    /// # Errors
    ///
    /// Returns an error when the id space is exhausted.
    pub fn begin(&self) -> Result<TxnId> {
        let mut clog = self.clog.write();
        let xid = self.next_xid();
        let following = xid.next()?;
        self.next_xid.store(following.as_u32(), Ordering::Release);
        clog.insert(xid, TxnStatus::InProgress);
        tracing::trace!(target: "tempora::txn", %xid, "transaction started");
        Ok(xid)
    }

    /// Commit a running transaction
    pub fn commit(&self, xid: TxnId) -> Result<()> {
        self.finish(xid, TxnStatus::Committed)
    }

    /// Roll back a running transaction
    pub fn abort(&self, xid: TxnId) -> Result<()> {
        self.finish(xid, TxnStatus::Aborted)
    }

    fn finish(&self, xid: TxnId, outcome: TxnStatus) -> Result<()> {
        let mut clog = self.clog.write();
        let status = clog
            .get_mut(&xid)
            .ok_or_else(|| Error::Transaction(format!("transaction {} is unknown", xid)))?;
        if *status != TxnStatus::InProgress {
            return Err(Error::Transaction(format!(
                "transaction {} already {:?}",
                xid, status
            )));
        }
        *status = outcome;
        tracing::trace!(target: "tempora::txn", %xid, ?outcome, "transaction finished");
        Ok(())
    }

    /// Status of `xid`
    ///
    /// Reserved ids count as committed. Ids never handed out count as
    /// aborted: nothing can have been written under them.
    pub fn status(&self, xid: TxnId) -> TxnStatus {
        if !xid.is_normal() {
            return if xid == TxnId::INVALID {
                TxnStatus::Aborted
            } else {
                TxnStatus::Committed
            };
        }
        self.clog
            .read()
            .get(&xid)
            .copied()
            .unwrap_or(TxnStatus::Aborted)
    }

    /// Ids of the transactions currently running, ascending
    pub fn running(&self) -> Vec<TxnId> {
        let clog = self.clog.read();
        let mut running: Vec<TxnId> = clog
            .iter()
            .filter(|(_, status)| **status == TxnStatus::InProgress)
            .map(|(xid, _)| *xid)
            .collect();
        running.sort_unstable();
        running
    }

    /// Snapshot of the transactions committed right now
    pub fn take_snapshot(&self) -> Result<Snapshot> {
        let clog = self.clog.read();
        let xmax = self.next_xid();
        let running: Vec<TxnId> = clog
            .iter()
            .filter(|(_, status)| **status == TxnStatus::InProgress)
            .map(|(xid, _)| *xid)
            .collect();
        let xmin = running.iter().copied().min().unwrap_or(xmax);
        Snapshot::new(xmin, xmax, running)
    }

    /// Move the id counter forward so the next transaction gets at least `xid`
    ///
    /// Never moves the counter backwards.
    pub fn advance_to(&self, xid: TxnId) {
        let _clog = self.clog.write();
        self.next_xid.fetch_max(xid.as_u32(), Ordering::AcqRel);
    }
}

impl Default for TransactionManager {
    fn default() -> Self {
        Self::new(TxnId::FIRST_NORMAL)
    }
}

impl std::fmt::Debug for TransactionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionManager")
            .field("next_xid", &self.next_xid())
            .field("running", &self.running())
            .finish()
    }
}
