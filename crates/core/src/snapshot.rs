//! Visibility snapshots
//!
//! A snapshot decides which committed transactions a scan may observe.
//!
//! # Bounds
//!
//! - `xmin`: every transaction below it had finished when the snapshot was taken
//! - `xmax`: the first transaction id that had not been assigned yet
//! - `xip`: transactions in `[xmin, xmax)` that were still running
//!
//! A transaction is treated as "in progress" (its effects are invisible)
//! when its id is `>= xmax` or listed in `xip`. Commit status is tracked
//! elsewhere; a snapshot only answers the timing question.
//!
//! # Time travel
//!
//! [`Snapshot::narrow_to`] collapses both bounds onto one transaction id `T`
//! and clears the in-progress list: the result sees exactly the
//! transactions below `T` that committed, i.e. the database as of `T`.

use smallvec::SmallVec;
use std::fmt;

use crate::error::{Error, Result};
use crate::types::TxnId;

/// Transaction-visibility bounds of one query or scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    xmin: TxnId,
    xmax: TxnId,
    xip: SmallVec<[TxnId; 8]>,
}

impl Snapshot {
    /// Build a snapshot from its bounds and in-progress list
    ///
    /// # Errors
    ///
    /// Returns an error if `xmin > xmax` or an in-progress id lies outside
    /// `[xmin, xmax)`.
    pub fn new(
        xmin: TxnId,
        xmax: TxnId,
        in_progress: impl IntoIterator<Item = TxnId>,
    ) -> Result<Self> {
        if xmin > xmax {
            return Err(Error::invalid_input(format!(
                "snapshot lower bound {} exceeds upper bound {}",
                xmin, xmax
            )));
        }
        let mut xip: SmallVec<[TxnId; 8]> = in_progress.into_iter().collect();
        if let Some(bad) = xip.iter().find(|x| **x < xmin || **x >= xmax) {
            return Err(Error::invalid_input(format!(
                "in-progress transaction {} outside snapshot bounds [{}, {})",
                bad, xmin, xmax
            )));
        }
        xip.sort_unstable();
        xip.dedup();
        Ok(Snapshot { xmin, xmax, xip })
    }

    /// Snapshot with the given bounds and nothing in progress
    pub fn bounds(xmin: TxnId, xmax: TxnId) -> Result<Self> {
        Self::new(xmin, xmax, std::iter::empty())
    }

    /// Snapshot seeing exactly the transactions committed below `boundary`
    pub fn at(boundary: TxnId) -> Self {
        Snapshot {
            xmin: boundary,
            xmax: boundary,
            xip: SmallVec::new(),
        }
    }

    /// Lower bound
    pub fn xmin(&self) -> TxnId {
        self.xmin
    }

    /// Upper bound
    pub fn xmax(&self) -> TxnId {
        self.xmax
    }

    /// Transactions that were running when the snapshot was taken
    pub fn in_progress(&self) -> &[TxnId] {
        &self.xip
    }

    /// Collapse both bounds onto `boundary`
    pub fn narrow_to(&mut self, boundary: TxnId) {
        self.xmin = boundary;
        self.xmax = boundary;
        self.xip.clear();
    }

    /// Copy of this snapshot narrowed to `boundary`
    pub fn as_of(&self, boundary: TxnId) -> Snapshot {
        let mut copy = self.clone();
        copy.narrow_to(boundary);
        copy
    }

    /// True if both bounds equal `boundary` and nothing is in progress
    pub fn is_pinned_to(&self, boundary: TxnId) -> bool {
        self.xmin == boundary && self.xmax == boundary && self.xip.is_empty()
    }

    /// Whether `xid` counts as still running from this snapshot's view
    pub fn xid_in_progress(&self, xid: TxnId) -> bool {
        if xid < self.xmin {
            return false;
        }
        if xid >= self.xmax {
            return true;
        }
        self.xip.binary_search(&xid).is_ok()
    }
}

impl fmt::Display for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{},{}]", self.xmin, self.xmax)
    }
}
