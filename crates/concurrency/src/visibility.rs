//! Row-version visibility
//!
//! A version inserted by `xmin` and (possibly) deleted by `xmax` is visible
//! to a reader when:
//! - `xmin` is seen by the reader, and
//! - `xmax` is absent or not seen by the reader.
//!
//! A transaction is seen when it committed and the snapshot does not count
//! it as in progress. The reader's own transaction is always seen unless
//! the scan asked to hide its own writes.

use tempora_core::{ScanFlags, Snapshot, TxnId};

use crate::manager::{TransactionManager, TxnStatus};

/// Visibility test of one reader
#[derive(Debug, Clone, Copy)]
pub struct Visibility<'a> {
    manager: &'a TransactionManager,
    snapshot: &'a Snapshot,
    current: Option<TxnId>,
    flags: ScanFlags,
}

impl<'a> Visibility<'a> {
    /// Reader running in transaction `current` (if any) under `snapshot`
    pub fn new(
        manager: &'a TransactionManager,
        snapshot: &'a Snapshot,
        current: Option<TxnId>,
        flags: ScanFlags,
    ) -> Self {
        Visibility {
            manager,
            snapshot,
            current,
            flags,
        }
    }

    /// Whether the effects of `xid` are seen by this reader
    pub fn sees(&self, xid: TxnId) -> bool {
        if !xid.is_normal() {
            return self.manager.status(xid) == TxnStatus::Committed;
        }
        if self.current == Some(xid) && !self.flags.hide_own_writes {
            return true;
        }
        if self.snapshot.xid_in_progress(xid) {
            return false;
        }
        self.manager.status(xid) == TxnStatus::Committed
    }

    /// Whether a version with the given stamps is visible
    pub fn version_visible(&self, xmin: TxnId, xmax: Option<TxnId>) -> bool {
        self.sees(xmin) && !xmax.is_some_and(|deleter| self.sees(deleter))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn xid(raw: u32) -> TxnId {
        TxnId::new(raw)
    }

    /// Manager where 100, 110 and 125 committed and 121 aborted
    fn history() -> TransactionManager {
        let manager = TransactionManager::new(xid(100));
        for raw in 100..=130 {
            let t = manager.begin().unwrap();
            assert_eq!(t, xid(raw));
            if raw == 121 {
                manager.abort(t).unwrap();
            } else if raw != 130 {
                manager.commit(t).unwrap();
            }
        }
        manager
    }

    #[test]
    fn test_live_snapshot_sees_committed_below_xmax() {
        let manager = history();
        let live = Snapshot::bounds(xid(120), xid(130)).unwrap();
        let vis = Visibility::new(&manager, &live, None, ScanFlags::default());
        assert!(vis.sees(xid(100)));
        assert!(vis.sees(xid(110)));
        assert!(vis.sees(xid(125)));
        assert!(!vis.sees(xid(121)));
        assert!(!vis.sees(xid(130)));
    }

    #[test]
    fn test_pinned_snapshot_hides_later_transactions() {
        let manager = history();
        let past = Snapshot::at(xid(105));
        let vis = Visibility::new(&manager, &past, None, ScanFlags::default());
        assert!(vis.version_visible(xid(100), None));
        assert!(!vis.version_visible(xid(110), None));
        assert!(!vis.version_visible(xid(125), None));
    }

    #[test]
    fn test_deleted_version_visible_before_delete() {
        let manager = history();
        let live = Snapshot::bounds(xid(120), xid(130)).unwrap();
        let past = Snapshot::at(xid(105));

        let now = Visibility::new(&manager, &live, None, ScanFlags::default());
        let then = Visibility::new(&manager, &past, None, ScanFlags::default());
        assert!(!now.version_visible(xid(100), Some(xid(110))));
        assert!(then.version_visible(xid(100), Some(xid(110))));
        // aborted delete leaves the row in place
        assert!(now.version_visible(xid(100), Some(xid(121))));
    }

    #[test]
    fn test_own_writes() {
        let manager = history();
        let snap = manager.take_snapshot().unwrap();
        let own = xid(130);
        assert!(snap.xid_in_progress(own));

        let shown = Visibility::new(&manager, &snap, Some(own), ScanFlags::default());
        assert!(shown.version_visible(own, None));
        assert!(!shown.version_visible(xid(100), Some(own)));

        let hidden = Visibility::new(
            &manager,
            &snap,
            Some(own),
            ScanFlags {
                hide_own_writes: true,
            },
        );
        assert!(!hidden.version_visible(own, None));
    }

    #[test]
    fn test_frozen_rows_always_visible() {
        let manager = TransactionManager::default();
        let snap = Snapshot::at(TxnId::FIRST_NORMAL);
        let vis = Visibility::new(&manager, &snap, None, ScanFlags::default());
        assert!(vis.version_visible(TxnId::FROZEN, None));
        assert!(!vis.version_visible(TxnId::INVALID, None));
    }

    proptest! {
        #[test]
        fn prop_pinned_snapshot_sees_exactly_committed_below_boundary(boundary in 100u32..=131) {
            let manager = history();
            let snap = Snapshot::at(xid(boundary));
            let vis = Visibility::new(&manager, &snap, None, ScanFlags::default());
            for raw in 100u32..=130 {
                let expected = raw < boundary && raw != 121 && raw != 130;
                prop_assert_eq!(vis.sees(xid(raw)), expected);
            }
        }
    }
}
