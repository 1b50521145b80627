//! Scan retargeting
//!
//! Moves scan operators to a requested past boundary before they produce
//! anything. Only stored-table scans that have not begun are eligible: a
//! begun scan's snapshot is locked by the engine, and table-function scans
//! choose their own snapshot.
//!
//! # Scope
//!
//! | Scope       | Effect                                             |
//! |-------------|----------------------------------------------------|
//! | `AllScans`  | every eligible scan in the tree (default)          |
//! | `FirstScan` | the first eligible scan, root first, then children |

use serde::{Deserialize, Serialize};
use std::ops::ControlFlow;

use tempora_core::{ExecState, TxnId};
use tracing::debug;

/// Which scans a marker retargets
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RewriteScope {
    /// Every eligible scan
    #[default]
    #[serde(rename = "all")]
    AllScans,
    /// Only the first eligible scan in traversal order
    #[serde(rename = "first")]
    FirstScan,
}

/// Narrows scan snapshots to a boundary
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SnapshotRewriter {
    scope: RewriteScope,
}

impl SnapshotRewriter {
    /// Rewriter with the given scope
    pub fn new(scope: RewriteScope) -> Self {
        SnapshotRewriter { scope }
    }

    /// Configured scope
    pub fn scope(&self) -> RewriteScope {
        self.scope
    }

    /// Pin eligible scans of `estate` to `boundary`
    ///
    /// Returns the number of scans rewritten. When it is not zero the
    /// query-level snapshot is narrowed too, so it keeps describing the
    /// bounds the query actually reads under.
    pub fn rewrite(&self, boundary: TxnId, estate: &mut ExecState) -> usize {
        let mut rewritten = 0usize;
        let scope = self.scope;
        let _ = estate.root.walk_mut(&mut |node| -> ControlFlow<()> {
            let Some(snapshot) = node.as_scan_mut().and_then(|scan| scan.snapshot_mut()) else {
                return ControlFlow::Continue(());
            };
            snapshot.narrow_to(boundary);
            rewritten += 1;
            match scope {
                RewriteScope::FirstScan => ControlFlow::Break(()),
                RewriteScope::AllScans => ControlFlow::Continue(()),
            }
        });

        if rewritten == 0 {
            debug!(
                target: "tempora::timetravel",
                %boundary,
                "no eligible scan; snapshot left unchanged"
            );
            return 0;
        }
        estate.snapshot_mut().narrow_to(boundary);
        debug!(target: "tempora::timetravel", %boundary, scans = rewritten, "scans pinned");
        rewritten
    }
}
