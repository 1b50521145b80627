//! Execution-state trees
//!
//! [`ExecState`] mirrors a [`Plan`] node for node and carries the runtime
//! state of one query: per-scan snapshots and cursors, join positions, the
//! count of processed rows. It is owned by the query descriptor for the
//! duration of one execution.
//!
//! # Snapshot access
//!
//! Every [`ScanState`] holds its own copy of the query snapshot. The copy
//! may be changed only until the scan begins: [`ScanState::snapshot_mut`]
//! returns `None` once the first row has been requested, so bounds stay
//! stable for the whole scan.

use std::collections::VecDeque;
use std::ops::ControlFlow;

use crate::host::ScanHandle;
use crate::plan::{Plan, PlanKind};
use crate::snapshot::Snapshot;
use crate::types::{Row, TableId};

/// Runtime state of a stored-table scan
#[derive(Debug, Clone)]
pub struct ScanState {
    table: TableId,
    rti: usize,
    snapshot: Snapshot,
    cursor: Option<ScanHandle>,
}

impl ScanState {
    /// A scan that has not begun yet
    pub fn new(table: TableId, rti: usize, snapshot: Snapshot) -> Self {
        ScanState {
            table,
            rti,
            snapshot,
            cursor: None,
        }
    }

    /// Scanned table
    pub fn table(&self) -> TableId {
        self.table
    }

    /// Range-table index of the scanned table
    pub fn rti(&self) -> usize {
        self.rti
    }

    /// Snapshot the scan uses (or will use)
    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    /// Mutable access to the snapshot, only before the scan has begun
    pub fn snapshot_mut(&mut self) -> Option<&mut Snapshot> {
        if self.cursor.is_some() {
            None
        } else {
            Some(&mut self.snapshot)
        }
    }

    /// True once the engine opened the scan cursor
    pub fn has_begun(&self) -> bool {
        self.cursor.is_some()
    }

    /// Install the cursor opened with this scan's snapshot
    pub fn begin(&mut self, cursor: ScanHandle) {
        self.cursor = Some(cursor);
    }

    /// The open cursor, if the scan has begun
    pub fn cursor_mut(&mut self) -> Option<&mut ScanHandle> {
        self.cursor.as_mut()
    }

    /// Drop the cursor; the next pull starts over under the same snapshot
    pub fn rescan(&mut self) {
        self.cursor = None;
    }
}

/// Runtime state of a table-function scan
#[derive(Debug, Clone, Default)]
pub struct FunctionScanState {
    /// Rows materialised by the first call, drained afterwards
    pub rows: Option<VecDeque<Row>>,
}

/// Per-operator runtime state
#[derive(Debug, Clone)]
pub enum PlanStateKind {
    /// Stored-table scan
    SeqScan(ScanState),
    /// Table-function scan
    FunctionScan(FunctionScanState),
    /// Nested loop, remembering the current outer tuple
    NestLoop {
        /// Outer tuple being joined
        outer: Option<Row>,
    },
    /// Single-tuple result
    Result {
        /// True once the tuple was emitted
        done: bool,
    },
    /// Insert
    Insert {
        /// True once the rows were written
        done: bool,
    },
    /// Delete
    Delete {
        /// True once the child was drained
        done: bool,
    },
}

/// Runtime node mirroring one plan node
#[derive(Debug, Clone)]
pub struct PlanState {
    /// State of this operator
    pub kind: PlanStateKind,
    /// States of the plan node's children, in the same order
    pub children: Vec<PlanState>,
}

impl PlanState {
    /// Build the state tree for `plan`, giving each scan a copy of `snapshot`
    pub fn init(plan: &Plan, snapshot: &Snapshot) -> PlanState {
        let kind = match &plan.kind {
            PlanKind::SeqScan { table, rti } => {
                PlanStateKind::SeqScan(ScanState::new(*table, *rti, snapshot.clone()))
            }
            PlanKind::FunctionScan { .. } => {
                PlanStateKind::FunctionScan(FunctionScanState::default())
            }
            PlanKind::NestLoop => PlanStateKind::NestLoop { outer: None },
            PlanKind::Result => PlanStateKind::Result { done: false },
            PlanKind::Insert { .. } => PlanStateKind::Insert { done: false },
            PlanKind::Delete { .. } => PlanStateKind::Delete { done: false },
        };
        let children = plan
            .children
            .iter()
            .map(|child| PlanState::init(child, snapshot))
            .collect();
        PlanState { kind, children }
    }

    /// The scan state, if this node is a stored-table scan
    pub fn as_scan(&self) -> Option<&ScanState> {
        match &self.kind {
            PlanStateKind::SeqScan(scan) => Some(scan),
            _ => None,
        }
    }

    /// Mutable scan state, if this node is a stored-table scan
    pub fn as_scan_mut(&mut self) -> Option<&mut ScanState> {
        match &mut self.kind {
            PlanStateKind::SeqScan(scan) => Some(scan),
            _ => None,
        }
    }

    /// Reset this subtree so it produces its tuples again from the start
    ///
    /// Scan snapshots are kept as they are.
    pub fn rescan(&mut self) {
        match &mut self.kind {
            PlanStateKind::SeqScan(scan) => scan.rescan(),
            PlanStateKind::FunctionScan(fs) => fs.rows = None,
            PlanStateKind::NestLoop { outer } => *outer = None,
            PlanStateKind::Result { done }
            | PlanStateKind::Insert { done }
            | PlanStateKind::Delete { done } => *done = false,
        }
        for child in &mut self.children {
            child.rescan();
        }
    }

    /// Visit this node and then its descendants, depth-first
    pub fn walk_mut<B>(
        &mut self,
        visit: &mut impl FnMut(&mut PlanState) -> ControlFlow<B>,
    ) -> ControlFlow<B> {
        visit(self)?;
        for child in &mut self.children {
            child.walk_mut(visit)?;
        }
        ControlFlow::Continue(())
    }

    /// Read-only depth-first visit
    pub fn walk<B>(&self, visit: &mut impl FnMut(&PlanState) -> ControlFlow<B>) -> ControlFlow<B> {
        visit(self)?;
        for child in &self.children {
            child.walk(visit)?;
        }
        ControlFlow::Continue(())
    }
}

/// Runtime state of one query execution
#[derive(Debug, Clone)]
pub struct ExecState {
    snapshot: Snapshot,
    /// Root of the operator state tree
    pub root: PlanState,
    started: bool,
    /// Rows returned, inserted or deleted so far
    pub processed: u64,
}

impl ExecState {
    /// Build the state for `plan` running under `snapshot`
    pub fn new(plan: &Plan, snapshot: Snapshot) -> Self {
        let root = PlanState::init(plan, &snapshot);
        ExecState {
            snapshot,
            root,
            started: false,
            processed: 0,
        }
    }

    /// Query-level snapshot
    ///
    /// Starts equal to the snapshot every scan was given. Modules that
    /// retarget scans narrow it as well, so it always describes the bounds
    /// the query actually ran under.
    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    /// Mutable query-level snapshot
    pub fn snapshot_mut(&mut self) -> &mut Snapshot {
        &mut self.snapshot
    }

    /// True once the engine's standard start routine ran
    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Record that the standard start routine ran
    pub fn mark_started(&mut self) {
        self.started = true;
    }

    /// Snapshots of all stored-table scans, in depth-first order
    pub fn scan_snapshots(&self) -> Vec<Snapshot> {
        let mut out = Vec::new();
        let _ = self.root.walk(&mut |node| -> ControlFlow<()> {
            if let Some(scan) = node.as_scan() {
                out.push(scan.snapshot().clone());
            }
            ControlFlow::Continue(())
        });
        out
    }
}
