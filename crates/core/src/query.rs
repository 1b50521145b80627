//! Query descriptors

use std::sync::Arc;

use crate::exec::ExecState;
use crate::plan::PlannedStmt;
use crate::snapshot::Snapshot;
use crate::types::Datum;

/// Everything the executor and its hooks know about one query execution
///
/// Created by the engine right before the start hook chain runs, with the
/// execution-state tree already built. The standard end routine takes the
/// execution state away again.
#[derive(Debug)]
pub struct QueryDesc {
    /// Exact SQL text the query was issued with
    pub source_text: String,
    /// The plan being executed
    pub plan: Arc<PlannedStmt>,
    /// Bound parameter values
    pub params: Vec<Datum>,
    /// Snapshot the query was started with
    pub snapshot: Snapshot,
    /// Runtime state; `None` after the standard end routine ran
    pub estate: Option<ExecState>,
    /// Rows processed, recorded when the execution state is released
    pub processed: u64,
}

impl QueryDesc {
    /// Descriptor with a fresh execution-state tree for `plan`
    pub fn new(
        source_text: impl Into<String>,
        plan: Arc<PlannedStmt>,
        params: Vec<Datum>,
        snapshot: Snapshot,
    ) -> Self {
        let estate = ExecState::new(&plan.plan, snapshot.clone());
        QueryDesc {
            source_text: source_text.into(),
            plan,
            params,
            snapshot,
            estate: Some(estate),
            processed: 0,
        }
    }

    /// Snapshot the query's scans run under
    ///
    /// This is the execution state's snapshot while it exists, and the
    /// snapshot the query was started with otherwise.
    pub fn effective_snapshot(&self) -> &Snapshot {
        self.estate
            .as_ref()
            .map(|estate| estate.snapshot())
            .unwrap_or(&self.snapshot)
    }
}
