//! Tuple-at-a-time executor
//!
//! Walks a [`Plan`] and its [`PlanState`] mirror in lockstep. Every node
//! produces tuples on demand, filters them with its qual and projects them
//! through its target list. Stored-table scans open their cursor on the
//! first pull, with the snapshot their [`ScanState`] holds at that moment,
//! so anything a start hook changed before the first row takes effect.
//!
//! [`ScanState`]: tempora_core::ScanState

use std::collections::VecDeque;

use tempora_concurrency::TxnStatus;
use tempora_core::{
    Datum, Error, FunctionBody, LockMode, Plan, PlanKind, PlanState, PlanStateKind, PlannedStmt,
    QueryDesc, Result, Row, ScanDirection, ScanFlags, TableAccess, TableId,
};
use tracing::trace;

use crate::backend::Backend;
use crate::eval::{eval, eval_qual, EvalContext};

/// What every node of one execution can see
struct Exec<'a> {
    backend: &'a Backend,
    params: &'a [Datum],
}

impl Exec<'_> {
    fn context<'t>(&'t self, tuple: &'t [Datum]) -> EvalContext<'t> {
        EvalContext {
            tuple,
            params: self.params,
            functions: self.backend.database().functions(),
        }
    }
}

/// Run a started query to completion (or until `row_limit` rows)
pub(crate) fn run(backend: &Backend, qd: &mut QueryDesc, row_limit: usize) -> Result<Vec<Row>> {
    let QueryDesc {
        plan,
        params,
        estate,
        ..
    } = qd;
    let estate = estate
        .as_mut()
        .ok_or_else(|| Error::executor("query has no execution state"))?;
    let stmt: &PlannedStmt = plan;
    let exec = Exec {
        backend,
        params: params.as_slice(),
    };
    let root = &stmt.plan;

    match &root.kind {
        PlanKind::Insert { table, rows } => {
            let count = insert(&exec, *table, rows)?;
            estate.processed += count;
            if let PlanStateKind::Insert { done } = &mut estate.root.kind {
                *done = true;
            }
            Ok(Vec::new())
        }
        PlanKind::Delete { table } => {
            let count = delete(&exec, *table, root, &mut estate.root)?;
            estate.processed += count;
            Ok(Vec::new())
        }
        _ => {
            let mut out = Vec::new();
            while row_limit == 0 || out.len() < row_limit {
                match exec_node(&exec, root, &mut estate.root)? {
                    Some(row) => {
                        estate.processed += 1;
                        out.push(row);
                    }
                    None => break,
                }
            }
            Ok(out)
        }
    }
}

/// Next tuple of `plan` that passes its qual, projected
fn exec_node(exec: &Exec<'_>, plan: &Plan, state: &mut PlanState) -> Result<Option<Row>> {
    loop {
        let Some(tuple) = produce(exec, plan, state)? else {
            return Ok(None);
        };
        if let Some(qual) = &plan.qual {
            if !eval_qual(qual, &exec.context(&tuple))? {
                continue;
            }
        }
        if plan.target_list.is_empty() {
            return Ok(Some(tuple));
        }
        let ctx = exec.context(&tuple);
        let projected = plan
            .target_list
            .iter()
            .map(|te| eval(&te.expr, &ctx))
            .collect::<Result<Row>>()?;
        return Ok(Some(projected));
    }
}

/// Next raw tuple of `plan`, before qual and projection
fn produce(exec: &Exec<'_>, plan: &Plan, state: &mut PlanState) -> Result<Option<Row>> {
    let PlanState { kind, children } = state;
    match (&plan.kind, kind) {
        (PlanKind::SeqScan { table, .. }, PlanStateKind::SeqScan(scan)) => {
            if !scan.has_begun() {
                let handle = exec.backend.table_handle(*table, LockMode::AccessShare)?;
                let cursor =
                    exec.backend
                        .begin_scan(&handle, scan.snapshot().clone(), ScanFlags::default())?;
                scan.begin(cursor);
            }
            let cursor = scan
                .cursor_mut()
                .ok_or_else(|| Error::internal("scan has no cursor"))?;
            exec.backend.next_row(cursor, ScanDirection::Forward)
        }
        (PlanKind::FunctionScan { func, args, .. }, PlanStateKind::FunctionScan(fs)) => {
            if fs.rows.is_none() {
                let ctx = exec.context(&[]);
                let values = args
                    .iter()
                    .map(|a| eval(a, &ctx))
                    .collect::<Result<Vec<_>>>()?;
                let def = exec.backend.database().functions().get(*func)?;
                let rows = match def.body {
                    FunctionBody::SetReturning { body, .. } => body(exec.backend, &values)?,
                    FunctionBody::Scalar { .. } => {
                        return Err(Error::executor(format!(
                            "function {} does not return a set",
                            def.name
                        )))
                    }
                };
                trace!(target: "tempora::engine", function = %def.name, rows = rows.len(), "function scan materialized");
                fs.rows = Some(VecDeque::from(rows));
            }
            Ok(fs.rows.as_mut().and_then(VecDeque::pop_front))
        }
        (PlanKind::NestLoop, PlanStateKind::NestLoop { outer }) => {
            let [outer_state, inner_state] = children.as_mut_slice() else {
                return Err(Error::internal("nested loop needs exactly two inputs"));
            };
            let (outer_plan, inner_plan) = match plan.children.as_slice() {
                [o, i] => (o, i),
                _ => return Err(Error::internal("nested loop needs exactly two inputs")),
            };
            loop {
                if outer.is_none() {
                    match exec_node(exec, outer_plan, outer_state)? {
                        Some(row) => {
                            *outer = Some(row);
                            inner_state.rescan();
                        }
                        None => return Ok(None),
                    }
                }
                match exec_node(exec, inner_plan, inner_state)? {
                    Some(inner_row) => {
                        let mut joined = outer.clone().unwrap_or_default();
                        joined.extend(inner_row);
                        return Ok(Some(joined));
                    }
                    None => *outer = None,
                }
            }
        }
        (PlanKind::Result, PlanStateKind::Result { done }) => {
            if *done {
                Ok(None)
            } else {
                *done = true;
                Ok(Some(Vec::new()))
            }
        }
        (kind, _) => Err(Error::internal(format!(
            "plan node {:?} does not match its execution state",
            kind
        ))),
    }
}

fn insert(exec: &Exec<'_>, table: TableId, rows: &[Vec<tempora_core::Expr>]) -> Result<u64> {
    let heap = exec
        .backend
        .database()
        .store()
        .get(table)
        .ok_or_else(|| Error::internal(format!("table {} vanished", table)))?;
    let ctx = exec.context(&[]);
    let values = rows
        .iter()
        .map(|row| row.iter().map(|e| eval(e, &ctx)).collect::<Result<Row>>())
        .collect::<Result<Vec<_>>>()?;
    let xid = exec.backend.assign_xid()?;
    for row in values {
        heap.insert(xid, row)?;
    }
    Ok(rows.len() as u64)
}

fn delete(exec: &Exec<'_>, table: TableId, plan: &Plan, state: &mut PlanState) -> Result<u64> {
    let heap = exec
        .backend
        .database()
        .store()
        .get(table)
        .ok_or_else(|| Error::internal(format!("table {} vanished", table)))?;
    let (Some(child_plan), Some(child_state)) = (plan.children.first(), state.children.first_mut())
    else {
        return Err(Error::internal("delete needs a scan input"));
    };
    let xid = exec.backend.assign_xid()?;
    let txns = exec.backend.database().transactions();
    let mut count = 0u64;
    while exec_node(exec, child_plan, child_state)?.is_some() {
        let position = child_state
            .as_scan_mut()
            .and_then(|scan| scan.cursor_mut())
            .and_then(|cursor| cursor.position())
            .ok_or_else(|| Error::internal("delete input is not a table scan"))?;
        let version = heap
            .version_at(position)
            .ok_or_else(|| Error::internal(format!("no row version at {}", position)))?;
        if let Some(deleter) = version.xmax.filter(|d| *d != xid) {
            match txns.status(deleter) {
                TxnStatus::InProgress => {
                    return Err(Error::Transaction(format!(
                        "row is being deleted by concurrent transaction {}",
                        deleter
                    )))
                }
                TxnStatus::Committed => {
                    return Err(Error::Transaction(
                        "could not serialize access due to concurrent delete".into(),
                    ))
                }
                TxnStatus::Aborted => {}
            }
        }
        heap.mark_deleted(position, xid)?;
        count += 1;
    }
    if let PlanStateKind::Delete { done } = &mut state.kind {
        *done = true;
    }
    Ok(count)
}

/// Describe the plan, one line per node, with the snapshot each scan runs under
pub(crate) fn explain(qd: &QueryDesc) -> Vec<Row> {
    let mut lines = Vec::new();
    match &qd.estate {
        Some(estate) => describe(&qd.plan, &qd.plan.plan, Some(&estate.root), 0, &mut lines),
        None => describe(&qd.plan, &qd.plan.plan, None, 0, &mut lines),
    }
    lines
        .into_iter()
        .map(|line| vec![Datum::Text(line)])
        .collect()
}

fn describe(
    stmt: &PlannedStmt,
    plan: &Plan,
    state: Option<&PlanState>,
    depth: usize,
    out: &mut Vec<String>,
) {
    let entry_name = |rti: usize| -> String {
        match stmt.range_table.get(rti) {
            Some(rte) if rte.alias != rte.name => format!("{} {}", rte.name, rte.alias),
            Some(rte) => rte.name.clone(),
            None => "?".to_string(),
        }
    };
    let label = match &plan.kind {
        PlanKind::SeqScan { rti, .. } => {
            let snapshot = state
                .and_then(PlanState::as_scan)
                .map(|scan| format!(" {}", scan.snapshot()))
                .unwrap_or_default();
            format!("Seq Scan on {}{}", entry_name(*rti), snapshot)
        }
        PlanKind::FunctionScan { rti, .. } => format!("Function Scan on {}", entry_name(*rti)),
        PlanKind::NestLoop => "Nested Loop".to_string(),
        PlanKind::Result => "Result".to_string(),
        PlanKind::Insert { .. } => format!("Insert on {}", entry_name(0)),
        PlanKind::Delete { .. } => format!("Delete on {}", entry_name(0)),
    };
    let indent = if depth == 0 {
        String::new()
    } else {
        format!("{}->  ", "  ".repeat(depth))
    };
    out.push(format!("{}{}", indent, label));
    if plan.qual.is_some() {
        out.push(format!("{}  Filter", " ".repeat(indent.len())));
    }
    for (i, child) in plan.children.iter().enumerate() {
        let child_state = state.and_then(|s| s.children.get(i));
        describe(stmt, child, child_state, depth + 1, out);
    }
}
