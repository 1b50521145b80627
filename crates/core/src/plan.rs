//! Plan trees
//!
//! A [`PlannedStmt`] is what the planner hands to the executor. It is
//! shared read-only (`Arc`) between the query descriptor, the SPI plan
//! cache and any hooks inspecting it.
//!
//! Every [`Plan`] node produces tuples. Leaf scans emit whole table rows,
//! joins concatenate their children's tuples, and a node with a non-empty
//! target list projects its input through it after applying its qual.

use std::ops::ControlFlow;

use crate::expr::{Expr, TargetEntry};
use crate::types::{DataType, FunctionId, TableId};

/// Statement kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmdType {
    /// `SELECT`
    Select,
    /// `INSERT`
    Insert,
    /// `DELETE`
    Delete,
}

/// What a range-table entry refers to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RteKind {
    /// A stored table
    Relation(TableId),
    /// A set-returning function in FROM
    Function(FunctionId),
}

/// One entry of the statement's range table
///
/// The first entry is the statement's primary target: the table read by a
/// single-table `SELECT`, or the table written by `INSERT`/`DELETE`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeTblEntry {
    /// Referenced object
    pub kind: RteKind,
    /// Catalog name of the table or function
    pub name: String,
    /// Alias the query used for it (equal to `name` when none was given)
    pub alias: String,
}

impl RangeTblEntry {
    /// Entry for a stored table
    pub fn relation(table: TableId, name: impl Into<String>, alias: Option<String>) -> Self {
        let name = name.into();
        RangeTblEntry {
            kind: RteKind::Relation(table),
            alias: alias.unwrap_or_else(|| name.clone()),
            name,
        }
    }

    /// Entry for a table function
    pub fn function(func: FunctionId, name: impl Into<String>, alias: Option<String>) -> Self {
        let name = name.into();
        RangeTblEntry {
            kind: RteKind::Function(func),
            alias: alias.unwrap_or_else(|| name.clone()),
            name,
        }
    }

    /// The table id, for relation entries
    pub fn table(&self) -> Option<TableId> {
        match self.kind {
            RteKind::Relation(id) => Some(id),
            RteKind::Function(_) => None,
        }
    }
}

/// Operator kind of a plan node
#[derive(Debug, Clone, PartialEq)]
pub enum PlanKind {
    /// Sequential scan of a stored table
    SeqScan {
        /// Scanned table
        table: TableId,
        /// Index into the range table
        rti: usize,
    },
    /// Rows produced by a set-returning function
    FunctionScan {
        /// The table function
        func: FunctionId,
        /// Call arguments (constants or parameters)
        args: Vec<Expr>,
        /// Index into the range table
        rti: usize,
    },
    /// Nested-loop cross product of exactly two children
    NestLoop,
    /// A single empty input tuple (`SELECT` without `FROM`)
    Result,
    /// Insert literal rows
    Insert {
        /// Target table
        table: TableId,
        /// Rows to insert, one expression per column
        rows: Vec<Vec<Expr>>,
    },
    /// Delete every tuple produced by the single child scan
    Delete {
        /// Target table
        table: TableId,
    },
}

/// A plan node
#[derive(Debug, Clone, PartialEq)]
pub struct Plan {
    /// Operator kind
    pub kind: PlanKind,
    /// Output projection; empty means pass the input tuple through
    pub target_list: Vec<TargetEntry>,
    /// Filter applied before projection
    pub qual: Option<Expr>,
    /// Input nodes
    pub children: Vec<Plan>,
}

impl Plan {
    /// Node without children, projection or filter
    pub fn leaf(kind: PlanKind) -> Plan {
        Plan {
            kind,
            target_list: Vec::new(),
            qual: None,
            children: Vec::new(),
        }
    }

    /// Node over the given children
    pub fn with_children(kind: PlanKind, children: Vec<Plan>) -> Plan {
        Plan {
            kind,
            target_list: Vec::new(),
            qual: None,
            children,
        }
    }

    /// Visit this node and every descendant, depth-first
    pub fn walk<B>(&self, visit: &mut impl FnMut(&Plan) -> ControlFlow<B>) -> ControlFlow<B> {
        visit(self)?;
        for child in &self.children {
            child.walk(visit)?;
        }
        ControlFlow::Continue(())
    }
}

/// A fully planned statement
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedStmt {
    /// Statement kind
    pub command: CmdType,
    /// Root of the plan tree
    pub plan: Plan,
    /// Tables and functions referenced by the statement
    pub range_table: Vec<RangeTblEntry>,
    /// Types of `$1..$n`
    pub param_types: Vec<DataType>,
    /// Names of the result columns
    pub output_columns: Vec<String>,
}

impl PlannedStmt {
    /// The statement's primary target, if it references anything
    pub fn primary_relation(&self) -> Option<&RangeTblEntry> {
        self.range_table.first()
    }

    /// The top-level projection
    pub fn target_list(&self) -> &[TargetEntry] {
        &self.plan.target_list
    }

    /// Number of scan nodes over stored tables
    pub fn scan_count(&self) -> usize {
        let mut count = 0usize;
        let _ = self.plan.walk(&mut |p| -> ControlFlow<()> {
            if matches!(p.kind, PlanKind::SeqScan { .. }) {
                count += 1;
            }
            ControlFlow::Continue(())
        });
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn join_stmt() -> PlannedStmt {
        let left = Plan::leaf(PlanKind::SeqScan {
            table: TableId(1),
            rti: 0,
        });
        let right = Plan::leaf(PlanKind::SeqScan {
            table: TableId(2),
            rti: 1,
        });
        PlannedStmt {
            command: CmdType::Select,
            plan: Plan::with_children(PlanKind::NestLoop, vec![left, right]),
            range_table: vec![
                RangeTblEntry::relation(TableId(1), "orders", Some("o".into())),
                RangeTblEntry::relation(TableId(2), "customers", None),
            ],
            param_types: Vec::new(),
            output_columns: Vec::new(),
        }
    }

    #[test]
    fn test_primary_relation_is_first_entry() {
        let stmt = join_stmt();
        let primary = stmt.primary_relation().unwrap();
        assert_eq!(primary.name, "orders");
        assert_eq!(primary.alias, "o");
        assert_eq!(primary.table(), Some(TableId(1)));
        assert_eq!(stmt.range_table[1].alias, "customers");
    }

    #[test]
    fn test_scan_count() {
        assert_eq!(join_stmt().scan_count(), 2);
    }
}
