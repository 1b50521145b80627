//! Expression trees
//!
//! Expressions are produced by the planner and are read-only afterwards.
//! [`Expr::walk`] is the generic pre-order visitor every tree search goes
//! through: the visitor sees a node before its children and can stop the
//! walk early by returning `ControlFlow::Break`.

use std::ops::ControlFlow;

use crate::types::{Datum, FunctionId};

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `=`
    Eq,
    /// `<>`
    NotEq,
    /// `<`
    Lt,
    /// `<=`
    LtEq,
    /// `>`
    Gt,
    /// `>=`
    GtEq,
    /// `AND`
    And,
    /// `OR`
    Or,
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// Arithmetic negation
    Neg,
    /// Logical negation
    Not,
}

/// An expression node
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Literal value
    Const(Datum),
    /// Reference to a column of the node's input tuple
    Column {
        /// Position in the input tuple
        index: usize,
        /// Column name, for display
        name: String,
    },
    /// Statement parameter `$n` (zero-based here)
    Param(usize),
    /// Scalar function call
    FuncCall {
        /// Resolved callee
        func: FunctionId,
        /// Callee name, for display
        name: String,
        /// Arguments in call order
        args: Vec<Expr>,
    },
    /// Binary operation
    Binary {
        /// Operator
        op: BinaryOp,
        /// Left operand
        left: Box<Expr>,
        /// Right operand
        right: Box<Expr>,
    },
    /// Unary operation
    Unary {
        /// Operator
        op: UnaryOp,
        /// Operand
        operand: Box<Expr>,
    },
    /// `expr IS [NOT] NULL`
    IsNull {
        /// Tested expression
        operand: Box<Expr>,
        /// True for `IS NOT NULL`
        negated: bool,
    },
}

impl Expr {
    /// Integer literal
    pub fn int(v: i64) -> Expr {
        Expr::Const(Datum::Int(v))
    }

    /// Text literal
    pub fn text(s: impl Into<String>) -> Expr {
        Expr::Const(Datum::Text(s.into()))
    }

    /// Function call node
    pub fn call(func: FunctionId, name: impl Into<String>, args: Vec<Expr>) -> Expr {
        Expr::FuncCall {
            func,
            name: name.into(),
            args,
        }
    }

    /// Binary operation node
    pub fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
        Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Visit this node and then every descendant, depth-first, left to right
    ///
    /// The walk stops at the first `Break` and returns it.
    pub fn walk<B>(&self, visit: &mut impl FnMut(&Expr) -> ControlFlow<B>) -> ControlFlow<B> {
        visit(self)?;
        match self {
            Expr::Const(_) | Expr::Column { .. } | Expr::Param(_) => ControlFlow::Continue(()),
            Expr::FuncCall { args, .. } => {
                for arg in args {
                    arg.walk(visit)?;
                }
                ControlFlow::Continue(())
            }
            Expr::Binary { left, right, .. } => {
                left.walk(visit)?;
                right.walk(visit)
            }
            Expr::Unary { operand, .. } | Expr::IsNull { operand, .. } => operand.walk(visit),
        }
    }

    /// Number of nodes in the tree
    pub fn node_count(&self) -> usize {
        let mut count = 0usize;
        let _ = self.walk(&mut |_| -> ControlFlow<()> {
            count += 1;
            ControlFlow::Continue(())
        });
        count
    }
}

/// One output column of a plan node
#[derive(Debug, Clone, PartialEq)]
pub struct TargetEntry {
    /// Expression producing the value
    pub expr: Expr,
    /// Output column name
    pub name: String,
}

impl TargetEntry {
    /// Create a target entry
    pub fn new(expr: Expr, name: impl Into<String>) -> Self {
        TargetEntry {
            expr,
            name: name.into(),
        }
    }
}
