//! Expression evaluation
//!
//! NULL handling follows SQL: arithmetic and comparisons with a NULL
//! operand yield NULL, `AND`/`OR` use three-valued logic, and a WHERE
//! clause keeps a tuple only when it evaluates to `true`.

use tempora_core::{BinaryOp, Datum, Error, Expr, FunctionBody, Result, UnaryOp};

use crate::catalog::FunctionCatalog;

/// What an expression may refer to while it is evaluated
#[derive(Debug, Clone, Copy)]
pub struct EvalContext<'a> {
    /// Input tuple of the plan node
    pub tuple: &'a [Datum],
    /// Bound statement parameters
    pub params: &'a [Datum],
    /// Function bodies
    pub functions: &'a FunctionCatalog,
}

/// Evaluate `expr`
pub fn eval(expr: &Expr, ctx: &EvalContext<'_>) -> Result<Datum> {
    match expr {
        Expr::Const(d) => Ok(d.clone()),
        Expr::Column { index, name } => ctx.tuple.get(*index).cloned().ok_or_else(|| {
            Error::internal(format!("column {} at {} outside input tuple", name, index))
        }),
        Expr::Param(i) => ctx
            .params
            .get(*i)
            .cloned()
            .ok_or_else(|| Error::invalid_input(format!("no value supplied for parameter ${}", i + 1))),
        Expr::FuncCall { func, name, args } => {
            let values = args
                .iter()
                .map(|a| eval(a, ctx))
                .collect::<Result<Vec<_>>>()?;
            match ctx.functions.get(*func)?.body {
                FunctionBody::Scalar { body, .. } => body(&values),
                FunctionBody::SetReturning { .. } => Err(Error::executor(format!(
                    "set-returning function {} called in scalar context",
                    name
                ))),
            }
        }
        Expr::Binary { op, left, right } => {
            let l = eval(left, ctx)?;
            match op {
                // short-circuit only when the left side decides the result
                BinaryOp::And if l == Datum::Bool(false) => Ok(l),
                BinaryOp::Or if l == Datum::Bool(true) => Ok(l),
                _ => binary(*op, l, eval(right, ctx)?),
            }
        }
        Expr::Unary { op, operand } => match (op, eval(operand, ctx)?) {
            (_, Datum::Null) => Ok(Datum::Null),
            (UnaryOp::Neg, Datum::Int(v)) => v
                .checked_neg()
                .map(Datum::Int)
                .ok_or_else(|| Error::invalid_input("integer out of range")),
            (UnaryOp::Not, Datum::Bool(b)) => Ok(Datum::Bool(!b)),
            (UnaryOp::Neg, other) => Err(Error::type_mismatch("integer", other.type_name())),
            (UnaryOp::Not, other) => Err(Error::type_mismatch("boolean", other.type_name())),
        },
        Expr::IsNull { operand, negated } => {
            let is_null = eval(operand, ctx)?.is_null();
            Ok(Datum::Bool(is_null != *negated))
        }
    }
}

/// Evaluate a filter: only `true` keeps the tuple
pub fn eval_qual(expr: &Expr, ctx: &EvalContext<'_>) -> Result<bool> {
    match eval(expr, ctx)? {
        Datum::Bool(b) => Ok(b),
        Datum::Null => Ok(false),
        other => Err(Error::type_mismatch("boolean", other.type_name())),
    }
}

fn binary(op: BinaryOp, l: Datum, r: Datum) -> Result<Datum> {
    match op {
        BinaryOp::And | BinaryOp::Or => logic(op, l, r),
        _ if l.is_null() || r.is_null() => Ok(Datum::Null),
        BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul => {
            let (a, b) = match (&l, &r) {
                (Datum::Int(a), Datum::Int(b)) => (*a, *b),
                _ => {
                    return Err(Error::type_mismatch(
                        "integer",
                        format!("{} and {}", l.type_name(), r.type_name()),
                    ))
                }
            };
            let result = match op {
                BinaryOp::Add => a.checked_add(b),
                BinaryOp::Sub => a.checked_sub(b),
                _ => a.checked_mul(b),
            };
            result
                .map(Datum::Int)
                .ok_or_else(|| Error::invalid_input("integer out of range"))
        }
        _ => {
            let ordering = match (&l, &r) {
                (Datum::Int(a), Datum::Int(b)) => a.cmp(b),
                (Datum::Text(a), Datum::Text(b)) => a.cmp(b),
                (Datum::Bool(a), Datum::Bool(b)) => a.cmp(b),
                _ => {
                    return Err(Error::type_mismatch(
                        l.type_name(),
                        r.type_name().to_string(),
                    ))
                }
            };
            let holds = match op {
                BinaryOp::Eq => ordering.is_eq(),
                BinaryOp::NotEq => ordering.is_ne(),
                BinaryOp::Lt => ordering.is_lt(),
                BinaryOp::LtEq => ordering.is_le(),
                BinaryOp::Gt => ordering.is_gt(),
                _ => ordering.is_ge(),
            };
            Ok(Datum::Bool(holds))
        }
    }
}

fn logic(op: BinaryOp, l: Datum, r: Datum) -> Result<Datum> {
    let as_bool = |d: &Datum| -> Result<Option<bool>> {
        match d {
            Datum::Bool(b) => Ok(Some(*b)),
            Datum::Null => Ok(None),
            other => Err(Error::type_mismatch("boolean", other.type_name())),
        }
    };
    let (a, b) = (as_bool(&l)?, as_bool(&r)?);
    let result = match op {
        BinaryOp::And => match (a, b) {
            (Some(false), _) | (_, Some(false)) => Some(false),
            (Some(true), Some(true)) => Some(true),
            _ => None,
        },
        _ => match (a, b) {
            (Some(true), _) | (_, Some(true)) => Some(true),
            (Some(false), Some(false)) => Some(false),
            _ => None,
        },
    };
    Ok(result.map_or(Datum::Null, Datum::Bool))
}
