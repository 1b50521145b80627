//! Marker detection
//!
//! A query asks for time travel by calling the marker function in its
//! projection: `SELECT snapshot(105) FROM orders`. At the SQL level the
//! marker is the identity function, so the query computes the same values
//! whether or not anything acts on it.
//!
//! The scanner walks the target list depth-first, left to right, and stops
//! at the first call to the marker whose single argument is a constant (or
//! a bound parameter). Calls with any other argument shape are not markers.

use std::ops::ControlFlow;

use tempora_core::{Datum, Error, Expr, FunctionId, Result, TargetEntry, TxnId};

/// Finds marker calls in projection trees
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarkerScanner {
    marker: FunctionId,
}

impl MarkerScanner {
    /// Scanner for calls to the function `marker`
    pub fn new(marker: FunctionId) -> Self {
        MarkerScanner { marker }
    }

    /// Identity of the marker function
    pub fn marker(&self) -> FunctionId {
        self.marker
    }

    /// Requested boundary of the first marker in `targets`
    ///
    /// `params` are the query's bound parameter values; a marker whose
    /// argument is a parameter reads its value from there.
    ///
    /// # Errors
    ///
    /// Returns an error if the first marker's argument is not a
    /// non-negative integer that fits a transaction id.
    pub fn scan(&self, targets: &[TargetEntry], params: &[Datum]) -> Result<Option<TxnId>> {
        for target in targets {
            if let Some(found) = self.scan_expr(&target.expr, params)? {
                return Ok(Some(found));
            }
        }
        Ok(None)
    }

    /// Requested boundary of the first marker in `expr`
    pub fn scan_expr(&self, expr: &Expr, params: &[Datum]) -> Result<Option<TxnId>> {
        let outcome = expr.walk(&mut |node| -> ControlFlow<Result<TxnId>> {
            match self.marker_argument(node, params) {
                Some(value) => ControlFlow::Break(decode_boundary(value)),
                None => ControlFlow::Continue(()),
            }
        });
        match outcome {
            ControlFlow::Break(found) => found.map(Some),
            ControlFlow::Continue(()) => Ok(None),
        }
    }

    /// The constant argument of `node` if it is a marker call
    fn marker_argument<'a>(&self, node: &'a Expr, params: &'a [Datum]) -> Option<&'a Datum> {
        let Expr::FuncCall { func, args, .. } = node else {
            return None;
        };
        if *func != self.marker {
            return None;
        }
        match args.as_slice() {
            [Expr::Const(value)] => Some(value),
            [Expr::Param(index)] => params.get(*index),
            _ => None,
        }
    }
}

/// Decode a requested boundary
///
/// # Errors
///
/// Returns an error for NULL, non-integer, negative and oversized values.
pub fn decode_boundary(value: &Datum) -> Result<TxnId> {
    match value {
        Datum::Int(raw) => TxnId::try_from(*raw),
        Datum::Null => Err(Error::invalid_input("snapshot boundary must not be NULL")),
        other => Err(Error::type_mismatch("integer", other.type_name())),
    }
}
