//! Core value and identifier types
//!
//! This module defines the foundational types:
//! - TxnId: Transaction identifier, the unit of visibility
//! - TableId / FunctionId: Catalog identities
//! - DataType / Datum: The value model
//! - Column / TableDef: Relation shapes

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};

/// Transaction identifier
///
/// Transaction ids are allocated from a monotonically increasing counter.
/// The low ids are reserved: `INVALID` never names a transaction and
/// `FROZEN` marks rows that are visible to every snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TxnId(u32);

impl TxnId {
    /// Never assigned to a transaction
    pub const INVALID: TxnId = TxnId(0);
    /// Committed before any snapshot could be taken
    pub const FROZEN: TxnId = TxnId(2);
    /// First id handed out to ordinary transactions
    pub const FIRST_NORMAL: TxnId = TxnId(3);

    /// Wrap a raw transaction id
    pub const fn new(raw: u32) -> Self {
        TxnId(raw)
    }

    /// Raw value
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    /// True for ids allocated to ordinary transactions
    pub fn is_normal(self) -> bool {
        self >= Self::FIRST_NORMAL
    }

    /// The id following this one
    pub fn next(self) -> Result<TxnId> {
        self.0
            .checked_add(1)
            .map(TxnId)
            .ok_or_else(|| Error::internal("transaction id space exhausted"))
    }
}

impl fmt::Display for TxnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<TxnId> for i64 {
    fn from(xid: TxnId) -> i64 {
        i64::from(xid.0)
    }
}

impl TryFrom<i64> for TxnId {
    type Error = Error;

    fn try_from(raw: i64) -> Result<TxnId> {
        u32::try_from(raw).map(TxnId).map_err(|_| {
            Error::invalid_input(format!("{} is not a valid transaction id", raw))
        })
    }
}

/// Catalog identity of a table
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TableId(pub u32);

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "table#{}", self.0)
    }
}

/// Catalog identity of a function
///
/// Resolved from a name and an arity once, then compared by value. Two
/// functions with the same name but different arities have different ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FunctionId(pub u32);

impl fmt::Display for FunctionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "function#{}", self.0)
    }
}

/// Column and parameter types understood by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    /// 64-bit signed integer
    Integer,
    /// UTF-8 text
    Text,
    /// Boolean
    Boolean,
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataType::Integer => "integer",
            DataType::Text => "text",
            DataType::Boolean => "boolean",
        };
        f.write_str(name)
    }
}

/// A single SQL value
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Datum {
    /// SQL NULL
    Null,
    /// Integer value
    Int(i64),
    /// Text value
    Text(String),
    /// Boolean value
    Bool(bool),
}

impl Datum {
    /// The type of a non-null datum
    pub fn data_type(&self) -> Option<DataType> {
        match self {
            Datum::Null => None,
            Datum::Int(_) => Some(DataType::Integer),
            Datum::Text(_) => Some(DataType::Text),
            Datum::Bool(_) => Some(DataType::Boolean),
        }
    }

    /// True for SQL NULL
    pub fn is_null(&self) -> bool {
        matches!(self, Datum::Null)
    }

    /// Integer payload, if this is an integer
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Datum::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Text payload, if this is text
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Datum::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Name of the datum's type for error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Datum::Null => "null",
            Datum::Int(_) => "integer",
            Datum::Text(_) => "text",
            Datum::Bool(_) => "boolean",
        }
    }

    /// Check that this datum may be stored in a column of `ty`
    pub fn check_type(&self, ty: DataType) -> Result<()> {
        match self.data_type() {
            None => Ok(()),
            Some(actual) if actual == ty => Ok(()),
            Some(actual) => Err(Error::type_mismatch(ty.to_string(), actual.to_string())),
        }
    }
}

impl fmt::Display for Datum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Datum::Null => f.write_str("NULL"),
            Datum::Int(v) => write!(f, "{}", v),
            Datum::Text(s) => f.write_str(s),
            Datum::Bool(b) => write!(f, "{}", b),
        }
    }
}

/// A tuple of values
pub type Row = Vec<Datum>;

/// A named, typed column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    /// Column name (case-folded)
    pub name: String,
    /// Column type
    pub data_type: DataType,
}

impl Column {
    /// Create a column
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Column {
            name: name.into(),
            data_type,
        }
    }
}

/// Definition of a table to create
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDef {
    /// Table name (case-folded)
    pub name: String,
    /// Columns in storage order
    pub columns: Vec<Column>,
}
