//! Error types for Tempora
//!
//! A single error enum is the engine's abort channel: anything that goes
//! wrong inside planning, execution, an executor hook or an SPI call
//! surfaces as an [`Error`] and unwinds the query that triggered it.
//! We use `thiserror` for automatic `Display` and `Error` implementations.

use std::io;
use thiserror::Error;

/// Result type alias for Tempora operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the Tempora engine and its modules
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// SQL text could not be parsed
    #[error("syntax error: {0}")]
    Syntax(String),

    /// Valid SQL that the engine does not implement
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// Relation lookup failed
    #[error("relation \"{0}\" does not exist")]
    UndefinedTable(String),

    /// Relation already exists
    #[error("relation \"{0}\" already exists")]
    DuplicateTable(String),

    /// Column lookup failed
    #[error("column \"{0}\" does not exist")]
    UndefinedColumn(String),

    /// Function lookup failed
    #[error("function {name} with {arity} argument(s) does not exist")]
    UndefinedFunction {
        /// Function name
        name: String,
        /// Number of arguments at the call site
        arity: usize,
    },

    /// A value had the wrong type for its context
    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        /// Expected type
        expected: String,
        /// Type actually found
        actual: String,
    },

    /// Bad input value
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Misuse of the server programming interface
    #[error("SPI error: {0}")]
    Spi(String),

    /// Transaction state error
    #[error("transaction error: {0}")]
    Transaction(String),

    /// Executor protocol violation
    #[error("executor error: {0}")]
    Executor(String),

    /// Configuration could not be read or is invalid
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O error (configuration files)
    #[error("I/O error: {0}")]
    Io(String),

    /// Internal error (bug or invariant violation)
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a syntax error
    pub fn syntax(msg: impl Into<String>) -> Self {
        Error::Syntax(msg.into())
    }

    /// Create an unsupported-feature error
    pub fn unsupported(msg: impl Into<String>) -> Self {
        Error::Unsupported(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Error::InvalidInput(msg.into())
    }

    /// Create an SPI error
    pub fn spi(msg: impl Into<String>) -> Self {
        Error::Spi(msg.into())
    }

    /// Create an executor protocol error
    pub fn executor(msg: impl Into<String>) -> Self {
        Error::Executor(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Error::Internal(msg.into())
    }

    /// Create a type mismatch error
    pub fn type_mismatch(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Error::TypeMismatch {
            expected: expected.into(),
            actual: actual.into(),
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(e.to_string())
    }
}
