//! Error types for the club engine.

use crate::Table;
use thiserror::Error;

/// All possible errors from the club engine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    // Scope errors
    #[error("invalid scope: {0}")]
    InvalidScope(String),

    #[error("scope {scope} does not address table {table}")]
    ScopeMismatch { scope: String, table: Table },

    // Row decoding errors
    #[error("unknown table: {0}")]
    UnknownTable(String),

    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    #[error("malformed {table} row: {reason}")]
    MalformedRow { table: Table, reason: String },

    #[error("missing required field: {0}")]
    MissingRequiredField(String),

    #[error("type mismatch for field '{field}': expected {expected}, got {got}")]
    TypeMismatch {
        field: String,
        expected: String,
        got: String,
    },

    // Channel lifecycle errors
    #[error("cannot {action} a channel that is {from}")]
    InvalidTransition { from: String, action: String },
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;
