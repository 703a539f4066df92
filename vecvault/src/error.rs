//! Database error types for the safe `SQLite` wrapper.

use std::fmt;

use thiserror::Error;

/// Numeric `SQLite` result code (e.g. `1` for `SQLITE_ERROR`, `26` for
/// `SQLITE_NOTADB`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DbErrorCode(pub i32);

impl fmt::Display for DbErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An error from the `SQLite` engine or this wrapper.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("sqlite error {code}: {message}")]
pub struct DbError {
    /// The `SQLite` result code that produced this error.
    pub code: DbErrorCode,
    /// Human-readable message from `sqlite3_errmsg` or the wrapper.
    pub message: String,
}

impl DbError {
    /// Builds an error from a raw result code and message.
    pub(crate) fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code: DbErrorCode(code),
            message: message.into(),
        }
    }
}

/// Convenience alias for database results.
pub type DbResult<T> = Result<T, DbError>;
