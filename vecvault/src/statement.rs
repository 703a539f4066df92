//! Safe wrapper around a `SQLite` prepared statement.
//!
//! This file contains **no `unsafe` code**. All FFI interaction is delegated to
//! [`ffi::RawStmt`] which encapsulates the raw pointers and C type conversions.

use super::error::DbResult;
use super::ffi::{self, RawStmt};
use super::value::Value;

/// Result of a single `sqlite3_step` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepResult {
    /// A result row is available.
    Row,
    /// The statement has finished executing.
    Done,
}

/// A prepared `SQLite` statement.
///
/// Created via [`Connection::prepare`](super::Connection::prepare).
/// Tied to the lifetime of the connection that created it.
/// Finalized when dropped.
pub struct Statement<'conn> {
    raw: RawStmt<'conn>,
}

impl<'conn> Statement<'conn> {
    /// Wraps a raw statement handle.
    pub(super) const fn new(raw: RawStmt<'conn>) -> Self {
        Self { raw }
    }

    /// Binds a slice of [`Value`]s to the statement parameters (1-indexed).
    pub fn bind_values(&self, values: &[Value]) -> DbResult<()> {
        for (i, val) in values.iter().enumerate() {
            let idx = i32::try_from(i + 1).expect("parameter index overflow");
            match val {
                Value::Integer(v) => self.raw.bind_i64(idx, *v)?,
                Value::Real(v) => self.raw.bind_f64(idx, *v)?,
                Value::Blob(v) => self.raw.bind_blob(idx, v)?,
                Value::Text(v) => self.raw.bind_text(idx, v)?,
                Value::Null => self.raw.bind_null(idx)?,
            }
        }
        Ok(())
    }

    /// Executes a single step.
    pub fn step(&self) -> DbResult<StepResult> {
        let rc = self.raw.step()?;
        if rc == ffi::SQLITE_ROW {
            Ok(StepResult::Row)
        } else {
            Ok(StepResult::Done)
        }
    }

    /// Resets the statement so it can be stepped again. Bindings are kept.
    pub fn reset(&self) -> DbResult<()> {
        self.raw.reset()
    }

    /// Returns the number of columns in the result set.
    pub fn column_count(&self) -> usize {
        usize::try_from(self.raw.column_count()).unwrap_or(0)
    }

    /// Reads a column as `i64`.
    pub fn column_i64(&self, idx: usize) -> i64 {
        self.raw
            .column_i64(i32::try_from(idx).expect("column index overflow"))
    }

    /// Reads a column as `f64`.
    pub fn column_f64(&self, idx: usize) -> f64 {
        self.raw
            .column_f64(i32::try_from(idx).expect("column index overflow"))
    }

    /// Reads a column as a blob. Returns an empty `Vec` for NULL.
    pub fn column_blob(&self, idx: usize) -> Vec<u8> {
        self.raw
            .column_blob(i32::try_from(idx).expect("column index overflow"))
    }

    /// Reads a column as a UTF-8 string. Returns an empty string for NULL.
    pub fn column_text(&self, idx: usize) -> String {
        self.raw
            .column_text(i32::try_from(idx).expect("column index overflow"))
    }

    /// Returns `true` if the column is SQL NULL.
    pub fn is_column_null(&self, idx: usize) -> bool {
        self.raw
            .column_type(i32::try_from(idx).expect("column index overflow"))
            == ffi::SQLITE_NULL
    }

    /// Reads a column as an optional `i64` (returns `None` for NULL).
    pub fn column_optional_i64(&self, idx: usize) -> Option<i64> {
        if self.is_column_null(idx) {
            None
        } else {
            Some(self.column_i64(idx))
        }
    }

    /// Reads a column as an optional blob (returns `None` for NULL).
    pub fn column_optional_blob(&self, idx: usize) -> Option<Vec<u8>> {
        if self.is_column_null(idx) {
            None
        } else {
            Some(self.column_blob(idx))
        }
    }

    /// Name of the table that originates result column `idx`, or `None` when
    /// the column is an expression, literal, or other non-table source.
    ///
    /// Only meaningful for `SELECT` statements.
    #[cfg(feature = "column-metadata")]
    pub fn column_table_name(&self, idx: usize) -> Option<String> {
        self.raw
            .column_table_name(i32::try_from(idx).expect("column index overflow"))
    }

    /// Reads a column as a dynamically typed [`Value`].
    pub fn column_value(&self, idx: usize) -> Value {
        let i = i32::try_from(idx).expect("column index overflow");
        match self.raw.column_type(i) {
            ffi::SQLITE_INTEGER => Value::Integer(self.raw.column_i64(i)),
            ffi::SQLITE_FLOAT => Value::Real(self.raw.column_f64(i)),
            ffi::SQLITE_BLOB => Value::Blob(self.raw.column_blob(i)),
            ffi::SQLITE_TEXT => Value::Text(self.raw.column_text(i)),
            _ => Value::Null,
        }
    }
}

impl std::fmt::Debug for Statement<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Statement").finish_non_exhaustive()
    }
}
