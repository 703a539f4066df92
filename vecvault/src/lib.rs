//! Encrypted `SQLite` with vector search, behind a minimal safe wrapper.
//!
//! This crate provides a small, safe Rust API over the `SQLite` C FFI.
//! The raw symbols are resolved at compile time against the `sqlite3mc`
//! static library compiled from the downloaded amalgamation by `build.rs`,
//! so databases are encryptable at rest (ChaCha20-Poly1305) with no external
//! crypto library. The sqlite-vec extension is registered process-wide on
//! first open, so every connection can create `vec0` virtual tables and
//! evaluate the `vec_*` SQL functions without per-connection setup.
//!
//! Consumer code uses only the safe types defined here and never touches
//! raw FFI directly. The `ffi` module is the **only** file that contains
//! `unsafe` code or C types.
//!
//! The optional `column-metadata` Cargo feature compiles `SQLite` with
//! `SQLITE_ENABLE_COLUMN_METADATA` and exposes
//! `Statement::column_table_name`.

mod ffi;

mod connection;
pub mod error;
mod statement;
mod transaction;
pub mod value;

pub mod cipher;
pub mod vec;

pub use cipher::EncryptionKey;
pub use connection::Connection;
pub use error::{DbError, DbResult};
pub use statement::{Statement, StepResult};
pub use transaction::{Transaction, TransactionBehavior};
pub use value::Value;
pub use vec::VecBlob;
