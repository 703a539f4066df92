//! Raw FFI bindings to `SQLite`, and the only file containing `unsafe` code.
//!
//! The symbols resolve against the sqlite3mc static library compiled from the
//! downloaded amalgamation by `build.rs`. All pointer types use `*mut c_void`
//! so the C handle types (`sqlite3`, `sqlite3_stmt`) do not leak into the
//! rest of the crate; safe modules only ever see [`RawDb`] and [`RawStmt`].
//!
//! Registration of the bundled vector-search extension also lives here: it is
//! a process-wide one-shot (`Once`) that hands `sqlite3_vec_init` to
//! `sqlite3_auto_extension`, so every connection opened afterwards carries
//! the extension without per-connection opt-in.

#![allow(non_camel_case_types, dead_code)]

use std::ffi::{CStr, CString};
use std::marker::PhantomData;
use std::os::raw::{c_char, c_int, c_void};
use std::sync::Once;

use zeroize::Zeroize;

use super::error::{DbError, DbResult};

// ── SQLite constants ────────────────────────────────────────────────────

pub(crate) const SQLITE_OK: c_int = 0;
pub(crate) const SQLITE_ERROR: c_int = 1;
pub(crate) const SQLITE_BUSY: c_int = 5;
pub(crate) const SQLITE_MISMATCH: c_int = 20;
pub(crate) const SQLITE_MISUSE: c_int = 21;
pub(crate) const SQLITE_NOTADB: c_int = 26;
pub(crate) const SQLITE_ROW: c_int = 100;
pub(crate) const SQLITE_DONE: c_int = 101;

// Column type constants
pub(crate) const SQLITE_INTEGER: c_int = 1;
pub(crate) const SQLITE_FLOAT: c_int = 2;
pub(crate) const SQLITE_TEXT: c_int = 3;
pub(crate) const SQLITE_BLOB: c_int = 4;
pub(crate) const SQLITE_NULL: c_int = 5;

// Open flags
pub(crate) const SQLITE_OPEN_READONLY: c_int = 0x0000_0001;
pub(crate) const SQLITE_OPEN_READWRITE: c_int = 0x0000_0002;
pub(crate) const SQLITE_OPEN_CREATE: c_int = 0x0000_0004;
pub(crate) const SQLITE_OPEN_FULLMUTEX: c_int = 0x0001_0000;

// Destructor type aliases (transient = -1 means SQLite copies the data)
pub(crate) const SQLITE_TRANSIENT: isize = -1;

/// Entry-point signature `sqlite3_auto_extension` invokes on every new
/// connection: `(db, errmsg_out, api_routines)`.
type ExtensionEntry =
    unsafe extern "C" fn(*mut c_void, *mut *mut c_char, *const c_void) -> c_int;

mod decl {
    use super::{c_char, c_int, c_void, ExtensionEntry};

    type sqlite3 = c_void;
    type sqlite3_stmt = c_void;

    extern "C" {
        // Connection lifecycle
        pub fn sqlite3_open_v2(
            filename: *const c_char,
            pp_db: *mut *mut sqlite3,
            flags: c_int,
            z_vfs: *const c_char,
        ) -> c_int;

        pub fn sqlite3_close_v2(db: *mut sqlite3) -> c_int;

        // Execution
        pub fn sqlite3_exec(
            db: *mut sqlite3,
            sql: *const c_char,
            callback: *const c_void,
            arg: *mut c_void,
            errmsg: *mut *mut c_char,
        ) -> c_int;

        pub fn sqlite3_free(ptr: *mut c_void);

        // Prepared statements
        pub fn sqlite3_prepare_v2(
            db: *mut sqlite3,
            z_sql: *const c_char,
            n_byte: c_int,
            pp_stmt: *mut *mut sqlite3_stmt,
            pz_tail: *mut *const c_char,
        ) -> c_int;

        pub fn sqlite3_step(stmt: *mut sqlite3_stmt) -> c_int;
        pub fn sqlite3_reset(stmt: *mut sqlite3_stmt) -> c_int;
        pub fn sqlite3_finalize(stmt: *mut sqlite3_stmt) -> c_int;

        // Parameter binding
        pub fn sqlite3_bind_int64(stmt: *mut sqlite3_stmt, index: c_int, value: i64) -> c_int;

        pub fn sqlite3_bind_double(stmt: *mut sqlite3_stmt, index: c_int, value: f64) -> c_int;

        pub fn sqlite3_bind_blob(
            stmt: *mut sqlite3_stmt,
            index: c_int,
            value: *const c_void,
            n: c_int,
            destructor: isize,
        ) -> c_int;

        pub fn sqlite3_bind_text(
            stmt: *mut sqlite3_stmt,
            index: c_int,
            value: *const c_char,
            n: c_int,
            destructor: isize,
        ) -> c_int;

        pub fn sqlite3_bind_null(stmt: *mut sqlite3_stmt, index: c_int) -> c_int;

        // Column reading
        pub fn sqlite3_column_int64(stmt: *mut sqlite3_stmt, i_col: c_int) -> i64;

        pub fn sqlite3_column_double(stmt: *mut sqlite3_stmt, i_col: c_int) -> f64;

        pub fn sqlite3_column_blob(stmt: *mut sqlite3_stmt, i_col: c_int) -> *const c_void;

        pub fn sqlite3_column_bytes(stmt: *mut sqlite3_stmt, i_col: c_int) -> c_int;

        pub fn sqlite3_column_text(stmt: *mut sqlite3_stmt, i_col: c_int) -> *const c_char;

        pub fn sqlite3_column_type(stmt: *mut sqlite3_stmt, i_col: c_int) -> c_int;

        pub fn sqlite3_column_count(stmt: *mut sqlite3_stmt) -> c_int;

        #[cfg(feature = "column-metadata")]
        pub fn sqlite3_column_table_name(stmt: *mut sqlite3_stmt, i_col: c_int)
            -> *const c_char;

        // Error reporting
        pub fn sqlite3_errmsg(db: *mut sqlite3) -> *const c_char;

        // Changes
        pub fn sqlite3_changes(db: *mut sqlite3) -> c_int;

        pub fn sqlite3_last_insert_rowid(db: *mut sqlite3) -> i64;

        // Extension loading
        pub fn sqlite3_auto_extension(x_entry_point: Option<ExtensionEntry>) -> c_int;
    }
}

// ── Vector extension registration ───────────────────────────────────────

/// Registers the sqlite-vec extension for all connections opened after this
/// call. One-shot; guarded against double registration.
pub(crate) fn register_vec_extension() {
    static REGISTER: Once = Once::new();
    REGISTER.call_once(|| {
        // SAFETY: `sqlite3_vec_init` is the extension entry point compiled in
        // by the sqlite-vec crate; the engine retains the pointer for the
        // lifetime of the process and invokes it with the `(db, errmsg, api)`
        // arguments `ExtensionEntry` describes.
        let rc = unsafe {
            decl::sqlite3_auto_extension(Some(std::mem::transmute::<
                *const (),
                ExtensionEntry,
            >(sqlite_vec::sqlite3_vec_init as *const ())))
        };
        if rc != SQLITE_OK {
            log::warn!("sqlite3_auto_extension(sqlite3_vec_init) returned {rc}");
        }
    });
}

// ── Error helpers ───────────────────────────────────────────────────────

fn errmsg(db: *mut c_void) -> String {
    if db.is_null() {
        return "unknown error".to_string();
    }
    // SAFETY: `sqlite3_errmsg` returns a NUL-terminated string owned by the
    // connection; it is copied before any further engine call.
    unsafe {
        let ptr = decl::sqlite3_errmsg(db);
        if ptr.is_null() {
            "unknown error".to_string()
        } else {
            CStr::from_ptr(ptr).to_string_lossy().into_owned()
        }
    }
}

// ── RawDb ───────────────────────────────────────────────────────────────

/// Owned `sqlite3*` handle. Closed on drop.
pub(crate) struct RawDb {
    db: *mut c_void,
}

// Safety: the handle is opened with SQLITE_OPEN_FULLMUTEX and the safe
// wrapper never shares it (`Connection` is Send but not Sync), so moving it
// to another thread is sound.
unsafe impl Send for RawDb {}

impl RawDb {
    /// Opens a database at `path` with the given `SQLITE_OPEN_*` flags.
    pub(crate) fn open(path: &str, flags: c_int) -> DbResult<Self> {
        let c_path = CString::new(path)
            .map_err(|e| DbError::new(SQLITE_ERROR, format!("invalid path: {e}")))?;

        let mut db: *mut c_void = std::ptr::null_mut();
        // SAFETY: `c_path` is NUL-terminated and `db` is a valid out-pointer.
        let rc = unsafe {
            decl::sqlite3_open_v2(c_path.as_ptr(), &mut db, flags, std::ptr::null())
        };
        if rc != SQLITE_OK {
            // If open failed but we got a handle, extract the error and close.
            let msg = if db.is_null() {
                format!("sqlite3_open_v2 returned {rc}")
            } else {
                let m = errmsg(db);
                // SAFETY: close the half-opened handle exactly once.
                unsafe {
                    decl::sqlite3_close_v2(db);
                }
                m
            };
            return Err(DbError::new(rc, msg));
        }
        Ok(Self { db })
    }

    /// Executes one or more semicolon-separated SQL statements.
    pub(crate) fn exec(&self, sql: &str) -> DbResult<()> {
        let c_sql = CString::new(sql)
            .map_err(|e| DbError::new(SQLITE_ERROR, format!("nul in SQL: {e}")))?;
        self.exec_cstr(&c_sql)
    }

    /// Like [`exec`](Self::exec) but zeroizes the C string copy of `sql`
    /// after execution. Used for key-bearing PRAGMAs.
    pub(crate) fn exec_zeroized(&self, sql: &str) -> DbResult<()> {
        let c_sql = CString::new(sql)
            .map_err(|e| DbError::new(SQLITE_ERROR, format!("nul in SQL: {e}")))?;
        let result = self.exec_cstr(&c_sql);
        let mut bytes = c_sql.into_bytes_with_nul();
        bytes.zeroize();
        result
    }

    fn exec_cstr(&self, c_sql: &CStr) -> DbResult<()> {
        let mut raw_errmsg: *mut c_char = std::ptr::null_mut();
        // SAFETY: handle and SQL pointer are valid; no callback is installed.
        let rc = unsafe {
            decl::sqlite3_exec(
                self.db,
                c_sql.as_ptr(),
                std::ptr::null(),
                std::ptr::null_mut(),
                &mut raw_errmsg,
            )
        };
        if rc != SQLITE_OK {
            let msg = if raw_errmsg.is_null() {
                errmsg(self.db)
            } else {
                // SAFETY: non-null errmsg is an engine-allocated NUL-terminated
                // string; copy it, then release it with sqlite3_free.
                unsafe {
                    let s = CStr::from_ptr(raw_errmsg).to_string_lossy().into_owned();
                    decl::sqlite3_free(raw_errmsg.cast());
                    s
                }
            };
            return Err(DbError::new(rc, msg));
        }
        Ok(())
    }

    /// Prepares a single SQL statement.
    pub(crate) fn prepare(&self, sql: &str) -> DbResult<RawStmt<'_>> {
        let c_sql = CString::new(sql)
            .map_err(|e| DbError::new(SQLITE_ERROR, format!("nul in SQL: {e}")))?;
        let mut stmt: *mut c_void = std::ptr::null_mut();
        // SAFETY: handle and SQL pointer are valid; `stmt` is an out-pointer.
        let rc = unsafe {
            decl::sqlite3_prepare_v2(
                self.db,
                c_sql.as_ptr(),
                -1,
                &mut stmt,
                std::ptr::null_mut(),
            )
        };
        if rc != SQLITE_OK || stmt.is_null() {
            return Err(DbError::new(rc, errmsg(self.db)));
        }
        Ok(RawStmt {
            stmt,
            db: self.db,
            _db: PhantomData,
        })
    }

    /// Returns the number of rows changed by the most recent statement.
    pub(crate) fn changes(&self) -> i64 {
        // SAFETY: handle is valid for the lifetime of self.
        i64::from(unsafe { decl::sqlite3_changes(self.db) })
    }

    /// Returns the rowid of the most recent successful INSERT.
    pub(crate) fn last_insert_rowid(&self) -> i64 {
        // SAFETY: handle is valid for the lifetime of self.
        unsafe { decl::sqlite3_last_insert_rowid(self.db) }
    }
}

impl Drop for RawDb {
    fn drop(&mut self) {
        if !self.db.is_null() {
            // SAFETY: the handle is owned and closed exactly once.
            unsafe {
                decl::sqlite3_close_v2(self.db);
            }
            self.db = std::ptr::null_mut();
        }
    }
}

// ── RawStmt ─────────────────────────────────────────────────────────────

/// Owned `sqlite3_stmt*` handle, borrowing its connection. Finalized on drop.
pub(crate) struct RawStmt<'db> {
    stmt: *mut c_void,
    /// Owning `sqlite3*` handle -- kept for error messages.
    db: *mut c_void,
    _db: PhantomData<&'db RawDb>,
}

// Safety: single-owner semantics; the statement cannot outlive its
// connection (lifetime) and is never shared across threads.
unsafe impl Send for RawStmt<'_> {}

impl RawStmt<'_> {
    pub(crate) fn bind_i64(&self, index: c_int, value: i64) -> DbResult<()> {
        // SAFETY: statement handle is valid.
        self.check(unsafe { decl::sqlite3_bind_int64(self.stmt, index, value) })
    }

    pub(crate) fn bind_f64(&self, index: c_int, value: f64) -> DbResult<()> {
        // SAFETY: statement handle is valid.
        self.check(unsafe { decl::sqlite3_bind_double(self.stmt, index, value) })
    }

    pub(crate) fn bind_blob(&self, index: c_int, value: &[u8]) -> DbResult<()> {
        let n = c_int::try_from(value.len())
            .map_err(|_| DbError::new(SQLITE_MISUSE, "blob too large to bind"))?;
        // SAFETY: the engine copies `value` before returning (SQLITE_TRANSIENT).
        self.check(unsafe {
            decl::sqlite3_bind_blob(self.stmt, index, value.as_ptr().cast(), n, SQLITE_TRANSIENT)
        })
    }

    pub(crate) fn bind_text(&self, index: c_int, value: &str) -> DbResult<()> {
        let n = c_int::try_from(value.len())
            .map_err(|_| DbError::new(SQLITE_MISUSE, "text too large to bind"))?;
        // SAFETY: the engine copies `value` before returning (SQLITE_TRANSIENT).
        self.check(unsafe {
            decl::sqlite3_bind_text(self.stmt, index, value.as_ptr().cast(), n, SQLITE_TRANSIENT)
        })
    }

    pub(crate) fn bind_null(&self, index: c_int) -> DbResult<()> {
        // SAFETY: statement handle is valid.
        self.check(unsafe { decl::sqlite3_bind_null(self.stmt, index) })
    }

    /// Executes one step, returning `SQLITE_ROW` or `SQLITE_DONE`.
    pub(crate) fn step(&self) -> DbResult<c_int> {
        // SAFETY: statement handle is valid.
        let rc = unsafe { decl::sqlite3_step(self.stmt) };
        match rc {
            SQLITE_ROW | SQLITE_DONE => Ok(rc),
            _ => Err(self.last_error(rc)),
        }
    }

    /// Resets the statement so it can be stepped again.
    pub(crate) fn reset(&self) -> DbResult<()> {
        // SAFETY: statement handle is valid.
        self.check(unsafe { decl::sqlite3_reset(self.stmt) })
    }

    pub(crate) fn column_count(&self) -> c_int {
        // SAFETY: statement handle is valid.
        unsafe { decl::sqlite3_column_count(self.stmt) }
    }

    pub(crate) fn column_i64(&self, i_col: c_int) -> i64 {
        // SAFETY: statement handle is valid.
        unsafe { decl::sqlite3_column_int64(self.stmt, i_col) }
    }

    pub(crate) fn column_f64(&self, i_col: c_int) -> f64 {
        // SAFETY: statement handle is valid.
        unsafe { decl::sqlite3_column_double(self.stmt, i_col) }
    }

    pub(crate) fn column_blob(&self, i_col: c_int) -> Vec<u8> {
        // SAFETY: the pointer/length pair is valid until the next engine call
        // on this statement; the bytes are copied out immediately.
        unsafe {
            let ptr = decl::sqlite3_column_blob(self.stmt, i_col);
            let len = decl::sqlite3_column_bytes(self.stmt, i_col);
            if ptr.is_null() || len <= 0 {
                return Vec::new();
            }
            let len = usize::try_from(len).unwrap_or(0);
            std::slice::from_raw_parts(ptr.cast::<u8>(), len).to_vec()
        }
    }

    pub(crate) fn column_text(&self, i_col: c_int) -> String {
        // SAFETY: the pointer is NUL-terminated and valid until the next
        // engine call on this statement; the text is copied out immediately.
        unsafe {
            let ptr = decl::sqlite3_column_text(self.stmt, i_col);
            if ptr.is_null() {
                return String::new();
            }
            CStr::from_ptr(ptr).to_string_lossy().into_owned()
        }
    }

    pub(crate) fn column_type(&self, i_col: c_int) -> c_int {
        // SAFETY: statement handle is valid.
        unsafe { decl::sqlite3_column_type(self.stmt, i_col) }
    }

    /// Table that originates result column `i_col`, or `None` when the
    /// column is not a direct table reference.
    #[cfg(feature = "column-metadata")]
    pub(crate) fn column_table_name(&self, i_col: c_int) -> Option<String> {
        // SAFETY: the pointer is NUL-terminated and valid until the next
        // engine call on this statement; the text is copied out immediately.
        unsafe {
            let ptr = decl::sqlite3_column_table_name(self.stmt, i_col);
            if ptr.is_null() {
                None
            } else {
                Some(CStr::from_ptr(ptr).to_string_lossy().into_owned())
            }
        }
    }

    fn check(&self, rc: c_int) -> DbResult<()> {
        if rc == SQLITE_OK {
            Ok(())
        } else {
            Err(self.last_error(rc))
        }
    }

    fn last_error(&self, code: c_int) -> DbError {
        DbError::new(code, errmsg(self.db))
    }
}

impl Drop for RawStmt<'_> {
    fn drop(&mut self) {
        if !self.stmt.is_null() {
            // SAFETY: the handle is owned and finalized exactly once.
            unsafe {
                decl::sqlite3_finalize(self.stmt);
            }
            self.stmt = std::ptr::null_mut();
        }
    }
}
