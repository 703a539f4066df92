//! `sqlite3mc` encryption configuration.
//!
//! # Encryption flow
//!
//! Databases are encrypted at rest by `sqlite3mc` (`SQLite3` Multiple
//! Ciphers), compiled into the amalgamation with ChaCha20-Poly1305 as the
//! fixed cipher. The encryption is transparent to SQL -- once a database is
//! opened and keyed, all reads and writes are automatically
//! encrypted/decrypted by the `SQLite` pager layer.
//!
//! The flow when opening a database is:
//!
//! 1. **Open** -- `sqlite3_open_v2` creates or opens the database file.
//!    At this point the file is opaque (encrypted) and no data can be read.
//!
//! 2. **Key** -- `PRAGMA key` passes the key material to `sqlite3mc`. A raw
//!    32-byte key is hex-encoded and sent as `"x'<hex>'"`, which `sqlite3mc`
//!    uses directly as page-key material. A passphrase is sent as a quoted
//!    string and run through the cipher's KDF first.
//!
//! 3. **Verify** -- We immediately read from `sqlite_master` to confirm
//!    the key is correct. If the key is wrong, `sqlite3mc` returns
//!    `SQLITE_NOTADB` because the decrypted page header won't match the
//!    expected `SQLite` magic bytes. We surface this as a clear error.
//!
//! 4. **Configure** -- WAL journal mode and `synchronous=FULL` are set for
//!    crash consistency. Foreign keys are enabled.
//!
//! All crypto is built into the `sqlite3mc` amalgamation -- no OpenSSL or
//! other external crypto library is needed on any platform.

use std::fmt;
use std::path::Path;

use secrecy::{ExposeSecret, SecretString};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use super::connection::Connection;
use super::error::{DbError, DbResult};

/// Key material for an encrypted database.
///
/// Raw keys bypass the KDF and are used directly as page-key material;
/// passphrases are stretched by the cipher's KDF inside `sqlite3mc`.
/// Key bytes are zeroized on drop; the `Debug` impl never prints them.
#[derive(Zeroize, ZeroizeOnDrop)]
pub enum EncryptionKey {
    /// A 32-byte raw key, passed to `sqlite3mc` as `"x'<hex>'"`.
    Raw([u8; 32]),
    /// A passphrase, run through the cipher's KDF by `sqlite3mc`.
    Passphrase(#[zeroize(skip)] SecretString),
}

impl EncryptionKey {
    /// Wraps a 32-byte raw key.
    #[must_use]
    pub const fn raw(key: [u8; 32]) -> Self {
        Self::Raw(key)
    }

    /// Wraps a passphrase.
    #[must_use]
    pub fn passphrase(phrase: impl Into<String>) -> Self {
        Self::Passphrase(SecretString::from(phrase.into()))
    }

    /// Builds `PRAGMA <verb> = ...;` for this key. The returned buffer is
    /// zeroized on drop.
    fn pragma(&self, verb: &str) -> Zeroizing<String> {
        match self {
            Self::Raw(bytes) => {
                let key_hex = Zeroizing::new(hex::encode(bytes));
                Zeroizing::new(format!("PRAGMA {verb} = \"x'{}'\";", key_hex.as_str()))
            }
            Self::Passphrase(secret) => {
                // Single quotes in the passphrase are doubled so the value
                // stays a single SQL string literal.
                let escaped = Zeroizing::new(secret.expose_secret().replace('\'', "''"));
                Zeroizing::new(format!("PRAGMA {verb} = '{}';", escaped.as_str()))
            }
        }
    }
}

impl fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Raw(_) => f.write_str("EncryptionKey::Raw(..)"),
            Self::Passphrase(_) => f.write_str("EncryptionKey::Passphrase(..)"),
        }
    }
}

/// Opens a database, applies the encryption key, and configures the connection.
///
/// This is the standard open sequence: open -> key -> verify -> configure
/// (WAL + foreign keys).
///
/// See the [module-level documentation](self) for the full encryption flow.
pub fn open_encrypted(
    path: &Path,
    key: &EncryptionKey,
    read_only: bool,
) -> DbResult<Connection> {
    let conn = Connection::open(path, read_only)?;
    apply_key(&conn, key)?;
    configure_connection(&conn)?;
    Ok(conn)
}

/// Applies the `sqlite3mc` encryption key to an open connection.
///
/// After keying, a lightweight read (`SELECT count(*) FROM sqlite_master`)
/// verifies the key is correct. If it's wrong, `sqlite3mc` fails with
/// `SQLITE_NOTADB` on the first page read.
fn apply_key(conn: &Connection, key: &EncryptionKey) -> DbResult<()> {
    // execute_batch_zeroized ensures the internal CString copy of the PRAGMA
    // (which contains the key material) is zeroized after the FFI call returns.
    let pragma = key.pragma("key");
    conn.execute_batch_zeroized(&pragma)?;

    // Touch a page to verify the key works. On failure this produces a clear
    // error rather than a confusing "not a database" later during schema setup.
    conn.execute_batch("SELECT count(*) FROM sqlite_master;")
        .map_err(|e| {
            log::debug!("key verification read failed with code {}", e.code);
            DbError::new(
                e.code.0,
                format!(
                    "encryption key verification failed (is the key correct?): {}",
                    e.message
                ),
            )
        })
}

/// Re-encrypts an open, already-keyed database under `new_key`.
///
/// `sqlite3mc` rewrites every page under the new key; on large databases
/// this takes time proportional to the database size.
pub fn rekey(conn: &Connection, new_key: &EncryptionKey) -> DbResult<()> {
    let pragma = new_key.pragma("rekey");
    conn.execute_batch_zeroized(&pragma)?;

    conn.execute_batch("SELECT count(*) FROM sqlite_master;")
        .map_err(|e| {
            DbError::new(
                e.code.0,
                format!("rekey verification failed: {}", e.message),
            )
        })
}

/// Configures durable WAL settings, foreign keys, and secure deletion.
///
/// - `journal_mode = WAL` -- enables concurrent readers during writes.
/// - `synchronous = FULL` -- maximizes crash consistency (all WAL pages are
///   fsynced before the transaction is reported as committed).
/// - `foreign_keys = ON` -- enforces referential integrity constraints.
/// - `secure_delete = ON` -- overwrites deleted content with zeroes so
///   sensitive data does not linger in free pages.
fn configure_connection(conn: &Connection) -> DbResult<()> {
    conn.execute_batch(
        "PRAGMA foreign_keys = ON;
         PRAGMA journal_mode = WAL;
         PRAGMA synchronous = FULL;
         PRAGMA secure_delete = ON;",
    )
}

/// Runs `PRAGMA integrity_check` and returns whether the database is healthy.
pub fn integrity_check(conn: &Connection) -> DbResult<bool> {
    let result = conn.query_row("PRAGMA integrity_check;", &[], |stmt| {
        Ok(stmt.column_text(0))
    })?;
    Ok(result.trim() == "ok")
}
