//! Build script for vecvault.
//!
//! Downloads the sqlite3mc amalgamation from a pinned upstream release (if
//! not already cached in `OUT_DIR`) and compiles it into a static library
//! with the engine configuration this crate guarantees: ChaCha20-Poly1305
//! encryption codec, in-memory temporary storage, assertions stripped, the
//! I/O backend matching the target OS, and column metadata only when the
//! `column-metadata` cargo feature is active.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

use sha2::{Digest, Sha256};

// Pinned sqlite3mc release.
const SQLITE3MC_VERSION: &str = "2.2.7";
const SQLITE_VERSION: &str = "3.51.2";
const DOWNLOAD_URL: &str = "https://github.com/utelle/SQLite3MultipleCiphers/releases/download/v2.2.7/sqlite3mc-2.2.7-sqlite-3.51.2-amalgamation.zip";
const EXPECTED_SHA256: &str =
    "8e84aadc53bc09bda9cd307745a178191e7783e1b6478d74ffbcdf6a04f98085";

fn main() {
    let out_dir = PathBuf::from(std::env::var("OUT_DIR").expect("OUT_DIR not set"));
    let source_dir = out_dir.join(format!("sqlite3mc-{SQLITE3MC_VERSION}"));
    let amalgamation_c = source_dir.join("sqlite3mc_amalgamation.c");
    let amalgamation_h = source_dir.join("sqlite3mc_amalgamation.h");

    // Download and extract if not already cached in OUT_DIR.
    if !amalgamation_c.exists() || !amalgamation_h.exists() {
        std::fs::create_dir_all(&source_dir).expect("failed to create source dir");
        let zip_path = out_dir.join("sqlite3mc-amalgamation.zip");
        download(&zip_path);
        verify_checksum(&zip_path);
        extract(&zip_path, &source_dir);
        assert!(
            amalgamation_c.exists(),
            "sqlite3mc_amalgamation.c not found after extraction"
        );
        assert!(
            amalgamation_h.exists(),
            "sqlite3mc_amalgamation.h not found after extraction"
        );
    }

    compile(&amalgamation_c, &source_dir);
}

/// Downloads the pinned amalgamation zip using curl.
fn download(dest: &Path) {
    eprintln!(
        "cargo:warning=Downloading sqlite3mc {SQLITE3MC_VERSION} (SQLite {SQLITE_VERSION})..."
    );
    let status = Command::new("curl")
        .args(["-fsSL", "-o"])
        .arg(dest)
        .arg(DOWNLOAD_URL)
        .status()
        .expect("failed to run curl -- is it installed?");
    assert!(status.success(), "curl failed with status {status}");
}

/// Verifies the SHA-256 checksum of the downloaded zip.
fn verify_checksum(zip_path: &Path) {
    let mut file = File::open(zip_path).expect("failed to open downloaded zip");
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher).expect("failed to hash downloaded zip");
    let actual_hash: String = hasher
        .finalize()
        .iter()
        .map(|byte| format!("{byte:02x}"))
        .collect();
    assert_eq!(
        actual_hash, EXPECTED_SHA256,
        "sqlite3mc checksum mismatch!\n  expected: {EXPECTED_SHA256}\n  actual:   {actual_hash}\n\
         The download may be corrupted or the pinned release has changed."
    );
}

/// Extracts the two needed files from the zip into `dest_dir`.
fn extract(zip_path: &Path, dest_dir: &Path) {
    let file = File::open(zip_path).expect("failed to reopen downloaded zip");
    let mut archive = zip::ZipArchive::new(file).expect("downloaded zip is not a valid archive");
    for name in ["sqlite3mc_amalgamation.c", "sqlite3mc_amalgamation.h"] {
        let mut entry = archive
            .by_name(name)
            .unwrap_or_else(|e| panic!("{name} missing from archive: {e}"));
        let mut out = File::create(dest_dir.join(name))
            .unwrap_or_else(|e| panic!("failed to create {name}: {e}"));
        io::copy(&mut entry, &mut out).unwrap_or_else(|e| panic!("failed to extract {name}: {e}"));
    }
}

/// Compiles the sqlite3mc amalgamation into a static library.
fn compile(amalgamation_c: &Path, include_dir: &Path) {
    let target_os = std::env::var("CARGO_CFG_TARGET_OS").unwrap_or_default();
    let target_family = std::env::var("CARGO_CFG_TARGET_FAMILY").unwrap_or_default();

    let mut build = cc::Build::new();
    build
        .file(amalgamation_c)
        .include(include_dir)
        // Core SQLite configuration
        .define("SQLITE_CORE", None)
        .define("SQLITE_THREADSAFE", "1")
        .define("SQLITE_ENABLE_FTS5", None)
        .define("SQLITE_ENABLE_JSON1", None)
        .define("SQLITE_DEFAULT_WAL_SYNCHRONOUS", "1")
        .define("SQLITE_DQS", "0")
        // Temporary tables and indices never touch disk
        .define("SQLITE_TEMP_STORE", "2")
        // Engine assertions are stripped from release artifacts
        .define("NDEBUG", None)
        // sqlite3mc cipher configuration -- the codec is fixed to
        // ChaCha20-Poly1305; all crypto is built into the amalgamation
        .define("CODEC_TYPE", "CODEC_TYPE_CHACHA20")
        // Disable Argon2 threading (not needed, avoids pthread dep on some targets)
        .define("ARGON2_NO_THREADS", None)
        // Optimizations
        .define("SQLITE_DEFAULT_MEMSTATUS", "0")
        .define("SQLITE_LIKE_DOESNT_MATCH_BLOBS", None)
        .define("SQLITE_OMIT_DEPRECATED", None)
        .define("SQLITE_OMIT_SHARED_CACHE", None);

    // Column-origin introspection is an explicit opt-in; the accessor in
    // src/statement.rs is gated on the same feature.
    if std::env::var_os("CARGO_FEATURE_COLUMN_METADATA").is_some() {
        build.define("SQLITE_ENABLE_COLUMN_METADATA", None);
    }

    // OS-specific I/O backend selection.
    match target_family.as_str() {
        "unix" => {
            build.define("SQLITE_OS_UNIX", "1");
        }
        "windows" => {
            build.define("SQLITE_OS_WIN", "1");
        }
        _ => {}
    }

    match target_os.as_str() {
        "android" | "ios" | "macos" => {
            build.define("HAVE_USLEEP", "1");
            build.define("HAVE_LOCALTIME_R", "1");
        }
        "linux" => {
            build.define("HAVE_USLEEP", "1");
            build.define("HAVE_LOCALTIME_R", "1");
            build.define("HAVE_POSIX_FALLOCATE", "1");
        }
        _ => {}
    }

    // Suppress warnings from the amalgamation (third-party code)
    build.warnings(false);
    build.compile("sqlite3mc");
}
