//! Content checksums used to pin builds to a source table version.

use std::io::Read as _;
use std::path::Path;

use sha2::{Digest, Sha256};

/// Lowercase hex SHA-256 of the file at `path`.
///
/// # Errors
///
/// Returns [`std::io::Error`] if the file cannot be read.
pub fn file_sha256(path: &Path) -> std::io::Result<String> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Compares `actual` with the pinned checksum, if any. A mismatch is
/// only logged.
///
/// Returns `false` on a mismatch.
pub fn verify(path: &Path, actual: &str, expected: Option<&str>) -> bool {
    let Some(expected) = expected.map(str::trim).filter(|e| !e.is_empty()) else {
        log::debug!("No pinned checksum for {}; sha256={actual}", path.display());
        return true;
    };
    if expected.eq_ignore_ascii_case(actual) {
        log::info!("Checksum verified for {}", path.display());
        true
    } else {
        log::warn!(
            "Checksum mismatch for {}: expected {expected}, got {actual}; the table may have been refreshed since it was pinned, continuing",
            path.display()
        );
        false
    }
}
