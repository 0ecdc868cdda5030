//! Content digests for change detection.
//!
//! Digests are compared for equality only, never used for security. The full
//! file is always read before hashing: change detection is exact-content
//! comparison, not mtime or size heuristics.

use std::io;
use std::path::Path;

/// Hex-encoded blake3 digest of a byte slice.
pub fn hash_bytes(bytes: &[u8]) -> String {
    blake3::hash(bytes).to_hex().to_string()
}

/// Hex-encoded blake3 digest of a file's entire contents.
pub async fn hash_file(path: &Path) -> io::Result<String> {
    let buf = tokio::fs::read(path).await?;
    Ok(hash_bytes(&buf))
}
