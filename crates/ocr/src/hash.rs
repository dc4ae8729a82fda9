use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

pub fn sha256_bytes(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

/// Lowercase hex, 64 chars.
pub fn to_hex(hash: &[u8; 32]) -> String {
    hash.iter().map(|b| format!("{b:02x}")).collect()
}

/// Where a captured frame is kept: `<dir>/<first_2_hex_chars>/<full_hex>.<ext>`.
pub fn snapshot_path(snapshots_dir: &Path, hash_hex: &str, ext: &str) -> PathBuf {
    let shard = hash_hex.get(..2).unwrap_or(hash_hex);
    snapshots_dir.join(shard).join(format!("{hash_hex}.{ext}"))
}
