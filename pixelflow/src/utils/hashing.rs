//! Stable hashing and unique-name helpers.

use md5::{Digest, Md5};
use uuid::Uuid;

/// Returns a hash of `input` that is stable across processes and platforms.
///
/// Uses the first eight bytes of the MD5 digest, big-endian.
#[must_use]
pub fn stable_hash(input: &str) -> u64 {
    let digest = Md5::digest(input.as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(bytes)
}

/// Returns a process-unique, time-ordered suffix for temporary file names.
#[must_use]
pub fn unique_suffix() -> String {
    Uuid::now_v7().simple().to_string()
}
