//! Content and API hashing for change detection and invalidation.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A 128-bit content hash computed with XXH3, used to stamp file contents.
///
/// Two files with the same `ContentHash` are assumed identical. Content
/// hashes back the "did this source change at all" decision; the finer
/// "did its interface change" decision uses [`ApiHash`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentHash([u8; 16]);

impl ContentHash {
    /// Computes a content hash of a byte slice using XXH3-128.
    pub fn from_bytes(data: &[u8]) -> Self {
        let hash = xxhash_rust::xxh3::xxh3_128(data);
        Self(hash.to_le_bytes())
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({:02x}{:02x}..)", self.0[0], self.0[1])
    }
}

/// A 64-bit digest of a class API or of a single public name.
///
/// API hashes are computed over canonical signature text supplied by the
/// compiler. Equality of hashes is taken to mean equality of the hashed
/// interface, so dependents of a class whose hashes are unchanged after a
/// recompile are not invalidated.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ApiHash(u64);

impl ApiHash {
    /// The hash of an absent API, used for classes that no longer exist.
    pub const ABSENT: ApiHash = ApiHash(0);

    /// Computes an API hash of canonical signature text using XXH3-64.
    pub fn of(text: &str) -> Self {
        Self(xxhash_rust::xxh3::xxh3_64(text.as_bytes()))
    }

    /// Combines two hashes into one, order-sensitively.
    ///
    /// Used to fold a class half and its companion object half into a single
    /// per-class hash.
    pub fn combine(self, other: ApiHash) -> Self {
        let mut buf = [0u8; 16];
        buf[..8].copy_from_slice(&self.0.to_le_bytes());
        buf[8..].copy_from_slice(&other.0.to_le_bytes());
        Self(xxhash_rust::xxh3::xxh3_64(&buf))
    }

    /// Returns the raw 64-bit value.
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ApiHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

impl fmt::Debug for ApiHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ApiHash({:04x}..)", self.0 >> 48)
    }
}
