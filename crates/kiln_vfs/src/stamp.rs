//! Content stamps recording the observed state of a file at analysis time.

use kiln_common::ContentHash;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// The observed state of a file, used to detect changes between runs.
///
/// Two stamps are equivalent iff their tag and payload match; a content-hash
/// stamp is never equivalent to a last-modified stamp even for the same
/// on-disk bytes. `Empty` records a file that could not be read or does not
/// exist.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum Stamp {
    /// Last-modified time in nanoseconds since the Unix epoch.
    LastModified(u64),
    /// XXH3-128 hash of the file content.
    Hash(ContentHash),
    /// The file was absent or unreadable when stamped.
    Empty,
}

impl Stamp {
    /// Returns `true` unless this is the [`Empty`](Stamp::Empty) stamp.
    pub fn is_present(self) -> bool {
        !matches!(self, Stamp::Empty)
    }
}

impl fmt::Display for Stamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stamp::LastModified(ns) => write!(f, "lastModified({ns})"),
            Stamp::Hash(h) => write!(f, "hash({h})"),
            Stamp::Empty => write!(f, "absent"),
        }
    }
}

/// Error raised when a file cannot be stamped.
///
/// Never fatal to the engine: an unavailable stamp reads as "changed" for
/// inputs and "removed" for outputs.
#[derive(Debug, thiserror::Error)]
pub enum StampError {
    /// The underlying file could not be read.
    #[error("cannot stamp {path}: {source}")]
    Unavailable {
        /// The path that failed to stamp.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },
}
