//! Interned identifiers for cheap cloning and O(1) equality comparison.

use lasso::ThreadedRodeo;
use serde::{Deserialize, Serialize};

/// An interned string represented as a `u32` index into an [`Interner`].
///
/// Kiln interns logical file paths so that the analysis maps can key on a
/// `Copy` identifier instead of owned paths. Equality and hashing operate on
/// the index only.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub struct Name(u32);

impl Name {
    /// Creates a `Name` from a raw `u32` index.
    ///
    /// Intended for deserialization and tests; normal use goes through
    /// [`Interner::get_or_intern`].
    pub fn from_raw(index: u32) -> Self {
        Self(index)
    }

    /// Returns the raw `u32` index of this name.
    pub fn as_raw(self) -> u32 {
        self.0
    }
}

// SAFETY: `Name` wraps a `u32`, which always fits in a `usize` on supported
// platforms. `try_from_usize` rejects values that do not fit in `u32`.
unsafe impl lasso::Key for Name {
    fn into_usize(self) -> usize {
        self.0 as usize
    }

    fn try_from_usize(int: usize) -> Option<Self> {
        u32::try_from(int).ok().map(Name)
    }
}

/// Thread-safe string interner backed by [`lasso::ThreadedRodeo`].
///
/// The compile step is parallel and the analysis callback interns paths from
/// arbitrary compiler threads, so interning must be concurrent.
pub struct Interner {
    rodeo: ThreadedRodeo<Name>,
}

impl Interner {
    /// Creates a new empty interner.
    pub fn new() -> Self {
        Self {
            rodeo: ThreadedRodeo::new(),
        }
    }

    /// Interns a string, returning its [`Name`]. Re-interning an existing
    /// string returns the same name without allocating.
    pub fn get_or_intern(&self, s: &str) -> Name {
        self.rodeo.get_or_intern(s)
    }

    /// Resolves a [`Name`] back to its string value.
    ///
    /// # Panics
    ///
    /// Panics if the name was not created by this interner.
    pub fn resolve(&self, name: Name) -> &str {
        self.rodeo.resolve(&name)
    }
}

impl Default for Interner {
    fn default() -> Self {
        Self::new()
    }
}
