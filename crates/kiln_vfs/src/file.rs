//! Opaque file references and the virtual files built on top of them.

use kiln_common::Name;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Opaque reference to a logical file path.
///
/// References are interned through a [`FileConverter`](crate::FileConverter);
/// equality and ordering operate on the interned identifier, never on path
/// text. All analysis maps key files by `VirtualFileRef`.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub struct VirtualFileRef(Name);

impl VirtualFileRef {
    pub(crate) fn new(name: Name) -> Self {
        Self(name)
    }

    pub(crate) fn name(self) -> Name {
        self.0
    }
}

/// A file reference paired with its concrete path, able to read its content.
///
/// `VirtualFile` compares by reference identity only; the path is carried so
/// the stamp oracle and the external compiler can reach the bytes.
#[derive(Clone, Debug)]
pub struct VirtualFile {
    vref: VirtualFileRef,
    path: PathBuf,
}

impl VirtualFile {
    pub(crate) fn new(vref: VirtualFileRef, path: PathBuf) -> Self {
        Self { vref, path }
    }

    /// Returns the opaque reference identifying this file.
    pub fn vref(&self) -> VirtualFileRef {
        self.vref
    }

    /// Returns the concrete filesystem path of this file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the full content of this file.
    pub fn read(&self) -> std::io::Result<Vec<u8>> {
        std::fs::read(&self.path)
    }
}

impl PartialEq for VirtualFile {
    fn eq(&self, other: &Self) -> bool {
        self.vref == other.vref
    }
}

impl Eq for VirtualFile {}
