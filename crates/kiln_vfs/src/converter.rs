//! Conversion between concrete paths and opaque file references.

use crate::file::{VirtualFile, VirtualFileRef};
use kiln_common::Interner;
use std::path::{Path, PathBuf};

/// Central registry converting between filesystem paths and
/// [`VirtualFileRef`]s.
///
/// The converter owns the path interner, so it is the single authority on
/// file identity for a compilation run. It is shared (`Arc`) between the
/// driver, the stamp oracle, and the analysis callback; interning is
/// thread-safe because the compile step is parallel.
pub struct FileConverter {
    interner: Interner,
}

impl FileConverter {
    /// Creates a new converter with an empty interner.
    pub fn new() -> Self {
        Self {
            interner: Interner::new(),
        }
    }

    /// Interns a path, returning its opaque reference.
    pub fn to_ref(&self, path: &Path) -> VirtualFileRef {
        VirtualFileRef::new(self.interner.get_or_intern(&path.to_string_lossy()))
    }

    /// Builds a [`VirtualFile`] for a path, interning it in the process.
    pub fn to_virtual_file(&self, path: &Path) -> VirtualFile {
        VirtualFile::new(self.to_ref(path), path.to_path_buf())
    }

    /// Resolves a reference back to its concrete path.
    pub fn resolve(&self, vref: VirtualFileRef) -> PathBuf {
        PathBuf::from(self.interner.resolve(vref.name()))
    }

    /// Resolves a reference into a readable [`VirtualFile`].
    pub fn resolve_file(&self, vref: VirtualFileRef) -> VirtualFile {
        VirtualFile::new(vref, self.resolve(vref))
    }

    /// Renders a reference for log and error messages.
    pub fn display(&self, vref: VirtualFileRef) -> String {
        self.interner.resolve(vref.name()).to_string()
    }
}

impl Default for FileConverter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_path_same_ref() {
        let conv = FileConverter::new();
        let a = conv.to_ref(Path::new("src/A.src"));
        let b = conv.to_ref(Path::new("src/A.src"));
        assert_eq!(a, b);
    }

    #[test]
    fn different_paths_different_refs() {
        let conv = FileConverter::new();
        assert_ne!(
            conv.to_ref(Path::new("src/A.src")),
            conv.to_ref(Path::new("src/B.src"))
        );
    }

    #[test]
    fn resolve_roundtrip() {
        let conv = FileConverter::new();
        let vref = conv.to_ref(Path::new("src/A.src"));
        assert_eq!(conv.resolve(vref), PathBuf::from("src/A.src"));
    }

    #[test]
    fn virtual_file_carries_path_and_ref() {
        let conv = FileConverter::new();
        let file = conv.to_virtual_file(Path::new("src/A.src"));
        assert_eq!(file.path(), Path::new("src/A.src"));
        assert_eq!(file.vref(), conv.to_ref(Path::new("src/A.src")));
    }

    #[test]
    fn display_shows_path_text() {
        let conv = FileConverter::new();
        let vref = conv.to_ref(Path::new("src/A.src"));
        assert_eq!(conv.display(vref), "src/A.src");
    }
}
