//! Error types for analysis construction and merging.

use kiln_vfs::VirtualFileRef;

/// Invariant violations detected while building or merging an analysis.
///
/// These indicate a defective compiler integration (two sources claiming the
/// same binary class name, a library that is also a generated product) and
/// are fatal to the run.
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    /// Two different source classes claim the same binary class name.
    #[error("inconsistent analysis: binary class {binary_name} is claimed by more than one source class")]
    InconsistentAnalysis {
        /// The contested binary class name.
        binary_name: String,
    },

    /// A library dependency is also recorded as a generated product.
    #[error("inconsistent analysis: library dependency {library:?} is also a generated product")]
    LibraryIsProduct {
        /// The offending file reference.
        library: VirtualFileRef,
    },
}
