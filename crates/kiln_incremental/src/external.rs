//! Interfaces to the external collaborators: the compiler, the classpath
//! lookup, and the previous analysis handed in by the embedder.

use crate::callback::AnalysisCallback;
use kiln_analysis::Analysis;
use kiln_classfile::ClassFileManager;
use kiln_vfs::VirtualFile;
use std::sync::Arc;

/// Failure modes of the external compile function.
#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    /// The compile failed (type errors, crashes, anything fatal).
    #[error("compile failed: {message}")]
    Failed {
        /// The compiler's failure message.
        message: String,
    },

    /// The compile observed the cancellation request and stopped.
    #[error("compile cancelled")]
    Cancelled,
}

/// The external source-to-bytecode compiler, supplied by the embedder.
///
/// One call performs a single full compile step over the given sources. The
/// compiler must report everything it learns into `callback`, write all
/// emitted artifacts through `manager`, and may invoke both from parallel
/// worker threads.
pub trait Compiler {
    /// Compiles `sources` and reports into `callback`.
    fn compile(
        &self,
        sources: &[VirtualFile],
        changes: &DependencyChanges,
        callback: &dyn AnalysisCallback,
        manager: &dyn ClassFileManager,
    ) -> Result<(), CompileError>;
}

/// A summary of upstream changes handed to the compiler with each cycle.
#[derive(Clone, Debug, Default)]
pub struct DependencyChanges {
    /// Library files whose stamp changed since the previous analysis.
    pub modified_libraries: Vec<VirtualFile>,
    /// Binary names of classes whose external API changed.
    pub modified_classes: Vec<String>,
}

impl DependencyChanges {
    /// Returns `true` if nothing upstream changed.
    pub fn is_empty(&self) -> bool {
        self.modified_libraries.is_empty() && self.modified_classes.is_empty()
    }
}

/// Resolution of binary names against the classpath and against analyses of
/// upstream compilation units.
pub trait Lookup: Send + Sync {
    /// The classpath entry providing `binary_name`, if any.
    fn lookup_on_classpath(&self, binary_name: &str) -> Option<VirtualFile>;

    /// The analysis of the upstream unit that compiled `binary_name`, if
    /// one is known.
    fn lookup_analysis(&self, binary_name: &str) -> Option<&Analysis>;
}

/// The previous analysis as handed in by the embedder.
///
/// Tagged explicitly so a missing previous run is distinguishable from an
/// empty one; unknown representations fail fast at the boundary instead of
/// deep inside a cycle.
#[derive(Clone)]
pub enum PreviousAnalysis {
    /// A previous run's analysis.
    Analysis(Arc<Analysis>),
    /// No previous run; everything compiles from scratch.
    Empty,
}

impl PreviousAnalysis {
    /// The analysis, if one is present.
    pub fn get(&self) -> Option<&Analysis> {
        match self {
            PreviousAnalysis::Analysis(analysis) => Some(analysis),
            PreviousAnalysis::Empty => None,
        }
    }
}
