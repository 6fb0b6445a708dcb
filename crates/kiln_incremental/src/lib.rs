//! The incremental compilation engine.
//!
//! Given a set of sources, the analysis a previous run produced, and an
//! external [`Compiler`], the engine decides the minimum set of sources to
//! recompile and drives prune → compile → merge → recompute cycles until no
//! further invalidations appear. Artifact changes flow through a
//! [`ClassFileManager`](kiln_classfile::ClassFileManager), so a failed run
//! leaves the workspace unchanged.
//!
//! The entry point is [`compile_incremental`]; the compiler reports into an
//! [`AnalysisCallback`] while it runs.

#![warn(missing_docs)]

pub mod callback;
pub mod changes;
mod cycle;
pub mod driver;
pub mod error;
pub mod external;
pub mod invalidate;
pub mod options;

pub use callback::{AnalysisCallback, BuildCallback};
pub use changes::{detect_initial_changes, ExternalApiChange, InitialChanges};
pub use driver::{compile_incremental, CompileResult};
pub use error::IncError;
pub use external::{CompileError, Compiler, DependencyChanges, Lookup, PreviousAnalysis};
pub use invalidate::{invalidate_classes, invalidated_sources, ApiChange};
pub use options::IncOptions;
