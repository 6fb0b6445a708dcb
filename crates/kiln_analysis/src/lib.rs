//! The analysis store for the Kiln incremental compilation driver.
//!
//! An [`Analysis`] is an immutable-by-convention snapshot of everything one
//! compile run learned: per-source stamps, per-class APIs, the relations
//! graph connecting sources, classes, binary names, and used names, buffered
//! diagnostics, and the record of past compilations. The invalidation engine
//! queries it; the analysis callback produces deltas of it; deltas merge into
//! the running snapshot at each cycle boundary.

#![warn(missing_docs)]

pub mod analysis;
pub mod api;
pub mod error;
pub mod infos;
pub mod relations;
pub mod stamps;

pub use analysis::{Analysis, Apis};
pub use api::{
    AnalyzedClass, ClassLike, DefinitionKind, MemberDecl, NameHash, UseScope, UseScopes, UsedName,
};
pub use error::AnalysisError;
pub use infos::{Compilation, Compilations, SourceInfo, SourceInfos};
pub use relations::{
    DependencyContext, ExternalDependency, InternalDependency, LocalProduct, NonLocalProduct,
    Relation, Relations,
};
pub use stamps::Stamps;
