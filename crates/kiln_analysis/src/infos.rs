//! Per-source compile information and the record of past compilations.

use kiln_diagnostics::Problem;
use kiln_vfs::VirtualFileRef;
use std::collections::HashMap;

/// Diagnostics and entry points recorded for one source in one compile.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SourceInfo {
    /// Problems the compiler already reported to the user.
    pub reported: Vec<Problem>,
    /// Problems the compiler buffered without reporting.
    pub unreported: Vec<Problem>,
    /// Entry-point classes discovered in the source.
    pub main_classes: Vec<String>,
}

impl SourceInfo {
    /// Creates an empty info record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.reported.is_empty() && self.unreported.is_empty() && self.main_classes.is_empty()
    }
}

/// Per-source infos of an analysis.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SourceInfos {
    infos: HashMap<VirtualFileRef, SourceInfo>,
}

impl SourceInfos {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// The info for a source, if any.
    pub fn get(&self, src: &VirtualFileRef) -> Option<&SourceInfo> {
        self.infos.get(src)
    }

    /// Records the info for a source, replacing any prior record.
    pub fn set(&mut self, src: VirtualFileRef, info: SourceInfo) {
        self.infos.insert(src, info);
    }

    /// Forgets the info for a source.
    pub fn remove(&mut self, src: &VirtualFileRef) {
        self.infos.remove(src);
    }

    /// Adds every info of `other`; `other` wins on conflicts.
    pub fn merge(&mut self, other: SourceInfos) {
        self.infos.extend(other.infos);
    }

    /// Iterates all recorded infos.
    pub fn iter(&self) -> impl Iterator<Item = (&VirtualFileRef, &SourceInfo)> + '_ {
        self.infos.iter()
    }

    /// Returns `true` if no infos are recorded.
    pub fn is_empty(&self) -> bool {
        self.infos.is_empty()
    }
}

/// One completed compile cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Compilation {
    /// Nanosecond Unix timestamp at which the cycle's compile started.
    pub start_time_ns: u64,
}

/// The ordered record of compile cycles that built an analysis.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Compilations {
    all: Vec<Compilation>,
}

impl Compilations {
    /// Creates an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a compilation.
    pub fn push(&mut self, compilation: Compilation) {
        self.all.push(compilation);
    }

    /// Iterates compilations oldest-first.
    pub fn iter(&self) -> impl Iterator<Item = &Compilation> + '_ {
        self.all.iter()
    }

    /// Number of recorded compilations.
    pub fn len(&self) -> usize {
        self.all.len()
    }

    /// Returns `true` if no compilations are recorded.
    pub fn is_empty(&self) -> bool {
        self.all.is_empty()
    }

    /// Appends every compilation of `other`, keeping order.
    pub fn merge(&mut self, other: Compilations) {
        self.all.extend(other.all);
    }
}
