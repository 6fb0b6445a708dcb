//! Engine configuration.

use serde::Deserialize;

/// Options steering one incremental compilation run.
///
/// Embedders construct this directly or deserialize it from their own
/// configuration; every field falls back to its default when absent.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct IncOptions {
    /// Assert that the compiler registers each source at most once per cycle.
    pub strict_mode: bool,

    /// Retain full (un-minimized) API shapes in the analysis for debugging.
    pub api_debug: bool,

    /// Fold sealed-hierarchy information only into a type's own name hash
    /// instead of every member hash.
    pub use_optimized_sealed: bool,

    /// Log relation mutations verbosely.
    pub relations_debug: bool,

    /// Stage deletions and roll back on failure instead of unlinking eagerly.
    pub transactional: bool,

    /// If the fraction of invalidated sources exceeds this, escalate to one
    /// pass over all sources. Checked at cycle boundaries only.
    pub recompile_all_fraction: f64,

    /// Hard ceiling on invalidation cycles before the run is aborted.
    pub max_cycles: u32,
}

impl Default for IncOptions {
    fn default() -> Self {
        Self {
            strict_mode: false,
            api_debug: false,
            use_optimized_sealed: false,
            relations_debug: false,
            transactional: true,
            recompile_all_fraction: 0.5,
            max_cycles: 16,
        }
    }
}
