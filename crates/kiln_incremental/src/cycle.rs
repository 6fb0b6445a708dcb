//! The prune → compile → merge → recompute loop (C7).

use crate::callback::BuildCallback;
use crate::changes::detect_initial_changes;
use crate::error::IncError;
use crate::external::{CompileError, Compiler, DependencyChanges, Lookup, PreviousAnalysis};
use crate::invalidate::{invalidate_classes, invalidated_sources, ApiChange};
use crate::options::IncOptions;
use kiln_analysis::{Analysis, AnalyzedClass};
use kiln_classfile::ClassFileManager;
use kiln_vfs::{FileConverter, StampOracle, VirtualFile, VirtualFileRef};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

/// Runs the invalidation loop for one compile run. Borrowed collaborators
/// live in the driver, which owns the manager scope.
pub(crate) struct CycleRunner<'a> {
    pub sources: &'a [VirtualFile],
    pub converter: &'a Arc<FileConverter>,
    pub oracle: &'a Arc<StampOracle>,
    pub lookup: &'a Arc<dyn Lookup>,
    pub compiler: &'a dyn Compiler,
    pub manager: &'a Arc<dyn ClassFileManager>,
    pub options: &'a IncOptions,
    pub cancel: &'a Arc<AtomicBool>,
}

impl CycleRunner<'_> {
    /// Returns `(changed, analysis, cycles)`.
    pub fn run(&self, previous: &Analysis) -> Result<(bool, Analysis, u32), IncError> {
        let changes = detect_initial_changes(
            previous,
            self.sources,
            self.oracle,
            self.lookup.as_ref(),
            self.converter,
        );
        if changes.is_empty() {
            info!("no changes detected; analysis is up to date");
            return Ok((false, previous.clone(), 0));
        }

        let current_refs: BTreeSet<VirtualFileRef> =
            self.sources.iter().map(|f| f.vref()).collect();
        let mut analysis = previous.clone();

        // Initial invalidation: directly changed sources first.
        let mut invalidated: BTreeSet<VirtualFileRef> = BTreeSet::new();
        invalidated.extend(&changes.added);
        invalidated.extend(&changes.modified);
        invalidated.extend(&changes.product_affected);

        for library in &changes.modified_libraries {
            invalidated.extend(analysis.relations.sources_using_library(library).copied());
        }

        // External API deltas expand through the external relations.
        let external_changes: Vec<ApiChange> = changes
            .external_api_changes
            .iter()
            .filter_map(|c| ApiChange::between(&c.binary_name, &c.previous, c.current.as_ref()))
            .collect();
        let external_classes = invalidate_classes(&analysis.relations, &external_changes, true);
        invalidated.extend(invalidated_sources(&analysis.relations, &external_classes));

        // Classes of removed sources disappear; their dependents recompile.
        let removed_classes: Vec<String> = changes
            .removed
            .iter()
            .flat_map(|src| analysis.relations.classes_of(src).cloned().collect::<Vec<_>>())
            .collect();
        let removal_changes: Vec<ApiChange> = removed_classes
            .iter()
            .filter_map(|class| {
                analysis
                    .apis
                    .internal_api(class)
                    .map(|old| ApiChange::removal(class, old))
            })
            .collect();
        let removal_dependents = invalidate_classes(&analysis.relations, &removal_changes, false);
        invalidated.extend(invalidated_sources(&analysis.relations, &removal_dependents));

        // Prune the removed sources up front: their products leave the
        // output set and their entries leave the analysis (B1).
        if !changes.removed.is_empty() {
            let prune = self.product_paths(&analysis, &changes.removed);
            self.manager.delete(&prune)?;
            analysis.remove_sources(&changes.removed);
        }

        invalidated.retain(|src| current_refs.contains(src));

        if invalidated.is_empty() {
            debug!("changes require no recompilation");
            return Ok((!changes.removed.is_empty(), analysis, 0));
        }

        let mut dep_changes = DependencyChanges {
            modified_libraries: changes
                .modified_libraries
                .iter()
                .map(|l| self.converter.resolve_file(*l))
                .collect(),
            modified_classes: changes
                .external_api_changes
                .iter()
                .map(|c| c.binary_name.clone())
                .collect(),
        };

        let total = self.sources.len();
        let mut cycles = 0u32;

        loop {
            if cycles >= self.options.max_cycles {
                warn!(cycles, "invalidation cycle ceiling hit");
                return Err(IncError::CycleLimitExceeded { cycles });
            }
            // Cancellation is polled between cycles only; a cycle that has
            // started runs to completion (or the compiler raises Cancelled).
            if self.cancel.load(Ordering::SeqCst) {
                return Err(IncError::Cancelled);
            }
            cycles += 1;

            // Escalation is checked at cycle boundaries only, so the
            // class-file manager sees one consistent prune per cycle.
            if invalidated.len() < total {
                let fraction = invalidated.len() as f64 / total as f64;
                if fraction > self.options.recompile_all_fraction {
                    info!(
                        invalidated = invalidated.len(),
                        total, "invalidated fraction above threshold; recompiling everything"
                    );
                    invalidated = current_refs.clone();
                }
            }

            info!(
                cycle = cycles,
                sources = invalidated.len(),
                "compiling invalidated sources"
            );

            // APIs as they were before this cycle, for the post-merge diff.
            let watched: BTreeMap<String, AnalyzedClass> = invalidated
                .iter()
                .flat_map(|src| analysis.relations.classes_of(src).cloned().collect::<Vec<_>>())
                .filter_map(|class| {
                    analysis
                        .apis
                        .internal_api(&class)
                        .cloned()
                        .map(|api| (class, api))
                })
                .collect();

            let prune = self.product_paths(&analysis, &invalidated);
            self.manager.delete(&prune)?;
            analysis.remove_sources(&invalidated);

            let callback = BuildCallback::new(
                Arc::clone(self.converter),
                Arc::clone(self.oracle),
                Arc::clone(self.manager),
                Arc::clone(self.lookup),
                PreviousAnalysis::Analysis(Arc::new(analysis.clone())),
                self.options.clone(),
                now_ns(),
            );
            let to_compile: Vec<VirtualFile> = invalidated
                .iter()
                .map(|src| self.converter.resolve_file(*src))
                .collect();
            match self
                .compiler
                .compile(&to_compile, &dep_changes, &callback, self.manager.as_ref())
            {
                Ok(()) => {}
                Err(CompileError::Cancelled) => return Err(IncError::Cancelled),
                Err(CompileError::Failed { message }) => {
                    return Err(IncError::CompileFailed { message })
                }
            }

            let delta = callback.get()?;
            analysis.merge(delta)?;

            // Diff the recompiled classes' APIs and expand.
            let mut api_changes = Vec::new();
            for (class, old) in &watched {
                if let Some(change) =
                    ApiChange::between(class, old, analysis.apis.internal_api(class))
                {
                    api_changes.push(change);
                }
            }
            let next_classes = invalidate_classes(&analysis.relations, &api_changes, false);
            let mut next = invalidated_sources(&analysis.relations, &next_classes);
            // Sources compiled this cycle already saw the new APIs.
            next.retain(|src| current_refs.contains(src) && !invalidated.contains(src));

            if next.is_empty() {
                info!(cycles, "invalidation reached a fixed point");
                break;
            }

            dep_changes = DependencyChanges {
                modified_libraries: Vec::new(),
                modified_classes: api_changes
                    .iter()
                    .filter_map(|c| analysis.relations.binary_name_of(&c.class).cloned())
                    .collect(),
            };
            invalidated = next;
        }

        Ok((true, analysis, cycles))
    }

    fn product_paths(
        &self,
        analysis: &Analysis,
        sources: &BTreeSet<VirtualFileRef>,
    ) -> Vec<PathBuf> {
        sources
            .iter()
            .flat_map(|src| {
                analysis
                    .relations
                    .products_of(src)
                    .map(|p| self.converter.resolve(*p))
                    .collect::<Vec<_>>()
            })
            .collect()
    }
}

pub(crate) fn now_ns() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}
