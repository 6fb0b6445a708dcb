//! Detection of initial changes against the previous analysis (C6).

use crate::external::Lookup;
use kiln_analysis::{Analysis, AnalyzedClass};
use kiln_vfs::{FileConverter, StampOracle, VirtualFile, VirtualFileRef};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// An external class whose API differs from what the previous analysis
/// recorded.
#[derive(Clone, Debug)]
pub struct ExternalApiChange {
    /// Binary name of the changed class.
    pub binary_name: String,
    /// The API the previous analysis recorded.
    pub previous: AnalyzedClass,
    /// The API the lookup reports now; `None` if it no longer resolves.
    pub current: Option<AnalyzedClass>,
}

/// Everything that changed since the previous analysis was produced.
#[derive(Clone, Debug, Default)]
pub struct InitialChanges {
    /// Sources in the input set the previous analysis does not know.
    pub added: BTreeSet<VirtualFileRef>,
    /// Sources the previous analysis knows that left the input set.
    pub removed: BTreeSet<VirtualFileRef>,
    /// Known sources whose stamp no longer matches.
    pub modified: BTreeSet<VirtualFileRef>,
    /// Sources owning a product whose stamp changed or that disappeared.
    pub product_affected: BTreeSet<VirtualFileRef>,
    /// Libraries whose stamp changed or that no longer resolve.
    pub modified_libraries: Vec<VirtualFileRef>,
    /// External classes whose API hash changed.
    pub external_api_changes: Vec<ExternalApiChange>,
}

impl InitialChanges {
    /// Returns `true` if nothing changed and the run can short-circuit.
    pub fn is_empty(&self) -> bool {
        self.added.is_empty()
            && self.removed.is_empty()
            && self.modified.is_empty()
            && self.product_affected.is_empty()
            && self.modified_libraries.is_empty()
            && self.external_api_changes.is_empty()
    }
}

/// Resolves the current analyzed API of an external binary name.
pub(crate) fn resolve_external(lookup: &dyn Lookup, binary_name: &str) -> Option<AnalyzedClass> {
    lookup.lookup_analysis(binary_name).and_then(|analysis| {
        analysis
            .relations
            .src_class_of_binary(binary_name)
            .and_then(|class| analysis.apis.internal_api(class))
            .cloned()
    })
}

/// Compares the current input set and environment against the previous
/// analysis.
pub fn detect_initial_changes(
    previous: &Analysis,
    sources: &[VirtualFile],
    oracle: &StampOracle,
    lookup: &dyn Lookup,
    converter: &FileConverter,
) -> InitialChanges {
    let current: BTreeMap<VirtualFileRef, &VirtualFile> =
        sources.iter().map(|f| (f.vref(), f)).collect();

    let mut changes = InitialChanges::default();

    for (vref, file) in &current {
        match previous.stamps.source(vref) {
            None => {
                changes.added.insert(*vref);
            }
            Some(recorded) => {
                let now = oracle.source(file);
                if now != recorded {
                    changes.modified.insert(*vref);
                }
            }
        }
    }

    for (vref, _) in previous.stamps.sources() {
        if !current.contains_key(vref) {
            changes.removed.insert(*vref);
        }
    }

    // A product deleted or overwritten behind the engine's back forces its
    // owning source to be rebuilt.
    for (product, recorded) in previous.stamps.products() {
        let now = oracle.product(&converter.resolve(*product));
        if now != *recorded {
            if let Some(owner) = previous.relations.owner_of_product(product) {
                if current.contains_key(&owner) {
                    changes.product_affected.insert(owner);
                }
            }
        }
    }

    for (library, recorded) in previous.stamps.libraries() {
        let now = oracle.library(&converter.resolve_file(*library));
        if now != *recorded {
            changes.modified_libraries.push(*library);
        }
    }
    changes.modified_libraries.sort();

    for binary_name in previous.relations.referenced_external_binaries() {
        let Some(recorded) = previous.apis.external_api(&binary_name) else {
            continue;
        };
        let now = resolve_external(lookup, &binary_name);
        let has_inheritors = !previous
            .relations
            .external()
            .inheritance_dependents(&binary_name)
            .is_empty();
        let changed = match &now {
            None => true,
            Some(api) => {
                api.api_hash != recorded.api_hash
                    || (has_inheritors && api.extra_hash != recorded.extra_hash)
            }
        };
        if changed {
            changes.external_api_changes.push(ExternalApiChange {
                binary_name,
                previous: recorded.clone(),
                current: now,
            });
        }
    }

    debug!(
        added = changes.added.len(),
        removed = changes.removed.len(),
        modified = changes.modified.len(),
        product_affected = changes.product_affected.len(),
        libraries = changes.modified_libraries.len(),
        external = changes.external_api_changes.len(),
        "detected initial changes"
    );
    changes
}
