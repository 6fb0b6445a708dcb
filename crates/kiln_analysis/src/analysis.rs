//! The top-level analysis snapshot.

use crate::api::{AnalyzedClass, UsedName};
use crate::error::AnalysisError;
use crate::infos::{Compilations, SourceInfo, SourceInfos};
use crate::relations::{
    ExternalDependency, InternalDependency, LocalProduct, NonLocalProduct, Relations,
};
use crate::stamps::Stamps;
use kiln_vfs::{Stamp, VirtualFileRef};
use std::collections::{BTreeSet, HashMap};

/// The analyzed APIs of an analysis: internal classes keyed by source class
/// name, external classes keyed by binary name.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Apis {
    internal: HashMap<String, AnalyzedClass>,
    external: HashMap<String, AnalyzedClass>,
}

impl Apis {
    /// Creates an empty API table.
    pub fn new() -> Self {
        Self::default()
    }

    /// The analyzed API of an internal class.
    pub fn internal_api(&self, class: &str) -> Option<&AnalyzedClass> {
        self.internal.get(class)
    }

    /// The analyzed API of an external class, as observed when the
    /// dependency on it was recorded.
    pub fn external_api(&self, binary_name: &str) -> Option<&AnalyzedClass> {
        self.external.get(binary_name)
    }

    /// Records an internal class API.
    pub fn set_internal(&mut self, class: String, api: AnalyzedClass) {
        self.internal.insert(class, api);
    }

    /// Records an external class API.
    pub fn set_external(&mut self, binary_name: String, api: AnalyzedClass) {
        self.external.insert(binary_name, api);
    }

    /// Iterates internal class APIs.
    pub fn internal_iter(&self) -> impl Iterator<Item = (&String, &AnalyzedClass)> + '_ {
        self.internal.iter()
    }

    /// Iterates external class APIs.
    pub fn external_iter(&self) -> impl Iterator<Item = (&String, &AnalyzedClass)> + '_ {
        self.external.iter()
    }

    /// Forgets an internal class.
    pub fn remove_internal(&mut self, class: &str) {
        self.internal.remove(class);
    }

    /// Keeps only external entries whose binary name is in `live`.
    pub fn retain_external(&mut self, live: &BTreeSet<String>) {
        self.external.retain(|name, _| live.contains(name));
    }

    /// Adds every API of `other`; `other` wins on conflicts.
    pub fn merge(&mut self, other: Apis) {
        self.internal.extend(other.internal);
        self.external.extend(other.external);
    }

    /// Returns `true` if no APIs are recorded.
    pub fn is_empty(&self) -> bool {
        self.internal.is_empty() && self.external.is_empty()
    }
}

/// An immutable snapshot of everything one compile run learned (C2).
///
/// "Immutable" by convention: the engine clones the previous snapshot,
/// applies `remove_sources` and `merge`, and assigns the result. Invariant
/// I2 holds by construction: a source enters only through [`add_source`],
/// which records its stamp and every class API together.
///
/// [`add_source`]: Analysis::add_source
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Analysis {
    /// Stamps of all known sources, products, and libraries.
    pub stamps: Stamps,
    /// Analyzed class APIs.
    pub apis: Apis,
    /// The relations graph.
    pub relations: Relations,
    /// Per-source diagnostics and entry points.
    pub infos: SourceInfos,
    /// Record of the compile cycles that built this analysis.
    pub compilations: Compilations,
}

impl Analysis {
    /// Creates an empty analysis.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Returns `true` if the analysis knows nothing.
    pub fn is_empty(&self) -> bool {
        self.stamps.is_empty()
            && self.apis.is_empty()
            && self.relations.is_empty()
            && self.infos.is_empty()
            && self.compilations.is_empty()
    }

    /// Records everything one source contributed in a compile cycle.
    ///
    /// Enforces I1 (binary class names are claimed by one source class) and
    /// I5 (library dependencies are disjoint from products).
    #[allow(clippy::too_many_arguments)]
    pub fn add_source(
        &mut self,
        src: VirtualFileRef,
        apis: Vec<AnalyzedClass>,
        stamp: Stamp,
        info: SourceInfo,
        non_local_products: Vec<NonLocalProduct>,
        local_products: Vec<LocalProduct>,
        internal_deps: Vec<InternalDependency>,
        external_deps: Vec<ExternalDependency>,
        library_deps: Vec<(VirtualFileRef, Stamp)>,
    ) -> Result<(), AnalysisError> {
        let product_refs: BTreeSet<VirtualFileRef> = non_local_products
            .iter()
            .map(|p| p.product)
            .chain(local_products.iter().map(|p| p.product))
            .collect();
        for (lib, _) in &library_deps {
            if product_refs.contains(lib) {
                return Err(AnalysisError::LibraryIsProduct { library: *lib });
            }
        }

        let classes: BTreeSet<String> = apis.iter().map(|a| a.name.clone()).collect();
        self.relations.add_source(
            src,
            &classes,
            &non_local_products,
            &local_products,
            &internal_deps,
            &external_deps,
            &library_deps.iter().map(|(lib, _)| *lib).collect::<Vec<_>>(),
        )?;

        self.stamps.set_source(src, stamp);
        for p in &non_local_products {
            self.stamps.set_product(p.product, p.stamp);
        }
        for p in &local_products {
            self.stamps.set_product(p.product, p.stamp);
        }
        for (lib, lib_stamp) in library_deps {
            self.stamps.set_library(lib, lib_stamp);
        }

        for api in apis {
            self.apis.set_internal(api.name.clone(), api);
        }
        for dep in external_deps {
            self.apis.set_external(dep.to_binary_name.clone(), dep.to);
        }

        self.infos.set(src, info);
        Ok(())
    }

    /// Records a name use by a class.
    pub fn add_used_name(&mut self, class: &str, used: UsedName) {
        self.relations.add_used_name(class, used);
    }

    /// Drops every entry owned by the given sources (`--`).
    ///
    /// External APIs and library stamps no longer referenced by any
    /// surviving source are pruned too.
    pub fn remove_sources(&mut self, sources: &BTreeSet<VirtualFileRef>) {
        for src in sources {
            let classes: Vec<String> = self.relations.classes_of(src).cloned().collect();
            for class in &classes {
                self.apis.remove_internal(class);
            }
            for product in self.relations.products_of(src).copied().collect::<Vec<_>>() {
                self.stamps.remove_product(&product);
            }
            self.stamps.remove_source(src);
            self.infos.remove(src);
        }
        self.relations.remove_sources(sources);

        let live_binaries = self.relations.referenced_external_binaries();
        self.apis.retain_external(&live_binaries);
        let live_libraries: BTreeSet<VirtualFileRef> =
            self.relations.all_libraries().copied().collect();
        self.stamps.retain_libraries(&live_libraries);
    }

    /// Merges another analysis into this one.
    ///
    /// Commutative only for non-conflicting sources: when both analyses
    /// contain a source, `other` wins wholesale. This is how a recompiled
    /// source's callback delta replaces its prior record.
    pub fn merge(&mut self, other: Analysis) -> Result<(), AnalysisError> {
        let overlapping: BTreeSet<VirtualFileRef> = other
            .stamps
            .sources()
            .map(|(src, _)| *src)
            .filter(|src| self.stamps.contains_source(src))
            .collect();
        if !overlapping.is_empty() {
            self.remove_sources(&overlapping);
        }

        self.relations.merge(other.relations)?;
        self.stamps.merge(other.stamps);
        self.apis.merge(other.apis);
        self.infos.merge(other.infos);
        self.compilations.merge(other.compilations);
        Ok(())
    }

    /// Iterates all sources the analysis knows.
    pub fn sources(&self) -> impl Iterator<Item = VirtualFileRef> + '_ {
        self.stamps.sources().map(|(src, _)| *src)
    }

    /// Number of sources the analysis knows.
    pub fn source_count(&self) -> usize {
        self.stamps.sources().count()
    }
}
