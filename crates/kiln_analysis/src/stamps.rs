//! Recorded stamps for sources, products, and libraries.

use kiln_vfs::{Stamp, VirtualFileRef};
use std::collections::HashMap;

/// The stamps an analysis recorded for every file it knows about.
///
/// Sources and libraries carry content-hash stamps, products carry
/// last-modified stamps; the change detector compares these against the
/// oracle's current observations.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Stamps {
    sources: HashMap<VirtualFileRef, Stamp>,
    products: HashMap<VirtualFileRef, Stamp>,
    libraries: HashMap<VirtualFileRef, Stamp>,
}

impl Stamps {
    /// Creates an empty stamp table.
    pub fn new() -> Self {
        Self::default()
    }

    /// The recorded stamp of a source, if known.
    pub fn source(&self, src: &VirtualFileRef) -> Option<Stamp> {
        self.sources.get(src).copied()
    }

    /// The recorded stamp of a product, if known.
    pub fn product(&self, product: &VirtualFileRef) -> Option<Stamp> {
        self.products.get(product).copied()
    }

    /// The recorded stamp of a library, if known.
    pub fn library(&self, library: &VirtualFileRef) -> Option<Stamp> {
        self.libraries.get(library).copied()
    }

    /// Records a source stamp.
    pub fn set_source(&mut self, src: VirtualFileRef, stamp: Stamp) {
        self.sources.insert(src, stamp);
    }

    /// Records a product stamp.
    pub fn set_product(&mut self, product: VirtualFileRef, stamp: Stamp) {
        self.products.insert(product, stamp);
    }

    /// Records a library stamp.
    pub fn set_library(&mut self, library: VirtualFileRef, stamp: Stamp) {
        self.libraries.insert(library, stamp);
    }

    /// Iterates all known sources.
    pub fn sources(&self) -> impl Iterator<Item = (&VirtualFileRef, &Stamp)> + '_ {
        self.sources.iter()
    }

    /// Iterates all known products.
    pub fn products(&self) -> impl Iterator<Item = (&VirtualFileRef, &Stamp)> + '_ {
        self.products.iter()
    }

    /// Iterates all known libraries.
    pub fn libraries(&self) -> impl Iterator<Item = (&VirtualFileRef, &Stamp)> + '_ {
        self.libraries.iter()
    }

    /// Returns `true` if `src` is a known source.
    pub fn contains_source(&self, src: &VirtualFileRef) -> bool {
        self.sources.contains_key(src)
    }

    /// Forgets a source stamp.
    pub fn remove_source(&mut self, src: &VirtualFileRef) {
        self.sources.remove(src);
    }

    /// Forgets a product stamp.
    pub fn remove_product(&mut self, product: &VirtualFileRef) {
        self.products.remove(product);
    }

    /// Keeps only the libraries in `live`.
    pub fn retain_libraries(&mut self, live: &std::collections::BTreeSet<VirtualFileRef>) {
        self.libraries.retain(|lib, _| live.contains(lib));
    }

    /// Adds every stamp of `other`; `other` wins on conflicts.
    pub fn merge(&mut self, other: Stamps) {
        self.sources.extend(other.sources);
        self.products.extend(other.products);
        self.libraries.extend(other.libraries);
    }

    /// Returns `true` if no stamps are recorded.
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty() && self.products.is_empty() && self.libraries.is_empty()
    }
}
