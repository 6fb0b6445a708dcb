//! The relations algebra: bidirectional maps among sources, classes, binary
//! names, dependencies, and used names.
//!
//! Every relation is stored as a forward/reverse map pair indexed by stable
//! identifiers (strings for class names, interned references for files), so
//! dependency cycles are plain data and reverse lookups cost one map probe.

use crate::api::UsedName;
use crate::error::AnalysisError;
use kiln_vfs::{Stamp, VirtualFileRef};
use std::collections::{BTreeSet, HashMap};
use std::hash::Hash;

/// How one class depends on another; the invalidation rules differ per tag.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum DependencyContext {
    /// The dependent references a member of the dependee.
    MemberRef,
    /// The dependent inherits from the dependee.
    Inheritance,
    /// Inheritance between classes of the same source; propagates as
    /// inheritance for the cycle that observes it only.
    LocalInheritance,
}

/// A dependency between two source classes of this compilation unit.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct InternalDependency {
    /// The dependent source class.
    pub from: String,
    /// The source class depended upon.
    pub to: String,
    /// How the dependency arose.
    pub context: DependencyContext,
}

/// A dependency on a class outside this compilation unit, resolved through
/// the external lookup.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct ExternalDependency {
    /// The dependent source class.
    pub from: String,
    /// Binary name of the external class.
    pub to_binary_name: String,
    /// The external class's analyzed API at resolution time.
    pub to: crate::api::AnalyzedClass,
    /// How the dependency arose.
    pub context: DependencyContext,
}

/// A generated artifact exported to the binary class namespace.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct NonLocalProduct {
    /// The product file.
    pub product: VirtualFileRef,
    /// Binary class name of the artifact.
    pub binary_name: String,
    /// The source class that produced it.
    pub src_class_name: String,
    /// Product stamp at generation time.
    pub stamp: Stamp,
}

/// A generated artifact invisible outside its source (anonymous or nested).
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct LocalProduct {
    /// The product file.
    pub product: VirtualFileRef,
    /// Product stamp at generation time.
    pub stamp: Stamp,
}

/// A bidirectional one-to-many relation with O(1) forward and reverse probes.
#[derive(Clone, Debug)]
pub struct Relation<K, V> {
    forward: HashMap<K, BTreeSet<V>>,
    reverse: HashMap<V, BTreeSet<K>>,
}

impl<K, V> PartialEq for Relation<K, V>
where
    K: Eq + Hash,
    V: Eq + Hash + Ord,
{
    fn eq(&self, other: &Self) -> bool {
        self.forward == other.forward && self.reverse == other.reverse
    }
}

impl<K, V> Default for Relation<K, V> {
    fn default() -> Self {
        Self {
            forward: HashMap::new(),
            reverse: HashMap::new(),
        }
    }
}

impl<K, V> Relation<K, V>
where
    K: Clone + Eq + Hash + Ord,
    V: Clone + Eq + Hash + Ord,
{
    /// Creates an empty relation.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds the pair `(k, v)`.
    pub fn insert(&mut self, k: K, v: V) {
        self.forward.entry(k.clone()).or_default().insert(v.clone());
        self.reverse.entry(v).or_default().insert(k);
    }

    /// Returns `true` if the pair `(k, v)` is present.
    pub fn contains(&self, k: &K, v: &V) -> bool {
        self.forward.get(k).is_some_and(|vs| vs.contains(v))
    }

    /// Iterates the values related to `k`.
    pub fn forward(&self, k: &K) -> impl Iterator<Item = &V> + '_ {
        self.forward.get(k).into_iter().flatten()
    }

    /// Iterates the keys related to `v`.
    pub fn reverse(&self, v: &V) -> impl Iterator<Item = &K> + '_ {
        self.reverse.get(v).into_iter().flatten()
    }

    /// Iterates all keys.
    pub fn keys(&self) -> impl Iterator<Item = &K> + '_ {
        self.forward.keys()
    }

    /// Iterates all values.
    pub fn values(&self) -> impl Iterator<Item = &V> + '_ {
        self.reverse.keys()
    }

    /// Iterates all pairs.
    pub fn pairs(&self) -> impl Iterator<Item = (&K, &V)> + '_ {
        self.forward
            .iter()
            .flat_map(|(k, vs)| vs.iter().map(move |v| (k, v)))
    }

    /// Removes every pair keyed by `k`, fixing the reverse index.
    pub fn remove_key(&mut self, k: &K) {
        if let Some(vs) = self.forward.remove(k) {
            for v in vs {
                if let Some(ks) = self.reverse.get_mut(&v) {
                    ks.remove(k);
                    if ks.is_empty() {
                        self.reverse.remove(&v);
                    }
                }
            }
        }
    }

    /// Returns `true` if the relation holds no pairs.
    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }

    /// Number of pairs in the relation.
    pub fn len(&self) -> usize {
        self.forward.values().map(|vs| vs.len()).sum()
    }

    /// Adds every pair of `other`.
    pub fn extend(&mut self, other: Relation<K, V>) {
        for (k, vs) in other.forward {
            for v in vs {
                self.insert(k.clone(), v);
            }
        }
    }
}

/// The three per-context dependency relations between class names.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DependencyRelations {
    member_ref: Relation<String, String>,
    inheritance: Relation<String, String>,
    local_inheritance: Relation<String, String>,
}

impl DependencyRelations {
    fn by_context(&mut self, context: DependencyContext) -> &mut Relation<String, String> {
        match context {
            DependencyContext::MemberRef => &mut self.member_ref,
            DependencyContext::Inheritance => &mut self.inheritance,
            DependencyContext::LocalInheritance => &mut self.local_inheritance,
        }
    }

    /// The relation for a given context.
    pub fn of(&self, context: DependencyContext) -> &Relation<String, String> {
        match context {
            DependencyContext::MemberRef => &self.member_ref,
            DependencyContext::Inheritance => &self.inheritance,
            DependencyContext::LocalInheritance => &self.local_inheritance,
        }
    }

    /// Dependents of `to` under member reference.
    pub fn member_ref_dependents(&self, to: &str) -> impl Iterator<Item = &String> + '_ {
        self.member_ref.reverse(&to.to_string())
    }

    /// Dependents of `to` under inheritance, local inheritance included
    /// (local inheritance propagates as inheritance for the observing cycle).
    pub fn inheritance_dependents<'a>(&'a self, to: &str) -> BTreeSet<&'a String> {
        let key = to.to_string();
        self.inheritance
            .reverse(&key)
            .chain(self.local_inheritance.reverse(&key))
            .collect()
    }

    fn remove_from(&mut self, from: &String) {
        self.member_ref.remove_key(from);
        self.inheritance.remove_key(from);
        self.local_inheritance.remove_key(from);
    }

    fn extend(&mut self, other: DependencyRelations) {
        self.member_ref.extend(other.member_ref);
        self.inheritance.extend(other.inheritance);
        self.local_inheritance.extend(other.local_inheritance);
    }

    fn is_empty(&self) -> bool {
        self.member_ref.is_empty()
            && self.inheritance.is_empty()
            && self.local_inheritance.is_empty()
    }
}

/// The full relations graph of an analysis (C3).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Relations {
    /// src ↔ generated product.
    products: Relation<VirtualFileRef, VirtualFileRef>,
    /// src ↔ library file depended on.
    library_deps: Relation<VirtualFileRef, VirtualFileRef>,
    /// src ↔ source class declared in it.
    class_names: Relation<VirtualFileRef, String>,
    /// srcClass → srcClass, split by context.
    internal: DependencyRelations,
    /// srcClass → external binary class name, split by context.
    external: DependencyRelations,
    /// srcClass ↔ binary class name of its non-local product.
    product_class_names: Relation<String, String>,
    /// srcClass → names it uses.
    used_names: HashMap<String, BTreeSet<UsedName>>,
}

impl Relations {
    /// Creates an empty relations graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records everything one source contributed in a compile cycle.
    ///
    /// Self-dependencies among internal deps are dropped. Fails if a binary
    /// class name is already claimed by a different source class.
    #[allow(clippy::too_many_arguments)]
    pub fn add_source(
        &mut self,
        src: VirtualFileRef,
        classes: &BTreeSet<String>,
        non_local_products: &[NonLocalProduct],
        local_products: &[LocalProduct],
        internal_deps: &[InternalDependency],
        external_deps: &[ExternalDependency],
        library_deps: &[VirtualFileRef],
    ) -> Result<(), AnalysisError> {
        for class in classes {
            self.class_names.insert(src, class.clone());
        }
        for p in non_local_products {
            self.products.insert(src, p.product);
            // Synthetic classes can produce artifacts without an API shape;
            // owning them here keeps removal complete.
            self.class_names.insert(src, p.src_class_name.clone());
            self.add_product_class_name(&p.src_class_name, &p.binary_name)?;
        }
        for p in local_products {
            self.products.insert(src, p.product);
        }
        for dep in internal_deps {
            if dep.from == dep.to {
                continue;
            }
            self.internal
                .by_context(dep.context)
                .insert(dep.from.clone(), dep.to.clone());
        }
        for dep in external_deps {
            self.external
                .by_context(dep.context)
                .insert(dep.from.clone(), dep.to_binary_name.clone());
        }
        for lib in library_deps {
            self.library_deps.insert(src, *lib);
        }
        Ok(())
    }

    fn add_product_class_name(
        &mut self,
        src_class: &str,
        binary_name: &str,
    ) -> Result<(), AnalysisError> {
        let claimed_by_other = self
            .product_class_names
            .reverse(&binary_name.to_string())
            .any(|claimant| claimant != src_class);
        if claimed_by_other {
            return Err(AnalysisError::InconsistentAnalysis {
                binary_name: binary_name.to_string(),
            });
        }
        self.product_class_names
            .insert(src_class.to_string(), binary_name.to_string());
        Ok(())
    }

    /// Records a name use by a class.
    pub fn add_used_name(&mut self, class: &str, used: UsedName) {
        self.used_names
            .entry(class.to_string())
            .or_default()
            .insert(used);
    }

    /// Drops every relation owned by the given sources.
    ///
    /// Edges into the removed classes from surviving classes stay: they are
    /// owned by the surviving source's record.
    pub fn remove_sources(&mut self, sources: &BTreeSet<VirtualFileRef>) {
        for src in sources {
            let classes: Vec<String> = self.class_names.forward(src).cloned().collect();
            for class in &classes {
                self.internal.remove_from(class);
                self.external.remove_from(class);
                self.product_class_names.remove_key(class);
                self.used_names.remove(class);
            }
            self.class_names.remove_key(src);
            self.products.remove_key(src);
            self.library_deps.remove_key(src);
        }
    }

    /// Adds every relation of `other`, failing on binary-name collisions.
    pub fn merge(&mut self, other: Relations) -> Result<(), AnalysisError> {
        for (src_class, binary) in other.product_class_names.pairs() {
            let claimed_by_other = self
                .product_class_names
                .reverse(binary)
                .any(|claimant| claimant != src_class);
            if claimed_by_other {
                return Err(AnalysisError::InconsistentAnalysis {
                    binary_name: binary.clone(),
                });
            }
        }
        self.products.extend(other.products);
        self.library_deps.extend(other.library_deps);
        self.class_names.extend(other.class_names);
        self.internal.extend(other.internal);
        self.external.extend(other.external);
        self.product_class_names.extend(other.product_class_names);
        for (class, names) in other.used_names {
            self.used_names.entry(class).or_default().extend(names);
        }
        Ok(())
    }

    // -- queries --

    /// Classes declared in a source.
    pub fn classes_of(&self, src: &VirtualFileRef) -> impl Iterator<Item = &String> + '_ {
        self.class_names.forward(src)
    }

    /// The source declaring a class, if any. Unique by construction (I1).
    pub fn source_of_class(&self, class: &str) -> Option<VirtualFileRef> {
        self.class_names.reverse(&class.to_string()).next().copied()
    }

    /// Products generated from a source.
    pub fn products_of(&self, src: &VirtualFileRef) -> impl Iterator<Item = &VirtualFileRef> + '_ {
        self.products.forward(src)
    }

    /// The source that generated a product.
    pub fn owner_of_product(&self, product: &VirtualFileRef) -> Option<VirtualFileRef> {
        self.products.reverse(product).next().copied()
    }

    /// All recorded products.
    pub fn all_products(&self) -> impl Iterator<Item = &VirtualFileRef> + '_ {
        self.products.values()
    }

    /// Sources that depend on a library file.
    pub fn sources_using_library(
        &self,
        library: &VirtualFileRef,
    ) -> impl Iterator<Item = &VirtualFileRef> + '_ {
        self.library_deps.reverse(library)
    }

    /// All library files referenced by any source.
    pub fn all_libraries(&self) -> impl Iterator<Item = &VirtualFileRef> + '_ {
        self.library_deps.values()
    }

    /// The internal dependency relations.
    pub fn internal(&self) -> &DependencyRelations {
        &self.internal
    }

    /// The external dependency relations.
    pub fn external(&self) -> &DependencyRelations {
        &self.external
    }

    /// Binary class name produced by a source class.
    pub fn binary_name_of(&self, src_class: &str) -> Option<&String> {
        self.product_class_names.forward(&src_class.to_string()).next()
    }

    /// The source class producing a binary class name.
    pub fn src_class_of_binary(&self, binary_name: &str) -> Option<&String> {
        self.product_class_names
            .reverse(&binary_name.to_string())
            .next()
    }

    /// Names a class uses.
    pub fn used_names_of(&self, class: &str) -> Option<&BTreeSet<UsedName>> {
        self.used_names.get(class)
    }

    /// External binary names referenced by any surviving dependency.
    pub fn referenced_external_binaries(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        for context in [
            DependencyContext::MemberRef,
            DependencyContext::Inheritance,
            DependencyContext::LocalInheritance,
        ] {
            out.extend(self.external.of(context).values().cloned());
        }
        out
    }

    /// Returns `true` if the graph holds nothing.
    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
            && self.library_deps.is_empty()
            && self.class_names.is_empty()
            && self.internal.is_empty()
            && self.external.is_empty()
            && self.product_class_names.is_empty()
            && self.used_names.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{UseScope, UseScopes};
    use kiln_vfs::FileConverter;
    use std::path::Path;

    fn refs() -> (FileConverter, VirtualFileRef, VirtualFileRef) {
        let conv = FileConverter::new();
        let a = conv.to_ref(Path::new("A.src"));
        let b = conv.to_ref(Path::new("B.src"));
        (conv, a, b)
    }

    fn non_local(conv: &FileConverter, path: &str, class: &str, binary: &str) -> NonLocalProduct {
        NonLocalProduct {
            product: conv.to_ref(Path::new(path)),
            binary_name: binary.to_string(),
            src_class_name: class.to_string(),
            stamp: Stamp::LastModified(1),
        }
    }

    #[test]
    fn relation_forward_and_reverse() {
        let mut rel: Relation<String, String> = Relation::new();
        rel.insert("B".into(), "A".into());
        rel.insert("C".into(), "A".into());

        let deps: Vec<&String> = rel.reverse(&"A".to_string()).collect();
        assert_eq!(deps.len(), 2);
        assert!(rel.contains(&"B".to_string(), &"A".to_string()));
        assert_eq!(rel.len(), 2);
    }

    #[test]
    fn relation_remove_key_fixes_reverse() {
        let mut rel: Relation<String, String> = Relation::new();
        rel.insert("B".into(), "A".into());
        rel.remove_key(&"B".to_string());
        assert!(rel.is_empty());
        assert_eq!(rel.reverse(&"A".to_string()).count(), 0);
    }

    #[test]
    fn add_source_records_classes_and_products() {
        let (conv, a, _) = refs();
        let mut rels = Relations::new();
        let classes: BTreeSet<String> = ["A".to_string()].into();
        rels.add_source(
            a,
            &classes,
            &[non_local(&conv, "out/A.class", "A", "A")],
            &[],
            &[],
            &[],
            &[],
        )
        .unwrap();

        assert_eq!(rels.source_of_class("A"), Some(a));
        assert_eq!(rels.binary_name_of("A"), Some(&"A".to_string()));
        assert_eq!(rels.src_class_of_binary("A"), Some(&"A".to_string()));
        assert_eq!(rels.products_of(&a).count(), 1);
    }

    #[test]
    fn self_dependencies_are_dropped() {
        let (_, a, _) = refs();
        let mut rels = Relations::new();
        rels.add_source(
            a,
            &["A".to_string()].into(),
            &[],
            &[],
            &[InternalDependency {
                from: "A".into(),
                to: "A".into(),
                context: DependencyContext::MemberRef,
            }],
            &[],
            &[],
        )
        .unwrap();
        assert_eq!(rels.internal().member_ref_dependents("A").count(), 0);
    }

    #[test]
    fn binary_name_collision_is_inconsistent() {
        let (conv, a, b) = refs();
        let mut rels = Relations::new();
        rels.add_source(
            a,
            &["A".to_string()].into(),
            &[non_local(&conv, "out/A.class", "A", "pkg.A")],
            &[],
            &[],
            &[],
            &[],
        )
        .unwrap();

        let err = rels
            .add_source(
                b,
                &["B".to_string()].into(),
                &[non_local(&conv, "out/B.class", "B", "pkg.A")],
                &[],
                &[],
                &[],
                &[],
            )
            .unwrap_err();
        assert!(matches!(err, AnalysisError::InconsistentAnalysis { binary_name } if binary_name == "pkg.A"));
    }

    #[test]
    fn re_adding_same_mapping_is_fine() {
        let (conv, a, _) = refs();
        let mut rels = Relations::new();
        for _ in 0..2 {
            rels.add_source(
                a,
                &["A".to_string()].into(),
                &[non_local(&conv, "out/A.class", "A", "pkg.A")],
                &[],
                &[],
                &[],
                &[],
            )
            .unwrap();
        }
    }

    #[test]
    fn remove_sources_drops_owned_entries() {
        let (conv, a, b) = refs();
        let mut rels = Relations::new();
        rels.add_source(
            a,
            &["A".to_string()].into(),
            &[non_local(&conv, "out/A.class", "A", "A")],
            &[],
            &[],
            &[],
            &[conv.to_ref(Path::new("lib.jar"))],
        )
        .unwrap();
        rels.add_source(
            b,
            &["B".to_string()].into(),
            &[],
            &[],
            &[InternalDependency {
                from: "B".into(),
                to: "A".into(),
                context: DependencyContext::MemberRef,
            }],
            &[],
            &[],
        )
        .unwrap();
        rels.add_used_name("B", UsedName::new("foo", UseScopes::of(UseScope::Default)));

        rels.remove_sources(&[a].into());

        assert_eq!(rels.source_of_class("A"), None);
        assert_eq!(rels.binary_name_of("A"), None);
        assert_eq!(rels.products_of(&a).count(), 0);
        assert_eq!(rels.sources_using_library(&conv.to_ref(Path::new("lib.jar"))).count(), 0);
        // B's edge into the removed class survives; it belongs to B's record.
        assert_eq!(rels.internal().member_ref_dependents("A").count(), 1);
        assert!(rels.used_names_of("B").is_some());
    }

    #[test]
    fn merge_combines_and_detects_collisions() {
        let (conv, a, b) = refs();
        let mut left = Relations::new();
        left.add_source(
            a,
            &["A".to_string()].into(),
            &[non_local(&conv, "out/A.class", "A", "pkg.A")],
            &[],
            &[],
            &[],
            &[],
        )
        .unwrap();

        let mut right = Relations::new();
        right
            .add_source(
                b,
                &["B".to_string()].into(),
                &[non_local(&conv, "out/B.class", "B", "pkg.B")],
                &[],
                &[],
                &[],
                &[],
            )
            .unwrap();
        left.merge(right).unwrap();
        assert_eq!(left.source_of_class("B"), Some(b));

        let mut colliding = Relations::new();
        colliding
            .add_source(
                b,
                &["C".to_string()].into(),
                &[non_local(&conv, "out/C.class", "C", "pkg.A")],
                &[],
                &[],
                &[],
                &[],
            )
            .unwrap();
        assert!(left.merge(colliding).is_err());
    }

    #[test]
    fn inheritance_dependents_include_local() {
        let (_, a, _) = refs();
        let mut rels = Relations::new();
        rels.add_source(
            a,
            &["B".to_string(), "C".to_string()].into(),
            &[],
            &[],
            &[
                InternalDependency {
                    from: "B".into(),
                    to: "A".into(),
                    context: DependencyContext::Inheritance,
                },
                InternalDependency {
                    from: "C".into(),
                    to: "A".into(),
                    context: DependencyContext::LocalInheritance,
                },
            ],
            &[],
            &[],
        )
        .unwrap();
        let deps = rels.internal().inheritance_dependents("A");
        assert_eq!(deps.len(), 2);
    }

    #[test]
    fn referenced_external_binaries_spans_contexts() {
        let (_, a, _) = refs();
        let mut rels = Relations::new();
        let ext = |from: &str, to: &str, context| ExternalDependency {
            from: from.to_string(),
            to_binary_name: to.to_string(),
            to: crate::api::AnalyzedClass {
                name: to.to_string(),
                compile_timestamp_ns: 0,
                api_hash: kiln_common::ApiHash::of(to),
                extra_hash: kiln_common::ApiHash::of(to),
                name_hashes: vec![],
                has_macro: false,
                class_like: None,
            },
            context,
        };
        rels.add_source(
            a,
            &["A".to_string()].into(),
            &[],
            &[],
            &[],
            &[
                ext("A", "lib.X", DependencyContext::MemberRef),
                ext("A", "lib.Y", DependencyContext::Inheritance),
            ],
            &[],
        )
        .unwrap();
        let referenced = rels.referenced_external_binaries();
        assert!(referenced.contains("lib.X"));
        assert!(referenced.contains("lib.Y"));
    }
}
