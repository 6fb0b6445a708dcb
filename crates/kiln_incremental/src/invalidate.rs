//! The name-hash-based invalidation rules (C7).
//!
//! Member-ref dependents of a changed class are invalidated only when a name
//! they actually use changed its hash; inheritance dependents are invalidated
//! unconditionally on an extra-hash change and the invalidation propagates
//! transitively down the inheritance graph. Macro-bearing classes propagate
//! conservatively: any member-ref dependent of a changed macro class is
//! invalidated regardless of name hashes.

use kiln_analysis::{AnalyzedClass, NameHash, Relations, UseScope};
use kiln_vfs::VirtualFileRef;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use tracing::debug;

/// The observable API difference of one class between two analyses.
#[derive(Clone, Debug)]
pub struct ApiChange {
    /// Source class name for internal changes, binary name for external ones.
    pub class: String,
    /// Names whose hash changed, with the scope each hash applies to.
    pub modified_names: BTreeSet<(String, UseScope)>,
    /// Whether the extra hash changed (drives inheritance invalidation).
    pub extra_changed: bool,
    /// Whether either version of the class carries a macro.
    pub macro_involved: bool,
    /// Whether the class disappeared entirely; every dependent is
    /// invalidated.
    pub full: bool,
}

impl ApiChange {
    /// Compares two versions of a class, returning `None` when nothing a
    /// dependent could observe changed.
    pub fn between(class: &str, old: &AnalyzedClass, new: Option<&AnalyzedClass>) -> Option<Self> {
        let Some(new) = new else {
            return Some(Self::removal(class, old));
        };
        if old.api_hash == new.api_hash && old.extra_hash == new.extra_hash {
            return None;
        }
        Some(Self {
            class: class.to_string(),
            modified_names: diff_name_hashes(&old.name_hashes, &new.name_hashes),
            extra_changed: old.extra_hash != new.extra_hash,
            macro_involved: old.has_macro || new.has_macro,
            full: false,
        })
    }

    /// The change representing a class that no longer exists.
    pub fn removal(class: &str, old: &AnalyzedClass) -> Self {
        Self {
            class: class.to_string(),
            modified_names: old
                .name_hashes
                .iter()
                .map(|nh| (nh.name.clone(), nh.scope))
                .collect(),
            extra_changed: true,
            macro_involved: old.has_macro,
            full: true,
        }
    }
}

/// Names present in only one side or hashed differently on both sides.
fn diff_name_hashes(old: &[NameHash], new: &[NameHash]) -> BTreeSet<(String, UseScope)> {
    let index = |hashes: &[NameHash]| -> BTreeMap<(String, UseScope), kiln_common::ApiHash> {
        hashes
            .iter()
            .map(|nh| ((nh.name.clone(), nh.scope), nh.hash))
            .collect()
    };
    let old_index = index(old);
    let new_index = index(new);

    let mut modified = BTreeSet::new();
    for (key, hash) in &old_index {
        if new_index.get(key) != Some(hash) {
            modified.insert(key.clone());
        }
    }
    for key in new_index.keys() {
        if !old_index.contains_key(key) {
            modified.insert(key.clone());
        }
    }
    modified
}

/// Returns `true` if `class` uses any of the modified names in a matching
/// scope.
fn uses_modified_name(
    relations: &Relations,
    class: &str,
    modified_names: &BTreeSet<(String, UseScope)>,
) -> bool {
    let Some(used) = relations.used_names_of(class) else {
        return false;
    };
    used.iter().any(|used_name| {
        modified_names
            .iter()
            .any(|(name, scope)| *name == used_name.name && used_name.scopes.contains(*scope))
    })
}

/// Expands a set of API changes into the set of invalidated source classes.
///
/// With `external` set, the change's class names are binary names and
/// dependents are found through the external relations; the transitive
/// inheritance expansion always continues through internal edges, because
/// once an internal class is invalidated its own subclasses must follow.
pub fn invalidate_classes(
    relations: &Relations,
    changes: &[ApiChange],
    external: bool,
) -> BTreeSet<String> {
    let mut invalidated: BTreeSet<String> = BTreeSet::new();

    for change in changes {
        let deps = if external {
            relations.external()
        } else {
            relations.internal()
        };

        // Member-ref dependents: pruned by name hashes unless a macro or a
        // full removal forces conservatism.
        for dependent in deps.member_ref_dependents(&change.class) {
            if change.full
                || change.macro_involved
                || uses_modified_name(relations, dependent, &change.modified_names)
            {
                invalidated.insert(dependent.clone());
            }
        }

        // Inheritance dependents: unconditional on extra-hash change, and
        // transitive (local inheritance counts as inheritance this cycle).
        if change.extra_changed || change.full {
            let mut queue: VecDeque<String> = deps
                .inheritance_dependents(&change.class)
                .into_iter()
                .cloned()
                .collect();
            while let Some(class) = queue.pop_front() {
                if !invalidated.insert(class.clone()) {
                    continue;
                }
                for next in relations.internal().inheritance_dependents(&class) {
                    queue.push_back(next.clone());
                }
            }
        }
    }

    if !invalidated.is_empty() {
        debug!(classes = invalidated.len(), "invalidated classes");
    }
    invalidated
}

/// Maps invalidated classes to the sources owning them.
pub fn invalidated_sources(
    relations: &Relations,
    classes: &BTreeSet<String>,
) -> BTreeSet<VirtualFileRef> {
    classes
        .iter()
        .filter_map(|class| relations.source_of_class(class))
        .collect()
}
