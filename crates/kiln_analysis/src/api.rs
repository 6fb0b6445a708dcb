//! Class API shapes, digests, and per-name hashes.
//!
//! The external compiler supplies each class's API as a [`ClassLike`]:
//! canonical signature text plus a member list. The digesting functions here
//! reduce that shape to the 64-bit hashes the invalidation engine compares:
//! one hash for the public interface, one "extra" hash that for traits also
//! covers private members, and one hash per public name so that member-ref
//! dependents are only invalidated when a name they actually use changed.

use kiln_common::ApiHash;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The scope a name was used in.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub enum UseScope {
    /// An ordinary term or type reference.
    Default,
    /// A reference resolved through implicit search.
    Implicit,
    /// A type used as a pattern-match target; tracked separately because
    /// exhaustivity of sealed hierarchies depends on it.
    PatMatTarget,
}

/// A small set of [`UseScope`]s, stored as a bitset.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default, Serialize, Deserialize)]
pub struct UseScopes(u8);

impl UseScopes {
    /// The empty scope set.
    pub const EMPTY: UseScopes = UseScopes(0);

    fn bit(scope: UseScope) -> u8 {
        match scope {
            UseScope::Default => 1,
            UseScope::Implicit => 2,
            UseScope::PatMatTarget => 4,
        }
    }

    /// A set containing exactly one scope.
    pub fn of(scope: UseScope) -> Self {
        Self(Self::bit(scope))
    }

    /// Returns this set with `scope` added.
    pub fn with(self, scope: UseScope) -> Self {
        Self(self.0 | Self::bit(scope))
    }

    /// Returns the union of two scope sets.
    pub fn union(self, other: UseScopes) -> Self {
        Self(self.0 | other.0)
    }

    /// Returns `true` if `scope` is in the set.
    pub fn contains(self, scope: UseScope) -> bool {
        self.0 & Self::bit(scope) != 0
    }

    /// Returns `true` if the set has no scopes.
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

/// A simple-identifier reference from one class to a name it did not declare.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub struct UsedName {
    /// The referenced simple name.
    pub name: String,
    /// The scopes the name was used in.
    pub scopes: UseScopes,
}

impl UsedName {
    /// Creates a used name.
    pub fn new(name: impl Into<String>, scopes: UseScopes) -> Self {
        Self {
            name: name.into(),
            scopes,
        }
    }
}

/// The digest of a single public name of a class.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub struct NameHash {
    /// The simple name.
    pub name: String,
    /// The scope this hash applies to.
    pub scope: UseScope,
    /// Digest of every declaration carrying the name.
    pub hash: ApiHash,
}

/// What kind of definition a [`ClassLike`] describes.
///
/// Class-like halves (`ClassDef`, `Trait`) and object-like halves (`Module`,
/// `PackageModule`) of a companion pair are recorded separately and merged
/// when the callback finalizes its delta.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum DefinitionKind {
    /// A concrete or abstract class.
    ClassDef,
    /// A trait; its extra hash covers private members too, because trait
    /// private members are inlined into implementors.
    Trait,
    /// A singleton object.
    Module,
    /// A package-level object.
    PackageModule,
}

impl DefinitionKind {
    /// Returns `true` for the object-like kinds.
    pub fn is_object_like(self) -> bool {
        matches!(self, DefinitionKind::Module | DefinitionKind::PackageModule)
    }
}

/// One declared member of a class, in canonical form.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct MemberDecl {
    /// The member's simple name.
    pub name: String,
    /// The scope the member is visible in.
    pub scope: UseScope,
    /// Canonical rendering of the member's signature.
    pub signature: String,
}

impl MemberDecl {
    /// Creates a member declaration in the default scope.
    pub fn new(name: impl Into<String>, signature: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            scope: UseScope::Default,
            signature: signature.into(),
        }
    }
}

/// The opaque API shape of one class, as supplied by the compiler.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct ClassLike {
    /// Fully-qualified source class name.
    pub name: String,
    /// What kind of definition this is.
    pub kind: DefinitionKind,
    /// Canonical rendering of the public interface.
    pub public_signature: String,
    /// Canonical rendering of the full interface, private members included.
    pub full_signature: String,
    /// Public members, used for per-name hashing.
    pub members: Vec<MemberDecl>,
    /// Direct children if this class seals a hierarchy.
    pub sealed_children: Vec<String>,
    /// Whether the class defines a macro.
    pub has_macro: bool,
}

impl ClassLike {
    /// Digest of the public interface.
    pub fn api_hash(&self) -> ApiHash {
        ApiHash::of(&self.public_signature)
    }

    /// Digest driving inheritance invalidation.
    ///
    /// Traits hash their full signature because private trait members are
    /// woven into implementing classes; other kinds hash the public one.
    pub fn extra_hash(&self) -> ApiHash {
        match self.kind {
            DefinitionKind::Trait => ApiHash::of(&self.full_signature),
            _ => ApiHash::of(&self.public_signature),
        }
    }

    /// Per-name digests of the public members.
    ///
    /// With `optimized_sealed` unset, the sealed-children list is folded into
    /// every member hash, so any change to the hierarchy invalidates every
    /// dependent that uses any name of the class. With it set, only the
    /// class's own name entry carries the hierarchy.
    pub fn name_hashes(&self, optimized_sealed: bool) -> Vec<NameHash> {
        let sealed_suffix = if self.sealed_children.is_empty() {
            String::new()
        } else {
            format!("\nsealed:{}", self.sealed_children.join(","))
        };

        let own_name = simple_name(&self.name).to_string();
        let mut grouped: BTreeMap<(String, UseScope), String> = BTreeMap::new();
        for member in &self.members {
            let entry = grouped
                .entry((member.name.clone(), member.scope))
                .or_default();
            entry.push_str(&member.signature);
            entry.push('\n');
        }

        // The class's own name always carries the hierarchy, so pattern
        // matches on the sealed parent re-check exhaustivity.
        let own = grouped
            .entry((own_name.clone(), UseScope::Default))
            .or_default();
        own.push_str(&self.public_signature);
        own.push_str(&sealed_suffix);

        grouped
            .into_iter()
            .map(|((name, scope), mut text)| {
                if !optimized_sealed && name != own_name {
                    text.push_str(&sealed_suffix);
                }
                NameHash {
                    name,
                    scope,
                    hash: ApiHash::of(&text),
                }
            })
            .collect()
    }
}

/// Returns the last dotted segment of a fully-qualified name.
pub fn simple_name(qualified: &str) -> &str {
    qualified.rsplit('.').next().unwrap_or(qualified)
}

/// The analyzed API of one class after a compile cycle: companion halves
/// merged, hashes computed, full shape optionally retained.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct AnalyzedClass {
    /// Fully-qualified source class name.
    pub name: String,
    /// Nanosecond timestamp of the compile that produced this entry.
    pub compile_timestamp_ns: u64,
    /// Digest of the public interface; drives member-ref invalidation.
    pub api_hash: ApiHash,
    /// Digest including trait private members; drives inheritance invalidation.
    pub extra_hash: ApiHash,
    /// Per-name digests for pruned member-ref invalidation.
    pub name_hashes: Vec<NameHash>,
    /// Whether the class (or its companion) defines a macro.
    pub has_macro: bool,
    /// The full API shape, retained only when `api_debug` is set.
    pub class_like: Option<ClassLike>,
}

impl AnalyzedClass {
    /// Digests one companion half.
    pub fn of(
        class: &ClassLike,
        compile_timestamp_ns: u64,
        optimized_sealed: bool,
        retain_shape: bool,
    ) -> Self {
        Self {
            name: class.name.clone(),
            compile_timestamp_ns,
            api_hash: class.api_hash(),
            extra_hash: class.extra_hash(),
            name_hashes: class.name_hashes(optimized_sealed),
            has_macro: class.has_macro,
            class_like: retain_shape.then(|| class.clone()),
        }
    }

    /// Merges a class half with its companion object half.
    ///
    /// Hashes combine order-sensitively (class half first); name hashes for
    /// the same (name, scope) combine, others union.
    pub fn merged(class_half: Option<Self>, object_half: Option<Self>) -> Option<Self> {
        match (class_half, object_half) {
            (Some(c), Some(o)) => {
                let mut names: BTreeMap<(String, UseScope), ApiHash> = BTreeMap::new();
                for nh in c.name_hashes.into_iter() {
                    names.insert((nh.name, nh.scope), nh.hash);
                }
                for nh in o.name_hashes.into_iter() {
                    names
                        .entry((nh.name, nh.scope))
                        .and_modify(|h| *h = h.combine(nh.hash))
                        .or_insert(nh.hash);
                }
                Some(Self {
                    name: c.name,
                    compile_timestamp_ns: c.compile_timestamp_ns.max(o.compile_timestamp_ns),
                    api_hash: c.api_hash.combine(o.api_hash),
                    extra_hash: c.extra_hash.combine(o.extra_hash),
                    name_hashes: names
                        .into_iter()
                        .map(|((name, scope), hash)| NameHash { name, scope, hash })
                        .collect(),
                    has_macro: c.has_macro || o.has_macro,
                    class_like: c.class_like.or(o.class_like),
                })
            }
            (half, other) => half.or(other),
        }
    }

    /// Looks up the hash of a given (name, scope), if present.
    pub fn name_hash(&self, name: &str, scope: UseScope) -> Option<ApiHash> {
        self.name_hashes
            .iter()
            .find(|nh| nh.name == name && nh.scope == scope)
            .map(|nh| nh.hash)
    }
}
