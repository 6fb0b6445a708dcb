//! The analysis callback the external compiler reports into (C5).

use crate::error::IncError;
use crate::external::{Lookup, PreviousAnalysis};
use crate::options::IncOptions;
use kiln_analysis::{
    Analysis, AnalyzedClass, ClassLike, Compilation, DependencyContext, ExternalDependency,
    InternalDependency, LocalProduct, NonLocalProduct, SourceInfo, UseScopes, UsedName,
};
use kiln_classfile::ClassFileManager;
use kiln_common::{InternalError, KilnResult};
use kiln_diagnostics::{Position, Problem, Severity};
use kiln_vfs::{FileConverter, Stamp, StampOracle, VirtualFile, VirtualFileRef};
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::debug;

/// The capability set the compiler sees while reporting one compile step.
///
/// All operations are fire-and-forget and safe under parallel invocation by
/// arbitrary compiler threads; operations on the same source are serialized
/// by the compiler's per-source phase structure.
pub trait AnalysisCallback: Send + Sync {
    /// Whether the callback wants reports at all.
    fn enabled(&self) -> bool {
        true
    }

    /// Registers a source about to be compiled.
    fn start_source(&self, src: &VirtualFile);

    /// Buffers a compiler diagnostic.
    fn problem(
        &self,
        category: &str,
        position: Position,
        message: &str,
        severity: Severity,
        reported: bool,
    );

    /// Records a dependency between two source classes of this unit.
    fn class_dependency(&self, on: &str, from: &str, context: DependencyContext);

    /// Records a dependency on a class known only by binary name; the
    /// callback resolves it to an internal, external, or library dependency.
    fn binary_dependency(
        &self,
        class_file: &Path,
        on_binary_name: &str,
        from_class: &str,
        from_src: &VirtualFile,
        context: DependencyContext,
    );

    /// Records a generated artifact exported to the binary namespace.
    fn generated_non_local_class(
        &self,
        src: &VirtualFile,
        class_file: &Path,
        binary_name: &str,
        src_class_name: &str,
    );

    /// Records a generated artifact invisible outside its source.
    fn generated_local_class(&self, src: &VirtualFile, class_file: &Path);

    /// Supplies the API shape of one class of a source.
    fn api(&self, src: &VirtualFile, class_like: ClassLike);

    /// Buffers an entry-point candidate.
    fn main_class(&self, src: &VirtualFile, name: &str);

    /// Records a name use by a class.
    fn used_name(&self, class_name: &str, name: &str, scopes: UseScopes);

    /// Notification that the compiler finished its dependency phase.
    fn dependency_phase_completed(&self);

    /// Notification that the compiler finished its API phase.
    fn api_phase_completed(&self);

    /// Artifacts packaged into an output jar, if any.
    fn classes_in_output_jar(&self) -> Vec<PathBuf>;
}

#[derive(Default)]
struct CallbackState {
    started: BTreeSet<VirtualFileRef>,
    classes_of: HashMap<VirtualFileRef, BTreeSet<String>>,
    class_owner: HashMap<String, VirtualFileRef>,
    class_apis: HashMap<String, AnalyzedClass>,
    object_apis: HashMap<String, AnalyzedClass>,
    internal_deps: Vec<InternalDependency>,
    external_deps: Vec<ExternalDependency>,
    library_deps: HashMap<VirtualFileRef, BTreeSet<VirtualFileRef>>,
    binary_class_names: HashMap<VirtualFileRef, String>,
    non_local_products: HashMap<VirtualFileRef, Vec<(PathBuf, String, String)>>,
    local_products: HashMap<VirtualFileRef, Vec<PathBuf>>,
    product_to_class: HashMap<PathBuf, String>,
    used_names: HashMap<String, HashMap<String, UseScopes>>,
    problems: HashMap<VirtualFileRef, (Vec<Problem>, Vec<Problem>)>,
    main_classes: HashMap<VirtualFileRef, Vec<String>>,
    dropped_problems: usize,
    error: Option<InternalError>,
}

/// The engine's callback implementation: thread-safe stores filled during
/// one compile cycle, finalized into an [`Analysis`] delta by [`get`].
///
/// A single instance lives for exactly one cycle.
///
/// [`get`]: BuildCallback::get
pub struct BuildCallback {
    converter: Arc<FileConverter>,
    oracle: Arc<StampOracle>,
    manager: Arc<dyn ClassFileManager>,
    lookup: Arc<dyn Lookup>,
    previous: PreviousAnalysis,
    options: IncOptions,
    start_time_ns: u64,
    state: Mutex<CallbackState>,
    got: AtomicBool,
}

impl BuildCallback {
    /// Creates a callback for one compile cycle.
    pub fn new(
        converter: Arc<FileConverter>,
        oracle: Arc<StampOracle>,
        manager: Arc<dyn ClassFileManager>,
        lookup: Arc<dyn Lookup>,
        previous: PreviousAnalysis,
        options: IncOptions,
        start_time_ns: u64,
    ) -> Self {
        Self {
            converter,
            oracle,
            manager,
            lookup,
            previous,
            options,
            start_time_ns,
            state: Mutex::new(CallbackState::default()),
            got: AtomicBool::new(false),
        }
    }

    /// The binary class name remembered for a library class file, if a
    /// dependency on it was recorded this cycle.
    pub fn library_class_name(&self, class_file: &Path) -> Option<String> {
        let state = self.state.lock().unwrap();
        state
            .binary_class_names
            .get(&self.converter.to_ref(class_file))
            .cloned()
    }

    fn record_internal(
        state: &mut CallbackState,
        from: &str,
        to: &str,
        context: DependencyContext,
    ) {
        if from == to {
            return;
        }
        state.internal_deps.push(InternalDependency {
            from: from.to_string(),
            to: to.to_string(),
            context,
        });
    }

    /// Finalizes the cycle into an analysis delta. Terminal: a second call
    /// is an integration defect surfaced as [`IncError::Internal`]. Must
    /// only be called after the compile step has returned; the mutex
    /// acquisition establishes the happens-before edge with all
    /// compiler-thread writes.
    pub fn get(&self) -> Result<Analysis, IncError> {
        if self.got.swap(true, Ordering::SeqCst) {
            return Err(
                InternalError::new("analysis callback result taken more than once").into(),
            );
        }
        let mut state = std::mem::take(&mut *self.state.lock().unwrap());
        drain_integration_error(&mut state)?;
        if state.dropped_problems > 0 {
            debug!(
                dropped = state.dropped_problems,
                "dropped diagnostics without a source path"
            );
        }

        let mut sources: BTreeSet<VirtualFileRef> = state.started.clone();
        sources.extend(state.classes_of.keys().copied());
        sources.extend(state.non_local_products.keys().copied());
        sources.extend(state.local_products.keys().copied());

        // Deps are recorded per from-class; group them by owning source.
        let mut internal_by_src: HashMap<VirtualFileRef, Vec<InternalDependency>> = HashMap::new();
        for dep in std::mem::take(&mut state.internal_deps) {
            match state.class_owner.get(&dep.from) {
                Some(owner) => internal_by_src.entry(*owner).or_default().push(dep),
                None => debug!(from = %dep.from, "dropping dependency from unknown class"),
            }
        }
        let mut external_by_src: HashMap<VirtualFileRef, Vec<ExternalDependency>> = HashMap::new();
        for dep in std::mem::take(&mut state.external_deps) {
            match state.class_owner.get(&dep.from) {
                Some(owner) => external_by_src.entry(*owner).or_default().push(dep),
                None => debug!(from = %dep.from, "dropping dependency from unknown class"),
            }
        }

        let mut analysis = Analysis::empty();
        for src in sources {
            let mut apis = Vec::new();
            if let Some(classes) = state.classes_of.get(&src) {
                for class in classes {
                    let merged = AnalyzedClass::merged(
                        state.class_apis.get(class).cloned(),
                        state.object_apis.get(class).cloned(),
                    );
                    if let Some(api) = merged {
                        apis.push(api);
                    }
                }
            }

            let stamp = self.oracle.source(&self.converter.resolve_file(src));

            let non_local: Vec<NonLocalProduct> = state
                .non_local_products
                .remove(&src)
                .unwrap_or_default()
                .into_iter()
                .map(|(path, binary_name, src_class_name)| NonLocalProduct {
                    product: self.converter.to_ref(&path),
                    binary_name,
                    src_class_name,
                    stamp: self.oracle.refresh_product(&path),
                })
                .collect();
            let local: Vec<LocalProduct> = state
                .local_products
                .remove(&src)
                .unwrap_or_default()
                .into_iter()
                .map(|path| LocalProduct {
                    product: self.converter.to_ref(&path),
                    stamp: self.oracle.refresh_product(&path),
                })
                .collect();

            let libraries: Vec<(VirtualFileRef, Stamp)> = state
                .library_deps
                .remove(&src)
                .unwrap_or_default()
                .into_iter()
                .map(|lib| (lib, self.oracle.library(&self.converter.resolve_file(lib))))
                .collect();

            let (reported, unreported) = state.problems.remove(&src).unwrap_or_default();
            let info = SourceInfo {
                reported,
                unreported,
                main_classes: state.main_classes.remove(&src).unwrap_or_default(),
            };

            let internal = internal_by_src.remove(&src).unwrap_or_default();
            let external = external_by_src.remove(&src).unwrap_or_default();
            if self.options.relations_debug {
                debug!(
                    target: "kiln::relations",
                    src = %self.converter.display(src),
                    classes = apis.len(),
                    products = non_local.len() + local.len(),
                    internal_deps = internal.len(),
                    external_deps = external.len(),
                    libraries = libraries.len(),
                    "adding source relations"
                );
            }

            analysis.add_source(
                src, apis, stamp, info, non_local, local, internal, external, libraries,
            )?;
        }

        for (class, names) in state.used_names {
            for (name, scopes) in names {
                analysis.add_used_name(&class, UsedName::new(name, scopes));
            }
        }

        analysis.compilations.push(Compilation {
            start_time_ns: self.start_time_ns,
        });
        if self.options.relations_debug {
            debug!(
                target: "kiln::relations",
                sources = analysis.source_count(),
                classes = analysis.apis.internal_iter().count(),
                "finalized cycle delta"
            );
        }
        Ok(analysis)
    }
}

/// Surfaces an integration defect recorded during the compile step, such as
/// a strict-mode double start-source.
fn drain_integration_error(state: &mut CallbackState) -> KilnResult<()> {
    match state.error.take() {
        Some(error) => Err(error),
        None => Ok(()),
    }
}

impl AnalysisCallback for BuildCallback {
    fn start_source(&self, src: &VirtualFile) {
        let mut state = self.state.lock().unwrap();
        let fresh = state.started.insert(src.vref());
        if !fresh && self.options.strict_mode && state.error.is_none() {
            state.error = Some(InternalError::new(format!(
                "source registered twice in one compile cycle: {}",
                src.path().display()
            )));
        }
    }

    fn problem(
        &self,
        category: &str,
        position: Position,
        message: &str,
        severity: Severity,
        reported: bool,
    ) {
        let Some(source) = position.source.clone() else {
            // No source path means no place to attach the problem.
            self.state.lock().unwrap().dropped_problems += 1;
            return;
        };
        let src = self.converter.to_ref(&source);
        let problem = Problem::new(category, position, message, severity, reported);
        let mut state = self.state.lock().unwrap();
        let (reported_buf, unreported_buf) = state.problems.entry(src).or_default();
        if reported {
            reported_buf.push(problem);
        } else {
            unreported_buf.push(problem);
        }
    }

    fn class_dependency(&self, on: &str, from: &str, context: DependencyContext) {
        let mut state = self.state.lock().unwrap();
        Self::record_internal(&mut state, from, on, context);
    }

    fn binary_dependency(
        &self,
        class_file: &Path,
        on_binary_name: &str,
        from_class: &str,
        from_src: &VirtualFile,
        context: DependencyContext,
    ) {
        // 1. A binary name the previous analysis maps to an internal class.
        if let Some(prev) = self.previous.get() {
            if let Some(src_class) = prev.relations.src_class_of_binary(on_binary_name) {
                let to = src_class.clone();
                let mut state = self.state.lock().unwrap();
                Self::record_internal(&mut state, from_class, &to, context);
                return;
            }
        }

        // 2. A product of an earlier phase of this same compile.
        {
            let mut state = self.state.lock().unwrap();
            if let Some(src_class) = state.product_to_class.get(class_file).cloned() {
                Self::record_internal(&mut state, from_class, &src_class, context);
                return;
            }
        }

        // 3. An external class with a known analysis, else a library.
        let resolved = self.lookup.lookup_analysis(on_binary_name).and_then(|a| {
            a.relations
                .src_class_of_binary(on_binary_name)
                .and_then(|class| a.apis.internal_api(class))
                .cloned()
        });
        match resolved {
            Some(analyzed) => {
                let mut state = self.state.lock().unwrap();
                state.external_deps.push(ExternalDependency {
                    from: from_class.to_string(),
                    to_binary_name: on_binary_name.to_string(),
                    to: analyzed,
                    context,
                });
            }
            None => {
                let library = self
                    .lookup
                    .lookup_on_classpath(on_binary_name)
                    .unwrap_or_else(|| self.converter.to_virtual_file(class_file));
                let mut state = self.state.lock().unwrap();
                state
                    .library_deps
                    .entry(from_src.vref())
                    .or_default()
                    .insert(library.vref());
                state
                    .binary_class_names
                    .insert(self.converter.to_ref(class_file), on_binary_name.to_string());
            }
        }
    }

    fn generated_non_local_class(
        &self,
        src: &VirtualFile,
        class_file: &Path,
        binary_name: &str,
        src_class_name: &str,
    ) {
        let mut state = self.state.lock().unwrap();
        state.non_local_products.entry(src.vref()).or_default().push((
            class_file.to_path_buf(),
            binary_name.to_string(),
            src_class_name.to_string(),
        ));
        state
            .product_to_class
            .insert(class_file.to_path_buf(), src_class_name.to_string());
        state
            .class_owner
            .entry(src_class_name.to_string())
            .or_insert_with(|| src.vref());
    }

    fn generated_local_class(&self, src: &VirtualFile, class_file: &Path) {
        let mut state = self.state.lock().unwrap();
        state
            .local_products
            .entry(src.vref())
            .or_default()
            .push(class_file.to_path_buf());
    }

    fn api(&self, src: &VirtualFile, class_like: ClassLike) {
        let analyzed = AnalyzedClass::of(
            &class_like,
            self.start_time_ns,
            self.options.use_optimized_sealed,
            self.options.api_debug,
        );
        let mut state = self.state.lock().unwrap();
        state
            .classes_of
            .entry(src.vref())
            .or_default()
            .insert(class_like.name.clone());
        state.class_owner.insert(class_like.name.clone(), src.vref());
        if class_like.kind.is_object_like() {
            state.object_apis.insert(class_like.name.clone(), analyzed);
        } else {
            state.class_apis.insert(class_like.name.clone(), analyzed);
        }
    }

    fn main_class(&self, src: &VirtualFile, name: &str) {
        let mut state = self.state.lock().unwrap();
        state
            .main_classes
            .entry(src.vref())
            .or_default()
            .push(name.to_string());
    }

    fn used_name(&self, class_name: &str, name: &str, scopes: UseScopes) {
        let mut state = self.state.lock().unwrap();
        let entry = state
            .used_names
            .entry(class_name.to_string())
            .or_default()
            .entry(name.to_string())
            .or_insert(UseScopes::EMPTY);
        *entry = entry.union(scopes);
    }

    fn dependency_phase_completed(&self) {
        self.manager.dependency_phase_completed();
    }

    fn api_phase_completed(&self) {
        self.manager.api_phase_completed();
    }

    fn classes_in_output_jar(&self) -> Vec<PathBuf> {
        self.manager.classes_in_output_jar()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_analysis::{DefinitionKind, MemberDecl, UseScope};
    use kiln_classfile::DeleteImmediatelyManager;

    struct EmptyLookup;

    impl Lookup for EmptyLookup {
        fn lookup_on_classpath(&self, _binary_name: &str) -> Option<VirtualFile> {
            None
        }

        fn lookup_analysis(&self, _binary_name: &str) -> Option<&Analysis> {
            None
        }
    }

    struct Fixture {
        dir: tempfile::TempDir,
        converter: Arc<FileConverter>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                dir: tempfile::tempdir().unwrap(),
                converter: Arc::new(FileConverter::new()),
            }
        }

        fn source(&self, name: &str, content: &str) -> VirtualFile {
            let path = self.dir.path().join(name);
            std::fs::write(&path, content).unwrap();
            self.converter.to_virtual_file(&path)
        }

        fn callback(&self, options: IncOptions) -> BuildCallback {
            self.callback_with_previous(options, PreviousAnalysis::Empty)
        }

        fn callback_with_previous(
            &self,
            options: IncOptions,
            previous: PreviousAnalysis,
        ) -> BuildCallback {
            BuildCallback::new(
                Arc::clone(&self.converter),
                Arc::new(StampOracle::new(Arc::clone(&self.converter))),
                Arc::new(DeleteImmediatelyManager::new()),
                Arc::new(EmptyLookup),
                previous,
                options,
                1,
            )
        }
    }

    fn class_like(name: &str, signature: &str) -> ClassLike {
        ClassLike {
            name: name.to_string(),
            kind: DefinitionKind::ClassDef,
            public_signature: signature.to_string(),
            full_signature: signature.to_string(),
            members: vec![MemberDecl::new("foo", "def foo: Int")],
            sealed_children: vec![],
            has_macro: false,
        }
    }

    #[test]
    fn get_packages_a_compiled_source() {
        let fx = Fixture::new();
        let src = fx.source("A.src", "class A");
        let out = fx.dir.path().join("A.class");
        std::fs::write(&out, b"bytecode").unwrap();

        let callback = fx.callback(IncOptions::default());
        callback.start_source(&src);
        callback.api(&src, class_like("A", "class A { def foo: Int }"));
        callback.generated_non_local_class(&src, &out, "A", "A");
        callback.used_name("A", "println", UseScopes::of(UseScope::Default));
        callback.main_class(&src, "A");

        let analysis = callback.get().unwrap();
        assert!(analysis.stamps.contains_source(&src.vref()));
        assert!(analysis.apis.internal_api("A").is_some());
        assert_eq!(analysis.relations.binary_name_of("A"), Some(&"A".to_string()));
        assert_eq!(
            analysis.infos.get(&src.vref()).unwrap().main_classes,
            vec!["A"]
        );
        assert_eq!(analysis.compilations.len(), 1);
    }

    #[test]
    fn double_get_fails() {
        let fx = Fixture::new();
        let callback = fx.callback(IncOptions::default());
        callback.get().unwrap();
        let err = callback.get().unwrap_err();
        assert!(matches!(err, IncError::Internal(_)));
        assert!(err.to_string().contains("more than once"));
    }

    #[test]
    fn strict_mode_rejects_double_start() {
        let fx = Fixture::new();
        let src = fx.source("A.src", "class A");
        let callback = fx.callback(IncOptions {
            strict_mode: true,
            ..IncOptions::default()
        });
        callback.start_source(&src);
        callback.start_source(&src);
        let err = callback.get().unwrap_err();
        assert!(matches!(err, IncError::Internal(_)));
        assert!(err.to_string().contains("A.src"));
    }

    #[test]
    fn lax_mode_tolerates_double_start() {
        let fx = Fixture::new();
        let src = fx.source("A.src", "class A");
        let callback = fx.callback(IncOptions::default());
        callback.start_source(&src);
        callback.start_source(&src);
        assert!(callback.get().is_ok());
    }

    #[test]
    fn self_dependency_is_dropped() {
        let fx = Fixture::new();
        let src = fx.source("A.src", "class A");
        let callback = fx.callback(IncOptions::default());
        callback.start_source(&src);
        callback.api(&src, class_like("A", "class A"));
        callback.class_dependency("A", "A", DependencyContext::MemberRef);

        let analysis = callback.get().unwrap();
        assert_eq!(
            analysis.relations.internal().member_ref_dependents("A").count(),
            0
        );
    }

    #[test]
    fn problems_split_by_reported_flag() {
        let fx = Fixture::new();
        let src = fx.source("A.src", "class A");
        let callback = fx.callback(IncOptions::default());
        callback.start_source(&src);
        callback.problem(
            "typer",
            Position::at(src.path(), 1, 1),
            "visible",
            Severity::Error,
            true,
        );
        callback.problem(
            "typer",
            Position::in_source(src.path()),
            "buffered",
            Severity::Warn,
            false,
        );
        // No source path: dropped.
        callback.problem("typer", Position::unknown(), "lost", Severity::Info, true);

        let analysis = callback.get().unwrap();
        let info = analysis.infos.get(&src.vref()).unwrap();
        assert_eq!(info.reported.len(), 1);
        assert_eq!(info.unreported.len(), 1);
        assert_eq!(info.reported[0].message, "visible");
    }

    #[test]
    fn binary_dependency_resolves_against_previous_analysis() {
        let fx = Fixture::new();
        let a = fx.source("A.src", "class A");
        let out_a = fx.dir.path().join("A.class");
        std::fs::write(&out_a, b"a").unwrap();

        // First cycle: A.src produces binary pkg.A.
        let first = fx.callback(IncOptions::default());
        first.start_source(&a);
        first.api(&a, class_like("A", "class A"));
        first.generated_non_local_class(&a, &out_a, "pkg.A", "A");
        let previous = first.get().unwrap();

        // Second cycle: B depends on the binary name pkg.A.
        let b = fx.source("B.src", "class B");
        let callback = fx.callback_with_previous(
            IncOptions::default(),
            PreviousAnalysis::Analysis(Arc::new(previous)),
        );
        callback.start_source(&b);
        callback.api(&b, class_like("B", "class B"));
        callback.binary_dependency(&out_a, "pkg.A", "B", &b, DependencyContext::MemberRef);

        let analysis = callback.get().unwrap();
        let dependents: Vec<&String> = analysis
            .relations
            .internal()
            .member_ref_dependents("A")
            .collect();
        assert_eq!(dependents, vec![&"B".to_string()]);
    }

    #[test]
    fn binary_dependency_resolves_same_run_product() {
        let fx = Fixture::new();
        let a = fx.source("A.src", "class A");
        let b = fx.source("B.src", "class B");
        let out_a = fx.dir.path().join("A.class");
        std::fs::write(&out_a, b"a").unwrap();

        let callback = fx.callback(IncOptions::default());
        callback.start_source(&a);
        callback.start_source(&b);
        callback.api(&a, class_like("A", "class A"));
        callback.api(&b, class_like("B", "class B"));
        callback.generated_non_local_class(&a, &out_a, "pkg.A", "A");
        callback.binary_dependency(&out_a, "pkg.A", "B", &b, DependencyContext::Inheritance);

        let analysis = callback.get().unwrap();
        let dependents = analysis.relations.internal().inheritance_dependents("A");
        assert_eq!(dependents.len(), 1);
    }

    #[test]
    fn unresolved_binary_dependency_becomes_library_dep() {
        let fx = Fixture::new();
        let b = fx.source("B.src", "class B");
        let jar = fx.dir.path().join("dep.jar");
        std::fs::write(&jar, b"jar bytes").unwrap();

        let callback = fx.callback(IncOptions::default());
        callback.start_source(&b);
        callback.api(&b, class_like("B", "class B"));
        callback.binary_dependency(&jar, "lib.X", "B", &b, DependencyContext::MemberRef);

        assert_eq!(
            callback.library_class_name(&jar),
            Some("lib.X".to_string())
        );

        let analysis = callback.get().unwrap();
        let jar_ref = fx.converter.to_ref(&jar);
        assert_eq!(
            analysis.relations.sources_using_library(&jar_ref).count(),
            1
        );
        assert!(analysis.stamps.library(&jar_ref).is_some());
    }

    #[test]
    fn local_products_stay_out_of_the_binary_mapping() {
        let fx = Fixture::new();
        let src = fx.source("A.src", "class A");
        let anon = fx.dir.path().join("A$1.class");
        std::fs::write(&anon, b"anon").unwrap();

        let callback = fx.callback(IncOptions::default());
        callback.start_source(&src);
        callback.api(&src, class_like("A", "class A"));
        callback.generated_local_class(&src, &anon);

        let analysis = callback.get().unwrap();
        let anon_ref = fx.converter.to_ref(&anon);
        assert_eq!(
            analysis.relations.owner_of_product(&anon_ref),
            Some(src.vref())
        );
        assert!(analysis.relations.src_class_of_binary("A$1").is_none());
        assert!(analysis.stamps.product(&anon_ref).is_some());
    }

    #[test]
    fn companion_halves_merge_in_get() {
        let fx = Fixture::new();
        let src = fx.source("A.src", "class A; object A");
        let callback = fx.callback(IncOptions::default());
        callback.start_source(&src);
        callback.api(&src, class_like("A", "class A { def foo: Int }"));
        let mut object_half = class_like("A", "object A { def bar: Int }");
        object_half.kind = DefinitionKind::Module;
        object_half.members = vec![MemberDecl::new("bar", "def bar: Int")];
        callback.api(&src, object_half);

        let analysis = callback.get().unwrap();
        let api = analysis.apis.internal_api("A").unwrap();
        assert!(api.name_hash("foo", UseScope::Default).is_some());
        assert!(api.name_hash("bar", UseScope::Default).is_some());
    }

    #[test]
    fn api_debug_retains_shape() {
        let fx = Fixture::new();
        let src = fx.source("A.src", "class A");
        let callback = fx.callback(IncOptions {
            api_debug: true,
            ..IncOptions::default()
        });
        callback.start_source(&src);
        callback.api(&src, class_like("A", "class A"));
        let analysis = callback.get().unwrap();
        assert!(analysis.apis.internal_api("A").unwrap().class_like.is_some());
    }

    #[test]
    fn used_name_scopes_accumulate() {
        let fx = Fixture::new();
        let src = fx.source("A.src", "class A");
        let callback = fx.callback(IncOptions::default());
        callback.start_source(&src);
        callback.api(&src, class_like("A", "class A"));
        callback.used_name("A", "foo", UseScopes::of(UseScope::Default));
        callback.used_name("A", "foo", UseScopes::of(UseScope::Implicit));

        let analysis = callback.get().unwrap();
        let used = analysis.relations.used_names_of("A").unwrap();
        let foo = used.iter().find(|u| u.name == "foo").unwrap();
        assert!(foo.scopes.contains(UseScope::Default));
        assert!(foo.scopes.contains(UseScope::Implicit));
    }

    #[test]
    fn concurrent_reports_are_all_recorded() {
        use std::thread;

        let fx = Fixture::new();
        let callback = Arc::new(fx.callback(IncOptions::default()));
        let mut handles = Vec::new();
        for i in 0..8 {
            let callback = Arc::clone(&callback);
            let src = fx.source(&format!("S{i}.src"), &format!("class S{i}"));
            handles.push(thread::spawn(move || {
                callback.start_source(&src);
                callback.api(&src, class_like(&format!("S{i}"), &format!("class S{i}")));
            }));
        }
        for h in handles {
            h.join().unwrap();
        }

        let analysis = callback.get().unwrap();
        assert_eq!(analysis.source_count(), 8);
    }
}
