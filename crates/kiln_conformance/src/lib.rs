//! Conformance test helpers for the Kiln incremental driver.
//!
//! Provides a scripted fake compiler and a project harness so integration
//! tests can describe sources as class specifications, run the full
//! incremental driver against real temp files, and assert on which sources
//! each cycle recompiled.

#![warn(missing_docs)]

use kiln_analysis::{
    Analysis, AnalyzedClass, ClassLike, DefinitionKind, DependencyContext, MemberDecl,
    NonLocalProduct, SourceInfo, UseScope, UseScopes,
};
use kiln_common::ContentHash;
use kiln_incremental::{
    compile_incremental, AnalysisCallback, CompileError, CompileResult, Compiler,
    DependencyChanges, IncError, IncOptions, Lookup, PreviousAnalysis,
};
use kiln_classfile::ClassFileManager;
use kiln_vfs::{FileConverter, Stamp, VirtualFile};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

/// One class of a scripted source program.
#[derive(Clone, Debug)]
pub struct ClassSpec {
    /// Source class name (also used as the binary name).
    pub name: String,
    /// Definition kind; defaults to a class.
    pub kind: DefinitionKind,
    /// Public members as (name, signature) pairs.
    pub members: Vec<(String, String)>,
    /// Internal class this one extends, if any.
    pub extends: Option<String>,
    /// External binary name this one extends, if any.
    pub extends_binary: Option<String>,
    /// Internal member references as (target class, used member name).
    pub uses: Vec<(String, String)>,
    /// Whether the class defines a macro.
    pub has_macro: bool,
    /// Appends a per-compile counter to the signature, so every recompile
    /// changes the API. Used to exercise the cycle ceiling.
    pub volatile_api: bool,
}

impl ClassSpec {
    /// A plain class with the given members.
    pub fn new(name: &str, members: &[(&str, &str)]) -> Self {
        Self {
            name: name.to_string(),
            kind: DefinitionKind::ClassDef,
            members: members
                .iter()
                .map(|(n, s)| (n.to_string(), s.to_string()))
                .collect(),
            extends: None,
            extends_binary: None,
            uses: Vec::new(),
            has_macro: false,
            volatile_api: false,
        }
    }

    /// Sets the internal superclass.
    pub fn extends(mut self, parent: &str) -> Self {
        self.extends = Some(parent.to_string());
        self
    }

    /// Sets the external superclass by binary name.
    pub fn extends_binary(mut self, binary: &str) -> Self {
        self.extends_binary = Some(binary.to_string());
        self
    }

    /// Adds a member reference to another internal class.
    pub fn uses(mut self, target: &str, member: &str) -> Self {
        self.uses.push((target.to_string(), member.to_string()));
        self
    }

    /// Marks the class macro-bearing.
    pub fn with_macro(mut self) -> Self {
        self.has_macro = true;
        self
    }

    /// Makes every recompile change the class's API.
    pub fn volatile_api(mut self) -> Self {
        self.volatile_api = true;
        self
    }

    fn member_signature(&self, base: &str, compile_seq: u64) -> String {
        if self.volatile_api {
            format!("{base} #{compile_seq}")
        } else {
            base.to_string()
        }
    }

    fn signature(&self, compile_seq: u64) -> String {
        format!(
            "class {} {{ {} }}",
            self.name,
            self.members
                .iter()
                .map(|(_, s)| self.member_signature(s, compile_seq))
                .collect::<Vec<_>>()
                .join("; ")
        )
    }

    fn to_class_like(&self, compile_seq: u64) -> ClassLike {
        let signature = self.signature(compile_seq);
        ClassLike {
            name: self.name.clone(),
            kind: self.kind,
            public_signature: signature.clone(),
            full_signature: signature,
            members: self
                .members
                .iter()
                .map(|(n, s)| MemberDecl::new(n.clone(), self.member_signature(s, compile_seq)))
                .collect(),
            sealed_children: Vec::new(),
            has_macro: self.has_macro,
        }
    }
}

/// A scripted source program: the classes one source file declares.
#[derive(Clone, Debug, Default)]
pub struct SourceSpec {
    /// The classes declared in the source.
    pub classes: Vec<ClassSpec>,
}

impl SourceSpec {
    /// A source declaring the given classes.
    pub fn of(classes: Vec<ClassSpec>) -> Self {
        Self { classes }
    }
}

/// A fake compiler driven by scripted source programs.
///
/// For each source it reports the scripted classes through the callback,
/// writes one product per class under the output directory (content = the
/// class's current signature), and records which sources each compile call
/// received.
pub struct ScriptedCompiler {
    out_dir: PathBuf,
    programs: Mutex<HashMap<PathBuf, SourceSpec>>,
    invocations: Mutex<Vec<Vec<PathBuf>>>,
    fail_after: Mutex<Option<PathBuf>>,
    cancel_on: Mutex<Option<PathBuf>>,
    compile_seq: Mutex<u64>,
}

impl ScriptedCompiler {
    /// Creates a compiler writing products under `out_dir`.
    pub fn new(out_dir: PathBuf) -> Self {
        Self {
            out_dir,
            programs: Mutex::new(HashMap::new()),
            invocations: Mutex::new(Vec::new()),
            fail_after: Mutex::new(None),
            cancel_on: Mutex::new(None),
            compile_seq: Mutex::new(0),
        }
    }

    /// Registers (or replaces) the program for a source path.
    pub fn set_program(&self, path: PathBuf, spec: SourceSpec) {
        self.programs.lock().unwrap().insert(path, spec);
    }

    /// Forgets the program for a source path.
    pub fn remove_program(&self, path: &Path) {
        self.programs.lock().unwrap().remove(path);
    }

    /// Fails the compile after fully processing the given source.
    pub fn fail_after(&self, path: PathBuf) {
        *self.fail_after.lock().unwrap() = Some(path);
    }

    /// Clears any scripted failure or cancellation.
    pub fn clear_failures(&self) {
        *self.fail_after.lock().unwrap() = None;
        *self.cancel_on.lock().unwrap() = None;
    }

    /// Raises `Cancelled` when asked to compile the given source.
    pub fn cancel_on(&self, path: PathBuf) {
        *self.cancel_on.lock().unwrap() = Some(path);
    }

    /// The sources of each compile call so far, as sorted file names.
    pub fn invocations(&self) -> Vec<Vec<String>> {
        self.invocations
            .lock()
            .unwrap()
            .iter()
            .map(|sources| {
                let mut names: Vec<String> = sources
                    .iter()
                    .filter_map(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
                    .collect();
                names.sort();
                names
            })
            .collect()
    }

    /// Path of the product generated for a class.
    pub fn product_path(&self, class: &str) -> PathBuf {
        self.out_dir.join(format!("{class}.class"))
    }

    /// Paths of every registered source program.
    pub fn program_paths(&self) -> Vec<PathBuf> {
        self.programs.lock().unwrap().keys().cloned().collect()
    }
}

impl Compiler for ScriptedCompiler {
    fn compile(
        &self,
        sources: &[VirtualFile],
        _changes: &DependencyChanges,
        callback: &dyn AnalysisCallback,
        manager: &dyn ClassFileManager,
    ) -> Result<(), CompileError> {
        self.invocations
            .lock()
            .unwrap()
            .push(sources.iter().map(|s| s.path().to_path_buf()).collect());
        let seq = {
            let mut seq = self.compile_seq.lock().unwrap();
            *seq += 1;
            *seq
        };

        std::fs::create_dir_all(&self.out_dir).map_err(|e| CompileError::Failed {
            message: format!("cannot create output dir: {e}"),
        })?;

        for src in sources {
            if self.cancel_on.lock().unwrap().as_deref() == Some(src.path()) {
                return Err(CompileError::Cancelled);
            }
            let spec = self
                .programs
                .lock()
                .unwrap()
                .get(src.path())
                .cloned()
                .ok_or_else(|| CompileError::Failed {
                    message: format!("no program for {}", src.path().display()),
                })?;

            callback.start_source(src);
            for class in &spec.classes {
                callback.api(src, class.to_class_like(seq));

                let product = self.product_path(&class.name);
                std::fs::write(&product, class.signature(seq)).map_err(|e| {
                    CompileError::Failed {
                        message: format!("cannot write product: {e}"),
                    }
                })?;
                manager.generated(&[product.clone()]).map_err(|e| {
                    CompileError::Failed {
                        message: e.to_string(),
                    }
                })?;
                callback.generated_non_local_class(src, &product, &class.name, &class.name);

                if let Some(parent) = &class.extends {
                    callback.class_dependency(parent, &class.name, DependencyContext::Inheritance);
                }
                if let Some(binary) = &class.extends_binary {
                    let class_file = self.out_dir.join("cp").join(format!("{binary}.class"));
                    callback.binary_dependency(
                        &class_file,
                        binary,
                        &class.name,
                        src,
                        DependencyContext::Inheritance,
                    );
                }
                for (target, member) in &class.uses {
                    callback.class_dependency(target, &class.name, DependencyContext::MemberRef);
                    callback.used_name(
                        &class.name,
                        member,
                        UseScopes::of(UseScope::Default),
                    );
                }
            }
            callback.dependency_phase_completed();
            callback.api_phase_completed();

            if self.fail_after.lock().unwrap().as_deref() == Some(src.path()) {
                return Err(CompileError::Failed {
                    message: format!("scripted failure after {}", src.path().display()),
                });
            }
        }
        Ok(())
    }
}

/// Classpath and upstream-analysis resolution backed by plain maps.
pub struct ScriptedLookup {
    analyses: BTreeMap<String, Analysis>,
}

impl Lookup for ScriptedLookup {
    fn lookup_on_classpath(&self, _binary_name: &str) -> Option<VirtualFile> {
        None
    }

    fn lookup_analysis(&self, binary_name: &str) -> Option<&Analysis> {
        self.analyses.get(binary_name)
    }
}

/// A temp-dir project running the full incremental driver.
pub struct Project {
    dir: tempfile::TempDir,
    converter: Arc<FileConverter>,
    /// The scripted compiler under test control.
    pub compiler: ScriptedCompiler,
    /// Engine options for the next run.
    pub options: IncOptions,
    previous: PreviousAnalysis,
    external: BTreeMap<String, Analysis>,
    /// Cancellation flag passed to the next run.
    pub cancel: Arc<AtomicBool>,
}

impl Project {
    /// Creates an empty project.
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let out_dir = dir.path().join("out");
        Self {
            converter: Arc::new(FileConverter::new()),
            compiler: ScriptedCompiler::new(out_dir),
            options: IncOptions::default(),
            previous: PreviousAnalysis::Empty,
            external: BTreeMap::new(),
            cancel: Arc::new(AtomicBool::new(false)),
            dir,
        }
    }

    /// Absolute path of a source file.
    pub fn source_path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Writes a source file and registers its program.
    pub fn set_source(&self, name: &str, content: &str, spec: SourceSpec) {
        let path = self.source_path(name);
        std::fs::write(&path, content).unwrap();
        self.compiler.set_program(path, spec);
    }

    /// Removes a source file and its program.
    pub fn remove_source(&self, name: &str) {
        let path = self.source_path(name);
        let _ = std::fs::remove_file(&path);
        self.compiler.remove_program(&path);
    }

    /// Registers an upstream analysis exporting one external class.
    ///
    /// The class is a trait whose public and full signatures are given
    /// separately, so tests can change private members only.
    pub fn set_external_trait(&mut self, binary: &str, public: &str, full: &str) {
        let upstream_src = self
            .dir
            .path()
            .join(format!("{}.upstream", binary.replace('.', "_")));
        std::fs::write(&upstream_src, full).unwrap();
        let product = self.compiler.product_path(&format!("cp-{binary}"));

        let class_like = ClassLike {
            name: binary.to_string(),
            kind: DefinitionKind::Trait,
            public_signature: public.to_string(),
            full_signature: full.to_string(),
            members: Vec::new(),
            sealed_children: Vec::new(),
            has_macro: false,
        };
        let analyzed = AnalyzedClass::of(&class_like, 1, false, false);

        let mut analysis = Analysis::empty();
        analysis
            .add_source(
                self.converter.to_ref(&upstream_src),
                vec![analyzed],
                Stamp::Hash(ContentHash::from_bytes(full.as_bytes())),
                SourceInfo::new(),
                vec![NonLocalProduct {
                    product: self.converter.to_ref(&product),
                    binary_name: binary.to_string(),
                    src_class_name: binary.to_string(),
                    stamp: Stamp::LastModified(1),
                }],
                vec![],
                vec![],
                vec![],
                vec![],
            )
            .unwrap();
        self.external.insert(binary.to_string(), analysis);
    }

    /// The current input set: every registered source, sorted by path.
    fn inputs(&self) -> Vec<VirtualFile> {
        let mut paths = self.compiler.program_paths();
        paths.sort();
        paths
            .iter()
            .map(|p| self.converter.to_virtual_file(p))
            .collect()
    }

    /// Runs the incremental driver once, remembering the produced analysis
    /// as the next run's previous analysis.
    pub fn compile(&mut self) -> Result<CompileResult, IncError> {
        let sources = self.inputs();
        let lookup: Arc<dyn Lookup> = Arc::new(ScriptedLookup {
            analyses: self.external.clone(),
        });
        let result = compile_incremental(
            &sources,
            self.previous.clone(),
            &self.compiler,
            lookup,
            Arc::clone(&self.converter),
            &self.dir.path().join(".staging"),
            &self.options,
            Arc::clone(&self.cancel),
        )?;
        self.previous = PreviousAnalysis::Analysis(Arc::new(result.analysis.clone()));
        Ok(result)
    }

    /// The analysis of the last successful run.
    pub fn analysis(&self) -> Analysis {
        self.previous
            .get()
            .cloned()
            .unwrap_or_else(Analysis::empty)
    }

    /// On-disk product path for a class.
    pub fn product(&self, class: &str) -> PathBuf {
        self.compiler.product_path(class)
    }

    /// The `VirtualFileRef` of a registered source.
    pub fn vref(&self, name: &str) -> kiln_vfs::VirtualFileRef {
        self.converter.to_ref(&self.source_path(name))
    }
}

impl Default for Project {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_build_compiles_everything_once() {
        let mut project = Project::new();
        project.set_source(
            "A.src",
            "class A { def foo: Int }",
            SourceSpec::of(vec![ClassSpec::new("A", &[("foo", "def foo: Int")])]),
        );
        project.set_source(
            "B.src",
            "class B",
            SourceSpec::of(vec![ClassSpec::new("B", &[])]),
        );

        let result = project.compile().unwrap();
        assert!(result.changed);
        assert_eq!(result.cycles, 1);
        assert_eq!(
            project.compiler.invocations(),
            vec![vec!["A.src".to_string(), "B.src".to_string()]]
        );
        assert!(project.product("A").exists());
        assert!(project.product("B").exists());
    }

    #[test]
    fn product_content_tracks_signature() {
        let mut project = Project::new();
        project.set_source(
            "A.src",
            "class A",
            SourceSpec::of(vec![ClassSpec::new("A", &[("foo", "def foo: Int")])]),
        );
        project.compile().unwrap();
        let content = std::fs::read_to_string(project.product("A")).unwrap();
        assert!(content.contains("def foo: Int"));
    }
}
