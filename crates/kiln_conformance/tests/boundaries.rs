//! Boundary behavior: unreferenced libraries, the cycle ceiling,
//! cancellation, and recompile-all escalation.

use kiln_conformance::{ClassSpec, Project, SourceSpec};
use kiln_incremental::IncError;
use std::sync::atomic::Ordering;

#[test]
fn unreferenced_classpath_change_forces_nothing() {
    let mut project = Project::new();
    project.set_source(
        "A.src",
        "class A",
        SourceSpec::of(vec![ClassSpec::new("A", &[])]),
    );
    project.compile().unwrap();

    // A jar nobody references changes on disk: it is not in the analysis,
    // so nothing recompiles.
    let jar = project.source_path("unrelated.jar");
    std::fs::write(&jar, "jar v1").unwrap();
    std::fs::write(&jar, "jar v2").unwrap();

    let result = project.compile().unwrap();
    assert!(!result.changed);
    assert_eq!(project.compiler.invocations().len(), 1);
}

#[test]
fn cycle_ceiling_aborts_and_rolls_back() {
    // A and B each reference a member of the other, and both change their
    // API on every recompile, so invalidation ping-pongs forever.
    let mut project = Project::new();
    project.set_source(
        "A.src",
        "class A { B.fb() }",
        SourceSpec::of(vec![ClassSpec::new("A", &[("fa", "def fa: Int")])
            .uses("B", "fb")
            .volatile_api()]),
    );
    project.set_source(
        "B.src",
        "class B { A.fa() }",
        SourceSpec::of(vec![ClassSpec::new("B", &[("fb", "def fb: Int")])
            .uses("A", "fa")
            .volatile_api()]),
    );
    project.options.max_cycles = 4;

    // The full build runs in a single cycle; nothing to diff against.
    let first = project.compile().unwrap();
    assert_eq!(first.cycles, 1);
    let a_stable = std::fs::read_to_string(project.product("A")).unwrap();
    let b_stable = std::fs::read_to_string(project.product("B")).unwrap();

    // Touch A to start the ping-pong.
    project.set_source(
        "A.src",
        "class A touched { B.fb() }",
        SourceSpec::of(vec![ClassSpec::new("A", &[("fa", "def fa: Int")])
            .uses("B", "fb")
            .volatile_api()]),
    );
    let err = project.compile().unwrap_err();
    assert!(matches!(err, IncError::CycleLimitExceeded { cycles: 4 }));

    // Rollback: the on-disk products are what the first run left behind.
    assert_eq!(
        std::fs::read_to_string(project.product("A")).unwrap(),
        a_stable
    );
    assert_eq!(
        std::fs::read_to_string(project.product("B")).unwrap(),
        b_stable
    );
}

#[test]
fn cancellation_returns_no_change_and_rolls_back() {
    let mut project = Project::new();
    project.set_source(
        "A.src",
        "class A { def foo: Int }",
        SourceSpec::of(vec![ClassSpec::new("A", &[("foo", "def foo: Int")])]),
    );
    let first = project.compile().unwrap();
    let analysis_before = first.analysis.clone();

    project.set_source(
        "A.src",
        "class A { def foo: Long }",
        SourceSpec::of(vec![ClassSpec::new("A", &[("foo", "def foo: Long")])]),
    );
    project.cancel.store(true, Ordering::SeqCst);

    let result = project.compile().unwrap();
    assert!(!result.changed);
    assert_eq!(result.cycles, 0);
    assert_eq!(result.analysis, analysis_before);
    // The cancelled run never reached the compiler.
    assert_eq!(project.compiler.invocations().len(), 1);

    // Clearing the flag lets the change through.
    project.cancel.store(false, Ordering::SeqCst);
    let resumed = project.compile().unwrap();
    assert!(resumed.changed);
}

#[test]
fn compiler_raised_cancellation_is_no_change() {
    let mut project = Project::new();
    project.set_source(
        "A.src",
        "class A { def foo: Int }",
        SourceSpec::of(vec![ClassSpec::new("A", &[("foo", "def foo: Int")])]),
    );
    let first = project.compile().unwrap();

    project.set_source(
        "A.src",
        "class A { def foo: Long }",
        SourceSpec::of(vec![ClassSpec::new("A", &[("foo", "def foo: Long")])]),
    );
    project.compiler.cancel_on(project.source_path("A.src"));

    let result = project.compile().unwrap();
    assert!(!result.changed);
    assert_eq!(result.analysis, first.analysis);
}

#[test]
fn high_invalidation_fraction_escalates_to_full_recompile() {
    let mut project = Project::new();
    for name in ["A", "B", "C"] {
        project.set_source(
            &format!("{name}.src"),
            &format!("class {name}"),
            SourceSpec::of(vec![ClassSpec::new(name, &[("m", "def m: Int")])]),
        );
    }
    project.options.recompile_all_fraction = 0.3;
    project.compile().unwrap();

    // Two of three sources change: 2/3 > 0.3, so the cycle compiles all.
    for name in ["A", "B"] {
        project.set_source(
            &format!("{name}.src"),
            &format!("class {name} touched"),
            SourceSpec::of(vec![ClassSpec::new(name, &[("m", "def m: Int")])]),
        );
    }
    let result = project.compile().unwrap();
    assert_eq!(result.cycles, 1);
    assert_eq!(
        project.compiler.invocations().last().unwrap(),
        &vec!["A.src".to_string(), "B.src".to_string(), "C.src".to_string()]
    );
}

#[test]
fn delete_immediately_manager_skips_rollback() {
    let mut project = Project::new();
    project.options.transactional = false;
    project.set_source(
        "A.src",
        "class A { def foo: Int }",
        SourceSpec::of(vec![ClassSpec::new("A", &[("foo", "def foo: Int")])]),
    );
    project.compile().unwrap();

    project.set_source(
        "A.src",
        "class A { def foo: Long }",
        SourceSpec::of(vec![ClassSpec::new("A", &[("foo", "def foo: Long")])]),
    );
    project.compiler.fail_after(project.source_path("A.src"));
    let err = project.compile().unwrap_err();
    assert!(matches!(err, IncError::CompileFailed { .. }));

    // Without the transactional manager the new product survives the
    // failed run.
    assert!(std::fs::read_to_string(project.product("A"))
        .unwrap()
        .contains("def foo: Long"));
}
