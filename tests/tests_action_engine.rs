#![allow(clippy::unwrap_used)]
//! Inference action engine behaviour observed through custom actions:
//! exactly-once application, prerequisite resolution, path hops, the
//! unavailable sentinel, and stall diagnostics.

use std::cell::RefCell;
use std::rc::Rc;

use smol_str::SmolStr;
use stratum::reactor::{
    ActionContext, BuildError, BuildPhase, CtxId, InferenceAction, NamespaceId, Prereq, Resolution,
};
use stratum::{BuildSession, FeatureSet, RawDocument, RawStatement, Span};

// ============================================================
// COMMON HELPER FUNCTIONS
// ============================================================

fn stmt(keyword: &str, argument: Option<&str>) -> RawStatement {
    RawStatement::new(keyword, argument.map(SmolStr::new), Span::default())
}

fn stmt_with(keyword: &str, argument: Option<&str>, children: Vec<RawStatement>) -> RawStatement {
    stmt(keyword, argument).with_substatements(children)
}

fn leaf(name: &str) -> RawStatement {
    stmt_with("leaf", Some(name), vec![stmt("type", Some("string"))])
}

fn doc(root: RawStatement) -> RawDocument {
    RawDocument::new(root)
}

/// An action that records every engine callback it receives.
#[derive(Default)]
struct Probe {
    applied: usize,
    resolutions: Vec<(Prereq, Resolution)>,
    unavailable: Vec<Prereq>,
    failed: Vec<Prereq>,
}

struct ProbeAction {
    probe: Rc<RefCell<Probe>>,
    prereqs: Vec<Prereq>,
    name: &'static str,
}

impl InferenceAction for ProbeAction {
    fn apply(&mut self, ctx: &mut ActionContext<'_>) -> Result<(), BuildError> {
        let mut probe = self.probe.borrow_mut();
        probe.applied += 1;
        for &prereq in &self.prereqs {
            probe.resolutions.push((prereq, ctx.resolution(prereq)));
        }
        Ok(())
    }

    fn prerequisite_unavailable(&mut self, prereq: Prereq) {
        self.probe.borrow_mut().unavailable.push(prereq);
    }

    fn prerequisite_failed(&mut self, unmet: &[Prereq]) {
        self.probe.borrow_mut().failed.extend_from_slice(unmet);
    }

    fn describe(&self) -> String {
        self.name.to_string()
    }
}

// ============================================================
// EXACTLY-ONCE APPLICATION
// ============================================================

#[test]
fn test_action_applies_exactly_once() {
    let mut session = BuildSession::new(FeatureSet::all());
    let root = session
        .add_document(&doc(stmt_with(
            "schema",
            Some("demo"),
            vec![stmt_with("container", Some("c"), vec![leaf("x")])],
        )))
        .unwrap();

    let probe = Rc::new(RefCell::new(Probe::default()));
    let mut builder = session.build_action(root);
    // Two prerequisites resolving at different times queue several
    // application attempts; the side effect must still fire once.
    let p0 = builder.requires_ctx(root, BuildPhase::SourceLinkage);
    let p1 = builder.requires_ctx(root, BuildPhase::FullDeclaration);
    builder.apply(Box::new(ProbeAction {
        probe: Rc::clone(&probe),
        prereqs: vec![p0, p1],
        name: "probe",
    }));

    session.build().unwrap();
    assert_eq!(probe.borrow().applied, 1);
}

// ============================================================
// PREREQUISITE RESOLUTION
// ============================================================

#[test]
fn test_namespace_prerequisite_resolves_to_bound_context() {
    let mut session = BuildSession::new(FeatureSet::all());
    let root = session
        .add_document(&doc(stmt_with(
            "schema",
            Some("demo"),
            vec![stmt_with("group", Some("g"), vec![leaf("x")])],
        )))
        .unwrap();
    let group_ctx = session.find_descendant(root, &["g"]).unwrap();

    let probe = Rc::new(RefCell::new(Probe::default()));
    let mut builder = session.build_action(root);
    let group = builder.requires_ctx_in(
        root,
        NamespaceId::Groups,
        "g",
        BuildPhase::FullDeclaration,
    );
    builder.apply(Box::new(ProbeAction {
        probe: Rc::clone(&probe),
        prereqs: vec![group],
        name: "lookup group",
    }));

    session.build().unwrap();
    let probe = probe.borrow();
    assert_eq!(probe.applied, 1);
    assert_eq!(probe.resolutions[0].1, Resolution::Ctx(group_ctx));
}

#[test]
fn test_path_prerequisite_walks_child_registries() {
    let mut session = BuildSession::new(FeatureSet::all());
    let root = session
        .add_document(&doc(stmt_with(
            "schema",
            Some("demo"),
            vec![stmt_with(
                "container",
                Some("c"),
                vec![stmt_with("container", Some("inner"), vec![leaf("x")])],
            )],
        )))
        .unwrap();
    let target_ctx = session.find_descendant(root, &["c", "inner", "x"]).unwrap();

    let probe = Rc::new(RefCell::new(Probe::default()));
    let mut builder = session.build_action(root);
    let target = builder.requires_ctx_path(
        root,
        NamespaceId::ChildNodes,
        vec![SmolStr::new("c"), SmolStr::new("inner"), SmolStr::new("x")],
        BuildPhase::EffectiveModel,
    );
    builder.apply(Box::new(ProbeAction {
        probe: Rc::clone(&probe),
        prereqs: vec![target],
        name: "walk path",
    }));

    session.build().unwrap();
    let probe = probe.borrow();
    assert_eq!(probe.applied, 1);
    assert_eq!(probe.resolutions[0].1, Resolution::Ctx(target_ctx));
}

// ============================================================
// FEATURE EXCLUSION AND THE UNAVAILABLE SENTINEL
// ============================================================

#[test]
fn test_excluded_target_resolves_to_unavailable_sentinel() {
    let mut session = BuildSession::new(FeatureSet::none());
    let root = session
        .add_document(&doc(stmt_with(
            "schema",
            Some("demo"),
            vec![
                stmt("feature", Some("f")),
                stmt_with(
                    "container",
                    Some("c"),
                    vec![stmt("if-feature", Some("f")), leaf("x")],
                ),
            ],
        )))
        .unwrap();
    let c_ctx = session.find_descendant(root, &["c"]).unwrap();

    let probe = Rc::new(RefCell::new(Probe::default()));
    let mut builder = session.build_action(root);
    let c = builder.requires_ctx(c_ctx, BuildPhase::EffectiveModel);
    builder.apply(Box::new(ProbeAction {
        probe: Rc::clone(&probe),
        prereqs: vec![c],
        name: "watch pruned container",
    }));

    // Pruning is graceful: the build still succeeds.
    session.build().unwrap();
    let probe = probe.borrow();
    assert_eq!(probe.applied, 1);
    assert_eq!(probe.resolutions[0].1, Resolution::Unavailable);
    assert_eq!(probe.unavailable.len(), 1);
}

// ============================================================
// STALLS AND DIAGNOSTICS
// ============================================================

#[test]
fn test_mutual_requirements_terminate_with_both_named() {
    let mut session = BuildSession::new(FeatureSet::all());
    let root = session
        .add_document(&doc(stmt_with(
            "schema",
            Some("demo"),
            vec![
                stmt_with("container", Some("a"), vec![]),
                stmt_with("container", Some("b"), vec![]),
            ],
        )))
        .unwrap();
    let a = session.find_descendant(root, &["a"]).unwrap();
    let b = session.find_descendant(root, &["b"]).unwrap();

    let probe = Rc::new(RefCell::new(Probe::default()));
    register_blocking_pair(&mut session, a, b, &probe, "a waits for b");
    register_blocking_pair(&mut session, b, a, &probe, "b waits for a");

    let failure = session.build().unwrap_err();
    assert_eq!(failure.phase, BuildPhase::FullDeclaration);
    let rendered: Vec<String> = failure.errors.iter().map(ToString::to_string).collect();
    assert!(rendered.iter().any(|m| m.contains("container a")));
    assert!(rendered.iter().any(|m| m.contains("container b")));
    // Neither action ever applied.
    assert_eq!(probe.borrow().applied, 0);
    // Both actions were told which prerequisites went unmet.
    assert_eq!(probe.borrow().failed.len(), 2);
}

/// Block `blocked` from completing full declaration until `awaited` has.
fn register_blocking_pair(
    session: &mut BuildSession,
    blocked: CtxId,
    awaited: CtxId,
    probe: &Rc<RefCell<Probe>>,
    name: &'static str,
) {
    let mut builder = session.build_action(blocked);
    let awaited = builder.requires_ctx(awaited, BuildPhase::FullDeclaration);
    builder.mutates_ctx(blocked, BuildPhase::FullDeclaration);
    builder.apply(Box::new(ProbeAction {
        probe: Rc::clone(probe),
        prereqs: vec![awaited],
        name,
    }));
}

#[test]
fn test_stuck_context_names_blocking_action() {
    let mut session = BuildSession::new(FeatureSet::all());
    let root = session
        .add_document(&doc(stmt_with(
            "schema",
            Some("demo"),
            vec![stmt_with("container", Some("c"), vec![])],
        )))
        .unwrap();
    let c = session.find_descendant(root, &["c"]).unwrap();

    let probe = Rc::new(RefCell::new(Probe::default()));
    let mut builder = session.build_action(c);
    let missing = builder.requires_ctx_in(
        root,
        NamespaceId::Groups,
        "nope",
        BuildPhase::FullDeclaration,
    );
    builder.mutates_ctx(c, BuildPhase::FullDeclaration);
    builder.apply(Box::new(ProbeAction {
        probe: Rc::clone(&probe),
        prereqs: vec![missing],
        name: "wait for group that never comes",
    }));

    let failure = session.build().unwrap_err();
    let rendered: Vec<String> = failure.errors.iter().map(ToString::to_string).collect();
    assert!(rendered.iter().any(|m| {
        m.contains("container c") && m.contains("wait for group that never comes")
    }));
    assert!(rendered.iter().any(|m| m.contains("'nope'")));
}

// ============================================================
// DERIVED NAMESPACE PROJECTION
// ============================================================

/// Reads the derived prefix→schema projection once imports have resolved.
struct PrefixLookup {
    import_ctx: CtxId,
    observed: Rc<RefCell<Vec<Option<CtxId>>>>,
}

impl InferenceAction for PrefixLookup {
    fn apply(&mut self, ctx: &mut ActionContext<'_>) -> Result<(), BuildError> {
        let import_ctx = self.import_ctx;
        let session = ctx.session();
        // Twice on purpose: the second read is served from the cache and
        // must agree with the first.
        for _ in 0..2 {
            let resolved = session
                .ns_get(import_ctx, NamespaceId::ImportedSchemas, "base")
                .and_then(|value| value.as_ctx());
            self.observed.borrow_mut().push(resolved);
        }
        Ok(())
    }

    fn describe(&self) -> String {
        "look up imported schema by prefix".to_string()
    }
}

#[test]
fn test_derived_namespace_resolves_import_prefix() {
    let mut session = BuildSession::new(FeatureSet::all());
    let base_root = session
        .add_document(&doc(stmt_with("schema", Some("base"), vec![leaf("x")])))
        .unwrap();
    let app_root = session
        .add_document(&doc(stmt_with(
            "schema",
            Some("app"),
            vec![stmt("import", Some("base"))],
        )))
        .unwrap();
    let import_ctx = session.find_descendant(app_root, &["base"]).unwrap();

    let observed = Rc::new(RefCell::new(Vec::new()));
    let mut builder = session.build_action(app_root);
    // The prefix binding exists once the import action has run, which its
    // own source-linkage obligation guarantees by end of that phase.
    builder.requires_ctx(app_root, BuildPhase::StatementDefinition);
    builder.apply(Box::new(PrefixLookup {
        import_ctx,
        observed: Rc::clone(&observed),
    }));

    session.build().unwrap();
    assert_eq!(
        observed.borrow().as_slice(),
        &[Some(base_root), Some(base_root)]
    );
}

// ============================================================
// NAMESPACE SURFACE
// ============================================================

#[test]
fn test_namespace_write_once_surface() {
    use stratum::reactor::NsValue;

    let mut session = BuildSession::new(FeatureSet::all());
    let root = session
        .add_document(&doc(stmt_with(
            "schema",
            Some("demo"),
            vec![stmt_with("container", Some("c"), vec![])],
        )))
        .unwrap();
    let c = session.find_descendant(root, &["c"]).unwrap();

    assert!(session.ns_add(root, NamespaceId::Groups, "k", NsValue::Ctx(c)));
    // Equal rebinding: silent success.
    assert!(session.ns_add(root, NamespaceId::Groups, "k", NsValue::Ctx(c)));
    // Different value: hard error, surfaced at the next phase boundary.
    assert!(!session.ns_add(root, NamespaceId::Groups, "k", NsValue::Ctx(root)));
    assert_eq!(
        session.ns_get(c, NamespaceId::Groups, "k"),
        Some(NsValue::Ctx(c))
    );

    let failure = session.build().unwrap_err();
    assert!(failure
        .errors
        .iter()
        .any(|error| matches!(error, BuildError::DuplicateKey { .. })));
}
