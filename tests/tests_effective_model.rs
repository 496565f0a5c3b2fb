#![allow(clippy::unwrap_used)]
//! The read surface of the finished model: typed lookups, ordered effective
//! substatements, config inheritance, and thread-shareability.

use smol_str::SmolStr;
use stratum::{
    ArgValue, BuildSession, EffectiveModel, FeatureSet, RawDocument, RawStatement, Span,
    StatementKind,
};

// ============================================================
// COMMON HELPER FUNCTIONS
// ============================================================

fn stmt(keyword: &str, argument: Option<&str>) -> RawStatement {
    RawStatement::new(keyword, argument.map(SmolStr::new), Span::default())
}

fn stmt_with(keyword: &str, argument: Option<&str>, children: Vec<RawStatement>) -> RawStatement {
    stmt(keyword, argument).with_substatements(children)
}

fn build(documents: Vec<RawDocument>) -> EffectiveModel {
    let mut session = BuildSession::new(FeatureSet::all());
    for document in &documents {
        session.add_document(document).unwrap();
    }
    session.build().unwrap()
}

fn demo_model() -> EffectiveModel {
    build(vec![RawDocument::new(stmt_with(
        "schema",
        Some("demo"),
        vec![
            stmt("feature", Some("metrics")),
            stmt_with(
                "typedef",
                Some("speed"),
                vec![
                    stmt("type", Some("uint32")),
                    stmt("default", Some("0")),
                    stmt("description", Some("velocity in km/h")),
                ],
            ),
            stmt_with(
                "container",
                Some("state"),
                vec![
                    stmt("config", Some("false")),
                    stmt_with(
                        "leaf",
                        Some("current"),
                        vec![stmt("type", Some("speed"))],
                    ),
                    stmt_with(
                        "container",
                        Some("detail"),
                        vec![stmt_with(
                            "leaf",
                            Some("raw"),
                            vec![stmt("type", Some("string"))],
                        )],
                    ),
                ],
            ),
            stmt_with(
                "container",
                Some("settings"),
                vec![stmt_with(
                    "leaf",
                    Some("limit"),
                    vec![stmt("type", Some("speed")), stmt("default", Some("120"))],
                )],
            ),
        ],
    ))])
}

// ============================================================
// TYPED LOOKUPS
// ============================================================

#[test]
fn test_schema_and_path_lookup() {
    let model = demo_model();
    let schema = model.schema("demo").unwrap();
    assert_eq!(schema.kind(), StatementKind::Schema);
    assert_eq!(schema.name().unwrap(), "demo");

    let raw = model.resolve_path("demo", &["state", "detail", "raw"]).unwrap();
    assert_eq!(raw.kind(), StatementKind::Leaf);
    assert!(model.resolve_path("demo", &["state", "nope"]).is_none());
    assert!(model.resolve_path("ghost", &[]).is_none());
}

#[test]
fn test_feature_declarations_visible() {
    let model = demo_model();
    assert!(model.declares_feature("metrics"));
    assert!(!model.declares_feature("history"));
}

#[test]
fn test_effective_substatements_keep_document_order() {
    let model = demo_model();
    let schema = model.schema("demo").unwrap();
    let kinds: Vec<StatementKind> = schema
        .children()
        .iter()
        .map(|&id| model.get(id).kind())
        .collect();
    assert_eq!(
        kinds,
        vec![
            StatementKind::Feature,
            StatementKind::Typedef,
            StatementKind::Container,
            StatementKind::Container,
        ]
    );
}

#[test]
fn test_argument_values_are_resolved() {
    let model = demo_model();
    let typedef = model.resolve_path("demo", &["speed"]).unwrap();
    let description = model.children_of_kind(typedef, StatementKind::Description)[0];
    assert_eq!(
        description.argument(),
        &ArgValue::Text(SmolStr::new("velocity in km/h"))
    );
    let default = model.children_of_kind(typedef, StatementKind::DefaultValue)[0];
    assert_eq!(default.argument().as_text().unwrap(), "0");
}

// ============================================================
// CONFIG INHERITANCE
// ============================================================

#[test]
fn test_config_inherits_downward_until_overridden() {
    let model = demo_model();
    // Schema-level default is config=true.
    assert!(model.resolve_path("demo", &["settings"]).unwrap().config());
    assert!(model
        .resolve_path("demo", &["settings", "limit"])
        .unwrap()
        .config());
    // "state" declares config=false; everything below inherits it.
    let state = model.resolve_path("demo", &["state"]).unwrap();
    assert!(!state.config());
    assert!(!model.resolve_path("demo", &["state", "current"]).unwrap().config());
    assert!(!model
        .resolve_path("demo", &["state", "detail", "raw"])
        .unwrap()
        .config());
}

// ============================================================
// SHAREABILITY
// ============================================================

#[test]
fn test_model_is_send_and_sync() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<EffectiveModel>();
}

#[test]
fn test_concurrent_readers_share_one_model() {
    let model = std::sync::Arc::new(demo_model());
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let model = std::sync::Arc::clone(&model);
            std::thread::spawn(move || {
                model
                    .resolve_path("demo", &["state", "current"])
                    .map(|leaf| leaf.config())
            })
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.join().unwrap(), Some(false));
    }
}

// ============================================================
// GROUP DEFINITIONS REMAIN VISIBLE
// ============================================================

#[test]
fn test_group_definition_lookup() {
    let model = build(vec![RawDocument::new(stmt_with(
        "schema",
        Some("demo"),
        vec![
            stmt_with(
                "group",
                Some("g"),
                vec![stmt_with(
                    "leaf",
                    Some("x"),
                    vec![stmt("type", Some("string"))],
                )],
            ),
            stmt_with("container", Some("c"), vec![stmt("apply", Some("g"))]),
        ],
    ))]);
    let group = model.group("g").unwrap();
    assert_eq!(group.kind(), StatementKind::Group);
    // The use site keeps its apply statement alongside the expansion.
    let c = model.resolve_path("demo", &["c"]).unwrap();
    assert_eq!(model.children_of_kind(c, StatementKind::Apply).len(), 1);
    assert_eq!(model.children_of_kind(c, StatementKind::Leaf).len(), 1);
}
