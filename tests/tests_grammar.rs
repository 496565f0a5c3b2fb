#![allow(clippy::unwrap_used)]
//! Argument-shape and substatement-grammar coverage, parameterized over the
//! statement kinds.

use rstest::rstest;
use stratum::model::grammar::{resolve_argument, validate_substatements};
use stratum::StatementKind;

#[rstest]
#[case(StatementKind::Leaf, "speed", true)]
#[case(StatementKind::Leaf, "speed-limit.v2", true)]
#[case(StatementKind::Leaf, "2fast", false)]
#[case(StatementKind::Leaf, "two words", false)]
#[case(StatementKind::Container, "_hidden", true)]
#[case(StatementKind::Extend, "c", true)]
#[case(StatementKind::Extend, "c/inner/x", true)]
#[case(StatementKind::Extend, "c//x", false)]
#[case(StatementKind::Extend, "/c", false)]
#[case(StatementKind::Config, "true", true)]
#[case(StatementKind::Config, "false", true)]
#[case(StatementKind::Config, "yes", false)]
#[case(StatementKind::Description, "any prose at all", true)]
#[case(StatementKind::Description, "", false)]
fn test_argument_shapes(#[case] kind: StatementKind, #[case] raw: &str, #[case] ok: bool) {
    assert_eq!(
        resolve_argument(kind, Some(raw)).is_ok(),
        ok,
        "kind {kind} argument {raw:?}"
    );
}

#[rstest]
#[case(StatementKind::Leaf)]
#[case(StatementKind::Container)]
#[case(StatementKind::Schema)]
#[case(StatementKind::Group)]
fn test_named_kinds_reject_missing_argument(#[case] kind: StatementKind) {
    assert!(resolve_argument(kind, None).is_err());
}

#[rstest]
#[case(StatementKind::Leaf, vec![StatementKind::TypeRef], 0)]
#[case(StatementKind::Leaf, vec![], 1)] // missing mandatory type
#[case(StatementKind::Leaf, vec![StatementKind::TypeRef, StatementKind::TypeRef], 1)]
#[case(StatementKind::Schema, vec![StatementKind::Import, StatementKind::Container], 0)]
#[case(StatementKind::Import, vec![StatementKind::Leaf], 1)] // leaf not allowed here
#[case(
    StatementKind::Container,
    vec![StatementKind::Config, StatementKind::Config],
    1
)]
fn test_substatement_cardinalities(
    #[case] parent: StatementKind,
    #[case] children: Vec<StatementKind>,
    #[case] expected_violations: usize,
) {
    assert_eq!(
        validate_substatements(parent, &children).len(),
        expected_violations
    );
}
