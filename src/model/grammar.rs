//! Substatement grammar and argument shapes.
//!
//! Static per-kind tables: which substatement kinds are allowed with which
//! cardinality, and what shape the argument text must resolve to. Violations
//! are collected during `StatementDefinition` and aggregated into one build
//! failure rather than reported first-error-only.

use smol_str::SmolStr;

use super::kind::{ArgValue, StatementKind};

// ============================================================================
// ARGUMENT SHAPES
// ============================================================================

/// What the raw argument text of a statement kind must resolve to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgumentShape {
    /// The kind takes no argument.
    None,
    /// A single identifier: `[A-Za-z_][A-Za-z0-9_.-]*`.
    Ident,
    /// A `/`-separated non-empty sequence of identifiers.
    Path,
    /// `true` or `false`.
    Bool,
    /// Arbitrary non-empty text.
    Text,
}

pub fn argument_shape(kind: StatementKind) -> ArgumentShape {
    match kind {
        StatementKind::Schema
        | StatementKind::Import
        | StatementKind::Container
        | StatementKind::Leaf
        | StatementKind::TypeRef
        | StatementKind::Typedef
        | StatementKind::Group
        | StatementKind::Apply
        | StatementKind::Feature
        | StatementKind::IfFeature => ArgumentShape::Ident,
        StatementKind::Extend => ArgumentShape::Path,
        StatementKind::Config => ArgumentShape::Bool,
        StatementKind::Description | StatementKind::DefaultValue => ArgumentShape::Text,
    }
}

fn is_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
}

/// Resolve the raw argument text of a statement against its kind's shape.
pub fn resolve_argument(
    kind: StatementKind,
    raw: Option<&str>,
) -> Result<ArgValue, GrammarViolation> {
    let shape = argument_shape(kind);
    match (shape, raw) {
        (ArgumentShape::None, None) => Ok(ArgValue::None),
        (ArgumentShape::None, Some(_)) => Err(GrammarViolation::UnexpectedArgument { kind }),
        (_, None) => Err(GrammarViolation::MissingArgument { kind }),
        (ArgumentShape::Ident, Some(text)) => {
            if is_identifier(text) {
                Ok(ArgValue::Ident(SmolStr::new(text)))
            } else {
                Err(GrammarViolation::MalformedArgument {
                    kind,
                    reason: format!("'{text}' is not a valid identifier"),
                })
            }
        }
        (ArgumentShape::Path, Some(text)) => {
            let segments: Vec<SmolStr> = text.split('/').map(SmolStr::new).collect();
            if !segments.is_empty() && segments.iter().all(|s| is_identifier(s)) {
                Ok(ArgValue::Path(segments))
            } else {
                Err(GrammarViolation::MalformedArgument {
                    kind,
                    reason: format!("'{text}' is not a valid schema-node path"),
                })
            }
        }
        (ArgumentShape::Bool, Some(text)) => match text {
            "true" => Ok(ArgValue::Bool(true)),
            "false" => Ok(ArgValue::Bool(false)),
            other => Err(GrammarViolation::MalformedArgument {
                kind,
                reason: format!("'{other}' is not 'true' or 'false'"),
            }),
        },
        (ArgumentShape::Text, Some(text)) => {
            if text.is_empty() {
                Err(GrammarViolation::MalformedArgument {
                    kind,
                    reason: "empty text argument".to_string(),
                })
            } else {
                Ok(ArgValue::Text(SmolStr::new(text)))
            }
        }
    }
}

// ============================================================================
// SUBSTATEMENT RULES
// ============================================================================

/// How many occurrences of a substatement kind a parent allows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    /// Zero or one.
    Optional,
    /// Exactly one.
    One,
    /// Zero or more.
    Any,
}

/// One row of a parent kind's substatement table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubstatementRule {
    pub kind: StatementKind,
    pub cardinality: Cardinality,
}

const fn any(kind: StatementKind) -> SubstatementRule {
    SubstatementRule {
        kind,
        cardinality: Cardinality::Any,
    }
}

const fn opt(kind: StatementKind) -> SubstatementRule {
    SubstatementRule {
        kind,
        cardinality: Cardinality::Optional,
    }
}

const fn one(kind: StatementKind) -> SubstatementRule {
    SubstatementRule {
        kind,
        cardinality: Cardinality::One,
    }
}

const SCHEMA_RULES: &[SubstatementRule] = &[
    any(StatementKind::Import),
    any(StatementKind::Feature),
    any(StatementKind::Typedef),
    any(StatementKind::Group),
    any(StatementKind::Container),
    any(StatementKind::Leaf),
    any(StatementKind::Apply),
    any(StatementKind::Extend),
    opt(StatementKind::Description),
];

const IMPORT_RULES: &[SubstatementRule] = &[opt(StatementKind::Description)];

const CONTAINER_RULES: &[SubstatementRule] = &[
    any(StatementKind::Container),
    any(StatementKind::Leaf),
    any(StatementKind::Typedef),
    any(StatementKind::Group),
    any(StatementKind::Apply),
    any(StatementKind::IfFeature),
    opt(StatementKind::Config),
    opt(StatementKind::Description),
];

const LEAF_RULES: &[SubstatementRule] = &[
    one(StatementKind::TypeRef),
    opt(StatementKind::DefaultValue),
    any(StatementKind::IfFeature),
    opt(StatementKind::Config),
    opt(StatementKind::Description),
];

const TYPEDEF_RULES: &[SubstatementRule] = &[
    one(StatementKind::TypeRef),
    opt(StatementKind::DefaultValue),
    opt(StatementKind::Description),
];

const GROUP_RULES: &[SubstatementRule] = &[
    any(StatementKind::Container),
    any(StatementKind::Leaf),
    any(StatementKind::Typedef),
    any(StatementKind::Group),
    any(StatementKind::Apply),
    opt(StatementKind::Description),
];

const APPLY_RULES: &[SubstatementRule] = &[
    any(StatementKind::IfFeature),
    opt(StatementKind::Description),
];

const EXTEND_RULES: &[SubstatementRule] = &[
    any(StatementKind::Container),
    any(StatementKind::Leaf),
    any(StatementKind::IfFeature),
    opt(StatementKind::Description),
];

const FEATURE_RULES: &[SubstatementRule] = &[
    any(StatementKind::IfFeature),
    opt(StatementKind::Description),
];

/// Allowed substatements of each kind.
pub fn substatement_rules(kind: StatementKind) -> &'static [SubstatementRule] {
    match kind {
        StatementKind::Schema => SCHEMA_RULES,
        StatementKind::Import => IMPORT_RULES,
        StatementKind::Container => CONTAINER_RULES,
        StatementKind::Leaf => LEAF_RULES,
        StatementKind::Typedef => TYPEDEF_RULES,
        StatementKind::Group => GROUP_RULES,
        StatementKind::Apply => APPLY_RULES,
        StatementKind::Extend => EXTEND_RULES,
        StatementKind::Feature => FEATURE_RULES,
        StatementKind::TypeRef
        | StatementKind::IfFeature
        | StatementKind::Description
        | StatementKind::DefaultValue
        | StatementKind::Config => &[],
    }
}

/// A single grammar defect found while validating one statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GrammarViolation {
    MissingArgument {
        kind: StatementKind,
    },
    UnexpectedArgument {
        kind: StatementKind,
    },
    MalformedArgument {
        kind: StatementKind,
        reason: String,
    },
    DisallowedSubstatement {
        parent: StatementKind,
        child: StatementKind,
    },
    CardinalityViolation {
        parent: StatementKind,
        child: StatementKind,
        expected: Cardinality,
        found: usize,
    },
}

impl std::fmt::Display for GrammarViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GrammarViolation::MissingArgument { kind } => {
                write!(f, "'{kind}' requires an argument")
            }
            GrammarViolation::UnexpectedArgument { kind } => {
                write!(f, "'{kind}' takes no argument")
            }
            GrammarViolation::MalformedArgument { kind, reason } => {
                write!(f, "malformed '{kind}' argument: {reason}")
            }
            GrammarViolation::DisallowedSubstatement { parent, child } => {
                write!(f, "'{child}' is not allowed inside '{parent}'")
            }
            GrammarViolation::CardinalityViolation {
                parent,
                child,
                expected,
                found,
            } => {
                let expected = match expected {
                    Cardinality::Optional => "at most one",
                    Cardinality::One => "exactly one",
                    Cardinality::Any => "any number of",
                };
                write!(
                    f,
                    "'{parent}' requires {expected} '{child}' substatement(s), found {found}"
                )
            }
        }
    }
}

/// Validate the substatement set of one statement against its kind's table.
///
/// Returns every violation, not just the first.
pub fn validate_substatements(
    parent: StatementKind,
    children: &[StatementKind],
) -> Vec<GrammarViolation> {
    let rules = substatement_rules(parent);
    let mut violations = Vec::new();

    for &child in children {
        if !rules.iter().any(|rule| rule.kind == child) {
            violations.push(GrammarViolation::DisallowedSubstatement { parent, child });
        }
    }

    for rule in rules {
        let found = children.iter().filter(|&&c| c == rule.kind).count();
        let violated = match rule.cardinality {
            Cardinality::Optional => found > 1,
            Cardinality::One => found != 1,
            Cardinality::Any => false,
        };
        if violated {
            violations.push(GrammarViolation::CardinalityViolation {
                parent,
                child: rule.kind,
                expected: rule.cardinality,
                found,
            });
        }
    }

    violations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::kind::StatementKind::*;

    #[test]
    fn test_resolve_identifier_argument() {
        assert_eq!(
            resolve_argument(Leaf, Some("speed")),
            Ok(ArgValue::Ident(SmolStr::new("speed")))
        );
        assert!(resolve_argument(Leaf, Some("3speed")).is_err());
        assert!(resolve_argument(Leaf, Some("two words")).is_err());
        assert!(resolve_argument(Leaf, None).is_err());
    }

    #[test]
    fn test_resolve_path_argument() {
        assert_eq!(
            resolve_argument(Extend, Some("c/inner/x")),
            Ok(ArgValue::Path(vec![
                SmolStr::new("c"),
                SmolStr::new("inner"),
                SmolStr::new("x")
            ]))
        );
        assert!(resolve_argument(Extend, Some("c//x")).is_err());
    }

    #[test]
    fn test_resolve_bool_argument() {
        assert_eq!(
            resolve_argument(Config, Some("true")),
            Ok(ArgValue::Bool(true))
        );
        assert!(resolve_argument(Config, Some("yes")).is_err());
        assert!(resolve_argument(IfFeature, Some("f")).is_ok());
    }

    #[test]
    fn test_leaf_requires_exactly_one_type() {
        let violations = validate_substatements(Leaf, &[DefaultValue]);
        assert!(violations.iter().any(|v| matches!(
            v,
            GrammarViolation::CardinalityViolation {
                child: TypeRef,
                found: 0,
                ..
            }
        )));

        let violations = validate_substatements(Leaf, &[TypeRef, TypeRef]);
        assert_eq!(violations.len(), 1);
    }

    #[test]
    fn test_disallowed_substatement() {
        let violations = validate_substatements(Leaf, &[TypeRef, Import]);
        assert!(violations.iter().any(|v| matches!(
            v,
            GrammarViolation::DisallowedSubstatement {
                parent: Leaf,
                child: Import
            }
        )));
    }

    #[test]
    fn test_multiple_violations_all_reported() {
        // Missing type, duplicate description, stray import: three defects.
        let violations = validate_substatements(Leaf, &[Description, Description, Import]);
        assert_eq!(violations.len(), 3);
    }
}
