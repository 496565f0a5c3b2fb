//! Statement kinds of the schema language.
//!
//! A closed sum type rather than a per-kind type hierarchy: kind-specific
//! behaviour lives in small static tables ([`crate::model::grammar`]) and in
//! the reactor's per-kind hooks, keyed by this enum.

use smol_str::SmolStr;

/// Every statement kind the language defines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatementKind {
    /// Top-level document root, names the schema.
    Schema,
    /// Cross-document linkage to another schema by name.
    Import,
    /// Interior data node holding further nodes.
    Container,
    /// Terminal data node.
    Leaf,
    /// Reference to a named type (built-in or `Typedef`).
    TypeRef,
    /// Named type definition, reusable by `TypeRef`.
    Typedef,
    /// Named reusable subtree definition.
    Group,
    /// Instantiation of a `Group` at the use site.
    Apply,
    /// Grafts substatements onto a target named by a path.
    Extend,
    /// Declares an optional capability.
    Feature,
    /// Gates the parent statement on a declared capability.
    IfFeature,
    /// Human-readable documentation.
    Description,
    /// Default value for a leaf or typedef.
    DefaultValue,
    /// Whether a data node is configuration (true) or state (false).
    Config,
}

impl StatementKind {
    /// The keyword as it appears in raw statement trees.
    pub fn keyword(self) -> &'static str {
        match self {
            StatementKind::Schema => "schema",
            StatementKind::Import => "import",
            StatementKind::Container => "container",
            StatementKind::Leaf => "leaf",
            StatementKind::TypeRef => "type",
            StatementKind::Typedef => "typedef",
            StatementKind::Group => "group",
            StatementKind::Apply => "apply",
            StatementKind::Extend => "extend",
            StatementKind::Feature => "feature",
            StatementKind::IfFeature => "if-feature",
            StatementKind::Description => "description",
            StatementKind::DefaultValue => "default",
            StatementKind::Config => "config",
        }
    }

    pub fn from_keyword(keyword: &str) -> Option<Self> {
        Some(match keyword {
            "schema" => StatementKind::Schema,
            "import" => StatementKind::Import,
            "container" => StatementKind::Container,
            "leaf" => StatementKind::Leaf,
            "type" => StatementKind::TypeRef,
            "typedef" => StatementKind::Typedef,
            "group" => StatementKind::Group,
            "apply" => StatementKind::Apply,
            "extend" => StatementKind::Extend,
            "feature" => StatementKind::Feature,
            "if-feature" => StatementKind::IfFeature,
            "description" => StatementKind::Description,
            "default" => StatementKind::DefaultValue,
            "config" => StatementKind::Config,
            _ => return None,
        })
    }

    /// Kinds whose argument names the statement and registers it in its
    /// parent's child-node registry (schema-node identity).
    pub fn is_schema_node(self) -> bool {
        matches!(
            self,
            StatementKind::Container | StatementKind::Leaf | StatementKind::Schema
        )
    }

    /// Kinds whose argument is an identifier usable as a lookup key.
    pub fn is_named(self) -> bool {
        matches!(
            self,
            StatementKind::Schema
                | StatementKind::Import
                | StatementKind::Container
                | StatementKind::Leaf
                | StatementKind::Typedef
                | StatementKind::Group
                | StatementKind::Feature
        )
    }
}

impl std::fmt::Display for StatementKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.keyword())
    }
}

/// The resolved argument of a statement.
///
/// Raw arguments are plain text; during `StatementDefinition` each statement's
/// argument is resolved against its kind's [`ArgumentShape`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgValue {
    /// The kind takes no argument.
    None,
    /// A single identifier.
    Ident(SmolStr),
    /// A `/`-separated path of identifiers.
    Path(Vec<SmolStr>),
    /// A boolean literal.
    Bool(bool),
    /// Free text.
    Text(SmolStr),
}

impl ArgValue {
    pub fn as_ident(&self) -> Option<&SmolStr> {
        match self {
            ArgValue::Ident(name) => Some(name),
            _ => None,
        }
    }

    pub fn as_path(&self) -> Option<&[SmolStr]> {
        match self {
            ArgValue::Path(segments) => Some(segments),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ArgValue::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&SmolStr> {
        match self {
            ArgValue::Text(text) => Some(text),
            _ => None,
        }
    }
}
