//! The effective model: the immutable output of a successful build.
//!
//! Effective statements live in a flat arena indexed by [`StmtId`]; children
//! are id lists in document order. The arena plus the pre-computed lookup
//! maps make the whole model freely shareable between threads: everything is
//! owned, nothing is borrowed, and no mutation entry point exists.

use indexmap::IndexMap;
use smol_str::SmolStr;

use crate::base::{DocId, Span};

use super::kind::{ArgValue, StatementKind};

/// Identifier of one effective statement within its model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StmtId(u32);

impl StmtId {
    pub(crate) fn new(index: usize) -> Self {
        Self(index as u32)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// The fully resolved, immutable form of one statement.
#[derive(Debug, Clone)]
pub struct EffectiveStatement {
    id: StmtId,
    /// The original incarnation this statement was (transitively) copied
    /// from; `id == origin` for statements the source declared in place.
    origin: StmtId,
    kind: StatementKind,
    argument: ArgValue,
    doc: DocId,
    span: Span,
    /// Effective `config`: declared on this statement or inherited.
    config: bool,
    children: Vec<StmtId>,
}

impl EffectiveStatement {
    pub fn id(&self) -> StmtId {
        self.id
    }

    pub fn origin(&self) -> StmtId {
        self.origin
    }

    pub fn kind(&self) -> StatementKind {
        self.kind
    }

    pub fn argument(&self) -> &ArgValue {
        &self.argument
    }

    /// The identifier argument, for named kinds.
    pub fn name(&self) -> Option<&SmolStr> {
        self.argument.as_ident()
    }

    pub fn doc(&self) -> DocId {
        self.doc
    }

    pub fn span(&self) -> Span {
        self.span
    }

    pub fn config(&self) -> bool {
        self.config
    }

    /// Ordered effective substatements.
    pub fn children(&self) -> &[StmtId] {
        &self.children
    }
}

/// The finished model of one build: all effective statements of all source
/// documents, plus typed lookups over them.
#[derive(Debug, Clone, Default)]
pub struct EffectiveModel {
    statements: Vec<EffectiveStatement>,
    roots: Vec<StmtId>,
    /// Schema name → root statement, in document order.
    schemas: IndexMap<SmolStr, StmtId>,
    /// Group name → defining statement; first binding in document order wins.
    groups: IndexMap<SmolStr, StmtId>,
    /// Declared feature names, in document order.
    features: IndexMap<SmolStr, StmtId>,
}

impl EffectiveModel {
    pub fn get(&self, id: StmtId) -> &EffectiveStatement {
        &self.statements[id.index()]
    }

    /// Root statements, one per source document, in document order.
    pub fn roots(&self) -> &[StmtId] {
        &self.roots
    }

    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    /// Resolve a schema by name.
    pub fn schema(&self, name: &str) -> Option<&EffectiveStatement> {
        self.schemas.get(name).map(|&id| self.get(id))
    }

    /// Resolve a group definition by name.
    pub fn group(&self, name: &str) -> Option<&EffectiveStatement> {
        self.groups.get(name).map(|&id| self.get(id))
    }

    /// Whether a feature was declared (supported or not) in any document.
    pub fn declares_feature(&self, name: &str) -> bool {
        self.features.contains_key(name)
    }

    /// Children of `parent` filtered by kind.
    pub fn children_of_kind(
        &self,
        parent: &EffectiveStatement,
        kind: StatementKind,
    ) -> Vec<&EffectiveStatement> {
        parent
            .children()
            .iter()
            .map(|&id| self.get(id))
            .filter(|stmt| stmt.kind() == kind)
            .collect()
    }

    /// Find a direct child by its identifier argument.
    pub fn child_named(
        &self,
        parent: &EffectiveStatement,
        name: &str,
    ) -> Option<&EffectiveStatement> {
        parent
            .children()
            .iter()
            .map(|&id| self.get(id))
            .find(|stmt| stmt.name().is_some_and(|n| n == name))
    }

    /// Resolve a statement reachable from a schema root by a path of names.
    pub fn resolve_path(&self, schema: &str, path: &[&str]) -> Option<&EffectiveStatement> {
        let mut current = self.schema(schema)?;
        for segment in path {
            current = self.child_named(current, segment)?;
        }
        Some(current)
    }
}

// ============================================================================
// CONSTRUCTION (crate-internal; the reactor's freeze step)
// ============================================================================

/// Builder used by the reactor while freezing the context tree.
///
/// Statements are pushed in document order; origins are patched afterwards,
/// once every surviving context has its id assigned.
#[derive(Debug, Default)]
pub(crate) struct EffectiveModelBuilder {
    model: EffectiveModel,
}

impl EffectiveModelBuilder {
    pub(crate) fn push(
        &mut self,
        kind: StatementKind,
        argument: ArgValue,
        doc: DocId,
        span: Span,
        config: bool,
    ) -> StmtId {
        let id = StmtId::new(self.model.statements.len());
        if let Some(name) = argument.as_ident() {
            match kind {
                StatementKind::Schema => {
                    self.model.schemas.entry(name.clone()).or_insert(id);
                }
                StatementKind::Group => {
                    self.model.groups.entry(name.clone()).or_insert(id);
                }
                StatementKind::Feature => {
                    self.model.features.entry(name.clone()).or_insert(id);
                }
                _ => {}
            }
        }
        self.model.statements.push(EffectiveStatement {
            id,
            origin: id,
            kind,
            argument,
            doc,
            span,
            config,
            children: Vec::new(),
        });
        id
    }

    pub(crate) fn add_root(&mut self, id: StmtId) {
        self.model.roots.push(id);
    }

    pub(crate) fn set_children(&mut self, id: StmtId, children: Vec<StmtId>) {
        self.model.statements[id.index()].children = children;
    }

    pub(crate) fn set_origin(&mut self, id: StmtId, origin: StmtId) {
        self.model.statements[id.index()].origin = origin;
    }

    pub(crate) fn finish(self) -> EffectiveModel {
        self.model
    }
}
