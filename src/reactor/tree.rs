//! The context tree arena.
//!
//! Single source of truth for all statement contexts of one build. Contexts
//! are appended in document order; document order of the roots doubles as the
//! deterministic tie-break for every equal-key namespace decision.

use super::context::{CtxId, StatementContext};

#[derive(Debug, Default)]
pub(crate) struct ContextTree {
    /// Arena storage for all contexts - single source of truth
    arena: Vec<StatementContext>,
    roots: Vec<CtxId>,
}

impl ContextTree {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn alloc(&mut self, context: StatementContext) -> CtxId {
        let id = CtxId::new(self.arena.len());
        self.arena.push(context);
        // A declared statement is its own original; only copies start
        // unresolved and go through the linker.
        let stmt = &mut self.arena[id.index()];
        if !stmt.copy.is_copy() {
            stmt.original = Some(id);
        }
        id
    }

    pub(crate) fn get(&self, id: CtxId) -> &StatementContext {
        &self.arena[id.index()]
    }

    pub(crate) fn get_mut(&mut self, id: CtxId) -> &mut StatementContext {
        &mut self.arena[id.index()]
    }

    pub(crate) fn add_root(&mut self, id: CtxId) {
        self.roots.push(id);
    }

    pub(crate) fn roots(&self) -> &[CtxId] {
        &self.roots
    }

    /// Ids in allocation (document) order.
    pub(crate) fn ids(&self) -> impl Iterator<Item = CtxId> + '_ {
        (0..self.arena.len()).map(CtxId::new)
    }

    /// The document root this context belongs to.
    pub(crate) fn root_of(&self, mut id: CtxId) -> CtxId {
        while let Some(parent) = self.get(id).parent {
            id = parent;
        }
        id
    }

    /// Whether `ancestor` is `id` or one of its ancestors.
    pub(crate) fn is_ancestor_or_self(&self, ancestor: CtxId, id: CtxId) -> bool {
        let mut current = Some(id);
        while let Some(ctx) = current {
            if ctx == ancestor {
                return true;
            }
            current = self.get(ctx).parent;
        }
        false
    }

    /// `id` and its ancestors, nearest-enclosing-first.
    pub(crate) fn ancestors_or_self(&self, id: CtxId) -> Vec<CtxId> {
        let mut chain = Vec::new();
        let mut current = Some(id);
        while let Some(ctx) = current {
            chain.push(ctx);
            current = self.get(ctx).parent;
        }
        chain
    }

    /// Human-readable path of a context, for diagnostics:
    /// `schema demo / container c / leaf x`.
    pub(crate) fn display_path(&self, id: CtxId) -> String {
        let mut parts: Vec<String> = self
            .ancestors_or_self(id)
            .into_iter()
            .map(|ctx| {
                let stmt = self.get(ctx);
                match &stmt.raw_arg {
                    Some(arg) => format!("{} {}", stmt.kind, arg),
                    None => stmt.kind.to_string(),
                }
            })
            .collect();
        parts.reverse();
        parts.join(" / ")
    }
}
