//! The build session: one reactor instance owning one build.
//!
//! All mutable build state lives here: the context tree arena, every
//! namespace storage, the committed actions, the pending-work queue and the
//! error sink. There is no process-wide registry of any kind; independent
//! sessions can run on separate threads without sharing anything.

use std::collections::VecDeque;

use rustc_hash::FxHashMap;
use smol_str::SmolStr;

use crate::base::DocId;
use crate::model::effective::EffectiveModelBuilder;
use crate::model::{ArgValue, EffectiveModel, FeatureSet, StatementKind, StmtId};
use crate::raw::{RawDocument, RawStatement};

use super::action::{ActionBuilder, ActionStore, Event};
use super::context::{CopyHistory, CtxId, StatementContext};
use super::errors::{BuildError, BuildFailure};
use super::hooks;
use super::namespace::{NamespaceId, NamespaceStore, NsValue};
use super::phase::{BuildPhase, PhaseSet};
use super::scheduler;
use super::tree::ContextTree;

/// One build: raw statement forests in, one immutable effective model out.
pub struct BuildSession {
    pub(crate) tree: ContextTree,
    pub(crate) namespaces: NamespaceStore,
    pub(crate) actions: ActionStore,
    pub(crate) events: VecDeque<Event>,
    pub(crate) features: FeatureSet,
    pub(crate) errors: Vec<BuildError>,
    /// Copy-introduced contexts whose original incarnation is still unknown.
    pub(crate) pending_links: Vec<CtxId>,
    doc_count: usize,
}

impl BuildSession {
    pub fn new(features: FeatureSet) -> Self {
        Self {
            tree: ContextTree::new(),
            namespaces: NamespaceStore::default(),
            actions: ActionStore::default(),
            events: VecDeque::new(),
            features,
            errors: Vec::new(),
            pending_links: Vec::new(),
            doc_count: 0,
        }
    }

    // ============================================================
    // Ingestion
    // ============================================================

    /// Wrap one raw document into statement contexts and register its
    /// per-kind behaviours. Input-shape defects (unknown keywords, a
    /// non-schema root) are rejected here, before the reactor runs.
    pub fn add_document(&mut self, document: &RawDocument) -> Result<CtxId, BuildError> {
        let doc = DocId::new(self.doc_count);
        let root_kind = match StatementKind::from_keyword(&document.root.keyword) {
            Some(kind) => kind,
            None => {
                return Err(BuildError::UnknownKeyword {
                    keyword: document.root.keyword.clone(),
                    doc,
                    span: document.root.span,
                });
            }
        };
        if root_kind != StatementKind::Schema {
            return Err(BuildError::BadDocumentRoot {
                kind: root_kind,
                doc,
                span: document.root.span,
            });
        }
        let root = self.ingest(&document.root, doc, None)?;
        self.doc_count += 1;
        self.tree.add_root(root);
        self.run_ingest_hooks(root);
        Ok(root)
    }

    fn ingest(
        &mut self,
        raw: &RawStatement,
        doc: DocId,
        parent: Option<CtxId>,
    ) -> Result<CtxId, BuildError> {
        let Some(kind) = StatementKind::from_keyword(&raw.keyword) else {
            return Err(BuildError::UnknownKeyword {
                keyword: raw.keyword.clone(),
                doc,
                span: raw.span,
            });
        };
        let ctx = self.tree.alloc(StatementContext::new(
            kind,
            raw.argument.clone(),
            doc,
            raw.span,
            parent,
        ));
        if let Some(parent) = parent {
            self.tree.get_mut(parent).children.push(ctx);
        }
        for child in &raw.substatements {
            self.ingest(child, doc, Some(ctx))?;
        }
        Ok(ctx)
    }

    fn run_ingest_hooks(&mut self, ctx: CtxId) {
        hooks::on_ingest(self, ctx);
        for child in self.tree.get(ctx).children.clone() {
            self.run_ingest_hooks(child);
        }
    }

    // ============================================================
    // Build
    // ============================================================

    /// Drive every context and action through the ordered phases, then
    /// freeze the forest into its immutable effective form.
    ///
    /// Failure is all-or-nothing: a stalled fixed point reports every stuck
    /// context and action at once, and no partial model is produced.
    pub fn build(mut self) -> Result<EffectiveModel, BuildFailure> {
        scheduler::execute(&mut self)?;
        Ok(self.freeze())
    }

    // ============================================================
    // Namespaces
    // ============================================================

    /// Bind a key, scoped at `scope`. Duplicate-equal bindings are no-op
    /// successes; a different value for a bound key is recorded as a build
    /// error. New bindings notify any waiting prerequisite.
    pub fn ns_add(
        &mut self,
        scope: CtxId,
        ns: NamespaceId,
        key: impl Into<SmolStr>,
        value: NsValue,
    ) -> bool {
        let key = key.into();
        match self
            .namespaces
            .add_to(&self.tree, scope, ns, key.clone(), value)
        {
            Ok(Some(storage)) => {
                self.events.push_back(Event::NsItemAdded { storage, ns, key });
                true
            }
            Ok(None) => true,
            Err(error) => {
                self.errors.push(error);
                false
            }
        }
    }

    /// Behaviour-governed lookup as seen from `from`. Callers that need an
    /// absent value must register a prerequisite instead of polling.
    pub fn ns_get(&mut self, from: CtxId, ns: NamespaceId, key: &str) -> Option<NsValue> {
        self.namespaces.get_from(&self.tree, from, ns, key)
    }

    // ============================================================
    // Actions
    // ============================================================

    /// Start declaring an inference action registered by `owner`.
    pub fn build_action(&mut self, owner: CtxId) -> ActionBuilder<'_> {
        ActionBuilder::new(self, owner)
    }

    // ============================================================
    // Introspection (read surface over the mutable tree)
    // ============================================================

    /// Document roots, in document order.
    pub fn roots(&self) -> Vec<CtxId> {
        self.tree.roots().to_vec()
    }

    pub fn kind_of(&self, ctx: CtxId) -> StatementKind {
        self.tree.get(ctx).kind
    }

    pub fn children_of(&self, ctx: CtxId) -> Vec<CtxId> {
        self.tree.get(ctx).children.clone()
    }

    /// Read-only gate used to prune conditional subtrees.
    pub fn is_supported_by_features(&self, ctx: CtxId) -> bool {
        self.tree.get(ctx).supported
    }

    /// The resolved original incarnation, `None` while still unresolved.
    /// Non-copies are their own original from the start.
    pub fn original_of(&self, ctx: CtxId) -> Option<CtxId> {
        self.tree.get(ctx).original
    }

    /// Walk raw argument names from `from` down the child sequence.
    pub fn find_descendant(&self, from: CtxId, path: &[&str]) -> Option<CtxId> {
        let mut current = from;
        for segment in path {
            current = self
                .tree
                .get(current)
                .children
                .iter()
                .copied()
                .find(|&child| self.tree.get(child).raw_arg.as_deref() == Some(*segment))?;
        }
        Some(current)
    }

    // ============================================================
    // Feature exclusion
    // ============================================================

    /// Prune a subtree: it still completes phases but contributes nothing to
    /// the effective model, and pending prerequisites on it resolve to the
    /// unavailable sentinel.
    pub(crate) fn exclude_subtree(&mut self, ctx: CtxId) {
        if !self.tree.get(ctx).supported {
            return;
        }
        tracing::debug!("pruning {} (feature-excluded)", self.tree.display_path(ctx));
        self.tree.get_mut(ctx).supported = false;
        for child in self.tree.get(ctx).children.clone() {
            self.exclude_subtree(child);
        }
    }

    // ============================================================
    // Copy semantics (reuse and augmentation)
    // ============================================================

    /// Instantiate a group's data subtrees under `into`.
    ///
    /// Reuse-introduced children of the group are skipped: the copied
    /// `apply` statement re-expands them at the new site, keeping copy
    /// chains strictly decreasing.
    pub(crate) fn expand_reuse(&mut self, group: CtxId, into: CtxId) {
        tracing::debug!(
            "expanding {} into {}",
            self.tree.display_path(group),
            self.tree.display_path(into)
        );
        for child in self.tree.get(group).children.clone() {
            let stmt = self.tree.get(child);
            if stmt.copy == CopyHistory::AddedByReuse || !stmt.supported {
                continue;
            }
            if matches!(
                stmt.kind,
                StatementKind::Container | StatementKind::Leaf | StatementKind::Apply
            ) {
                self.copy_subtree(
                    child,
                    into,
                    CopyHistory::AddedByReuse,
                    BuildPhase::StatementDefinition,
                    Some(child),
                );
            }
        }
    }

    /// Graft an extend statement's declared nodes onto `target`.
    pub(crate) fn expand_augmentation(&mut self, extend: CtxId, target: CtxId) {
        tracing::debug!(
            "grafting {} onto {}",
            self.tree.display_path(extend),
            self.tree.display_path(target)
        );
        for child in self.tree.get(extend).children.clone() {
            let stmt = self.tree.get(child);
            if !stmt.supported {
                continue;
            }
            if matches!(stmt.kind, StatementKind::Container | StatementKind::Leaf) {
                self.copy_subtree(
                    child,
                    target,
                    CopyHistory::AddedByAugmentation,
                    BuildPhase::FullDeclaration,
                    Some(child),
                );
            }
        }
    }

    /// Deep-copy `src` under `parent`.
    ///
    /// Copies inherit the source's resolved argument and completed phases up
    /// to `upto`, register at the new site's child registry, and enter the
    /// original-incarnation backlog. Schema-node descendants leave their
    /// previous incarnation unset and resolve it lazily through their parent.
    fn copy_subtree(
        &mut self,
        src: CtxId,
        parent: CtxId,
        history: CopyHistory,
        upto: BuildPhase,
        previous: Option<CtxId>,
    ) -> CtxId {
        let (kind, raw_arg, arg, doc, span, src_supported) = {
            let stmt = self.tree.get(src);
            (
                stmt.kind,
                stmt.raw_arg.clone(),
                stmt.arg.clone(),
                stmt.doc,
                stmt.span,
                stmt.supported,
            )
        };
        let mut copy = StatementContext::new(kind, raw_arg.clone(), doc, span, Some(parent));
        copy.arg = arg;
        copy.copy = history;
        copy.previous = previous;
        copy.supported = src_supported && self.tree.get(parent).supported;
        copy.completed = PhaseSet::through(upto);
        copy.definition_checked = true;
        let ctx = self.tree.alloc(copy);
        self.tree.get_mut(parent).children.push(ctx);

        if kind.is_schema_node() {
            if let Some(name) = raw_arg {
                self.ns_add(parent, NamespaceId::ChildNodes, name, NsValue::Ctx(ctx));
            }
        }
        self.pending_links.push(ctx);

        for child in self.tree.get(src).children.clone() {
            let stmt = self.tree.get(child);
            if stmt.copy == CopyHistory::AddedByReuse || !stmt.supported {
                continue;
            }
            // Only schema nodes are answerable through a parent's child
            // registry; everything else records its source directly.
            let child_previous = if stmt.kind.is_schema_node() {
                None
            } else {
                Some(child)
            };
            self.copy_subtree(child, ctx, history, upto, child_previous);
        }

        hooks::on_copy(self, ctx);
        ctx
    }

    // ============================================================
    // Freeze
    // ============================================================

    /// Project the completed context tree into its immutable effective form.
    /// Feature-excluded subtrees are skipped; `config` inherits downward.
    fn freeze(&self) -> EffectiveModel {
        let mut builder = EffectiveModelBuilder::default();
        let mut id_map: FxHashMap<CtxId, StmtId> = FxHashMap::default();
        for &root in self.tree.roots() {
            if !self.tree.get(root).supported {
                continue;
            }
            let id = self.emit(root, true, &mut builder, &mut id_map);
            builder.add_root(id);
        }
        for (&ctx, &stmt) in &id_map {
            let original = self.tree.get(ctx).original.unwrap_or(ctx);
            if original != ctx {
                if let Some(&origin_stmt) = id_map.get(&original) {
                    builder.set_origin(stmt, origin_stmt);
                }
            }
        }
        builder.finish()
    }

    fn emit(
        &self,
        ctx: CtxId,
        inherited_config: bool,
        builder: &mut EffectiveModelBuilder,
        id_map: &mut FxHashMap<CtxId, StmtId>,
    ) -> StmtId {
        let stmt = self.tree.get(ctx);
        let own_config = stmt
            .children
            .iter()
            .map(|&child| self.tree.get(child))
            .find(|child| child.kind == StatementKind::Config)
            .and_then(|child| child.arg.as_ref())
            .and_then(ArgValue::as_bool);
        let config = own_config.unwrap_or(inherited_config);
        let argument = stmt.arg.clone().unwrap_or(ArgValue::None);
        let id = builder.push(stmt.kind, argument, stmt.doc, stmt.span, config);
        id_map.insert(ctx, id);
        let mut children = Vec::new();
        for &child in &stmt.children {
            if self.tree.get(child).supported {
                children.push(self.emit(child, config, builder, id_map));
            }
        }
        builder.set_children(id, children);
        id
    }
}
