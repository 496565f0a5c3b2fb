//! Statement contexts: the mutable per-statement build state.
//!
//! One [`StatementContext`] exists per statement occurrence. Contexts live in
//! the tree's arena and reference each other exclusively by [`CtxId`], never
//! by live back-reference, which keeps the cyclic parent/child/namespace
//! graph safe to mutate and cheap to freeze.

use rustc_hash::FxHashMap;
use smol_str::SmolStr;

use crate::base::{DocId, Span};
use crate::model::{ArgValue, StatementKind};

use super::action::PrereqRef;
use super::phase::{BuildPhase, PhaseSet};

/// Handle of one statement context within its build session's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CtxId(u32);

impl CtxId {
    pub(crate) fn new(index: usize) -> Self {
        Self(index as u32)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for CtxId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ctx#{}", self.0)
    }
}

/// How a context entered the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyHistory {
    /// Declared in a source document.
    Original,
    /// Introduced by group reuse.
    AddedByReuse,
    /// Introduced by augmentation.
    AddedByAugmentation,
}

impl CopyHistory {
    pub fn is_copy(self) -> bool {
        !matches!(self, CopyHistory::Original)
    }
}

/// One statement occurrence under construction.
///
/// Exclusively owned by the build session; the parent owns the ordered child
/// sequence. All cross-references go through ids.
#[derive(Debug)]
pub(crate) struct StatementContext {
    pub(crate) kind: StatementKind,
    pub(crate) raw_arg: Option<SmolStr>,
    /// Resolved argument; `None` until `StatementDefinition` (copies inherit
    /// the already-resolved value of their source).
    pub(crate) arg: Option<ArgValue>,
    pub(crate) doc: DocId,
    pub(crate) span: Span,
    pub(crate) parent: Option<CtxId>,
    pub(crate) children: Vec<CtxId>,
    /// Completed phases.
    pub(crate) completed: PhaseSet,
    /// Outstanding blocking obligations, per phase. An obligation is finished
    /// once its owning action has applied.
    pub(crate) mutations: FxHashMap<BuildPhase, Vec<PrereqRef>>,
    /// Phase-completion listeners, FIFO per phase, each fired exactly once.
    pub(crate) listeners: FxHashMap<BuildPhase, Vec<PrereqRef>>,
    /// Cleared when an `if-feature` gate on this subtree fails.
    pub(crate) supported: bool,
    pub(crate) copy: CopyHistory,
    /// The incarnation this context was copied from, once known.
    pub(crate) previous: Option<CtxId>,
    /// The ultimate original incarnation; self for non-copies.
    pub(crate) original: Option<CtxId>,
    /// Argument resolution + grammar validation ran (or was inherited).
    pub(crate) definition_checked: bool,
}

impl StatementContext {
    pub(crate) fn new(
        kind: StatementKind,
        raw_arg: Option<SmolStr>,
        doc: DocId,
        span: Span,
        parent: Option<CtxId>,
    ) -> Self {
        Self {
            kind,
            raw_arg,
            arg: None,
            doc,
            span,
            parent,
            children: Vec::new(),
            completed: PhaseSet::empty(),
            mutations: FxHashMap::default(),
            listeners: FxHashMap::default(),
            supported: true,
            copy: CopyHistory::Original,
            previous: None,
            original: None,
            definition_checked: false,
        }
    }

    /// The lookup name of this statement, for kinds whose argument names it.
    pub(crate) fn name(&self) -> Option<&SmolStr> {
        if self.kind.is_named() {
            self.raw_arg.as_ref()
        } else {
            None
        }
    }

    pub(crate) fn is_completed(&self, phase: BuildPhase) -> bool {
        self.completed.contains(phase)
    }

    pub(crate) fn add_mutation(&mut self, phase: BuildPhase, obligation: PrereqRef) {
        tracing::trace!("{:?} gains {phase} obligation {obligation:?}", self.kind);
        self.mutations.entry(phase).or_default().push(obligation);
    }

    /// Removing an obligation that is no longer present is a no-op: a path
    /// prerequisite releases its first hop without ever having held it.
    pub(crate) fn remove_mutation(&mut self, phase: BuildPhase, obligation: PrereqRef) {
        if let Some(obligations) = self.mutations.get_mut(&phase) {
            obligations.retain(|&existing| existing != obligation);
        }
    }
}
