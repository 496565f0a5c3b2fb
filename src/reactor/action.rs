//! The inference action engine.
//!
//! An inference action is a unit of deferred work: a set of prerequisites it
//! needs resolved, a set of mutations (blocking obligations) it will perform,
//! and an apply callback that runs exactly once, after every prerequisite is
//! satisfied. Callers declare everything through [`ActionBuilder`] before
//! committing the action; committed actions are retried on every resolution
//! event of any declared source.
//!
//! Resumption is not callback recursion: every notification lands on the
//! session's event queue and is drained by the scheduler loop, so control
//! flow depth stays bounded regardless of dependency-chain length.

use smol_str::SmolStr;

use super::context::CtxId;
use super::errors::BuildError;
use super::namespace::{NamespaceId, NsListener, NsValue, StorageRef};
use super::phase::BuildPhase;
use super::session::BuildSession;
use super::tree::ContextTree;

// ============================================================================
// PUBLIC HANDLES
// ============================================================================

/// Handle of one committed action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ActionId(u32);

impl ActionId {
    pub(crate) fn new(index: usize) -> Self {
        Self(index as u32)
    }

    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// Handle of one prerequisite, local to the action that declared it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Prereq(pub(crate) u16);

/// Globally addressable prerequisite: action + slot index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct PrereqRef {
    pub(crate) action: ActionId,
    pub(crate) index: u16,
}

/// The cached outcome of a prerequisite.
///
/// `Unavailable` is the explicit sentinel a prerequisite resolves to when its
/// target turned out to be feature-excluded; actions observe it and may
/// no-op gracefully instead of blocking forever.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Ctx(CtxId),
    Unavailable,
}

impl Resolution {
    pub fn ctx(self) -> Option<CtxId> {
        match self {
            Resolution::Ctx(id) => Some(id),
            Resolution::Unavailable => None,
        }
    }
}

// ============================================================================
// ACTION TRAIT
// ============================================================================

/// A unit of deferred work committed to the engine.
pub trait InferenceAction {
    /// Runs exactly once, after all prerequisites resolved.
    fn apply(&mut self, ctx: &mut ActionContext<'_>) -> Result<(), BuildError>;

    /// A required context became feature-excluded while this action was
    /// pending; the prerequisite has resolved to [`Resolution::Unavailable`].
    fn prerequisite_unavailable(&mut self, _prereq: Prereq) {}

    /// The build stalled with these prerequisites still unmet.
    fn prerequisite_failed(&mut self, _unmet: &[Prereq]) {}

    /// What this action does, for diagnostics.
    fn describe(&self) -> String {
        "inference action".to_string()
    }
}

/// What an applying action sees: its resolved prerequisites plus the session.
pub struct ActionContext<'a> {
    session: &'a mut BuildSession,
    resolved: Vec<Resolution>,
}

impl<'a> ActionContext<'a> {
    pub fn session(&mut self) -> &mut BuildSession {
        self.session
    }

    /// The permanently cached resolution of a prerequisite.
    pub fn resolution(&self, prereq: Prereq) -> Resolution {
        debug_assert!((prereq.0 as usize) < self.resolved.len());
        self.resolved
            .get(prereq.0 as usize)
            .copied()
            .unwrap_or(Resolution::Unavailable)
    }

    /// The resolved context, or `None` when the target was unavailable.
    pub fn ctx(&self, prereq: Prereq) -> Option<CtxId> {
        self.resolution(prereq).ctx()
    }
}

// ============================================================================
// ENGINE STATE
// ============================================================================

/// The concrete wait backing one prerequisite slot.
#[derive(Debug, Clone)]
pub(crate) enum PrereqKind {
    /// A context reaching a phase.
    PhaseFinished { ctx: CtxId, phase: BuildPhase },
    /// A (namespace, key) binding whose context then reaches a phase.
    NsItem {
        start: CtxId,
        ns: NamespaceId,
        key: SmolStr,
        phase: BuildPhase,
        /// The bound context, once the binding appeared.
        value: Option<CtxId>,
    },
    /// Blocks `ctx` from completing `phase`; resolves immediately.
    PhaseMutation { ctx: CtxId, phase: BuildPhase },
    /// Waits for a binding, then blocks the bound context's `phase`.
    NsItemMutation {
        start: CtxId,
        ns: NamespaceId,
        key: SmolStr,
        phase: BuildPhase,
    },
    /// Hop-by-hop resolution of a key sequence; every intermediate context
    /// carries a transit obligation while it is the current hop.
    Path {
        ns: NamespaceId,
        keys: Vec<SmolStr>,
        phase: BuildPhase,
        mutating: bool,
        next: usize,
        current: CtxId,
    },
}

#[derive(Debug)]
pub(crate) struct PrereqSlot {
    pub(crate) kind: PrereqKind,
    pub(crate) resolution: Option<Resolution>,
}

impl PrereqSlot {
    fn new(kind: PrereqKind) -> Self {
        Self {
            kind,
            resolution: None,
        }
    }

    /// Human-readable description of an unmet slot, for diagnostics.
    pub(crate) fn describe_unmet(&self, tree: &ContextTree) -> String {
        match &self.kind {
            PrereqKind::PhaseFinished { ctx, phase } => {
                format!("{} to reach {phase}", tree.display_path(*ctx))
            }
            PrereqKind::NsItem {
                ns, key, phase, ..
            } => format!("namespace {ns} key '{key}' at {phase}"),
            PrereqKind::PhaseMutation { ctx, phase } => {
                format!("own mutation of {} at {phase}", tree.display_path(*ctx))
            }
            PrereqKind::NsItemMutation { ns, key, phase, .. } => {
                format!("namespace {ns} key '{key}' at {phase}")
            }
            PrereqKind::Path { ns, keys, next, .. } => {
                let hop = keys.get(*next).or_else(|| keys.last());
                format!(
                    "path step '{}' of '{}' in namespace {ns}",
                    hop.map(SmolStr::as_str).unwrap_or("?"),
                    keys.join("/")
                )
            }
        }
    }
}

pub(crate) struct Modifier {
    /// The statement that registered this action, for diagnostics.
    pub(crate) owner: CtxId,
    pub(crate) slots: Vec<PrereqSlot>,
    pub(crate) action: Option<Box<dyn InferenceAction>>,
    pub(crate) applied: bool,
}

impl Modifier {
    pub(crate) fn all_resolved(&self) -> bool {
        self.slots.iter().all(|slot| slot.resolution.is_some())
    }

    pub(crate) fn unmet(&self) -> Vec<Prereq> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.resolution.is_none())
            .map(|(index, _)| Prereq(index as u16))
            .collect()
    }
}

impl std::fmt::Debug for Modifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Modifier")
            .field("owner", &self.owner)
            .field("slots", &self.slots)
            .field("applied", &self.applied)
            .finish_non_exhaustive()
    }
}

/// Arena of all committed actions of one build.
#[derive(Debug, Default)]
pub(crate) struct ActionStore {
    modifiers: Vec<Modifier>,
}

impl ActionStore {
    pub(crate) fn push(&mut self, modifier: Modifier) -> ActionId {
        let id = ActionId::new(self.modifiers.len());
        self.modifiers.push(modifier);
        id
    }

    pub(crate) fn get(&self, id: ActionId) -> &Modifier {
        &self.modifiers[id.index()]
    }

    pub(crate) fn get_mut(&mut self, id: ActionId) -> &mut Modifier {
        &mut self.modifiers[id.index()]
    }

    pub(crate) fn is_applied(&self, id: ActionId) -> bool {
        self.modifiers[id.index()].applied
    }

    pub(crate) fn ids(&self) -> impl Iterator<Item = ActionId> + '_ {
        (0..self.modifiers.len()).map(ActionId::new)
    }
}

// ============================================================================
// EVENTS
// ============================================================================

/// One unit of pending engine work, drained by the scheduler loop.
#[derive(Debug)]
pub(crate) enum Event {
    NsItemAdded {
        storage: StorageRef,
        ns: NamespaceId,
        key: SmolStr,
    },
    PhaseCompleted {
        ctx: CtxId,
        phase: BuildPhase,
    },
    TryApply {
        action: ActionId,
    },
}

// ============================================================================
// BUILDER
// ============================================================================

/// Declares an action's prerequisites and mutations, then commits it.
///
/// Everything must be declared before [`ActionBuilder::apply`]; committing
/// registers all hooks at once and attempts immediate application.
pub struct ActionBuilder<'a> {
    session: &'a mut BuildSession,
    owner: CtxId,
    slots: Vec<PrereqSlot>,
}

impl<'a> ActionBuilder<'a> {
    pub(crate) fn new(session: &'a mut BuildSession, owner: CtxId) -> Self {
        Self {
            session,
            owner,
            slots: Vec::new(),
        }
    }

    fn add_slot(&mut self, kind: PrereqKind) -> Prereq {
        let index = self.slots.len() as u16;
        self.slots.push(PrereqSlot::new(kind));
        Prereq(index)
    }

    /// Requires `ctx` to reach `phase`.
    pub fn requires_ctx(&mut self, ctx: CtxId, phase: BuildPhase) -> Prereq {
        self.add_slot(PrereqKind::PhaseFinished { ctx, phase })
    }

    /// Requires the context bound under `key` in `ns` (as seen from `start`)
    /// to exist and reach `phase`.
    pub fn requires_ctx_in(
        &mut self,
        start: CtxId,
        ns: NamespaceId,
        key: impl Into<SmolStr>,
        phase: BuildPhase,
    ) -> Prereq {
        self.add_slot(PrereqKind::NsItem {
            start,
            ns,
            key: key.into(),
            phase,
            value: None,
        })
    }

    /// Requires the context at the end of a key path, resolved one hop at a
    /// time through each intermediate context's own registry.
    pub fn requires_ctx_path(
        &mut self,
        start: CtxId,
        ns: NamespaceId,
        keys: Vec<SmolStr>,
        phase: BuildPhase,
    ) -> Prereq {
        debug_assert!(!keys.is_empty());
        self.add_slot(PrereqKind::Path {
            ns,
            keys,
            phase,
            mutating: false,
            next: 0,
            current: start,
        })
    }

    /// Declares that the action will mutate `ctx`, blocking its `phase` until
    /// the action has applied. Resolves immediately.
    pub fn mutates_ctx(&mut self, ctx: CtxId, phase: BuildPhase) -> Prereq {
        self.add_slot(PrereqKind::PhaseMutation { ctx, phase })
    }

    /// Declares a mutation of the context bound under `key` in `ns`, blocking
    /// its effective-model phase once the binding appears.
    pub fn mutates_ctx_in(
        &mut self,
        start: CtxId,
        ns: NamespaceId,
        key: impl Into<SmolStr>,
    ) -> Prereq {
        self.add_slot(PrereqKind::NsItemMutation {
            start,
            ns,
            key: key.into(),
            phase: BuildPhase::EffectiveModel,
        })
    }

    /// Declares a mutation of the context at the end of a key path. Every
    /// intermediate context carries a transit obligation while it is the
    /// current hop, released as soon as the next hop is hooked.
    pub fn mutates_ctx_path(
        &mut self,
        start: CtxId,
        ns: NamespaceId,
        keys: Vec<SmolStr>,
    ) -> Prereq {
        debug_assert!(!keys.is_empty());
        self.add_slot(PrereqKind::Path {
            ns,
            keys,
            phase: BuildPhase::EffectiveModel,
            mutating: true,
            next: 0,
            current: start,
        })
    }

    /// Commits the action: stores it, registers every declared hook, and
    /// queues an immediate application attempt.
    pub fn apply(self, action: Box<dyn InferenceAction>) -> ActionId {
        let ActionBuilder {
            session,
            owner,
            slots,
        } = self;
        let slot_count = slots.len();
        let id = session.actions.push(Modifier {
            owner,
            slots,
            action: Some(action),
            applied: false,
        });
        tracing::trace!("action {id:?} committed with {slot_count} prerequisite(s)");
        for index in 0..slot_count {
            session.register_slot(PrereqRef {
                action: id,
                index: index as u16,
            });
        }
        session.events.push_back(Event::TryApply { action: id });
        id
    }
}

// ============================================================================
// ENGINE (session methods)
// ============================================================================

impl BuildSession {
    /// Invoke the engine for `prereq` exactly once when `ctx` completes
    /// `phase`: immediately if already completed, otherwise FIFO-queued.
    pub(crate) fn add_phase_completed_listener(
        &mut self,
        ctx: CtxId,
        phase: BuildPhase,
        prereq: PrereqRef,
    ) {
        if self.tree.get(ctx).is_completed(phase) {
            self.on_phase_finished(prereq, ctx);
        } else {
            self.tree
                .get_mut(ctx)
                .listeners
                .entry(phase)
                .or_default()
                .push(prereq);
        }
    }

    /// Register the hook(s) backing one freshly committed prerequisite slot.
    pub(crate) fn register_slot(&mut self, prereq: PrereqRef) {
        let kind = {
            let slot = &self.actions.get(prereq.action).slots[prereq.index as usize];
            slot.kind.clone()
        };
        match kind {
            PrereqKind::PhaseFinished { ctx, phase } => {
                self.add_phase_completed_listener(ctx, phase, prereq);
            }
            PrereqKind::NsItem { start, ns, key, .. }
            | PrereqKind::NsItemMutation { start, ns, key, .. } => {
                match self.namespaces.get_from(&self.tree, start, ns, &key) {
                    Some(NsValue::Ctx(value)) => self.on_ns_item(prereq, value),
                    Some(NsValue::Name(_)) => {
                        // Name-valued namespaces cannot satisfy a context
                        // requirement; treat like an excluded target.
                        self.resolve_prereq(prereq, Resolution::Unavailable);
                        self.notify_unavailable(prereq);
                    }
                    None => self.namespaces.add_listener(
                        ns,
                        key,
                        NsListener {
                            prereq,
                            search_from: start,
                            exact_storage: None,
                        },
                    ),
                }
            }
            PrereqKind::PhaseMutation { ctx, phase } => {
                self.tree.get_mut(ctx).add_mutation(phase, prereq);
                self.resolve_prereq(prereq, Resolution::Ctx(ctx));
            }
            PrereqKind::Path { .. } => self.hook_path_hop(prereq),
        }
    }

    /// A (namespace, key) binding this prerequisite was waiting on appeared.
    pub(crate) fn on_ns_item(&mut self, prereq: PrereqRef, value: CtxId) {
        let kind = {
            let slot = &self.actions.get(prereq.action).slots[prereq.index as usize];
            slot.kind.clone()
        };
        match kind {
            PrereqKind::NsItem { phase, .. } => {
                if let PrereqKind::NsItem { value: stored, .. } =
                    &mut self.actions.get_mut(prereq.action).slots[prereq.index as usize].kind
                {
                    *stored = Some(value);
                }
                self.add_phase_completed_listener(value, phase, prereq);
            }
            PrereqKind::NsItemMutation { phase, .. } => {
                if !self.tree.get(value).supported {
                    self.resolve_prereq(prereq, Resolution::Unavailable);
                    self.notify_unavailable(prereq);
                } else {
                    self.tree.get_mut(value).add_mutation(phase, prereq);
                    self.resolve_prereq(prereq, Resolution::Ctx(value));
                }
            }
            PrereqKind::Path { .. } => self.fire_path_hop(prereq, value),
            PrereqKind::PhaseFinished { .. } | PrereqKind::PhaseMutation { .. } => {
                debug_assert!(false, "phase prerequisite notified by a namespace");
            }
        }
    }

    /// A phase this prerequisite was waiting on completed for `ctx`.
    pub(crate) fn on_phase_finished(&mut self, prereq: PrereqRef, _finished: CtxId) {
        let kind = {
            let slot = &self.actions.get(prereq.action).slots[prereq.index as usize];
            slot.kind.clone()
        };
        let target = match kind {
            PrereqKind::PhaseFinished { ctx, .. } => ctx,
            PrereqKind::NsItem { value, .. } => match value {
                Some(ctx) => ctx,
                None => {
                    debug_assert!(false, "phase listener fired before namespace binding");
                    return;
                }
            },
            _ => return,
        };
        if self.tree.get(target).supported {
            self.resolve_prereq(prereq, Resolution::Ctx(target));
        } else {
            self.resolve_prereq(prereq, Resolution::Unavailable);
            self.notify_unavailable(prereq);
        }
    }

    /// Register a wait for the current hop of a path prerequisite, or take
    /// the hop immediately when the binding already exists.
    fn hook_path_hop(&mut self, prereq: PrereqRef) {
        let (ns, key, current, first) = {
            let slot = &self.actions.get(prereq.action).slots[prereq.index as usize];
            let PrereqKind::Path {
                ns,
                keys,
                next,
                current,
                ..
            } = &slot.kind
            else {
                debug_assert!(false, "path hook on a non-path prerequisite");
                return;
            };
            (*ns, keys[*next].clone(), *current, *next == 0)
        };
        // The first key resolves through the namespace's own behaviour; every
        // later key binds to the previous hop's own registry.
        let found = if first {
            self.namespaces.get_from(&self.tree, current, ns, &key)
        } else {
            self.namespaces.get_local(current, ns, &key)
        };
        match found.and_then(|value| value.as_ctx()) {
            Some(target) => self.fire_path_hop(prereq, target),
            None => self.namespaces.add_listener(
                ns,
                key,
                NsListener {
                    prereq,
                    search_from: current,
                    exact_storage: if first { None } else { Some(current) },
                },
            ),
        }
    }

    /// One hop of a path prerequisite resolved to `target`.
    fn fire_path_hop(&mut self, prereq: PrereqRef, target: CtxId) {
        if !self.tree.get(target).supported {
            tracing::debug!(
                "path hop target {} is feature-excluded",
                self.tree.display_path(target)
            );
            self.resolve_prereq(prereq, Resolution::Unavailable);
            self.notify_unavailable(prereq);
            return;
        }
        let (phase, mutating, previous, finished) = {
            let slot = &mut self.actions.get_mut(prereq.action).slots[prereq.index as usize];
            let PrereqKind::Path {
                keys,
                phase,
                mutating,
                next,
                current,
                ..
            } = &mut slot.kind
            else {
                debug_assert!(false, "path hop on a non-path prerequisite");
                return;
            };
            let previous = *current;
            *current = target;
            *next += 1;
            (*phase, *mutating, previous, *next == keys.len())
        };
        if mutating {
            // The previous hop is no longer directly blocked; the obligation
            // travels with the head of the path.
            self.tree.get_mut(target).add_mutation(phase, prereq);
            self.tree.get_mut(previous).remove_mutation(phase, prereq);
        }
        if finished {
            self.resolve_prereq(prereq, Resolution::Ctx(target));
        } else {
            self.hook_path_hop(prereq);
        }
    }

    /// Permanently cache a prerequisite's value; queue an application attempt
    /// once the owning action has no unsatisfied prerequisites left.
    pub(crate) fn resolve_prereq(&mut self, prereq: PrereqRef, resolution: Resolution) {
        let modifier = self.actions.get_mut(prereq.action);
        let slot = &mut modifier.slots[prereq.index as usize];
        debug_assert!(slot.resolution.is_none(), "prerequisite resolved twice");
        slot.resolution = Some(resolution);
        tracing::trace!("{prereq:?} resolved to {resolution:?}");
        if modifier.all_resolved() {
            self.events.push_back(Event::TryApply {
                action: prereq.action,
            });
        }
    }

    /// Attempt to run an action. The committed side effect fires exactly
    /// once no matter how many attempts are queued.
    pub(crate) fn try_apply(&mut self, id: ActionId) -> bool {
        {
            let modifier = self.actions.get(id);
            if modifier.applied || !modifier.all_resolved() {
                return false;
            }
        }
        let Some(mut action) = self.actions.get_mut(id).action.take() else {
            return false;
        };
        let resolved: Vec<Resolution> = self
            .actions
            .get(id)
            .slots
            .iter()
            .map(|slot| slot.resolution.unwrap_or(Resolution::Unavailable))
            .collect();
        tracing::debug!("applying action {id:?}: {}", action.describe());
        let outcome = action.apply(&mut ActionContext {
            session: self,
            resolved,
        });
        if let Err(error) = outcome {
            self.errors.push(error);
        }
        let modifier = self.actions.get_mut(id);
        modifier.action = Some(action);
        modifier.applied = true;
        true
    }

    pub(crate) fn notify_unavailable(&mut self, prereq: PrereqRef) {
        if let Some(mut action) = self.actions.get_mut(prereq.action).action.take() {
            action.prerequisite_unavailable(Prereq(prereq.index));
            self.actions.get_mut(prereq.action).action = Some(action);
        }
    }

    /// Drain the pending-work queue. Returns whether anything happened that
    /// could unblock further progress.
    pub(crate) fn drain_events(&mut self) -> bool {
        let mut progress = false;
        while let Some(event) = self.events.pop_front() {
            match event {
                Event::NsItemAdded { storage, ns, key } => {
                    let fired =
                        self.namespaces
                            .take_visible_listeners(&self.tree, storage, ns, &key);
                    for listener in fired {
                        progress = true;
                        match self
                            .namespaces
                            .get_at_storage(storage, ns, &key)
                            .and_then(|value| value.as_ctx())
                        {
                            Some(value) => self.on_ns_item(listener.prereq, value),
                            None => {
                                self.resolve_prereq(listener.prereq, Resolution::Unavailable);
                                self.notify_unavailable(listener.prereq);
                            }
                        }
                    }
                }
                Event::PhaseCompleted { ctx, phase } => {
                    let listeners = self
                        .tree
                        .get_mut(ctx)
                        .listeners
                        .remove(&phase)
                        .unwrap_or_default();
                    for prereq in listeners {
                        progress = true;
                        self.on_phase_finished(prereq, ctx);
                    }
                }
                Event::TryApply { action } => {
                    progress |= self.try_apply(action);
                }
            }
        }
        progress
    }
}
