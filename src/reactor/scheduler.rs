//! The phase scheduler.
//!
//! Drives the whole forest plus all registered actions through the ordered
//! build phases to a fixed point. Each phase repeats {depth-first,
//! document-order completion sweep; pending-work drain} until one full pass
//! produces zero new completions and zero new applications. A clean fixed
//! point advances the phase; a stalled one aborts the build with an
//! aggregate diagnostic naming every stuck context and action.

use crate::model::grammar;
use crate::model::ArgValue;

use super::action::{Event, Prereq, PrereqRef};
use super::context::CtxId;
use super::errors::{BuildError, BuildFailure};
use super::linker;
use super::phase::BuildPhase;
use super::session::BuildSession;

/// Outcome of one completion attempt.
pub(crate) struct CompletionOutcome {
    pub(crate) completed: bool,
    pub(crate) progressed: bool,
}

/// Run every phase in order to completion.
pub(crate) fn execute(session: &mut BuildSession) -> Result<(), BuildFailure> {
    for phase in BuildPhase::ORDERED {
        run_phase(session, phase)?;
        tracing::debug!("phase {phase} complete for all documents");
    }
    // Every phase reached its fixed point, but an action that never held a
    // blocking obligation can still sit on a dangling reference; the model is
    // only valid once every committed action has either applied or resolved
    // all prerequisites (possibly to the unavailable sentinel).
    let dangling = session.actions.ids().any(|id| {
        let modifier = session.actions.get(id);
        !modifier.applied && !modifier.unmet().is_empty()
    });
    if dangling {
        return Err(session.fail_phase(BuildPhase::EffectiveModel));
    }
    Ok(())
}

fn run_phase(session: &mut BuildSession, phase: BuildPhase) -> Result<(), BuildFailure> {
    loop {
        let mut progress = session.drain_events();
        if phase == BuildPhase::EffectiveModel {
            progress |= linker::resolve_pending(session);
        }

        let mut all_done = true;
        for root in session.tree.roots().to_vec() {
            let outcome = session.try_complete_phase(root, phase);
            all_done &= outcome.completed;
            progress |= outcome.progressed;
        }
        progress |= session.drain_events();

        if all_done && session.errors.is_empty() {
            return Ok(());
        }
        if all_done || !progress {
            return Err(session.fail_phase(phase));
        }
    }
}

impl BuildSession {
    /// Post-order completion attempt: children first, then the zero-pending-
    /// obligation check, then mark complete and queue the listener firings.
    pub(crate) fn try_complete_phase(&mut self, ctx: CtxId, phase: BuildPhase) -> CompletionOutcome {
        if self.tree.get(ctx).is_completed(phase) {
            return CompletionOutcome {
                completed: true,
                progressed: false,
            };
        }

        let mut progressed = false;
        let mut ready = true;
        for child in self.tree.get(ctx).children.clone() {
            let outcome = self.try_complete_phase(child, phase);
            ready &= outcome.completed;
            progressed |= outcome.progressed;
        }

        if phase == BuildPhase::StatementDefinition && !self.tree.get(ctx).definition_checked {
            self.check_definition(ctx);
        }

        if self.has_pending_mutations(ctx, phase) {
            ready = false;
        }

        // A copy must know its original incarnation before its effective form
        // can exist.
        if phase == BuildPhase::EffectiveModel
            && self.tree.get(ctx).copy.is_copy()
            && self.tree.get(ctx).original.is_none()
        {
            ready = false;
        }

        if !ready {
            return CompletionOutcome {
                completed: false,
                progressed,
            };
        }

        self.tree.get_mut(ctx).completed.insert(phase);
        tracing::trace!("{} completed {phase}", self.tree.display_path(ctx));
        self.events.push_back(Event::PhaseCompleted { ctx, phase });
        CompletionOutcome {
            completed: true,
            progressed: true,
        }
    }

    /// Drop finished obligations for `phase`; report whether any remain.
    fn has_pending_mutations(&mut self, ctx: CtxId, phase: BuildPhase) -> bool {
        let Some(pending) = self.tree.get(ctx).mutations.get(&phase).cloned() else {
            return false;
        };
        if pending.is_empty() {
            return false;
        }
        let remaining: Vec<PrereqRef> = pending
            .into_iter()
            .filter(|obligation| !self.actions.is_applied(obligation.action))
            .collect();
        let blocked = !remaining.is_empty();
        self.tree.get_mut(ctx).mutations.insert(phase, remaining);
        blocked
    }

    /// Argument resolution and substatement grammar validation, run once per
    /// context when `StatementDefinition` is first attempted. Violations are
    /// collected, not thrown: the phase still reaches its fixed point so the
    /// aggregate failure carries every defect.
    fn check_definition(&mut self, ctx: CtxId) {
        self.tree.get_mut(ctx).definition_checked = true;
        let (kind, raw_arg, supported) = {
            let stmt = self.tree.get(ctx);
            (stmt.kind, stmt.raw_arg.clone(), stmt.supported)
        };
        if !supported {
            return;
        }
        match grammar::resolve_argument(kind, raw_arg.as_deref()) {
            Ok(value) => self.tree.get_mut(ctx).arg = Some(value),
            Err(violation) => {
                self.errors.push(BuildError::Grammar {
                    statement: self.tree.display_path(ctx),
                    violation: violation.to_string(),
                });
                self.tree.get_mut(ctx).arg = Some(ArgValue::None);
            }
        }
        let child_kinds: Vec<_> = self
            .tree
            .get(ctx)
            .children
            .iter()
            .map(|&child| self.tree.get(child).kind)
            .collect();
        for violation in grammar::validate_substatements(kind, &child_kinds) {
            self.errors.push(BuildError::Grammar {
                statement: self.tree.display_path(ctx),
                violation: violation.to_string(),
            });
        }
    }

    /// Build the aggregate failure for a stalled or error-carrying phase.
    pub(crate) fn fail_phase(&mut self, phase: BuildPhase) -> BuildFailure {
        let mut errors = std::mem::take(&mut self.errors);

        // Every still-unsatisfied action learns its unmet prerequisites, then
        // contributes one unresolved-reference error per missing requirement.
        for id in self.actions.ids().collect::<Vec<_>>() {
            let (applied, unmet, owner) = {
                let modifier = self.actions.get(id);
                (modifier.applied, modifier.unmet(), modifier.owner)
            };
            if applied || unmet.is_empty() {
                continue;
            }
            let description = match self.actions.get_mut(id).action.take() {
                Some(mut action) => {
                    action.prerequisite_failed(&unmet);
                    let description = action.describe();
                    self.actions.get_mut(id).action = Some(action);
                    description
                }
                None => "inference action".to_string(),
            };
            for Prereq(index) in unmet {
                let requirement =
                    self.actions.get(id).slots[index as usize].describe_unmet(&self.tree);
                errors.push(BuildError::Unresolved {
                    action: description.clone(),
                    requirement,
                    statement: self.tree.display_path(owner),
                });
            }
        }

        // Name the stall frontier: contexts short of the phase that are
        // either directly blocked or have no incomplete child to blame.
        for ctx in self.tree.ids().collect::<Vec<_>>() {
            if self.tree.get(ctx).is_completed(phase) {
                continue;
            }
            let blocking: Vec<String> = self
                .tree
                .get(ctx)
                .mutations
                .get(&phase)
                .map(|pending| {
                    pending
                        .iter()
                        .filter(|obligation| !self.actions.is_applied(obligation.action))
                        .filter_map(|obligation| {
                            self.actions
                                .get(obligation.action)
                                .action
                                .as_ref()
                                .map(|action| action.describe())
                        })
                        .collect()
                })
                .unwrap_or_default();
            let children_done = self
                .tree
                .get(ctx)
                .children
                .iter()
                .all(|&child| self.tree.get(child).is_completed(phase));
            if blocking.is_empty() && !children_done {
                continue;
            }
            let blockers = if blocking.is_empty() {
                String::new()
            } else {
                format!(", blocked by {}", blocking.join("; "))
            };
            errors.push(BuildError::StuckContext {
                statement: self.tree.display_path(ctx),
                phase,
                blockers,
            });
        }

        BuildFailure::new(phase, errors)
    }
}
