//! Original-incarnation linking for copy-introduced contexts.
//!
//! A context introduced by reuse or augmentation must eventually know the
//! context it was (transitively) copied from: default-value inheritance and
//! identity/override detection read it. Non-copies are their own original.
//!
//! Subtree copies record the previous incarnation only on the copy root (and
//! on statements absent from child-node registries, which no parent can
//! answer for); every schema-node descendant resolves lazily by asking its
//! parent's previous incarnation for the child registered under its own
//! name. A parent whose own link is still unresolved defers the child; the
//! scheduler retries every pass, and an unresolved link blocks the owning
//! context's effective-model completion. The chain is finite because copy
//! depth strictly decreases along it.

use super::context::CtxId;
use super::namespace::{NamespaceId, NsValue};
use super::session::BuildSession;

/// Retry every pending link once. Returns whether any resolution succeeded.
pub(crate) fn resolve_pending(session: &mut BuildSession) -> bool {
    let pending = std::mem::take(&mut session.pending_links);
    let mut progress = false;
    let mut deferred = Vec::new();
    for ctx in pending {
        if try_link(session, ctx) {
            progress = true;
        } else {
            deferred.push(ctx);
        }
    }
    session.pending_links = deferred;
    progress
}

/// Attempt to resolve one context's original incarnation.
fn try_link(session: &mut BuildSession, ctx: CtxId) -> bool {
    if session.tree.get(ctx).original.is_some() {
        return true;
    }
    let previous = match session.tree.get(ctx).previous {
        Some(previous) => previous,
        None => {
            let Some(found) = previous_from_parent(session, ctx) else {
                return false;
            };
            session.tree.get_mut(ctx).previous = Some(found);
            found
        }
    };
    // Follow the previous-incarnation pointer: its original is ours. The
    // chain strictly shortens, so a resolved predecessor is all we need;
    // non-copies carry themselves as original from allocation.
    let Some(original) = session.tree.get(previous).original else {
        return false;
    };
    session.tree.get_mut(ctx).original = Some(original);
    tracing::trace!(
        "linked {} to original {}",
        session.tree.display_path(ctx),
        session.tree.display_path(original)
    );
    true
}

/// Ask the parent's previous incarnation for the child under our name.
fn previous_from_parent(session: &mut BuildSession, ctx: CtxId) -> Option<CtxId> {
    let parent = session.tree.get(ctx).parent?;
    // The parent is a copy of the same generation; until it has found its own
    // previous incarnation it cannot answer for its children.
    let parent_previous = session.tree.get(parent).previous?;
    let name = session.tree.get(ctx).name()?.clone();
    match session
        .namespaces
        .get_local(parent_previous, NamespaceId::ChildNodes, &name)
    {
        Some(NsValue::Ctx(previous)) => Some(previous),
        _ => None,
    }
}
