//! Per-kind reactor behaviours.
//!
//! The closed kind enum keeps statement semantics in one registry of small
//! hook functions instead of a per-kind type hierarchy: at ingestion (and
//! again for copies, where noted) each statement registers its namespace
//! bindings and the inference actions that resolve its cross-references.

use smol_str::SmolStr;

use crate::model::StatementKind;

use super::action::{ActionContext, InferenceAction, Prereq};
use super::context::CtxId;
use super::errors::BuildError;
use super::namespace::{NamespaceId, NsValue};
use super::phase::BuildPhase;
use super::session::BuildSession;

/// Type names the language defines without a `typedef`.
pub(crate) const BUILTIN_TYPES: &[&str] = &[
    "binary", "boolean", "decimal64", "empty", "int32", "int64", "string", "uint32", "uint64",
];

/// Ingestion hook: namespace registrations and action setup for one freshly
/// created context.
pub(crate) fn on_ingest(session: &mut BuildSession, ctx: CtxId) {
    let (kind, name, parent) = {
        let stmt = session.tree.get(ctx);
        (stmt.kind, stmt.raw_arg.clone(), stmt.parent)
    };
    match kind {
        StatementKind::Schema => {
            if let Some(name) = name {
                session.ns_add(ctx, NamespaceId::Schemas, name, NsValue::Ctx(ctx));
            }
        }
        StatementKind::Group => {
            if let (Some(name), Some(parent)) = (name, parent) {
                session.ns_add(parent, NamespaceId::Groups, name, NsValue::Ctx(ctx));
            }
        }
        StatementKind::Typedef => {
            if let (Some(name), Some(parent)) = (name, parent) {
                session.ns_add(parent, NamespaceId::Typedefs, name, NsValue::Ctx(ctx));
            }
        }
        StatementKind::Feature => {
            if let Some(name) = name {
                session.ns_add(ctx, NamespaceId::Features, name, NsValue::Ctx(ctx));
            }
        }
        StatementKind::Container | StatementKind::Leaf => {
            if let (Some(name), Some(parent)) = (name, parent) {
                session.ns_add(parent, NamespaceId::ChildNodes, name, NsValue::Ctx(ctx));
            }
        }
        StatementKind::Import => {
            if let Some(name) = name {
                register_import(session, ctx, name);
            }
        }
        StatementKind::Apply => {
            if let Some(name) = name {
                register_apply(session, ctx, name);
            }
        }
        StatementKind::Extend => register_extend(session, ctx),
        StatementKind::IfFeature => {
            if let Some(name) = name {
                register_feature_gate(session, ctx, name);
            }
        }
        StatementKind::TypeRef => {
            if let Some(name) = name {
                register_type_resolution(session, ctx, name);
            }
        }
        StatementKind::Description | StatementKind::DefaultValue | StatementKind::Config => {}
    }
}

/// Copy hook: a copied `apply` expands fresh at its new site; everything else
/// inherits the source's already-resolved state.
pub(crate) fn on_copy(session: &mut BuildSession, ctx: CtxId) {
    let stmt = session.tree.get(ctx);
    if stmt.kind == StatementKind::Apply {
        if let Some(name) = stmt.raw_arg.clone() {
            register_apply(session, ctx, name);
        }
    }
}

// ============================================================================
// IMPORT
// ============================================================================

/// Resolves a cross-document import and records the import prefix once the
/// imported schema has finished source linkage.
struct ImportAction {
    import_ctx: CtxId,
    schema_name: SmolStr,
    target: Prereq,
}

impl InferenceAction for ImportAction {
    fn apply(&mut self, ctx: &mut ActionContext<'_>) -> Result<(), BuildError> {
        if ctx.ctx(self.target).is_none() {
            // Imported schema is feature-excluded; the import prunes quietly.
            return Ok(());
        }
        let session = ctx.session();
        session.ns_add(
            self.import_ctx,
            NamespaceId::ImportPrefixes,
            self.schema_name.clone(),
            NsValue::Name(self.schema_name.clone()),
        );
        Ok(())
    }

    fn describe(&self) -> String {
        format!("resolve import of schema '{}'", self.schema_name)
    }
}

fn register_import(session: &mut BuildSession, ctx: CtxId, name: SmolStr) {
    let mut builder = session.build_action(ctx);
    let target =
        builder.requires_ctx_in(ctx, NamespaceId::Schemas, name.clone(), BuildPhase::SourceLinkage);
    builder.mutates_ctx(ctx, BuildPhase::SourceLinkage);
    builder.apply(Box::new(ImportAction {
        import_ctx: ctx,
        schema_name: name,
        target,
    }));
}

// ============================================================================
// GROUP REUSE
// ============================================================================

/// Expands a group's subtree into the use site's parent once the group is
/// fully declared.
struct ApplyReuseAction {
    apply_ctx: CtxId,
    group_name: SmolStr,
    group: Prereq,
}

impl InferenceAction for ApplyReuseAction {
    fn apply(&mut self, ctx: &mut ActionContext<'_>) -> Result<(), BuildError> {
        let Some(group) = ctx.ctx(self.group) else {
            return Ok(());
        };
        let session = ctx.session();
        if !session.tree.get(self.apply_ctx).supported {
            return Ok(());
        }
        let Some(parent) = session.tree.get(self.apply_ctx).parent else {
            return Ok(());
        };
        session.expand_reuse(group, parent);
        Ok(())
    }

    fn describe(&self) -> String {
        format!("expand reuse of group '{}'", self.group_name)
    }
}

fn register_apply(session: &mut BuildSession, ctx: CtxId, name: SmolStr) {
    let Some(parent) = session.tree.get(ctx).parent else {
        return;
    };
    let mut builder = session.build_action(ctx);
    let group = builder.requires_ctx_in(
        ctx,
        NamespaceId::Groups,
        name.clone(),
        BuildPhase::FullDeclaration,
    );
    builder.mutates_ctx(parent, BuildPhase::FullDeclaration);
    builder.apply(Box::new(ApplyReuseAction {
        apply_ctx: ctx,
        group_name: name,
        group,
    }));
}

// ============================================================================
// AUGMENTATION
// ============================================================================

/// Grafts an `extend` statement's substatements onto the target named by its
/// path, during effective-model construction.
struct ExtendAction {
    extend_ctx: CtxId,
    path: Vec<SmolStr>,
    target: Prereq,
}

impl InferenceAction for ExtendAction {
    fn apply(&mut self, ctx: &mut ActionContext<'_>) -> Result<(), BuildError> {
        let Some(target) = ctx.ctx(self.target) else {
            // Target pruned by a feature gate; augmentation prunes with it.
            return Ok(());
        };
        let session = ctx.session();
        if !session.tree.get(self.extend_ctx).supported {
            return Ok(());
        }
        session.expand_augmentation(self.extend_ctx, target);
        Ok(())
    }

    fn describe(&self) -> String {
        format!("graft augmentation onto '{}'", self.path.join("/"))
    }
}

fn register_extend(session: &mut BuildSession, ctx: CtxId) {
    let Some(raw) = session.tree.get(ctx).raw_arg.clone() else {
        return;
    };
    let keys: Vec<SmolStr> = raw.split('/').map(SmolStr::new).collect();
    if keys.iter().any(|key| key.is_empty()) {
        // Malformed path; statement-definition grammar checking reports it.
        return;
    }
    let Some(parent) = session.tree.get(ctx).parent else {
        return;
    };
    let mut builder = session.build_action(ctx);
    // The graft carries declared substatements, so it must not run before the
    // extend statement itself is fully declared.
    builder.requires_ctx(ctx, BuildPhase::FullDeclaration);
    let target = builder.mutates_ctx_path(parent, NamespaceId::ChildNodes, keys.clone());
    builder.apply(Box::new(ExtendAction {
        extend_ctx: ctx,
        path: keys,
        target,
    }));
}

// ============================================================================
// FEATURE GATING
// ============================================================================

/// Prunes the gated statement when its feature is undeclared-by-exclusion or
/// outside the build's supported set. Pruning is not an error.
struct FeatureGateAction {
    gate_ctx: CtxId,
    feature_name: SmolStr,
    feature: Prereq,
}

impl InferenceAction for FeatureGateAction {
    fn apply(&mut self, ctx: &mut ActionContext<'_>) -> Result<(), BuildError> {
        let declared = ctx.ctx(self.feature).is_some();
        let session = ctx.session();
        let supported = declared && session.features.contains(&self.feature_name);
        if !supported {
            if let Some(parent) = session.tree.get(self.gate_ctx).parent {
                session.exclude_subtree(parent);
            }
        }
        Ok(())
    }

    fn describe(&self) -> String {
        format!("evaluate feature gate '{}'", self.feature_name)
    }
}

fn register_feature_gate(session: &mut BuildSession, ctx: CtxId, name: SmolStr) {
    let Some(parent) = session.tree.get(ctx).parent else {
        return;
    };
    let mut builder = session.build_action(ctx);
    let feature = builder.requires_ctx_in(
        ctx,
        NamespaceId::Features,
        name.clone(),
        BuildPhase::SourceLinkage,
    );
    builder.mutates_ctx(parent, BuildPhase::StatementDefinition);
    builder.apply(Box::new(FeatureGateAction {
        gate_ctx: ctx,
        feature_name: name,
        feature,
    }));
}

// ============================================================================
// TYPE RESOLUTION
// ============================================================================

/// Holds the enclosing statement's full declaration until the referenced
/// typedef is itself fully declared. Resolution is the observable effect;
/// an unavailable (feature-pruned) typedef degrades to a quiet no-op.
struct TypeResolveAction {
    type_name: SmolStr,
    typedef: Prereq,
}

impl InferenceAction for TypeResolveAction {
    fn apply(&mut self, ctx: &mut ActionContext<'_>) -> Result<(), BuildError> {
        if ctx.ctx(self.typedef).is_none() {
            tracing::debug!("type '{}' points at a pruned typedef", self.type_name);
        }
        Ok(())
    }

    fn describe(&self) -> String {
        format!("resolve type reference '{}'", self.type_name)
    }
}

fn register_type_resolution(session: &mut BuildSession, ctx: CtxId, name: SmolStr) {
    if BUILTIN_TYPES.contains(&name.as_str()) {
        return;
    }
    let Some(parent) = session.tree.get(ctx).parent else {
        return;
    };
    let mut builder = session.build_action(ctx);
    let typedef = builder.requires_ctx_in(
        ctx,
        NamespaceId::Typedefs,
        name.clone(),
        BuildPhase::FullDeclaration,
    );
    builder.mutates_ctx(parent, BuildPhase::FullDeclaration);
    builder.apply(Box::new(TypeResolveAction {
        type_name: name,
        typedef,
    }));
}
